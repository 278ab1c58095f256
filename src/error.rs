//! Error type shared by grid construction, terrain generation and the
//! saturation mutator.

use thiserror::Error;

/// Errors reported by the simulation core.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FlowError {
    /// A coordinate outside `[0, dimension)` was used.
    #[error("coordinate ({x}, {y}, {z}) is outside the grid")]
    OutOfBounds { x: i32, y: i32, z: i32 },

    /// A grid dimension was zero or negative.
    #[error("invalid grid dimensions {width}x{height}x{depth}")]
    InvalidDimensions { width: i32, height: i32, depth: i32 },

    /// The height function returned a level the grid cannot hold.
    #[error("height {level} at column ({x}, {z}) is outside [0, {height})")]
    HeightOutOfRange {
        x: i32,
        z: i32,
        level: i32,
        height: i32,
    },

    /// A saturation write outside `[0, 1]` (or NaN).
    #[error("saturation {0} is outside [0, 1]")]
    InvalidSaturation(f32),

    /// A write was aimed at a solid cell.
    #[error("cell ({x}, {y}, {z}) is solid")]
    SolidCell { x: i32, y: i32, z: i32 },

    /// A configuration value other than the dimensions was rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The spawn collaborator failed; the tick did not advance.
    #[error("spawn source failed: {0}")]
    Spawn(String),
}

pub type Result<T> = std::result::Result<T, FlowError>;
