//! Core automaton logic.
//!
//! The grid and its cells, the flow rules, active-cell bookkeeping, terrain
//! construction and the tick scheduler that ties them together.

pub mod flow;
pub mod grid;
pub mod parallel;
pub mod stepping;
pub mod terrain;
pub mod tracker;

pub use flow::{distribute_liquid, is_in_open_air, FlowOutcome};
pub use grid::{Cell, Coord, Grid, Membership};
pub use stepping::{TickClock, TickOutcome, TickScheduler, TickStats};
pub use terrain::{
    generate_terrain, FlatHeightmap, FnHeightmap, GrayscaleHeightmap, HeightmapProvider, Terrain,
};
pub use tracker::ActiveSetTracker;
