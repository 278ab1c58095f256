//! Liquid Voxels - liquid flow over a static 3D voxel terrain.
//!
//! Each cell holds a saturation in [0, 1]. Every tick, spawn sources inject
//! liquid, active cells pour into the cell below or average with their
//! horizontal neighbours, and the active set is committed at the tick
//! boundary. Rendering is left to a [`RenderBridge`] that only gets notified.

pub mod automaton;
pub mod config;
pub mod error;
pub mod render;
pub mod spawn;
pub mod world;

pub use automaton::{
    Cell, Coord, FlatHeightmap, FnHeightmap, GrayscaleHeightmap, Grid, HeightmapProvider,
    Membership, Terrain, TickClock, TickOutcome, TickScheduler, TickStats,
};
pub use config::{ExecutionMode, SimConfig};
pub use error::{FlowError, Result};
pub use render::{ChannelBridge, NullBridge, RecordingBridge, RenderBridge, RenderEvent};
pub use spawn::{CenterSpawner, CircleSpawner, NoSpawn, RandomSpawner, SpawnSet, SpawnSource};
pub use world::World;
