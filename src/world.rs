//! The simulation context: the grid plus its active-set tracker.
//!
//! Every component receives a `World` explicitly; there is no global handle.

use crate::automaton::grid::{Cell, Coord, Grid};
use crate::automaton::terrain::{self, HeightmapProvider, Terrain};
use crate::automaton::tracker::ActiveSetTracker;
use crate::config::SimConfig;
use crate::error::Result;
use crate::render::RenderBridge;

pub struct World {
    grid: Grid,
    tracker: ActiveSetTracker,
}

impl World {
    /// Empty world with the given dimensions.
    pub fn new(width: i16, height: i16, depth: i16) -> Result<Self> {
        Ok(World::from_grid(Grid::new(width, height, depth)?))
    }

    pub fn from_config(config: &SimConfig) -> Result<Self> {
        config.validate()?;
        World::new(config.width, config.height, config.depth)
    }

    pub fn from_grid(grid: Grid) -> Self {
        World {
            grid,
            tracker: ActiveSetTracker::new(),
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn tracker(&self) -> &ActiveSetTracker {
        &self.tracker
    }

    /// Mutable access to both halves at once, for the scheduler.
    pub(crate) fn parts_mut(&mut self) -> (&mut Grid, &mut ActiveSetTracker) {
        (&mut self.grid, &mut self.tracker)
    }

    /// Build solid columns from a height map. Call once, before the first tick.
    pub fn generate_terrain(
        &mut self,
        heights: &dyn HeightmapProvider,
        bridge: &mut dyn RenderBridge,
    ) -> Result<Terrain> {
        terrain::generate_terrain(&mut self.grid, heights, bridge)
    }

    /// Set the saturation of a non-solid cell.
    pub fn set_saturation(&mut self, x: i16, y: i16, z: i16, value: f32) -> Result<()> {
        self.tracker
            .set_saturation(&mut self.grid, Coord::new(x, y, z), value)
    }

    pub fn cell_at(&self, x: i16, y: i16, z: i16) -> Result<&Cell> {
        self.grid.cell_at(x, y, z)
    }

    pub fn saturation_at(&self, x: i16, y: i16, z: i16) -> Result<f32> {
        Ok(self.grid.cell_at(x, y, z)?.saturation())
    }

    /// Cells currently in the active set, in activation order.
    pub fn active_cells(&self) -> impl Iterator<Item = &Cell> {
        self.tracker.active().iter().map(|&idx| self.grid.cell(idx))
    }

    pub fn total_saturation(&self) -> f64 {
        self.tracker.total_saturation()
    }

    pub fn rate_of_change(&self) -> f64 {
        self.tracker.rate_of_change()
    }
}
