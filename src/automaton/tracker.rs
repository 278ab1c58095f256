//! Active-cell bookkeeping and the saturation mutator.
//!
//! Every saturation write goes through [`ActiveSetTracker::write`], which keeps
//! three things consistent without rescanning the grid:
//! - the running total of liquid in non-solid cells,
//! - the pending queue of cells that just became non-empty,
//! - the list of active cells that drained to zero during the tick.
//!
//! Membership changes are only applied at the tick boundary
//! (`retire_drained` + `activate_pending`), so the active list never changes
//! while a tick iterates its snapshot.

use super::grid::{Coord, Grid, Membership};
use crate::error::{FlowError, Result};

/// Changes smaller than this do not count towards `rate_of_change`.
pub const RATE_TOLERANCE: f64 = 0.1;

#[derive(Debug, Default, Clone)]
pub struct ActiveSetTracker {
    /// Indices of `Active` cells, in activation order.
    active: Vec<usize>,
    /// Indices of `PendingActivation` cells, in the order they filled.
    pending: Vec<usize>,
    /// Active cells that hit zero since the last boundary. May hold duplicates.
    drained: Vec<usize>,
    total_saturation: f64,
    total_at_last_tick: f64,
    rate_of_change: f64,
}

impl ActiveSetTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validated entry point for external writers (spawn sources, tests).
    pub fn set_saturation(&mut self, grid: &mut Grid, coord: Coord, value: f32) -> Result<()> {
        let idx = grid.checked_index(coord.x, coord.y, coord.z)?;
        if !(0.0..=1.0).contains(&value) {
            return Err(FlowError::InvalidSaturation(value));
        }
        if grid.cell(idx).is_solid() {
            return Err(FlowError::SolidCell {
                x: coord.x as i32,
                y: coord.y as i32,
                z: coord.z as i32,
            });
        }
        self.write(grid, idx, value);
        Ok(())
    }

    /// Unchecked mutator used by the flow rules.
    ///
    /// The flow rules only produce values in [0, 1] on non-solid cells; anything
    /// else is an algorithm bug.
    pub(crate) fn write(&mut self, grid: &mut Grid, idx: usize, value: f32) {
        debug_assert!(
            (0.0..=1.0).contains(&value),
            "saturation {} out of range at {:?}",
            value,
            grid.cell(idx).coord()
        );
        let cell = *grid.cell(idx);
        debug_assert!(!cell.is_solid(), "write to solid cell {:?}", cell.coord());

        let old = cell.saturation();
        match cell.membership() {
            Membership::Inactive => {
                if value > 0.0 {
                    grid.set_membership(idx, Membership::PendingActivation);
                    self.pending.push(idx);
                }
            }
            Membership::Active => {
                if value <= 0.0 && old > 0.0 {
                    self.drained.push(idx);
                }
            }
            Membership::PendingActivation | Membership::Solid => {}
        }

        self.total_saturation += value as f64 - old as f64;
        grid.store_saturation(idx, value);
    }

    /// Drop active cells that are still empty. Returns the removed indices.
    pub fn retire_drained(&mut self, grid: &mut Grid) -> Vec<usize> {
        let mut retired = Vec::new();
        for idx in self.drained.drain(..) {
            let cell = grid.cell(idx);
            if cell.membership() == Membership::Active && cell.saturation() <= 0.0 {
                grid.set_membership(idx, Membership::Inactive);
                retired.push(idx);
            }
        }
        if !retired.is_empty() {
            self.active
                .retain(|&idx| grid.cell(idx).membership() == Membership::Active);
        }
        retired
    }

    /// Move every pending cell that still holds liquid into the active set.
    ///
    /// Pending cells that drained again before the boundary fall back to
    /// `Inactive` without ever becoming active. Returns the activated indices.
    pub fn activate_pending(&mut self, grid: &mut Grid) -> Vec<usize> {
        let mut activated = Vec::with_capacity(self.pending.len());
        for idx in self.pending.drain(..) {
            if grid.cell(idx).saturation() > 0.0 {
                grid.set_membership(idx, Membership::Active);
                self.active.push(idx);
                activated.push(idx);
            } else {
                grid.set_membership(idx, Membership::Inactive);
            }
        }
        activated
    }

    /// Close the tick's aggregates: compute the rate of change against the
    /// previous boundary.
    pub fn close_tick(&mut self) {
        let delta = self.total_saturation - self.total_at_last_tick;
        self.rate_of_change = if delta < RATE_TOLERANCE { 0.0 } else { delta };
        self.total_at_last_tick = self.total_saturation;
    }

    /// Stable copy of the active list for one diffusion pass.
    pub fn snapshot_active(&self) -> Vec<usize> {
        self.active.clone()
    }

    pub fn active(&self) -> &[usize] {
        &self.active
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Sum of saturation over all non-solid cells.
    pub fn total_saturation(&self) -> f64 {
        self.total_saturation
    }

    /// Liquid gained over the last completed tick (0 when below tolerance).
    pub fn rate_of_change(&self) -> f64 {
        self.rate_of_change
    }
}
