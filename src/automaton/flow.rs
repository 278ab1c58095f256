//! Per-cell liquid flow rules.
//!
//! A cell first tries to pour into the cell below it. Only when that is not
//! possible, and the column underneath has settled, does it average its
//! saturation with its non-solid horizontal neighbours.
//!
//! The rules read and write through a [`FlowContext`], so the same code runs
//! against the live grid (serial mode) and against a per-column overlay of a
//! frozen grid (parallel mode).

use super::grid::Grid;
use super::tracker::ActiveSetTracker;

/// Read/write view the flow rules run against.
///
/// Geometry and solidity come from the grid; saturation may be overlaid.
pub trait FlowContext {
    fn grid(&self) -> &Grid;

    fn saturation(&self, idx: usize) -> f32;

    /// Record a new saturation for a non-solid cell.
    fn write_saturation(&mut self, idx: usize, value: f32);
}

/// What a single `distribute_liquid` call did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowOutcome {
    /// Solid or empty cell, or nothing could move.
    Idle,
    /// Liquid poured into the cell below.
    Vertical,
    /// Saturation averaged with the horizontal neighbours.
    Horizontal,
    /// Blocked from spreading: the column below is still falling, or the
    /// average was under the sensitivity threshold.
    Held,
}

/// Serial context: reads the live grid, writes through the tracker.
pub struct TrackedGrid<'a> {
    pub grid: &'a mut Grid,
    pub tracker: &'a mut ActiveSetTracker,
}

impl FlowContext for TrackedGrid<'_> {
    fn grid(&self) -> &Grid {
        &*self.grid
    }

    fn saturation(&self, idx: usize) -> f32 {
        self.grid.cell(idx).saturation()
    }

    fn write_saturation(&mut self, idx: usize, value: f32) {
        self.tracker.write(self.grid, idx, value);
    }
}

/// True if liquid in `idx` can pour into the cell below it.
pub fn can_flow_down<C: FlowContext + ?Sized>(ctx: &C, idx: usize) -> bool {
    match ctx.grid().below_index(idx) {
        Some(below) => !ctx.grid().cell(below).is_solid() && ctx.saturation(below) < 1.0,
        None => false,
    }
}

/// True if the column under `idx` is still draining.
///
/// Walks down through non-solid, non-empty cells. Where the walk stops, the
/// answer is whether that last cell could still pour down, which is only the
/// case when the cell under it is empty and not solid.
pub fn is_in_open_air<C: FlowContext + ?Sized>(ctx: &C, idx: usize) -> bool {
    let grid = ctx.grid();
    let mut current = idx;
    while let Some(below) = grid.below_index(current) {
        if grid.cell(below).is_solid() || ctx.saturation(below) <= 0.0 {
            break;
        }
        current = below;
    }
    can_flow_down(ctx, current)
}

/// Move liquid out of `idx` for one tick.
///
/// Does nothing for solid or empty cells. Vertical flow takes priority; when
/// it happens, the cell does not spread sideways in the same call.
pub fn distribute_liquid<C: FlowContext + ?Sized>(
    ctx: &mut C,
    idx: usize,
    sensitivity_threshold: f32,
) -> FlowOutcome {
    if ctx.grid().cell(idx).is_solid() || ctx.saturation(idx) <= 0.0 {
        return FlowOutcome::Idle;
    }

    if can_flow_down(ctx, idx) {
        pour_down(ctx, idx);
        return FlowOutcome::Vertical;
    }

    spread_sideways(ctx, idx, sensitivity_threshold)
}

fn pour_down<C: FlowContext + ?Sized>(ctx: &mut C, idx: usize) {
    let Some(below) = ctx.grid().below_index(idx) else {
        return;
    };
    let own = ctx.saturation(idx);
    let under = ctx.saturation(below);
    let transfer = (1.0 - under).min(own);

    ctx.write_saturation(idx, (own - transfer).max(0.0));
    ctx.write_saturation(below, (under + transfer).min(1.0));
}

fn spread_sideways<C: FlowContext + ?Sized>(
    ctx: &mut C,
    idx: usize,
    sensitivity_threshold: f32,
) -> FlowOutcome {
    if let Some(below) = ctx.grid().below_index(idx) {
        if !ctx.grid().cell(below).is_solid() && is_in_open_air(ctx, below) {
            return FlowOutcome::Held;
        }
    }

    let neighbors = ctx.grid().neighbor_indices(idx);
    if neighbors.is_empty() {
        return FlowOutcome::Idle;
    }

    let sum: f32 =
        ctx.saturation(idx) + neighbors.iter().map(|&n| ctx.saturation(n)).sum::<f32>();
    let average = (sum / (neighbors.len() + 1) as f32).min(1.0);

    if average <= sensitivity_threshold {
        return FlowOutcome::Held;
    }

    for &n in &neighbors {
        ctx.write_saturation(n, average);
    }
    ctx.write_saturation(idx, average);
    FlowOutcome::Horizontal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automaton::grid::Coord;

    struct Fixture {
        grid: Grid,
        tracker: ActiveSetTracker,
    }

    impl Fixture {
        fn new(width: i16, height: i16, depth: i16) -> Self {
            Fixture {
                grid: Grid::new(width, height, depth).unwrap(),
                tracker: ActiveSetTracker::new(),
            }
        }

        fn solid(&mut self, x: i16, y: i16, z: i16) {
            let idx = self.grid.index_of(x, y, z);
            assert!(self.grid.mark_solid(idx));
        }

        fn fill(&mut self, x: i16, y: i16, z: i16, value: f32) {
            self.tracker
                .set_saturation(&mut self.grid, Coord::new(x, y, z), value)
                .unwrap();
        }

        fn sat(&self, x: i16, y: i16, z: i16) -> f32 {
            self.grid.cell_at(x, y, z).unwrap().saturation()
        }

        fn distribute(&mut self, x: i16, y: i16, z: i16, threshold: f32) -> FlowOutcome {
            let idx = self.grid.index_of(x, y, z);
            let mut ctx = TrackedGrid {
                grid: &mut self.grid,
                tracker: &mut self.tracker,
            };
            distribute_liquid(&mut ctx, idx, threshold)
        }

        fn ctx(&mut self) -> TrackedGrid<'_> {
            TrackedGrid {
                grid: &mut self.grid,
                tracker: &mut self.tracker,
            }
        }
    }

    #[test]
    fn test_vertical_full_transfer() {
        let mut f = Fixture::new(1, 3, 1);
        f.solid(0, 0, 0);
        f.fill(0, 2, 0, 1.0);

        assert_eq!(f.distribute(0, 2, 0, 0.1), FlowOutcome::Vertical);
        assert_eq!(f.sat(0, 1, 0), 1.0);
        assert_eq!(f.sat(0, 2, 0), 0.0);
    }

    #[test]
    fn test_vertical_partial_transfer() {
        let mut f = Fixture::new(1, 2, 1);
        f.fill(0, 0, 0, 0.75);
        f.fill(0, 1, 0, 0.5);

        assert_eq!(f.distribute(0, 1, 0, 0.1), FlowOutcome::Vertical);
        assert_eq!(f.sat(0, 0, 0), 1.0);
        assert_eq!(f.sat(0, 1, 0), 0.25);
    }

    #[test]
    fn test_no_horizontal_after_vertical() {
        // Cell pours down and would also have room to spread
        let mut f = Fixture::new(2, 2, 1);
        f.fill(0, 0, 0, 0.5);
        f.fill(0, 1, 0, 1.0);

        assert_eq!(f.distribute(0, 1, 0, 0.1), FlowOutcome::Vertical);
        assert_eq!(f.sat(1, 1, 0), 0.0);
        assert_eq!(f.sat(0, 1, 0), 0.5);
    }

    #[test]
    fn test_horizontal_average() {
        let mut f = Fixture::new(3, 2, 1);
        for x in 0..3 {
            f.solid(x, 0, 0);
        }
        f.fill(0, 1, 0, 0.9);

        assert_eq!(f.distribute(0, 1, 0, 0.1), FlowOutcome::Horizontal);
        assert!((f.sat(0, 1, 0) - 0.45).abs() < 1e-6);
        assert!((f.sat(1, 1, 0) - 0.45).abs() < 1e-6);
        assert_eq!(f.sat(2, 1, 0), 0.0);
    }

    #[test]
    fn test_horizontal_below_threshold_holds() {
        let mut f = Fixture::new(3, 1, 1);
        f.fill(1, 0, 0, 0.2);

        assert_eq!(f.distribute(1, 0, 0, 0.1), FlowOutcome::Held);
        assert_eq!(f.sat(1, 0, 0), 0.2);
        assert_eq!(f.sat(0, 0, 0), 0.0);
    }

    #[test]
    fn test_floor_layer_spreads() {
        // y == 0 has nothing below: no vertical flow, no air check
        let mut f = Fixture::new(2, 1, 1);
        f.fill(0, 0, 0, 1.0);

        assert_eq!(f.distribute(0, 0, 0, 0.1), FlowOutcome::Horizontal);
        assert_eq!(f.sat(0, 0, 0), 0.5);
        assert_eq!(f.sat(1, 0, 0), 0.5);
    }

    #[test]
    fn test_held_while_column_below_is_falling() {
        // (0,2) sits on a full cell (0,1) that can still pour into empty (0,0)
        let mut f = Fixture::new(2, 3, 1);
        f.fill(0, 1, 0, 1.0);
        f.fill(0, 2, 0, 1.0);

        let middle = f.grid.index_of(0, 1, 0);
        assert!(is_in_open_air(&f.ctx(), middle));
        assert_eq!(f.distribute(0, 2, 0, 0.1), FlowOutcome::Held);
        assert_eq!(f.sat(1, 2, 0), 0.0);
    }

    #[test]
    fn test_open_air_walks_down_column() {
        let mut f = Fixture::new(1, 5, 1);
        f.solid(0, 0, 0);
        f.fill(0, 2, 0, 0.5);
        f.fill(0, 3, 0, 1.0);
        f.fill(0, 4, 0, 1.0);

        let top = f.grid.index_of(0, 4, 0);
        // Descent stops at (0,2); below it (0,1) is empty
        assert!(is_in_open_air(&f.ctx(), top));

        f.fill(0, 1, 0, 1.0);
        // Descent now reaches (0,1); below it is solid
        assert!(!is_in_open_air(&f.ctx(), top));
    }

    #[test]
    fn test_open_air_on_floor_is_false() {
        let mut f = Fixture::new(1, 1, 1);
        f.fill(0, 0, 0, 1.0);
        assert!(!is_in_open_air(&f.ctx(), 0));
    }

    #[test]
    fn test_idle_on_solid_and_empty() {
        let mut f = Fixture::new(2, 2, 1);
        f.solid(0, 0, 0);
        assert_eq!(f.distribute(0, 0, 0, 0.1), FlowOutcome::Idle);
        assert_eq!(f.distribute(1, 1, 0, 0.1), FlowOutcome::Idle);
    }

    #[test]
    fn test_enclosed_cell_is_idle() {
        let mut f = Fixture::new(3, 2, 1);
        for x in 0..3 {
            f.solid(x, 0, 0);
        }
        f.solid(0, 1, 0);
        f.solid(2, 1, 0);
        f.fill(1, 1, 0, 0.6);

        assert_eq!(f.distribute(1, 1, 0, 0.1), FlowOutcome::Idle);
        assert_eq!(f.sat(1, 1, 0), 0.6);
    }

    #[test]
    fn test_flow_conserves_total() {
        let mut f = Fixture::new(3, 3, 3);
        f.fill(1, 2, 1, 0.7);
        f.fill(1, 1, 1, 0.6);
        f.fill(0, 0, 0, 0.3);
        let before = f.tracker.total_saturation();

        for (x, y, z) in [(1, 2, 1), (1, 1, 1), (0, 0, 0), (1, 0, 1)] {
            f.distribute(x, y, z, 0.05);
        }

        let summed: f64 = f.grid.cells().map(|c| c.saturation() as f64).sum();
        assert!((f.tracker.total_saturation() - before).abs() < 1e-5);
        assert!((summed - before).abs() < 1e-5);
    }
}
