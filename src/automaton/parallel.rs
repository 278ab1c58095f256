//! Column colouring and overlay workspaces for parallel diffusion.
//!
//! A cell's flow touches its own column (pouring down, the open-air walk)
//! and the four orthogonal neighbour columns (averaging). Colouring columns by
//! `(x mod 3, z mod 3)` puts every pair of same-colour columns at Manhattan
//! distance >= 3, so their footprints never overlap and one colour class can
//! be diffused concurrently against a frozen grid.
//!
//! Each column runs its cells serially in a [`ColumnOverlay`]: reads fall
//! through to the frozen grid unless the column already wrote that cell,
//! writes are appended to an ordered log. After the class finishes, the logs
//! are replayed through the tracker, one after another.

use rayon::prelude::*;
use rustc_hash::FxHashMap;

use super::flow::{distribute_liquid, FlowContext};
use super::grid::Grid;

/// Number of column colour classes.
pub const COLOR_CLASSES: usize = 9;

/// Colour class of column (x, z).
#[inline]
pub fn column_color(x: i16, z: i16) -> usize {
    (x.rem_euclid(3) as usize) * 3 + z.rem_euclid(3) as usize
}

/// Snapshot cells of one column, in snapshot order.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnBatch {
    pub x: i16,
    pub z: i16,
    pub cells: Vec<usize>,
}

/// A tick's snapshot split into colour classes of column batches.
#[derive(Clone, Debug, Default)]
pub struct ColumnPlan {
    classes: [Vec<ColumnBatch>; COLOR_CLASSES],
}

impl ColumnPlan {
    /// Group snapshot cells by column. Columns keep the order in which they
    /// first appear in the snapshot; cells keep snapshot order.
    pub fn from_snapshot(grid: &Grid, snapshot: &[usize]) -> Self {
        let mut plan = ColumnPlan::default();
        let mut slots: FxHashMap<(i16, i16), usize> = FxHashMap::default();

        for &idx in snapshot {
            let coord = grid.cell(idx).coord();
            let class = &mut plan.classes[column_color(coord.x, coord.z)];
            let pos = *slots.entry((coord.x, coord.z)).or_insert_with(|| {
                class.push(ColumnBatch {
                    x: coord.x,
                    z: coord.z,
                    cells: Vec::new(),
                });
                class.len() - 1
            });
            class[pos].cells.push(idx);
        }

        plan
    }

    pub fn classes(&self) -> impl Iterator<Item = &[ColumnBatch]> {
        self.classes.iter().map(|c| c.as_slice())
    }

    pub fn column_count(&self) -> usize {
        self.classes.iter().map(|c| c.len()).sum()
    }
}

/// Private view of a frozen grid for one column's diffusion.
pub struct ColumnOverlay<'a> {
    grid: &'a Grid,
    overrides: FxHashMap<usize, f32>,
    writes: Vec<(usize, f32)>,
}

impl<'a> ColumnOverlay<'a> {
    pub fn new(grid: &'a Grid) -> Self {
        ColumnOverlay {
            grid,
            overrides: FxHashMap::default(),
            writes: Vec::new(),
        }
    }

    /// Ordered write log, ready to be replayed through the tracker.
    pub fn into_writes(self) -> Vec<(usize, f32)> {
        self.writes
    }
}

impl FlowContext for ColumnOverlay<'_> {
    fn grid(&self) -> &Grid {
        self.grid
    }

    fn saturation(&self, idx: usize) -> f32 {
        match self.overrides.get(&idx) {
            Some(&value) => value,
            None => self.grid.cell(idx).saturation(),
        }
    }

    fn write_saturation(&mut self, idx: usize, value: f32) {
        self.overrides.insert(idx, value);
        self.writes.push((idx, value));
    }
}

/// Diffuse one colour class in parallel and return each column's write log,
/// in the order the batches appear in the class.
pub fn diffuse_class(
    grid: &Grid,
    class: &[ColumnBatch],
    sensitivity_threshold: f32,
) -> Vec<Vec<(usize, f32)>> {
    class
        .par_iter()
        .map(|batch| {
            let mut overlay = ColumnOverlay::new(grid);
            for &idx in &batch.cells {
                distribute_liquid(&mut overlay, idx, sensitivity_threshold);
            }
            overlay.into_writes()
        })
        .collect()
}
