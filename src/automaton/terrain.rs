//! One-time terrain construction from a height map.

use super::grid::{Coord, Grid};
use crate::error::{FlowError, Result};
use crate::render::RenderBridge;

/// Source of column heights. `level_at` is the number of solid cells stacked
/// from y = 0 in column (x, z).
pub trait HeightmapProvider {
    fn width(&self) -> i32;
    fn depth(&self) -> i32;
    fn level_at(&self, x: i32, z: i32) -> i32;
}

/// Same level everywhere.
#[derive(Debug, Clone, Copy)]
pub struct FlatHeightmap {
    pub width: i32,
    pub depth: i32,
    pub level: i32,
}

impl HeightmapProvider for FlatHeightmap {
    fn width(&self) -> i32 {
        self.width
    }

    fn depth(&self) -> i32 {
        self.depth
    }

    fn level_at(&self, _x: i32, _z: i32) -> i32 {
        self.level
    }
}

/// Levels computed by a closure.
pub struct FnHeightmap<F> {
    width: i32,
    depth: i32,
    f: F,
}

impl<F: Fn(i32, i32) -> i32> FnHeightmap<F> {
    pub fn new(width: i32, depth: i32, f: F) -> Self {
        FnHeightmap { width, depth, f }
    }
}

impl<F: Fn(i32, i32) -> i32> HeightmapProvider for FnHeightmap<F> {
    fn width(&self) -> i32 {
        self.width
    }

    fn depth(&self) -> i32 {
        self.depth
    }

    fn level_at(&self, x: i32, z: i32) -> i32 {
        (self.f)(x, z)
    }
}

/// Grayscale samples (0.0 black .. 1.0 white) mapped to `level_count` levels.
///
/// Samples are stored row by row: `samples[z * width + x]`.
#[derive(Debug, Clone)]
pub struct GrayscaleHeightmap {
    width: i32,
    depth: i32,
    samples: Vec<f32>,
    level_count: i32,
}

impl GrayscaleHeightmap {
    pub fn new(width: i32, depth: i32, samples: Vec<f32>, level_count: i32) -> Result<Self> {
        if width <= 0 || depth <= 0 || samples.len() != (width as usize) * (depth as usize) {
            return Err(FlowError::InvalidConfig(format!(
                "heightmap of {}x{} needs {} samples, got {}",
                width,
                depth,
                width.max(0) as usize * depth.max(0) as usize,
                samples.len()
            )));
        }
        Ok(GrayscaleHeightmap {
            width,
            depth,
            samples,
            level_count,
        })
    }
}

impl HeightmapProvider for GrayscaleHeightmap {
    fn width(&self) -> i32 {
        self.width
    }

    fn depth(&self) -> i32 {
        self.depth
    }

    fn level_at(&self, x: i32, z: i32) -> i32 {
        let gray = self.samples[(z * self.width + x) as usize].clamp(0.0, 1.0);
        (gray * self.level_count as f32) as i32
    }
}

/// The solid cells produced by terrain generation, in creation order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Terrain {
    cells: Vec<Coord>,
}

impl Terrain {
    pub fn cells(&self) -> &[Coord] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Mark y in [0, level) solid for every column the height map covers.
///
/// All levels are checked before the grid is touched, so a rejected height
/// map leaves the grid unchanged.
pub fn generate_terrain(
    grid: &mut Grid,
    heights: &dyn HeightmapProvider,
    bridge: &mut dyn RenderBridge,
) -> Result<Terrain> {
    let map_width = heights.width().max(0);
    let map_depth = heights.depth().max(0);
    if map_width > grid.width() as i32 || map_depth > grid.depth() as i32 {
        return Err(FlowError::OutOfBounds {
            x: map_width - 1,
            y: 0,
            z: map_depth - 1,
        });
    }

    let mut columns = Vec::with_capacity((map_width * map_depth) as usize);
    for x in 0..map_width {
        for z in 0..map_depth {
            let level = heights.level_at(x, z);
            if level < 0 || level >= grid.height() as i32 {
                return Err(FlowError::HeightOutOfRange {
                    x,
                    z,
                    level,
                    height: grid.height() as i32,
                });
            }
            columns.push((x as i16, z as i16, level as i16));
        }
    }

    let mut terrain = Terrain::default();
    for (x, z, level) in columns {
        for y in 0..level {
            let idx = grid.index_of(x, y, z);
            if grid.mark_solid(idx) {
                terrain.cells.push(Coord::new(x, y, z));
                bridge.on_terrain_cell_created(grid.cell(idx));
            } else if !grid.cell(idx).is_solid() {
                log::warn!("cell ({}, {}, {}) holds liquid; left non-solid", x, y, z);
            }
        }
    }

    log::info!(
        "terrain generated: {} solid cells over {}x{} columns",
        terrain.len(),
        map_width,
        map_depth
    );
    Ok(terrain)
}
