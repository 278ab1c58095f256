//! Dense voxel storage and bounds-checked cell access.

use smallvec::SmallVec;

use crate::error::{FlowError, Result};

/// Integer position of a cell. `y` is the vertical axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coord {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

impl Coord {
    pub const fn new(x: i16, y: i16, z: i16) -> Self {
        Coord { x, y, z }
    }
}

/// Where a cell stands in the active-cell lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Membership {
    /// Empty and untracked.
    Inactive,
    /// Became non-empty this tick; joins the active set at the next boundary.
    PendingActivation,
    /// Tracked for diffusion.
    Active,
    /// Terrain. Never changes again.
    Solid,
}

/// One voxel of the simulation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cell {
    coord: Coord,
    saturation: f32,
    membership: Membership,
}

impl Cell {
    fn new(coord: Coord) -> Self {
        Cell {
            coord,
            saturation: 0.0,
            membership: Membership::Inactive,
        }
    }

    pub fn coord(&self) -> Coord {
        self.coord
    }

    /// Liquid fill level in [0, 1]. Solid cells always report 1.0.
    pub fn saturation(&self) -> f32 {
        self.saturation
    }

    pub fn membership(&self) -> Membership {
        self.membership
    }

    pub fn is_solid(&self) -> bool {
        self.membership == Membership::Solid
    }

    /// True for a non-solid cell holding no liquid.
    pub fn is_empty(&self) -> bool {
        !self.is_solid() && self.saturation <= 0.0
    }
}

/// Up to four horizontal neighbour indices.
pub type Neighbors = SmallVec<[usize; 4]>;

/// Fixed-size 3D grid of cells.
///
/// Cells live in one `Vec`, laid out z-major, then y, then x (x changes fastest).
#[derive(Clone, Debug)]
pub struct Grid {
    width: i16,
    height: i16,
    depth: i16,
    cells: Vec<Cell>,
}

impl Grid {
    /// Allocate `width * height * depth` inactive, empty cells.
    pub fn new(width: i16, height: i16, depth: i16) -> Result<Self> {
        if width <= 0 || height <= 0 || depth <= 0 {
            return Err(FlowError::InvalidDimensions {
                width: width as i32,
                height: height as i32,
                depth: depth as i32,
            });
        }

        let size = (width as usize) * (height as usize) * (depth as usize);
        let mut cells = Vec::with_capacity(size);
        for z in 0..depth {
            for y in 0..height {
                for x in 0..width {
                    cells.push(Cell::new(Coord::new(x, y, z)));
                }
            }
        }

        log::info!("allocated {}x{}x{} grid ({} cells)", width, height, depth, size);

        Ok(Grid {
            width,
            height,
            depth,
            cells,
        })
    }

    pub fn width(&self) -> i16 {
        self.width
    }

    pub fn height(&self) -> i16 {
        self.height
    }

    pub fn depth(&self) -> i16 {
        self.depth
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Linear index of an in-bounds coordinate.
    #[inline]
    pub fn index_of(&self, x: i16, y: i16, z: i16) -> usize {
        z as usize * self.height as usize * self.width as usize
            + y as usize * self.width as usize
            + x as usize
    }

    /// Check if coordinates are within grid bounds.
    #[inline]
    pub fn in_bounds(&self, x: i16, y: i16, z: i16) -> bool {
        x >= 0 && x < self.width && y >= 0 && y < self.height && z >= 0 && z < self.depth
    }

    /// Linear index, or `OutOfBounds`.
    pub fn checked_index(&self, x: i16, y: i16, z: i16) -> Result<usize> {
        if self.in_bounds(x, y, z) {
            Ok(self.index_of(x, y, z))
        } else {
            Err(FlowError::OutOfBounds {
                x: x as i32,
                y: y as i32,
                z: z as i32,
            })
        }
    }

    pub fn cell_at(&self, x: i16, y: i16, z: i16) -> Result<&Cell> {
        let idx = self.checked_index(x, y, z)?;
        Ok(&self.cells[idx])
    }

    /// Cell by linear index. Panics on an index past the end.
    #[inline]
    pub fn cell(&self, idx: usize) -> &Cell {
        &self.cells[idx]
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter()
    }

    /// The cell at y - 1, or `None` on the floor layer.
    pub fn cell_below(&self, x: i16, y: i16, z: i16) -> Result<Option<&Cell>> {
        let idx = self.checked_index(x, y, z)?;
        Ok(self.below_index(idx).map(|below| &self.cells[below]))
    }

    /// Non-solid orthogonal horizontal neighbours (x-1, z-1, x+1, z+1 order).
    ///
    /// Diagonals are not neighbours: liquid only moves along the x and z axes.
    pub fn neighbors_4(&self, x: i16, y: i16, z: i16) -> Result<Vec<&Cell>> {
        let idx = self.checked_index(x, y, z)?;
        Ok(self
            .neighbor_indices(idx)
            .into_iter()
            .map(|n| &self.cells[n])
            .collect())
    }

    #[inline]
    pub(crate) fn below_index(&self, idx: usize) -> Option<usize> {
        let coord = self.cells[idx].coord;
        if coord.y > 0 {
            Some(idx - self.width as usize)
        } else {
            None
        }
    }

    pub(crate) fn neighbor_indices(&self, idx: usize) -> Neighbors {
        let Coord { x, y, z } = self.cells[idx].coord;
        let mut out = Neighbors::new();
        for (dx, dz) in [(-1, 0), (0, -1), (1, 0), (0, 1)] {
            let nx = x + dx;
            let nz = z + dz;
            if self.in_bounds(nx, y, nz) {
                let n = self.index_of(nx, y, nz);
                if !self.cells[n].is_solid() {
                    out.push(n);
                }
            }
        }
        out
    }

    /// Raw saturation store. Only the tracker calls this for non-solid cells.
    #[inline]
    pub(crate) fn store_saturation(&mut self, idx: usize, value: f32) {
        self.cells[idx].saturation = value;
    }

    #[inline]
    pub(crate) fn set_membership(&mut self, idx: usize, membership: Membership) {
        self.cells[idx].membership = membership;
    }

    /// Turn an untouched cell into terrain. Returns false (and changes
    /// nothing) when the cell is already solid or holds liquid.
    pub(crate) fn mark_solid(&mut self, idx: usize) -> bool {
        let cell = &mut self.cells[idx];
        if cell.membership != Membership::Inactive || cell.saturation > 0.0 {
            return false;
        }
        cell.membership = Membership::Solid;
        cell.saturation = 1.0;
        true
    }
}
