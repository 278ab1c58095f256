//! Liquid sources invoked at the start of every tick.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::Result;
use crate::world::World;

/// Injects liquid into the world once per tick, before diffusion.
///
/// Writes must go through [`World::set_saturation`]. Returning an error stops
/// the tick from advancing.
pub trait SpawnSource {
    fn on_tick(&mut self, world: &mut World, tick: u64) -> Result<()>;
}

impl<F> SpawnSource for F
where
    F: FnMut(&mut World, u64) -> Result<()>,
{
    fn on_tick(&mut self, world: &mut World, tick: u64) -> Result<()> {
        self(world, tick)
    }
}

/// Spawns nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSpawn;

impl SpawnSource for NoSpawn {
    fn on_tick(&mut self, _world: &mut World, _tick: u64) -> Result<()> {
        Ok(())
    }
}

/// Fill a cell to 1.0 if it exists, is not solid and is empty.
fn fill_if_empty(world: &mut World, x: i16, y: i16, z: i16) -> Result<bool> {
    let empty = matches!(world.grid().cell_at(x, y, z), Ok(cell) if cell.is_empty());
    if empty {
        world.set_saturation(x, y, z, 1.0)?;
    }
    Ok(empty)
}

/// Fills the 2x2x2 block at the horizontal centre of the top two layers.
#[derive(Debug, Default, Clone, Copy)]
pub struct CenterSpawner;

impl SpawnSource for CenterSpawner {
    fn on_tick(&mut self, world: &mut World, _tick: u64) -> Result<()> {
        let grid = world.grid();
        let (cx, cz) = (grid.width() / 2, grid.depth() / 2);
        let top = grid.height() - 1;

        for y in [top, top - 1] {
            for (x, z) in [(cx, cz), (cx - 1, cz), (cx, cz - 1), (cx - 1, cz - 1)] {
                let open = matches!(world.grid().cell_at(x, y, z), Ok(cell) if !cell.is_solid());
                if open {
                    world.set_saturation(x, y, z, 1.0)?;
                }
            }
        }
        Ok(())
    }
}

/// Countdown shared by the periodic spawners.
#[derive(Debug, Clone, Copy)]
struct Interval {
    every: u32,
    elapsed: u32,
}

impl Interval {
    fn new(every: u32) -> Self {
        Interval {
            every: every.max(1),
            elapsed: 0,
        }
    }

    fn ready(&mut self) -> bool {
        self.elapsed += 1;
        if self.elapsed >= self.every {
            self.elapsed = 0;
            true
        } else {
            false
        }
    }
}

/// Drops liquid into one random empty cell in the upper part of the grid.
#[derive(Debug, Clone)]
pub struct RandomSpawner {
    rng: ChaCha8Rng,
    /// Lowest spawn layer as a fraction of the grid height.
    min_height: f32,
    interval: Interval,
}

impl RandomSpawner {
    pub fn new(seed: u64) -> Self {
        RandomSpawner {
            rng: ChaCha8Rng::seed_from_u64(seed),
            min_height: 0.7,
            interval: Interval::new(1),
        }
    }

    /// Spawn every `every` ticks instead of every tick.
    pub fn with_interval(mut self, every: u32) -> Self {
        self.interval = Interval::new(every);
        self
    }
}

impl SpawnSource for RandomSpawner {
    fn on_tick(&mut self, world: &mut World, _tick: u64) -> Result<()> {
        if !self.interval.ready() {
            return Ok(());
        }
        let grid = world.grid();
        let (width, height, depth) = (grid.width(), grid.height(), grid.depth());
        let low = ((height as f32 * self.min_height) as i16).min(height - 1);

        let x = self.rng.gen_range(0..width);
        let y = self.rng.gen_range(low..height);
        let z = self.rng.gen_range(0..depth);
        fill_if_empty(world, x, y, z)?;
        Ok(())
    }
}

/// Walks a square loop on the top layer between 1/4 and 3/4 of the width and
/// depth, filling the cell under the cursor.
#[derive(Debug, Clone)]
pub struct CircleSpawner {
    cursor: Option<(i16, i16)>,
    interval: Interval,
}

impl Default for CircleSpawner {
    fn default() -> Self {
        CircleSpawner::new()
    }
}

impl CircleSpawner {
    pub fn new() -> Self {
        CircleSpawner {
            cursor: None,
            interval: Interval::new(1),
        }
    }

    pub fn with_interval(mut self, every: u32) -> Self {
        self.interval = Interval::new(every);
        self
    }

    /// Advance the cursor one step around the loop.
    fn step(&mut self, width: i16, depth: i16) -> (i16, i16) {
        let (lo_x, hi_x) = (width / 4, width / 4 * 3);
        let (lo_z, hi_z) = (depth / 4, depth / 4 * 3);
        let (mut x, mut z) = self.cursor.unwrap_or((lo_x, lo_z));

        if x <= lo_x && z < hi_z {
            z += 1;
        }
        if z >= hi_z && x < hi_x {
            x += 1;
        }
        if x >= hi_x && z > lo_z {
            z -= 1;
        }
        if z <= lo_z && x > lo_x {
            x -= 1;
        }

        self.cursor = Some((x, z));
        (x, z)
    }
}

impl SpawnSource for CircleSpawner {
    fn on_tick(&mut self, world: &mut World, _tick: u64) -> Result<()> {
        if !self.interval.ready() {
            return Ok(());
        }
        let grid = world.grid();
        let (width, depth, top) = (grid.width(), grid.depth(), grid.height() - 1);
        let (x, z) = self.step(width, depth);
        fill_if_empty(world, x, top, z)?;
        Ok(())
    }
}

/// A list of spawners that can be switched on and off individually.
#[derive(Default)]
pub struct SpawnSet {
    entries: Vec<(Box<dyn SpawnSource + Send>, bool)>,
}

impl SpawnSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a spawner and return its slot.
    pub fn push(&mut self, source: Box<dyn SpawnSource + Send>, enabled: bool) -> usize {
        self.entries.push((source, enabled));
        self.entries.len() - 1
    }

    pub fn set_enabled(&mut self, slot: usize, enabled: bool) {
        if let Some(entry) = self.entries.get_mut(slot) {
            entry.1 = enabled;
        }
    }

    /// Flip a spawner on or off; returns the new state.
    pub fn toggle(&mut self, slot: usize) -> bool {
        match self.entries.get_mut(slot) {
            Some(entry) => {
                entry.1 = !entry.1;
                entry.1
            }
            None => false,
        }
    }

    pub fn is_enabled(&self, slot: usize) -> bool {
        self.entries.get(slot).map_or(false, |e| e.1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SpawnSource for SpawnSet {
    fn on_tick(&mut self, world: &mut World, tick: u64) -> Result<()> {
        for (source, enabled) in &mut self.entries {
            if *enabled {
                source.on_tick(world, tick)?;
            }
        }
        Ok(())
    }
}
