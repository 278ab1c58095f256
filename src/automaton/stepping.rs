//! Tick scheduling: spawn, diffuse, commit.
//!
//! A tick runs to completion before the next one starts:
//! 1. Spawn: the spawn source may write saturations through the tracker.
//! 2. Diffuse: every cell of the active snapshot taken after spawning gets one
//!    `distribute_liquid` call. Cells that only became non-empty during this
//!    tick are pending, not active, so they are not in the snapshot.
//! 3. Commit: drained cells leave the active set, pending cells join it,
//!    aggregates are closed and the render bridge is notified.

use std::time::Duration;

use super::flow::{distribute_liquid, TrackedGrid};
use super::parallel::{diffuse_class, ColumnPlan};
use crate::config::{self, ExecutionMode, SimConfig};
use crate::error::Result;
use crate::render::RenderBridge;
use crate::spawn::SpawnSource;
use crate::world::World;

/// Most ticks a single `TickClock::accumulate` call will hand out.
pub const MAX_CATCH_UP_TICKS: u32 = 8;

/// Aggregates published after a completed tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickStats {
    /// Number of ticks completed so far, this one included.
    pub tick: u64,
    pub active_cells: usize,
    pub activated: usize,
    pub deactivated: usize,
    pub total_saturation: f64,
    pub rate_of_change: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TickOutcome {
    /// The scheduler is paused; nothing ran.
    Paused,
    Completed(TickStats),
}

/// Fixed-step accumulator turning elapsed time into due ticks.
#[derive(Clone, Debug)]
pub struct TickClock {
    interval: Duration,
    accumulated: Duration,
}

impl TickClock {
    /// Clock for `tick_rate` ticks per second. Fails with `InvalidConfig`
    /// when the rate has no positive, representable interval.
    pub fn new(tick_rate: f32) -> Result<Self> {
        Ok(TickClock {
            interval: config::tick_interval(tick_rate)?,
            accumulated: Duration::ZERO,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Add elapsed time; returns how many ticks are now due.
    ///
    /// At most `MAX_CATCH_UP_TICKS` are returned; time beyond that is dropped
    /// so a long stall cannot snowball.
    pub fn accumulate(&mut self, elapsed: Duration) -> u32 {
        self.accumulated += elapsed;
        let mut due = 0;
        while self.accumulated >= self.interval && due < MAX_CATCH_UP_TICKS {
            self.accumulated -= self.interval;
            due += 1;
        }
        if self.accumulated >= self.interval {
            log::debug!(
                "tick clock behind by {:?}; dropping backlog",
                self.accumulated
            );
            self.accumulated = Duration::ZERO;
        }
        due
    }

    /// Give back the time of `ticks` handed out but never run.
    fn refund(&mut self, ticks: u32) {
        self.accumulated += self.interval * ticks;
    }
}

/// Drives ticks over a `World`. Owns neither the world nor the collaborators.
pub struct TickScheduler {
    mode: ExecutionMode,
    sensitivity_threshold: f32,
    /// Only built in parallel mode.
    thread_pool: Option<rayon::ThreadPool>,
    clock: TickClock,
    paused: bool,
    ticks: u64,
}

impl TickScheduler {
    pub fn new(config: &SimConfig) -> Result<Self> {
        config.validate()?;

        let thread_pool = match config.execution_mode {
            ExecutionMode::Serial => None,
            ExecutionMode::Parallel => Some(build_pool(config.worker_threads)),
        };
        log::info!(
            "tick scheduler: {:?} mode, threshold {}, {} ticks/s",
            config.execution_mode,
            config.sensitivity_threshold,
            config.tick_rate
        );

        Ok(TickScheduler {
            mode: config.execution_mode,
            sensitivity_threshold: config.sensitivity_threshold,
            thread_pool,
            clock: TickClock::new(config.tick_rate)?,
            paused: false,
            ticks: 0,
        })
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Completed ticks.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn toggle_pause(&mut self) -> bool {
        self.paused = !self.paused;
        self.paused
    }

    /// Run one tick. A spawn failure is returned before any diffusion and the
    /// tick counter does not advance.
    pub fn tick(
        &mut self,
        world: &mut World,
        spawn: &mut dyn SpawnSource,
        bridge: &mut dyn RenderBridge,
    ) -> Result<TickOutcome> {
        if self.paused {
            return Ok(TickOutcome::Paused);
        }

        if let Err(err) = spawn.on_tick(world, self.ticks) {
            log::warn!("tick {} aborted: {}", self.ticks + 1, err);
            return Err(err);
        }

        let snapshot = world.tracker().snapshot_active();
        match self.thread_pool {
            Some(ref pool) => self.diffuse_parallel(pool, world, &snapshot),
            None => self.diffuse_serial(world, &snapshot),
        }

        let stats = self.commit(world, bridge);
        log::debug!(
            "tick {}: {} active (+{} -{}), total {:.3}, rate {:.3}",
            stats.tick,
            stats.active_cells,
            stats.activated,
            stats.deactivated,
            stats.total_saturation,
            stats.rate_of_change
        );
        Ok(TickOutcome::Completed(stats))
    }

    /// Run however many ticks `elapsed` makes due. Returns the stats of each
    /// completed tick; nothing runs while paused.
    ///
    /// On a spawn failure the error is returned and the time of the failed
    /// tick and of every tick after it goes back to the clock, so the next
    /// call retries them. Ticks completed before the failure stay applied;
    /// `ticks()` counts them.
    pub fn advance(
        &mut self,
        elapsed: Duration,
        world: &mut World,
        spawn: &mut dyn SpawnSource,
        bridge: &mut dyn RenderBridge,
    ) -> Result<Vec<TickStats>> {
        if self.paused {
            return Ok(Vec::new());
        }
        let due = self.clock.accumulate(elapsed);
        let mut completed = Vec::with_capacity(due as usize);
        for run in 0..due {
            match self.tick(world, spawn, bridge) {
                Ok(TickOutcome::Completed(stats)) => completed.push(stats),
                Ok(TickOutcome::Paused) => {}
                Err(err) => {
                    self.clock.refund(due - run);
                    log::debug!(
                        "advance stopped after {} of {} ticks",
                        completed.len(),
                        due
                    );
                    return Err(err);
                }
            }
        }
        Ok(completed)
    }

    fn diffuse_serial(&self, world: &mut World, snapshot: &[usize]) {
        let (grid, tracker) = world.parts_mut();
        let mut ctx = TrackedGrid { grid, tracker };
        for &idx in snapshot {
            distribute_liquid(&mut ctx, idx, self.sensitivity_threshold);
        }
    }

    fn diffuse_parallel(&self, pool: &rayon::ThreadPool, world: &mut World, snapshot: &[usize]) {
        let plan = ColumnPlan::from_snapshot(world.grid(), snapshot);
        let threshold = self.sensitivity_threshold;
        log::trace!("parallel diffusion over {} columns", plan.column_count());

        // One install per tick; each class commits before the next one reads.
        pool.install(|| {
            for class in plan.classes() {
                if class.is_empty() {
                    continue;
                }
                let writes = diffuse_class(world.grid(), class, threshold);

                let (grid, tracker) = world.parts_mut();
                for column in writes {
                    for (idx, value) in column {
                        tracker.write(grid, idx, value);
                    }
                }
            }
        });
    }

    fn commit(&mut self, world: &mut World, bridge: &mut dyn RenderBridge) -> TickStats {
        let (grid, tracker) = world.parts_mut();

        let retired = tracker.retire_drained(grid);
        let activated = tracker.activate_pending(grid);
        tracker.close_tick();
        self.ticks += 1;

        for &idx in &retired {
            bridge.on_cell_deactivated(grid.cell(idx));
        }
        let survivors = tracker.active_len() - activated.len();
        for &idx in &tracker.active()[..survivors] {
            bridge.on_cell_updated(grid.cell(idx));
        }
        for &idx in &activated {
            bridge.on_cell_activated(grid.cell(idx));
        }
        log::trace!(
            "commit: {} retired, {} activated",
            retired.len(),
            activated.len()
        );

        TickStats {
            tick: self.ticks,
            active_cells: tracker.active_len(),
            activated: activated.len(),
            deactivated: retired.len(),
            total_saturation: tracker.total_saturation(),
            rate_of_change: tracker.rate_of_change(),
        }
    }
}

fn build_pool(worker_threads: u8) -> rayon::ThreadPool {
    let mut builder = rayon::ThreadPoolBuilder::new();
    if worker_threads > 0 {
        builder = builder.num_threads(worker_threads as usize);
    }
    builder.build().unwrap_or_else(|err| {
        log::warn!("failed to build worker pool ({}); using one thread", err);
        rayon::ThreadPoolBuilder::new()
            .num_threads(1)
            .build()
            .expect("single-thread pool")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automaton::grid::Membership;
    use crate::error::FlowError;
    use crate::render::{NullBridge, RecordingBridge, RenderEvent};
    use crate::spawn::NoSpawn;

    fn scheduler(mode: ExecutionMode) -> TickScheduler {
        let mut config = SimConfig::with_dimensions(4, 4, 4);
        config.execution_mode = mode;
        config.worker_threads = 2;
        TickScheduler::new(&config).unwrap()
    }

    #[test]
    fn test_tick_clock_counts_due_ticks() {
        let mut clock = TickClock::new(10.0).unwrap();
        assert_eq!(clock.accumulate(Duration::from_millis(50)), 0);
        assert_eq!(clock.accumulate(Duration::from_millis(60)), 1);
        assert_eq!(clock.accumulate(Duration::from_millis(200)), 2);
    }

    #[test]
    fn test_tick_clock_drops_backlog() {
        let mut clock = TickClock::new(100.0).unwrap();
        assert_eq!(clock.accumulate(Duration::from_secs(5)), MAX_CATCH_UP_TICKS);
        assert_eq!(clock.accumulate(Duration::ZERO), 0);
    }

    #[test]
    fn test_extreme_tick_rates_are_rejected() {
        assert!(matches!(
            TickClock::new(1e-20),
            Err(FlowError::InvalidConfig(_))
        ));
        assert!(matches!(
            TickClock::new(1e30),
            Err(FlowError::InvalidConfig(_))
        ));

        // The scheduler reports the same error instead of panicking
        let mut config = SimConfig::with_dimensions(2, 2, 2);
        config.tick_rate = 1e-20;
        assert!(TickScheduler::new(&config).is_err());
        config.tick_rate = 1e30;
        assert!(TickScheduler::new(&config).is_err());
    }

    #[test]
    fn test_advance_retries_ticks_after_spawn_failure() {
        let mut world = World::new(2, 2, 2).unwrap();
        let mut config = SimConfig::with_dimensions(2, 2, 2);
        config.tick_rate = 10.0;
        let mut sched = TickScheduler::new(&config).unwrap();

        // Fails on the second tick only
        let mut failing = |_: &mut World, tick: u64| -> Result<()> {
            if tick == 1 {
                Err(FlowError::Spawn("dry".into()))
            } else {
                Ok(())
            }
        };
        let err = sched
            .advance(Duration::from_millis(350), &mut world, &mut failing, &mut NullBridge)
            .unwrap_err();
        assert_eq!(err, FlowError::Spawn("dry".into()));
        assert_eq!(sched.ticks(), 1);

        // The two ticks that did not run are still due
        let stats = sched
            .advance(Duration::ZERO, &mut world, &mut NoSpawn, &mut NullBridge)
            .unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[1].tick, 3);
    }

    #[test]
    fn test_spawned_cells_wait_one_tick() {
        let mut world = World::new(1, 3, 1).unwrap();
        let mut sched = scheduler(ExecutionMode::Serial);
        let mut spawned = false;
        let mut spawn = |w: &mut World, _tick: u64| -> Result<()> {
            if !spawned {
                spawned = true;
                w.set_saturation(0, 2, 0, 1.0)?;
            }
            Ok(())
        };

        sched.tick(&mut world, &mut spawn, &mut NullBridge).unwrap();
        // Pending during tick 1, so it did not fall
        assert_eq!(world.saturation_at(0, 2, 0).unwrap(), 1.0);
        assert_eq!(
            world.cell_at(0, 2, 0).unwrap().membership(),
            Membership::Active
        );

        sched.tick(&mut world, &mut spawn, &mut NullBridge).unwrap();
        assert_eq!(world.saturation_at(0, 2, 0).unwrap(), 0.0);
        assert_eq!(world.saturation_at(0, 1, 0).unwrap(), 1.0);
    }

    #[test]
    fn test_pause_is_a_no_op() {
        let mut world = World::new(2, 2, 2).unwrap();
        world.set_saturation(0, 1, 0, 1.0).unwrap();
        let mut sched = scheduler(ExecutionMode::Serial);
        sched.pause();

        let mut calls = 0;
        let mut spawn = |_: &mut World, _tick: u64| -> Result<()> {
            calls += 1;
            Ok(())
        };
        let outcome = sched.tick(&mut world, &mut spawn, &mut NullBridge).unwrap();

        assert_eq!(outcome, TickOutcome::Paused);
        assert_eq!(sched.ticks(), 0);
        assert_eq!(world.tracker().pending_len(), 1);
        assert_eq!(world.tracker().active_len(), 0);
        assert_eq!(world.saturation_at(0, 1, 0).unwrap(), 1.0);
        assert!(sched
            .advance(Duration::from_secs(1), &mut world, &mut NoSpawn, &mut NullBridge)
            .unwrap()
            .is_empty());
        drop(spawn);
        assert_eq!(calls, 0);

        assert!(!sched.toggle_pause());
        assert!(matches!(
            sched.tick(&mut world, &mut NoSpawn, &mut NullBridge).unwrap(),
            TickOutcome::Completed(_)
        ));
    }

    #[test]
    fn test_spawn_failure_does_not_advance() {
        let mut world = World::new(2, 2, 2).unwrap();
        let mut sched = scheduler(ExecutionMode::Serial);
        let mut failing =
            |_: &mut World, _tick: u64| -> Result<()> { Err(FlowError::Spawn("no water".into())) };

        let err = sched
            .tick(&mut world, &mut failing, &mut NullBridge)
            .unwrap_err();
        assert_eq!(err, FlowError::Spawn("no water".into()));
        assert_eq!(sched.ticks(), 0);
    }

    #[test]
    fn test_commit_notifies_bridge() {
        let mut world = World::new(1, 2, 1).unwrap();
        world.set_saturation(0, 1, 0, 0.5).unwrap();
        let mut sched = scheduler(ExecutionMode::Serial);
        let mut bridge = RecordingBridge::new();

        // Tick 1: the pending cell is activated
        sched.tick(&mut world, &mut NoSpawn, &mut bridge).unwrap();
        assert_eq!(
            bridge.take(),
            vec![RenderEvent::Activated(*world.cell_at(0, 1, 0).unwrap())]
        );

        // Tick 2: it pours down; the top drains, the bottom becomes pending
        sched.tick(&mut world, &mut NoSpawn, &mut bridge).unwrap();
        let events = bridge.take();
        assert_eq!(
            events,
            vec![
                RenderEvent::Deactivated(*world.cell_at(0, 1, 0).unwrap()),
                RenderEvent::Activated(*world.cell_at(0, 0, 0).unwrap()),
            ]
        );

        // Tick 3: the bottom cell has nowhere to go and stays active
        sched.tick(&mut world, &mut NoSpawn, &mut bridge).unwrap();
        assert_eq!(
            bridge.take(),
            vec![RenderEvent::Updated(*world.cell_at(0, 0, 0).unwrap())]
        );
    }

    #[test]
    fn test_advance_runs_due_ticks() {
        let mut world = World::new(2, 2, 2).unwrap();
        let mut config = SimConfig::with_dimensions(2, 2, 2);
        config.tick_rate = 10.0;
        let mut sched = TickScheduler::new(&config).unwrap();

        let stats = sched
            .advance(Duration::from_millis(350), &mut world, &mut NoSpawn, &mut NullBridge)
            .unwrap();
        assert_eq!(stats.len(), 3);
        assert_eq!(stats[2].tick, 3);
        assert_eq!(sched.ticks(), 3);
    }

    #[test]
    fn test_parallel_mode_builds_pool() {
        assert!(scheduler(ExecutionMode::Parallel).thread_pool.is_some());
        assert!(scheduler(ExecutionMode::Serial).thread_pool.is_none());
        assert_eq!(scheduler(ExecutionMode::Parallel).mode(), ExecutionMode::Parallel);
    }
}
