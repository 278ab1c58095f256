//! Simulation configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FlowError, Result};

/// How the diffusion phase walks the active-cell snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExecutionMode {
    /// One cell after another, each seeing the writes of the previous one.
    #[default]
    Serial,
    /// Column colour classes processed on a rayon pool, committed serially.
    Parallel,
}

/// Recognised simulation options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Grid size along x.
    pub width: i16,
    /// Grid size along y (vertical).
    pub height: i16,
    /// Grid size along z.
    pub depth: i16,
    /// Horizontal averaging only happens when the average exceeds this.
    pub sensitivity_threshold: f32,
    /// Ticks per second, used by `TickClock`.
    pub tick_rate: f32,
    pub execution_mode: ExecutionMode,
    /// Worker threads for parallel mode (0 = let rayon decide).
    pub worker_threads: u8,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            width: 32,
            height: 32,
            depth: 32,
            sensitivity_threshold: 0.1,
            tick_rate: 20.0,
            execution_mode: ExecutionMode::Serial,
            worker_threads: 0,
        }
    }
}

impl SimConfig {
    /// Config with the given dimensions and every other option at its default.
    pub fn with_dimensions(width: i16, height: i16, depth: i16) -> Self {
        Self {
            width,
            height,
            depth,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.width <= 0 || self.height <= 0 || self.depth <= 0 {
            return Err(FlowError::InvalidDimensions {
                width: self.width as i32,
                height: self.height as i32,
                depth: self.depth as i32,
            });
        }
        if !self.sensitivity_threshold.is_finite() || self.sensitivity_threshold < 0.0 {
            return Err(FlowError::InvalidConfig(format!(
                "sensitivity_threshold must be a finite value >= 0, got {}",
                self.sensitivity_threshold
            )));
        }
        tick_interval(self.tick_rate)?;
        Ok(())
    }
}

/// Time between ticks at `tick_rate` ticks per second.
///
/// Rejects rates whose interval is not a positive, representable `Duration`.
pub fn tick_interval(tick_rate: f32) -> Result<Duration> {
    if !tick_rate.is_finite() || tick_rate <= 0.0 {
        return Err(FlowError::InvalidConfig(format!(
            "tick_rate must be a finite value > 0, got {}",
            tick_rate
        )));
    }
    match Duration::try_from_secs_f32(1.0 / tick_rate) {
        Ok(interval) if !interval.is_zero() => Ok(interval),
        _ => Err(FlowError::InvalidConfig(format!(
            "tick_rate {} gives no usable tick interval",
            tick_rate
        ))),
    }
}
