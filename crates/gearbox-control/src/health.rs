//! [`FreshnessMonitor`] – per-actuator input watchdog.
//!
//! The monitor is fed once per control cycle with the timestamp of the sample
//! the backend returned (or `None` when the backend could not produce one).
//! A sample is *fresh* only when its timestamp is strictly later than the
//! last fresh one; anything else is a stale cycle.  After `threshold`
//! consecutive stale cycles the inputs are considered timed out.
//!
//! Counting cycles instead of wall-clock time keeps the monitor deterministic
//! under simulation.
//!
//! # Example
//!
//! ```
//! use gearbox_control::health::{FreshnessMonitor, InputHealth};
//!
//! let mut monitor = FreshnessMonitor::new(2);
//! assert_eq!(monitor.observe(Some(0.02)), InputHealth::Fresh);
//! assert_eq!(monitor.observe(Some(0.02)), InputHealth::Stale { cycles: 1 });
//! assert_eq!(monitor.observe(None), InputHealth::TimedOut { cycles: 2 });
//! assert_eq!(monitor.observe(Some(0.04)), InputHealth::Fresh);
//! ```

/// Outcome of one [`FreshnessMonitor::observe`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputHealth {
    Fresh,
    /// Stale, but below the timeout threshold.
    Stale { cycles: u32 },
    /// At least `threshold` consecutive stale cycles.
    TimedOut { cycles: u32 },
}

#[derive(Debug, Clone)]
pub struct FreshnessMonitor {
    threshold: u32,
    last_timestamp: Option<f64>,
    stale_cycles: u32,
}

impl FreshnessMonitor {
    /// `threshold` is clamped to at least one cycle.
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            last_timestamp: None,
            stale_cycles: 0,
        }
    }

    /// Record this cycle's sample timestamp and classify it.
    pub fn observe(&mut self, timestamp_s: Option<f64>) -> InputHealth {
        let fresh = match (timestamp_s, self.last_timestamp) {
            (Some(now), Some(last)) => now > last,
            (Some(now), None) => now.is_finite(),
            (None, _) => false,
        };

        if fresh {
            self.last_timestamp = timestamp_s;
            self.stale_cycles = 0;
            return InputHealth::Fresh;
        }

        self.stale_cycles = self.stale_cycles.saturating_add(1);
        self.health()
    }

    /// Classification of the most recent observation.
    pub fn health(&self) -> InputHealth {
        match self.stale_cycles {
            0 => InputHealth::Fresh,
            n if n >= self.threshold => InputHealth::TimedOut { cycles: n },
            n => InputHealth::Stale { cycles: n },
        }
    }

    pub fn stale_cycles(&self) -> u32 {
        self.stale_cycles
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}
