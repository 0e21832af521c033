//! [`ActuatorController`] – one closed-loop controller for every degree of
//! freedom.
//!
//! A controller exclusively owns one [`ActuatorIo`] backend together with the
//! actuator's [`ActuatorSpec`], its [`ControlGains`] and the current goal.
//! The external scheduler calls [`ActuatorController::periodic`] once per
//! control cycle:
//!
//! 1. refresh inputs from the backend and classify them with the
//!    [`FreshnessMonitor`],
//! 2. push gains to the backend if they changed since the last cycle,
//! 3. compute the feedforward for the goal and issue the closed-loop command.
//!
//! `periodic` never returns an error and never panics.  Problems surface as
//! state readable through [`ActuatorController::fault`]:
//!
//! | Condition | Behaviour | Flag |
//! |---|---|---|
//! | goal outside `[min, max]` | clamped silently | none |
//! | stale sample | last delivered command re-issued verbatim | `SensorStale` after `stale_fault_cycles`, clears on the next fresh sample |
//! | backend fault | backend stopped once, output suspended | `Actuator`, latched until [`reset_fault`](ActuatorController::reset_fault) |
//!
//! # Example
//!
//! ```rust
//! use gearbox_control::presets;
//!
//! let mut flywheel = presets::flywheel().simulated(0.02).unwrap();
//! flywheel.set_goal(250.0); // clamped to the 100 rot/s ceiling
//! assert_eq!(flywheel.goal(), 100.0);
//!
//! flywheel.set_goal(40.0);
//! for _ in 0..100 {
//!     flywheel.periodic();
//! }
//! assert!(flywheel.at_goal_default());
//! ```

use gearbox_hal::{ActuatorIo, MAX_VOLTS};
use gearbox_types::{ActuatorId, ActuatorInputs, ControlGains, GearboxError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::feedforward::{Feedforward, GravityModel};
use crate::health::{FreshnessMonitor, InputHealth};

// ────────────────────────────────────────────────────────────────────────────
// Static description
// ────────────────────────────────────────────────────────────────────────────

/// Which quantity the goal refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlKind {
    Velocity,
    Position,
}

fn default_stale_fault_cycles() -> u32 {
    5
}

fn default_settle_cycles() -> u32 {
    5
}

/// Fixed characteristics of one actuator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActuatorSpec {
    pub id: ActuatorId,
    pub kind: ControlKind,
    /// Mechanical range of the goal, actuator units.
    pub min: f64,
    pub max: f64,
    /// Default tolerance for [`ActuatorController::at_goal_default`].
    pub tolerance: f64,
    /// Goal restored by [`ActuatorController::stop`].
    pub neutral_goal: f64,
    #[serde(default)]
    pub gravity: GravityModel,
    /// Consecutive stale cycles before the stale fault flag is raised.
    #[serde(default = "default_stale_fault_cycles")]
    pub stale_fault_cycles: u32,
    /// Consecutive in-tolerance cycles before the actuator counts as settled.
    #[serde(default = "default_settle_cycles")]
    pub settle_cycles: u32,
}

impl ActuatorSpec {
    /// Clamp `value` into `[min, max]`.  NaN maps to `min`.
    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }

    /// # Errors
    ///
    /// Returns [`GearboxError::Configuration`] when the range is empty or not
    /// finite, the tolerance is not positive, or the neutral goal lies outside
    /// the range.
    pub fn validate(&self) -> Result<(), GearboxError> {
        let problem = if !(self.min.is_finite() && self.max.is_finite()) || self.min > self.max {
            Some(format!("range [{}, {}] is invalid", self.min, self.max))
        } else if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            Some(format!("tolerance {} must be positive", self.tolerance))
        } else if !(self.min..=self.max).contains(&self.neutral_goal) {
            Some(format!("neutral goal {} is outside the range", self.neutral_goal))
        } else {
            None
        };
        match problem {
            Some(p) => Err(GearboxError::Configuration(format!("{}: {p}", self.id))),
            None => Ok(()),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Commands and faults
// ────────────────────────────────────────────────────────────────────────────

/// A command as delivered to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HalCommand {
    Neutral,
    OpenLoop { volts: f64 },
    Velocity { target: f64, ff_volts: f64 },
    Position { target: f64, ff_volts: f64 },
}

impl HalCommand {
    fn send(self, io: &mut dyn ActuatorIo) -> Result<(), GearboxError> {
        match self {
            HalCommand::Neutral => io.stop(),
            HalCommand::OpenLoop { volts } => io.run_open_loop(volts),
            HalCommand::Velocity { target, ff_volts } => io.set_closed_loop_velocity(target, ff_volts),
            HalCommand::Position { target, ff_volts } => io.set_closed_loop_position(target, ff_volts),
        }
    }
}

/// Non-fatal fault flag readable by the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ControllerFault {
    /// Inputs have not refreshed for `cycles` consecutive cycles.
    SensorStale { cycles: u32 },
    /// The backend reported a persistent fault.
    Actuator { details: String },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mode {
    /// Safe hold; the backend is re-stopped every cycle.
    Idle,
    ClosedLoop,
    OpenLoop { volts: f64 },
}

// ────────────────────────────────────────────────────────────────────────────
// Controller
// ────────────────────────────────────────────────────────────────────────────

pub struct ActuatorController {
    spec: ActuatorSpec,
    io: Box<dyn ActuatorIo>,
    gains: ControlGains,
    gains_dirty: bool,
    goal: f64,
    mode: Mode,
    inputs: ActuatorInputs,
    monitor: FreshnessMonitor,
    last_command: Option<HalCommand>,
    actuator_fault: Option<String>,
    settled_cycles: u32,
}

impl ActuatorController {
    /// Wrap `io`.  The controller starts idle at its neutral goal; the
    /// gains are pushed to the backend on the first [`periodic`](Self::periodic).
    ///
    /// # Errors
    ///
    /// Returns [`GearboxError::Configuration`] if `spec` is invalid or `io`
    /// drives a different actuator.
    pub fn new(spec: ActuatorSpec, gains: ControlGains, io: Box<dyn ActuatorIo>) -> Result<Self, GearboxError> {
        spec.validate()?;
        if io.id() != spec.id {
            return Err(GearboxError::Configuration(format!(
                "backend for {} handed to the {} controller",
                io.id(),
                spec.id
            )));
        }
        Ok(Self {
            spec,
            io,
            gains,
            gains_dirty: true,
            goal: spec.neutral_goal,
            mode: Mode::Idle,
            inputs: ActuatorInputs::default(),
            monitor: FreshnessMonitor::new(spec.stale_fault_cycles),
            last_command: None,
            actuator_fault: None,
            settled_cycles: 0,
        })
    }

    pub fn id(&self) -> ActuatorId {
        self.spec.id
    }

    pub fn spec(&self) -> &ActuatorSpec {
        &self.spec
    }

    /// Clamp `value` into the mechanical range and make it the goal.
    ///
    /// Nothing is sent to the backend until the next
    /// [`periodic`](Self::periodic).  Re-arms closed-loop control after
    /// [`stop`](Self::stop) or [`run_open_loop`](Self::run_open_loop).
    pub fn set_goal(&mut self, value: f64) {
        let clamped = self.spec.clamp(value);
        if clamped != value {
            trace!(actuator = %self.spec.id, requested = value, clamped, "goal clamped to range");
        }
        if clamped != self.goal || self.mode != Mode::ClosedLoop {
            self.settled_cycles = 0;
        }
        self.goal = clamped;
        self.mode = Mode::ClosedLoop;
    }

    /// Run one control cycle.
    pub fn periodic(&mut self) {
        let sample = match self.io.update_inputs() {
            Ok(inputs) => Some(inputs),
            Err(GearboxError::ActuatorFault { details, .. }) => {
                self.latch_fault(details);
                None
            }
            Err(GearboxError::SensorStale { .. }) => None,
            Err(error) => {
                warn!(actuator = %self.spec.id, %error, "input refresh failed");
                None
            }
        };

        let recovering = matches!(self.monitor.health(), InputHealth::TimedOut { .. });
        let health = self.monitor.observe(sample.map(|s| s.timestamp_s));
        let fresh = match (health, sample) {
            (InputHealth::Fresh, Some(inputs)) => {
                self.inputs = inputs;
                if recovering {
                    info!(actuator = %self.spec.id, "inputs fresh again");
                }
                self.track_settling();
                true
            }
            (InputHealth::TimedOut { cycles }, _) if cycles == self.monitor.threshold() => {
                warn!(actuator = %self.spec.id, cycles, "inputs stale, holding last command");
                false
            }
            _ => false,
        };

        if self.actuator_fault.is_some() {
            return;
        }

        if self.gains_dirty {
            self.push_gains();
            if self.actuator_fault.is_some() {
                return;
            }
        }

        let command = if fresh {
            self.compute_command()
        } else {
            self.last_command.unwrap_or(HalCommand::Neutral)
        };
        self.issue(command);
    }

    /// Restore the neutral goal and command a safe hold.  The backend's
    /// integrator is cleared by the stop.
    pub fn stop(&mut self) {
        self.mode = Mode::Idle;
        self.goal = self.spec.neutral_goal;
        self.settled_cycles = 0;
        if self.actuator_fault.is_none() {
            self.issue(HalCommand::Neutral);
        }
    }

    /// Apply `volts` open loop every cycle until the next goal or stop.
    /// Used for characterization.
    pub fn run_open_loop(&mut self, volts: f64) {
        let volts = if volts.is_finite() { volts.clamp(-MAX_VOLTS, MAX_VOLTS) } else { 0.0 };
        self.mode = Mode::OpenLoop { volts };
        self.settled_cycles = 0;
    }

    /// `|measured − goal| ≤ tolerance` against the last fresh sample.
    pub fn at_goal(&self, tolerance: f64) -> bool {
        (self.measured() - self.goal).abs() <= tolerance
    }

    pub fn at_goal_default(&self) -> bool {
        self.at_goal(self.spec.tolerance)
    }

    /// Under closed-loop control, unfaulted, and within tolerance for
    /// `settle_cycles` consecutive fresh cycles.
    pub fn is_settled(&self) -> bool {
        self.mode == Mode::ClosedLoop
            && self.settled_cycles >= self.spec.settle_cycles.max(1)
            && self.fault().is_none()
    }

    pub fn fault(&self) -> Option<ControllerFault> {
        if let Some(details) = &self.actuator_fault {
            return Some(ControllerFault::Actuator {
                details: details.clone(),
            });
        }
        match self.monitor.health() {
            InputHealth::TimedOut { cycles } => Some(ControllerFault::SensorStale { cycles }),
            _ => None,
        }
    }

    /// Clear a latched actuator fault.  Output resumes on the next cycle with
    /// the gains re-sent.
    pub fn reset_fault(&mut self) {
        if let Some(details) = self.actuator_fault.take() {
            info!(actuator = %self.spec.id, %details, "actuator fault cleared");
            self.gains_dirty = true;
        }
    }

    /// Replace the gains; they reach the backend on the next cycle.
    pub fn configure_gains(&mut self, gains: ControlGains) {
        self.gains = gains;
        self.gains_dirty = true;
    }

    /// Last fresh input snapshot.
    pub fn inputs(&self) -> &ActuatorInputs {
        &self.inputs
    }

    pub fn goal(&self) -> f64 {
        self.goal
    }

    pub fn gains(&self) -> &ControlGains {
        &self.gains
    }

    /// Last command the backend accepted.
    pub fn last_command(&self) -> Option<HalCommand> {
        self.last_command
    }

    pub fn is_idle(&self) -> bool {
        self.mode == Mode::Idle
    }

    // ── internals ────────────────────────────────────────────────────────────

    fn measured(&self) -> f64 {
        match self.spec.kind {
            ControlKind::Velocity => self.inputs.velocity,
            ControlKind::Position => self.inputs.position,
        }
    }

    fn track_settling(&mut self) {
        if self.mode == Mode::ClosedLoop && self.at_goal_default() {
            self.settled_cycles = self.settled_cycles.saturating_add(1);
        } else {
            self.settled_cycles = 0;
        }
    }

    fn compute_command(&self) -> HalCommand {
        match self.mode {
            Mode::Idle => HalCommand::Neutral,
            Mode::OpenLoop { volts } => HalCommand::OpenLoop { volts },
            Mode::ClosedLoop => {
                let ff = Feedforward::new(&self.gains, self.spec.gravity);
                let position = self.inputs.position;
                match self.spec.kind {
                    ControlKind::Velocity => HalCommand::Velocity {
                        target: self.goal,
                        ff_volts: ff.velocity(self.goal, position),
                    },
                    ControlKind::Position => HalCommand::Position {
                        target: self.goal,
                        ff_volts: ff.position(self.goal, position, self.spec.tolerance),
                    },
                }
            }
        }
    }

    fn push_gains(&mut self) {
        let ControlGains { kp, ki, kd, .. } = self.gains;
        match self.io.configure_gains(kp, ki, kd) {
            Ok(()) => {
                self.gains_dirty = false;
                debug!(actuator = %self.spec.id, kp, ki, kd, "gains applied");
            }
            Err(GearboxError::ActuatorFault { details, .. }) => self.latch_fault(details),
            Err(error) => warn!(actuator = %self.spec.id, %error, "gains not applied, retrying next cycle"),
        }
    }

    fn issue(&mut self, command: HalCommand) {
        match command.send(self.io.as_mut()) {
            Ok(()) => self.last_command = Some(command),
            Err(GearboxError::ActuatorFault { details, .. }) => self.latch_fault(details),
            Err(error) => warn!(actuator = %self.spec.id, %error, ?command, "command not delivered"),
        }
    }

    fn latch_fault(&mut self, details: String) {
        if self.actuator_fault.is_some() {
            return;
        }
        warn!(actuator = %self.spec.id, %details, "actuator fault latched, output suspended");
        match self.io.stop() {
            Ok(()) => self.last_command = Some(HalCommand::Neutral),
            Err(error) => warn!(actuator = %self.spec.id, %error, "stop after fault not delivered"),
        }
        self.settled_cycles = 0;
        self.actuator_fault = Some(details);
    }
}
