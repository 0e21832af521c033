use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The robot's independently controlled mechanical degrees of freedom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActuatorId {
    /// Shooter flywheel, velocity controlled.
    Flywheel,
    /// Note feeder between intake and flywheel, velocity controlled.
    Feeder,
    /// Ground intake rollers, velocity controlled.
    IntakeRoller,
    /// Elevator carriage extension, position controlled (metres).
    ElevatorExtension,
    /// Elevator / arm pivot, position controlled (radians).
    ElevatorPivot,
}

impl ActuatorId {
    pub const ALL: [ActuatorId; 5] = [
        ActuatorId::Flywheel,
        ActuatorId::Feeder,
        ActuatorId::IntakeRoller,
        ActuatorId::ElevatorExtension,
        ActuatorId::ElevatorPivot,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActuatorId::Flywheel => "flywheel",
            ActuatorId::Feeder => "feeder",
            ActuatorId::IntakeRoller => "intake_roller",
            ActuatorId::ElevatorExtension => "elevator_extension",
            ActuatorId::ElevatorPivot => "elevator_pivot",
        }
    }
}

impl fmt::Display for ActuatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActuatorId {
    type Err = GearboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActuatorId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| GearboxError::Configuration(format!("unknown actuator '{s}'")))
    }
}

/// Which backend drives an actuator.  Chosen once per actuator at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HardwareMode {
    /// Physical motor controller.
    Real,
    /// Physics simulation.
    #[default]
    Sim,
    /// Log replay: hardware intentionally absent, IO is inert.
    Replay,
}

impl fmt::Display for HardwareMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HardwareMode::Real => write!(f, "real"),
            HardwareMode::Sim => write!(f, "sim"),
            HardwareMode::Replay => write!(f, "replay"),
        }
    }
}

impl FromStr for HardwareMode {
    type Err = GearboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "real" => Ok(HardwareMode::Real),
            "sim" => Ok(HardwareMode::Sim),
            "replay" => Ok(HardwareMode::Replay),
            other => Err(GearboxError::Configuration(format!("unknown hardware mode '{other}'"))),
        }
    }
}

/// Per-cycle measurement snapshot produced by a HAL backend.
///
/// Units are actuator specific: rotations and rotations/s for rollers and
/// flywheels, metres for the elevator, radians for the pivot.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ActuatorInputs {
    pub position: f64,
    pub velocity: f64,
    pub applied_volts: f64,
    pub current_amps: f64,
    /// Setpoint the backend's own control law is currently tracking.
    pub setpoint: f64,
    /// Backend clock of the sample, seconds.  Must strictly increase between
    /// fresh samples.
    pub timestamp_s: f64,
}

/// Feedback and feedforward coefficients for one actuator.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// Static friction feedforward, volts.
    pub ks: f64,
    /// Velocity feedforward, volts per unit/s.
    pub kv: f64,
    /// Gravity compensation, volts.
    pub kg: f64,
}

impl ControlGains {
    pub fn pid(kp: f64, ki: f64, kd: f64) -> Self {
        Self {
            kp,
            ki,
            kd,
            ..Self::default()
        }
    }

    pub fn with_feedforward(mut self, ks: f64, kv: f64, kg: f64) -> Self {
        self.ks = ks;
        self.kv = kv;
        self.kg = kg;
        self
    }
}

/// Stages of the climb routine, in their only legal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClimbState {
    #[default]
    None,
    PivotClimb,
    RetractClimb,
    ScoreTrap,
    Done,
}

impl ClimbState {
    pub const ALL: [ClimbState; 5] = [
        ClimbState::None,
        ClimbState::PivotClimb,
        ClimbState::RetractClimb,
        ClimbState::ScoreTrap,
        ClimbState::Done,
    ];

    /// The state after `self`; `Done` is its own successor.
    pub fn next(self) -> ClimbState {
        match self {
            ClimbState::None => ClimbState::PivotClimb,
            ClimbState::PivotClimb => ClimbState::RetractClimb,
            ClimbState::RetractClimb => ClimbState::ScoreTrap,
            ClimbState::ScoreTrap => ClimbState::Done,
            ClimbState::Done => ClimbState::Done,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == ClimbState::Done
    }

    /// Configuration key of the state (`snake_case`).
    pub fn as_str(self) -> &'static str {
        match self {
            ClimbState::None => "none",
            ClimbState::PivotClimb => "pivot_climb",
            ClimbState::RetractClimb => "retract_climb",
            ClimbState::ScoreTrap => "score_trap",
            ClimbState::Done => "done",
        }
    }
}

impl FromStr for ClimbState {
    type Err = GearboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ClimbState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| GearboxError::Configuration(format!("unknown climb state '{s}'")))
    }
}

impl fmt::Display for ClimbState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClimbState::None => "NONE",
            ClimbState::PivotClimb => "PIVOT_CLIMB",
            ClimbState::RetractClimb => "RETRACT_CLIMB",
            ClimbState::ScoreTrap => "SCORE_TRAP",
            ClimbState::Done => "DONE",
        };
        f.write_str(name)
    }
}

/// Error type shared by the HAL backends, the factory table and config loading.
///
/// Control-cycle code never propagates these past `periodic()`; they are
/// converted into readable fault flags there.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GearboxError {
    #[error("Sensor data for {actuator} is stale")]
    SensorStale { actuator: ActuatorId },

    #[error("Actuator fault on {actuator}: {details}")]
    ActuatorFault { actuator: ActuatorId, details: String },

    #[error("Driver error on {actuator}: {details}")]
    Driver { actuator: ActuatorId, details: String },

    #[error("Configuration error: {0}")]
    Configuration(String),
}
