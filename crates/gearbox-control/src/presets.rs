//! Per-DOF presets for the robot's five actuators.
//!
//! Each [`Preset`] bundles the controller's [`ActuatorSpec`], starting
//! [`ControlGains`], and the [`PlantConfig`] describing the mechanism, so
//! every actuator can run against the simulated backend out of the box.  The
//! velocity and gravity feedforward constants are derived from the plant
//! model rather than typed in, so they stay consistent with it.
//!
//! | Actuator | Control | Units | Range | Motor |
//! |---|---|---|---|---|
//! | flywheel | velocity | rot/s | 0 ..= 100 | Kraken X60, 1:1 |
//! | feeder | velocity | rot/s | −100 ..= 100 | Kraken X60, 1:1 |
//! | intake roller | velocity | rot/s | −100 ..= 100 | Falcon 500, 1:1, 30 A limit |
//! | elevator extension | position | m | 0 ..= 1.2 | Kraken X60, 10:1 drum |
//! | elevator pivot | position | rad | 0 ..= π | Kraken X60, 100:1 |

use std::f64::consts::PI;

use gearbox_hal::{DcMotor, Load, PlantConfig, SimActuatorIo};
use gearbox_types::{ActuatorId, ControlGains, GearboxError};

use crate::controller::{ActuatorController, ActuatorSpec, ControlKind};
use crate::feedforward::GravityModel;

/// Stator current limit on the intake rollers, amps.
pub const INTAKE_ROLLER_CURRENT_LIMIT_A: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preset {
    pub spec: ActuatorSpec,
    pub gains: ControlGains,
    pub plant: PlantConfig,
}

impl Preset {
    /// A controller for this preset over a fresh simulated plant.
    ///
    /// # Errors
    ///
    /// Returns [`GearboxError::Configuration`] if the `ActuatorSpec` is invalid.
    pub fn simulated(&self, period_s: f64) -> Result<ActuatorController, GearboxError> {
        let io = SimActuatorIo::new(self.spec.id, self.plant, period_s);
        ActuatorController::new(self.spec, self.gains, Box::new(io))
    }
}

pub fn for_actuator(id: ActuatorId) -> Preset {
    match id {
        ActuatorId::Flywheel => flywheel(),
        ActuatorId::Feeder => feeder(),
        ActuatorId::IntakeRoller => intake_roller(),
        ActuatorId::ElevatorExtension => elevator_extension(),
        ActuatorId::ElevatorPivot => elevator_pivot(),
    }
}

fn velocity_spec(id: ActuatorId, min: f64, max: f64, tolerance: f64) -> ActuatorSpec {
    ActuatorSpec {
        id,
        kind: ControlKind::Velocity,
        min,
        max,
        tolerance,
        neutral_goal: 0.0,
        gravity: GravityModel::None,
        stale_fault_cycles: 5,
        settle_cycles: 5,
    }
}

fn roller(id: ActuatorId, plant: PlantConfig, min: f64, max: f64, tolerance: f64) -> Preset {
    let kv = 1.0 / plant.free_speed_at(1.0);
    Preset {
        spec: velocity_spec(id, min, max, tolerance),
        gains: ControlGains::pid(0.5, 0.0, 0.0).with_feedforward(0.0, kv, 0.0),
        plant,
    }
}

pub fn flywheel() -> Preset {
    let plant = PlantConfig::new(DcMotor::kraken_x60(1), 1.0, Load::Roller { moi_kg_m2: 0.004 });
    roller(ActuatorId::Flywheel, plant, 0.0, 100.0, 1.0)
}

pub fn feeder() -> Preset {
    let plant = PlantConfig::new(DcMotor::kraken_x60(1), 1.0, Load::Roller { moi_kg_m2: 0.0015 });
    roller(ActuatorId::Feeder, plant, -100.0, 100.0, 1.0)
}

pub fn intake_roller() -> Preset {
    let plant = PlantConfig::new(DcMotor::falcon_500(1), 1.0, Load::Roller { moi_kg_m2: 0.001 })
        .with_current_limit(INTAKE_ROLLER_CURRENT_LIMIT_A);
    roller(ActuatorId::IntakeRoller, plant, -100.0, 100.0, 2.0)
}

pub fn elevator_extension() -> Preset {
    let plant = PlantConfig::new(
        DcMotor::kraken_x60(1),
        10.0,
        Load::Elevator {
            carriage_mass_kg: 8.0,
            drum_radius_m: 0.02,
        },
    )
    .with_hard_limits(0.0, 1.2);
    Preset {
        spec: ActuatorSpec {
            id: ActuatorId::ElevatorExtension,
            kind: ControlKind::Position,
            min: 0.0,
            max: 1.2,
            tolerance: 0.01,
            neutral_goal: 0.0,
            gravity: GravityModel::Constant,
            stale_fault_cycles: 5,
            settle_cycles: 5,
        },
        gains: ControlGains::pid(120.0, 0.0, 0.0).with_feedforward(0.0, 0.0, plant.gravity_volts(0.0)),
        plant,
    }
}

pub fn elevator_pivot() -> Preset {
    let plant = PlantConfig::new(
        DcMotor::kraken_x60(1),
        100.0,
        Load::Arm {
            moi_kg_m2: 0.5,
            mass_kg: 5.0,
            com_length_m: 0.3,
        },
    )
    .with_hard_limits(0.0, PI);
    Preset {
        spec: ActuatorSpec {
            id: ActuatorId::ElevatorPivot,
            kind: ControlKind::Position,
            min: 0.0,
            max: PI,
            tolerance: 0.02,
            neutral_goal: 0.0,
            gravity: GravityModel::Cosine,
            stale_fault_cycles: 5,
            settle_cycles: 5,
        },
        // Horizontal is the worst case; the controller scales by cos θ.
        gains: ControlGains::pid(40.0, 0.0, 0.0).with_feedforward(0.0, 0.0, plant.gravity_volts(0.0)),
        plant,
    }
}
