//! Simulated backend for running the full control stack without hardware.
//!
//! [`SimActuatorIo`] owns a [`Plant`] and a [`PidController`] standing in for
//! the motor controller's firmware loop.  Each [`ActuatorIo::update_inputs`]
//! call advances simulated time by exactly one control period under the
//! command currently in force, then samples the plant:
//!
//! | Command in force | Applied volts |
//! |---|---|
//! | stop | `0` (brake: windings shorted through back-EMF) |
//! | open loop | the commanded volts |
//! | closed-loop velocity / position | `PID(measurement) + feedforward` |
//!
//! Applied volts are always clamped to [`MAX_VOLTS`].  The loop's integrator
//! survives goal changes and open-loop interludes; a stop is the one command
//! that clears it.
//!
//! # Example
//!
//! ```rust
//! use gearbox_hal::{ActuatorIo, DcMotor, Load, PlantConfig, SimActuatorIo};
//! use gearbox_types::ActuatorId;
//!
//! let plant = PlantConfig::new(DcMotor::kraken_x60(1), 1.0, Load::Roller { moi_kg_m2: 0.004 });
//! let mut io = SimActuatorIo::new(ActuatorId::Flywheel, plant, 0.02);
//!
//! io.run_open_loop(12.0).unwrap();
//! let inputs = io.update_inputs().unwrap();
//! assert!(inputs.velocity > 0.0);
//! assert!((inputs.timestamp_s - 0.02).abs() < 1e-12);
//! ```

use gearbox_types::{ActuatorId, ActuatorInputs, GearboxError};

use crate::io::{ActuatorIo, MAX_VOLTS};
use crate::pid::PidController;
use crate::plant::{Plant, PlantConfig};

#[derive(Debug, Clone, Copy, PartialEq)]
enum SimCommand {
    Neutral,
    OpenLoop { volts: f64 },
    Velocity { target: f64, ff_volts: f64 },
    Position { target: f64, ff_volts: f64 },
}

impl SimCommand {
    fn setpoint(&self) -> f64 {
        match *self {
            SimCommand::Velocity { target, .. } | SimCommand::Position { target, .. } => target,
            SimCommand::Neutral | SimCommand::OpenLoop { .. } => 0.0,
        }
    }
}

/// A physics-backed actuator.  Always succeeds and never goes stale.
pub struct SimActuatorIo {
    id: ActuatorId,
    plant: Plant,
    pid: PidController,
    command: SimCommand,
    period_s: f64,
}

impl SimActuatorIo {
    /// Create a simulated actuator stepping `period_s` per refresh.
    pub fn new(id: ActuatorId, plant: PlantConfig, period_s: f64) -> Self {
        let mut pid = PidController::new(0.0, 0.0, 0.0);
        pid.set_output_limits(-MAX_VOLTS, MAX_VOLTS);
        Self {
            id,
            plant: Plant::new(plant),
            pid,
            command: SimCommand::Neutral,
            period_s,
        }
    }

    /// Read-only view of the simulated mechanism.
    pub fn plant(&self) -> &Plant {
        &self.plant
    }

    fn output_volts(&mut self) -> f64 {
        let volts = match self.command {
            SimCommand::Neutral => 0.0,
            SimCommand::OpenLoop { volts } => volts,
            SimCommand::Velocity { ff_volts, .. } => {
                self.pid.update(self.plant.velocity(), self.period_s) + ff_volts
            }
            SimCommand::Position { ff_volts, .. } => {
                self.pid.update(self.plant.position(), self.period_s) + ff_volts
            }
        };
        volts.clamp(-MAX_VOLTS, MAX_VOLTS)
    }

    /// Retargets the loop without touching its accumulated state; only
    /// [`ActuatorIo::stop`] clears the integrator.
    fn set_closed_loop(&mut self, command: SimCommand) {
        self.pid.set_set_point(command.setpoint());
        self.command = command;
    }
}

impl ActuatorIo for SimActuatorIo {
    fn id(&self) -> ActuatorId {
        self.id
    }

    fn update_inputs(&mut self) -> Result<ActuatorInputs, GearboxError> {
        let volts = self.output_volts();
        self.plant.step(volts, self.period_s);

        Ok(ActuatorInputs {
            position: self.plant.position(),
            velocity: self.plant.velocity(),
            applied_volts: volts,
            current_amps: self.plant.current_amps(),
            setpoint: self.command.setpoint(),
            timestamp_s: self.plant.time_s(),
        })
    }

    fn run_open_loop(&mut self, volts: f64) -> Result<(), GearboxError> {
        self.command = SimCommand::OpenLoop { volts };
        Ok(())
    }

    fn set_closed_loop_velocity(&mut self, target: f64, ff_volts: f64) -> Result<(), GearboxError> {
        self.set_closed_loop(SimCommand::Velocity { target, ff_volts });
        Ok(())
    }

    fn set_closed_loop_position(&mut self, target: f64, ff_volts: f64) -> Result<(), GearboxError> {
        self.set_closed_loop(SimCommand::Position { target, ff_volts });
        Ok(())
    }

    fn stop(&mut self) -> Result<(), GearboxError> {
        self.command = SimCommand::Neutral;
        self.pid.reset();
        Ok(())
    }

    fn configure_gains(&mut self, kp: f64, ki: f64, kd: f64) -> Result<(), GearboxError> {
        self.pid.set_gains(kp, ki, kd);
        Ok(())
    }
}
