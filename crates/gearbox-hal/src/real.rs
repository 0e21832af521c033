//! Real-hardware backend over a motor-controller protocol seam.
//!
//! The vendor protocol (CAN frames, status signal subscriptions, firmware
//! PID slots) lives behind [`MotorDriver`].  [`RealActuatorIo`] adapts a
//! driver to the [`ActuatorIo`] contract:
//!
//! - converts rotor rotations into mechanism units with the mechanism's
//!   [`PlantConfig::units_per_rotor_rotation`][crate::plant::PlantConfig::units_per_rotor_rotation],
//! - echoes the last closed-loop target as the inputs' setpoint,
//! - maps [`DriverFault`]s onto the shared [`GearboxError`] taxonomy.
//!
//! On construction the backend applies the stator current limit and neutral
//! mode from [`DriverSettings`] before any command is sent.

use gearbox_types::{ActuatorId, ActuatorInputs, GearboxError};
use thiserror::Error;
use tracing::{debug, warn};

use crate::io::{ActuatorIo, MAX_VOLTS};

/// Failure reported by a [`MotorDriver`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverFault {
    /// No fresh frame arrived from the device.
    #[error("status frame timed out")]
    Timeout,
    /// The device reports a latched hardware fault (overtemperature, bridge
    /// brownout, ...).
    #[error("device fault: {0}")]
    Hardware(String),
    /// The command could not be delivered.
    #[error("bus error: {0}")]
    Bus(String),
}

/// One status sample in rotor units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotorStatus {
    pub rotor_rotations: f64,
    pub rotor_rotations_per_s: f64,
    pub applied_volts: f64,
    pub stator_current_a: f64,
    /// Device timestamp of the sample, seconds.
    pub timestamp_s: f64,
}

/// Settings applied once when the backend is constructed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriverSettings {
    pub stator_current_limit_a: Option<f64>,
    /// `true` shorts the windings at neutral output, `false` coasts.
    pub brake_on_neutral: bool,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            stator_current_limit_a: None,
            brake_on_neutral: true,
        }
    }
}

/// Vendor protocol for a single motor controller.
///
/// Implementations must not block; `read_status` returns the most recent
/// cached frame.
pub trait MotorDriver: Send {
    fn apply_settings(&mut self, settings: &DriverSettings) -> Result<(), DriverFault>;
    fn read_status(&mut self) -> Result<MotorStatus, DriverFault>;
    fn set_voltage(&mut self, volts: f64) -> Result<(), DriverFault>;
    fn set_velocity(&mut self, rotor_rotations_per_s: f64, ff_volts: f64) -> Result<(), DriverFault>;
    fn set_position(&mut self, rotor_rotations: f64, ff_volts: f64) -> Result<(), DriverFault>;
    fn set_neutral(&mut self) -> Result<(), DriverFault>;
    fn set_slot_gains(&mut self, kp: f64, ki: f64, kd: f64) -> Result<(), DriverFault>;
}

/// Opens drivers for the actuators configured in [`HardwareMode::Real`][gearbox_types::HardwareMode::Real].
pub trait DriverProvider: Send + Sync {
    /// Open the motor controller at `can_id` for `actuator`.
    ///
    /// # Errors
    ///
    /// Returns a [`DriverFault`] when the device cannot be reached.
    fn open(&self, actuator: ActuatorId, can_id: u8) -> Result<Box<dyn MotorDriver>, DriverFault>;
}

/// [`ActuatorIo`] backed by a physical motor controller.
pub struct RealActuatorIo {
    id: ActuatorId,
    driver: Box<dyn MotorDriver>,
    units_per_rotor_rotation: f64,
    setpoint: f64,
}

impl RealActuatorIo {
    /// Wrap `driver` and push `settings` to the device.
    ///
    /// # Errors
    ///
    /// Returns [`GearboxError::Driver`] if the settings cannot be applied or
    /// `units_per_rotor_rotation` is not a positive finite number.
    pub fn new(
        id: ActuatorId,
        mut driver: Box<dyn MotorDriver>,
        settings: DriverSettings,
        units_per_rotor_rotation: f64,
    ) -> Result<Self, GearboxError> {
        if !(units_per_rotor_rotation.is_finite() && units_per_rotor_rotation > 0.0) {
            return Err(GearboxError::Driver {
                actuator: id,
                details: format!("invalid unit conversion {units_per_rotor_rotation}"),
            });
        }
        driver.apply_settings(&settings).map_err(|fault| GearboxError::Driver {
            actuator: id,
            details: fault.to_string(),
        })?;
        debug!(actuator = %id, ?settings, "motor controller configured");
        Ok(Self {
            id,
            driver,
            units_per_rotor_rotation,
            setpoint: 0.0,
        })
    }

    fn map_fault(&self, fault: DriverFault) -> GearboxError {
        match fault {
            DriverFault::Timeout => GearboxError::SensorStale { actuator: self.id },
            DriverFault::Hardware(details) => GearboxError::ActuatorFault {
                actuator: self.id,
                details,
            },
            DriverFault::Bus(details) => GearboxError::Driver {
                actuator: self.id,
                details,
            },
        }
    }

    fn to_rotor(&self, mechanism: f64) -> f64 {
        mechanism / self.units_per_rotor_rotation
    }
}

impl ActuatorIo for RealActuatorIo {
    fn id(&self) -> ActuatorId {
        self.id
    }

    fn update_inputs(&mut self) -> Result<ActuatorInputs, GearboxError> {
        let status = self.driver.read_status().map_err(|f| self.map_fault(f))?;
        Ok(ActuatorInputs {
            position: status.rotor_rotations * self.units_per_rotor_rotation,
            velocity: status.rotor_rotations_per_s * self.units_per_rotor_rotation,
            applied_volts: status.applied_volts,
            current_amps: status.stator_current_a,
            setpoint: self.setpoint,
            timestamp_s: status.timestamp_s,
        })
    }

    fn run_open_loop(&mut self, volts: f64) -> Result<(), GearboxError> {
        self.setpoint = 0.0;
        self.driver
            .set_voltage(volts.clamp(-MAX_VOLTS, MAX_VOLTS))
            .map_err(|f| self.map_fault(f))
    }

    fn set_closed_loop_velocity(&mut self, target: f64, ff_volts: f64) -> Result<(), GearboxError> {
        let rotor = self.to_rotor(target);
        self.driver.set_velocity(rotor, ff_volts).map_err(|f| self.map_fault(f))?;
        self.setpoint = target;
        Ok(())
    }

    fn set_closed_loop_position(&mut self, target: f64, ff_volts: f64) -> Result<(), GearboxError> {
        let rotor = self.to_rotor(target);
        self.driver.set_position(rotor, ff_volts).map_err(|f| self.map_fault(f))?;
        self.setpoint = target;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), GearboxError> {
        self.setpoint = 0.0;
        // Neutral output also drops the firmware loop's accumulated error.
        self.driver.set_neutral().map_err(|f| self.map_fault(f))
    }

    fn configure_gains(&mut self, kp: f64, ki: f64, kd: f64) -> Result<(), GearboxError> {
        self.driver.set_slot_gains(kp, ki, kd).map_err(|f| {
            warn!(actuator = %self.id, error = %f, "failed to write slot gains");
            self.map_fault(f)
        })
    }
}
