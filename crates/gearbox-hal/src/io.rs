//! Generic `ActuatorIo` trait for flywheels, rollers, elevators and pivots.
//!
//! Backends implement this trait and are produced by the
//! [`IoRegistry`][crate::registry::IoRegistry].  Controllers only ever talk to
//! the trait, so a real motor controller, a physics simulation and an inert
//! stand-in are interchangeable without touching control logic.

use gearbox_types::{ActuatorId, ActuatorInputs, GearboxError};

/// Bus voltage every backend clamps its output to.
pub const MAX_VOLTS: f64 = 12.0;

/// One actuator's hardware boundary.
///
/// Implementations must never block: `update_inputs` returns the latest
/// sample available, and commands are fire-and-forget.
pub trait ActuatorIo: Send {
    /// The actuator this backend drives.
    fn id(&self) -> ActuatorId;

    /// Refresh and return the latest measurement snapshot.
    ///
    /// # Errors
    ///
    /// - [`GearboxError::SensorStale`] if no new sample is available.
    /// - [`GearboxError::ActuatorFault`] if the device reports a persistent
    ///   fault.
    fn update_inputs(&mut self) -> Result<ActuatorInputs, GearboxError>;

    /// Apply a raw voltage, bypassing any closed-loop logic.
    ///
    /// # Errors
    ///
    /// Returns [`GearboxError::Driver`] or [`GearboxError::ActuatorFault`] if
    /// the command cannot be delivered.
    fn run_open_loop(&mut self, volts: f64) -> Result<(), GearboxError>;

    /// Track `target` velocity with the backend's native control law, adding
    /// `ff_volts` of feedforward.
    ///
    /// # Errors
    ///
    /// Same as [`ActuatorIo::run_open_loop`].
    fn set_closed_loop_velocity(&mut self, target: f64, ff_volts: f64) -> Result<(), GearboxError>;

    /// Track `target` position with the backend's native control law, adding
    /// `ff_volts` of feedforward.
    ///
    /// # Errors
    ///
    /// Same as [`ActuatorIo::run_open_loop`].
    fn set_closed_loop_position(&mut self, target: f64, ff_volts: f64) -> Result<(), GearboxError>;

    /// Command a zero-output hold and clear any integrator state inside the
    /// backend.
    ///
    /// # Errors
    ///
    /// Same as [`ActuatorIo::run_open_loop`].
    fn stop(&mut self) -> Result<(), GearboxError>;

    /// Replace the backend's feedback gains, effective immediately.
    ///
    /// # Errors
    ///
    /// Same as [`ActuatorIo::run_open_loop`].
    fn configure_gains(&mut self, kp: f64, ki: f64, kd: f64) -> Result<(), GearboxError>;
}
