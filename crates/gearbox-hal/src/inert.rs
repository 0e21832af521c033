//! Inert backend for replay runs and intentionally disabled hardware.
//!
//! Every command succeeds and does nothing.  Inputs are all zero, but the
//! timestamp advances one period per refresh so a disabled actuator is never
//! mistaken for a stale one.

use gearbox_types::{ActuatorId, ActuatorInputs, GearboxError};

use crate::io::ActuatorIo;

pub struct InertActuatorIo {
    id: ActuatorId,
    period_s: f64,
    time_s: f64,
}

impl InertActuatorIo {
    pub fn new(id: ActuatorId, period_s: f64) -> Self {
        Self {
            id,
            period_s,
            time_s: 0.0,
        }
    }
}

impl ActuatorIo for InertActuatorIo {
    fn id(&self) -> ActuatorId {
        self.id
    }

    fn update_inputs(&mut self) -> Result<ActuatorInputs, GearboxError> {
        self.time_s += self.period_s;
        Ok(ActuatorInputs {
            timestamp_s: self.time_s,
            ..ActuatorInputs::default()
        })
    }

    fn run_open_loop(&mut self, _volts: f64) -> Result<(), GearboxError> {
        Ok(())
    }

    fn set_closed_loop_velocity(&mut self, _target: f64, _ff_volts: f64) -> Result<(), GearboxError> {
        Ok(())
    }

    fn set_closed_loop_position(&mut self, _target: f64, _ff_volts: f64) -> Result<(), GearboxError> {
        Ok(())
    }

    fn stop(&mut self) -> Result<(), GearboxError> {
        Ok(())
    }

    fn configure_gains(&mut self, _kp: f64, _ki: f64, _kd: f64) -> Result<(), GearboxError> {
        Ok(())
    }
}
