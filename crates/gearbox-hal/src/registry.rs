//! [`IoRegistry`] – hardware-mode → backend constructor table.
//!
//! The registry is the only code that looks at a
//! [`HardwareMode`][gearbox_types::HardwareMode].  It maps each mode to a
//! constructor closure and is evaluated once per actuator at startup; the
//! resulting `Box<dyn ActuatorIo>` is handed to a controller that never learns
//! which backend it got.
//!
//! # Standard table
//!
//! | Mode | Backend |
//! |---|---|
//! | `sim` | [`SimActuatorIo`] over the configured plant |
//! | `replay` | [`InertActuatorIo`] |
//! | `real` | [`RealActuatorIo`] via a [`DriverProvider`] (only when one is supplied) |
//!
//! # Example
//!
//! ```rust
//! use gearbox_hal::{BackendConfig, DcMotor, IoRegistry, Load, PlantConfig};
//! use gearbox_types::{ActuatorId, HardwareMode};
//!
//! let registry = IoRegistry::standard(None);
//! let config = BackendConfig::new(
//!     ActuatorId::Feeder,
//!     PlantConfig::new(DcMotor::kraken_x60(1), 1.0, Load::Roller { moi_kg_m2: 0.002 }),
//!     0.02,
//! );
//!
//! let io = registry.build(HardwareMode::Sim, &config).unwrap();
//! assert_eq!(io.id(), ActuatorId::Feeder);
//!
//! // No driver provider was supplied, so real hardware is unavailable.
//! assert!(registry.build(HardwareMode::Real, &config).is_err());
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use gearbox_types::{ActuatorId, GearboxError, HardwareMode};
use tracing::info;

use crate::inert::InertActuatorIo;
use crate::io::ActuatorIo;
use crate::plant::PlantConfig;
use crate::real::{DriverProvider, DriverSettings, RealActuatorIo};
use crate::sim::SimActuatorIo;

/// Everything a backend constructor may need to know about one actuator.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendConfig {
    pub id: ActuatorId,
    /// Motor controller address; required for [`HardwareMode::Real`].
    pub can_id: Option<u8>,
    pub plant: PlantConfig,
    pub driver: DriverSettings,
    pub loop_period_s: f64,
}

impl BackendConfig {
    pub fn new(id: ActuatorId, plant: PlantConfig, loop_period_s: f64) -> Self {
        Self {
            id,
            can_id: None,
            driver: DriverSettings {
                stator_current_limit_a: plant.current_limit_a,
                brake_on_neutral: true,
            },
            plant,
            loop_period_s,
        }
    }

    pub fn with_can_id(mut self, can_id: u8) -> Self {
        self.can_id = Some(can_id);
        self
    }
}

/// A backend constructor stored in the table.
pub type IoConstructor =
    Box<dyn Fn(&BackendConfig) -> Result<Box<dyn ActuatorIo>, GearboxError> + Send + Sync>;

/// Mode → constructor table.
#[derive(Default)]
pub struct IoRegistry {
    constructors: HashMap<HardwareMode, IoConstructor>,
}

impl IoRegistry {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard table: simulation and replay always, real hardware when
    /// `drivers` is supplied.
    pub fn standard(drivers: Option<Arc<dyn DriverProvider>>) -> Self {
        let mut registry = Self::new();

        registry.register(
            HardwareMode::Sim,
            Box::new(|cfg: &BackendConfig| {
                Ok(Box::new(SimActuatorIo::new(cfg.id, cfg.plant, cfg.loop_period_s)) as Box<dyn ActuatorIo>)
            }),
        );

        registry.register(
            HardwareMode::Replay,
            Box::new(|cfg: &BackendConfig| {
                Ok(Box::new(InertActuatorIo::new(cfg.id, cfg.loop_period_s)) as Box<dyn ActuatorIo>)
            }),
        );

        if let Some(provider) = drivers {
            registry.register(
                HardwareMode::Real,
                Box::new(move |cfg: &BackendConfig| {
                    let can_id = cfg.can_id.ok_or_else(|| {
                        GearboxError::Configuration(format!("{} is in real mode but has no can_id", cfg.id))
                    })?;
                    let driver = provider.open(cfg.id, can_id).map_err(|fault| GearboxError::Driver {
                        actuator: cfg.id,
                        details: fault.to_string(),
                    })?;
                    let io = RealActuatorIo::new(cfg.id, driver, cfg.driver, cfg.plant.units_per_rotor_rotation())?;
                    Ok(Box::new(io) as Box<dyn ActuatorIo>)
                }),
            );
        }

        registry
    }

    /// Register a constructor for `mode`.  Any previously registered
    /// constructor for the same mode is replaced.
    pub fn register(&mut self, mode: HardwareMode, constructor: IoConstructor) {
        self.constructors.insert(mode, constructor);
    }

    pub fn supports(&self, mode: HardwareMode) -> bool {
        self.constructors.contains_key(&mode)
    }

    /// Construct the backend for `config` in `mode`.
    ///
    /// # Errors
    ///
    /// - [`GearboxError::Configuration`] when no constructor is registered
    ///   for `mode` or the config lacks what the constructor needs.
    /// - Any error the constructor itself returns.
    pub fn build(&self, mode: HardwareMode, config: &BackendConfig) -> Result<Box<dyn ActuatorIo>, GearboxError> {
        let constructor = self.constructors.get(&mode).ok_or_else(|| {
            GearboxError::Configuration(format!("no backend registered for mode '{mode}' ({})", config.id))
        })?;
        let io = constructor(config)?;
        info!(actuator = %config.id, %mode, "actuator backend constructed");
        Ok(io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motor::DcMotor;
    use crate::plant::Load;
    use crate::real::{DriverFault, MotorDriver, MotorStatus};
    use gearbox_types::ActuatorInputs;

    // ------------------------------------------------------------------
    // Test doubles
    // ------------------------------------------------------------------

    struct NullDriver {
        time_s: f64,
    }

    impl MotorDriver for NullDriver {
        fn apply_settings(&mut self, _settings: &DriverSettings) -> Result<(), DriverFault> {
            Ok(())
        }
        fn read_status(&mut self) -> Result<MotorStatus, DriverFault> {
            self.time_s += 0.01;
            Ok(MotorStatus {
                timestamp_s: self.time_s,
                ..MotorStatus::default()
            })
        }
        fn set_voltage(&mut self, _volts: f64) -> Result<(), DriverFault> {
            Ok(())
        }
        fn set_velocity(&mut self, _rps: f64, _ff: f64) -> Result<(), DriverFault> {
            Ok(())
        }
        fn set_position(&mut self, _rot: f64, _ff: f64) -> Result<(), DriverFault> {
            Ok(())
        }
        fn set_neutral(&mut self) -> Result<(), DriverFault> {
            Ok(())
        }
        fn set_slot_gains(&mut self, _kp: f64, _ki: f64, _kd: f64) -> Result<(), DriverFault> {
            Ok(())
        }
    }

    struct Bus {
        reachable: bool,
    }

    impl DriverProvider for Bus {
        fn open(&self, _actuator: ActuatorId, _can_id: u8) -> Result<Box<dyn MotorDriver>, DriverFault> {
            if self.reachable {
                Ok(Box::new(NullDriver { time_s: 0.0 }))
            } else {
                Err(DriverFault::Bus("no response".into()))
            }
        }
    }

    fn config() -> BackendConfig {
        BackendConfig::new(
            ActuatorId::Flywheel,
            PlantConfig::new(DcMotor::kraken_x60(1), 1.0, Load::Roller { moi_kg_m2: 0.004 }),
            0.02,
        )
    }

    // ------------------------------------------------------------------
    // Tests
    // ------------------------------------------------------------------

    #[test]
    fn sim_mode_builds_a_moving_backend() {
        let registry = IoRegistry::standard(None);
        let mut io = registry.build(HardwareMode::Sim, &config()).unwrap();
        io.run_open_loop(12.0).unwrap();
        let inputs = io.update_inputs().unwrap();
        assert!(inputs.velocity > 0.0);
    }

    #[test]
    fn replay_mode_builds_an_inert_backend() {
        let registry = IoRegistry::standard(None);
        let mut io = registry.build(HardwareMode::Replay, &config()).unwrap();
        io.run_open_loop(12.0).unwrap();
        let inputs = io.update_inputs().unwrap();
        assert_eq!(
            inputs,
            ActuatorInputs {
                timestamp_s: 0.02,
                ..ActuatorInputs::default()
            }
        );
    }

    #[test]
    fn real_mode_requires_a_driver_provider() {
        let registry = IoRegistry::standard(None);
        assert!(!registry.supports(HardwareMode::Real));
        let result = registry.build(HardwareMode::Real, &config().with_can_id(7));
        assert!(matches!(result, Err(GearboxError::Configuration(_))));
    }

    #[test]
    fn real_mode_requires_a_can_id() {
        let registry = IoRegistry::standard(Some(Arc::new(Bus { reachable: true })));
        let result = registry.build(HardwareMode::Real, &config());
        assert!(matches!(result, Err(GearboxError::Configuration(_))));
    }

    #[test]
    fn real_mode_opens_the_driver() {
        let registry = IoRegistry::standard(Some(Arc::new(Bus { reachable: true })));
        let mut io = registry.build(HardwareMode::Real, &config().with_can_id(7)).unwrap();
        assert_eq!(io.id(), ActuatorId::Flywheel);
        assert!(io.update_inputs().is_ok());
    }

    #[test]
    fn unreachable_driver_is_a_driver_error() {
        let registry = IoRegistry::standard(Some(Arc::new(Bus { reachable: false })));
        let result = registry.build(HardwareMode::Real, &config().with_can_id(7));
        assert!(matches!(result, Err(GearboxError::Driver { .. })));
    }

    #[test]
    fn re_registering_a_mode_replaces_the_constructor() {
        let mut registry = IoRegistry::standard(None);
        registry.register(
            HardwareMode::Sim,
            Box::new(|cfg: &BackendConfig| {
                Ok(Box::new(InertActuatorIo::new(cfg.id, cfg.loop_period_s)) as Box<dyn ActuatorIo>)
            }),
        );
        let mut io = registry.build(HardwareMode::Sim, &config()).unwrap();
        io.run_open_loop(12.0).unwrap();
        assert_eq!(io.update_inputs().unwrap().velocity, 0.0);
    }
}
