//! [`Robot`] – composition root.
//!
//! Built once from a [`RobotConfig`]: every actuator gets its own backend
//! from the [`IoRegistry`] and its own [`ActuatorController`], and the climb
//! plan is handed to a [`ClimbSequencer`].  No controller state is shared
//! between actuators; each owns its backend.
//!
//! One call to [`periodic`](Robot::periodic) is one control cycle.

use std::collections::BTreeMap;
use std::sync::Arc;

use gearbox_control::{ActuatorController, ControllerFault};
use gearbox_hal::{DriverProvider, IoRegistry};
use gearbox_sequencer::{ActuatorSet, ClimbSequencer, StageActuator, StageStatus};
use gearbox_types::{ActuatorId, ActuatorInputs, ClimbState, GearboxError, HardwareMode};
use serde::Serialize;
use tracing::info;

use crate::config::RobotConfig;

/// Read-only view of one actuator for telemetry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActuatorSnapshot {
    pub mode: HardwareMode,
    pub goal: f64,
    pub inputs: ActuatorInputs,
    pub settled: bool,
    pub fault: Option<ControllerFault>,
}

/// Read-only view of the whole robot for telemetry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RobotSnapshot {
    pub cycle: u64,
    pub climb_state: ClimbState,
    pub actuators: BTreeMap<ActuatorId, ActuatorSnapshot>,
}

pub struct Robot {
    loop_period_s: f64,
    modes: BTreeMap<ActuatorId, HardwareMode>,
    controllers: BTreeMap<ActuatorId, ActuatorController>,
    sequencer: ClimbSequencer,
    cycle: u64,
}

impl Robot {
    /// Build every actuator with the standard backend table.
    ///
    /// `drivers` is only needed when an actuator is configured for
    /// [`HardwareMode::Real`].
    ///
    /// # Errors
    ///
    /// - [`GearboxError::Configuration`] if the configuration is invalid or a
    ///   real actuator has no driver or CAN id.
    /// - [`GearboxError::Driver`] if a motor controller cannot be opened.
    pub fn from_config(config: &RobotConfig, drivers: Option<Arc<dyn DriverProvider>>) -> Result<Self, GearboxError> {
        Self::with_registry(config, &IoRegistry::standard(drivers))
    }

    /// Build every actuator with a caller-supplied backend table.
    ///
    /// # Errors
    ///
    /// Same as [`Robot::from_config`].
    pub fn with_registry(config: &RobotConfig, registry: &IoRegistry) -> Result<Self, GearboxError> {
        config.validate()?;

        let mut modes = BTreeMap::new();
        let mut controllers = BTreeMap::new();
        for id in ActuatorId::ALL {
            let resolved = config.actuator(id).resolve(id, config.loop_period_s)?;
            let io = registry.build(resolved.mode, &resolved.backend)?;
            let controller = ActuatorController::new(resolved.spec, resolved.gains, io)?;
            modes.insert(id, resolved.mode);
            controllers.insert(id, controller);
        }

        info!(
            loop_period_s = config.loop_period_s,
            actuators = controllers.len(),
            "robot assembled"
        );

        Ok(Self {
            loop_period_s: config.loop_period_s,
            modes,
            controllers,
            sequencer: ClimbSequencer::new(config.climb.clone()),
            cycle: 0,
        })
    }

    pub fn loop_period_s(&self) -> f64 {
        self.loop_period_s
    }

    /// Control cycles run so far.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn mode(&self, id: ActuatorId) -> Option<HardwareMode> {
        self.modes.get(&id).copied()
    }

    pub fn controller(&self, id: ActuatorId) -> Option<&ActuatorController> {
        self.controllers.get(&id)
    }

    pub fn controller_mut(&mut self, id: ActuatorId) -> Option<&mut ActuatorController> {
        self.controllers.get_mut(&id)
    }

    pub fn controllers(&self) -> impl Iterator<Item = (ActuatorId, &ActuatorController)> {
        self.controllers.iter().map(|(id, c)| (*id, c))
    }

    pub fn sequencer(&self) -> &ClimbSequencer {
        &self.sequencer
    }

    pub fn sequencer_mut(&mut self) -> &mut ClimbSequencer {
        &mut self.sequencer
    }

    /// Run one control cycle of every actuator.  The climb sequencer is not
    /// ticked.
    pub fn periodic(&mut self) {
        for controller in self.controllers.values_mut() {
            controller.periodic();
        }
        self.cycle += 1;
    }

    /// Tick the climb sequencer, then run one control cycle.
    pub fn climb_periodic(&mut self) -> StageStatus {
        let status = self.sequencer.tick(&mut self.controllers);
        self.periodic();
        status
    }

    /// Abandon the current climb stage and stop the actuators it moved.
    pub fn cancel_climb(&mut self) {
        self.sequencer.cancel(&mut self.controllers);
    }

    /// Stop every actuator.
    pub fn stop_all(&mut self) {
        for controller in self.controllers.values_mut() {
            controller.stop();
        }
    }

    pub fn snapshot(&self) -> RobotSnapshot {
        RobotSnapshot {
            cycle: self.cycle,
            climb_state: self.sequencer.current_state(),
            actuators: self
                .controllers
                .iter()
                .map(|(id, c)| {
                    (
                        *id,
                        ActuatorSnapshot {
                            mode: self.modes.get(id).copied().unwrap_or_default(),
                            goal: c.goal(),
                            inputs: *c.inputs(),
                            settled: c.is_settled(),
                            fault: c.fault(),
                        },
                    )
                })
                .collect(),
        }
    }
}

impl ActuatorSet for Robot {
    fn actuator(&mut self, id: ActuatorId) -> Option<&mut dyn StageActuator> {
        self.controllers.actuator(id)
    }
}
