//! [`RobotConfig`] – the startup configuration handed to the composition root.
//!
//! Every field is optional in the serialized form.  Per-actuator tables only
//! override the preset for that actuator; an actuator without a table runs
//! its preset in simulation.
//!
//! ```toml
//! loop_period_s = 0.02
//!
//! [actuators.flywheel]
//! mode = "real"
//! can_id = 14
//! gains = { kp = 0.4, kv = 0.118 }
//!
//! [actuators.elevator_pivot]
//! mode = "replay"
//!
//! [[climb.pivot_climb.steps]]
//! actuator = "elevator_pivot"
//! goal = 1.2
//! barrier = true
//! ```

use std::collections::BTreeMap;

use gearbox_control::{ActuatorSpec, presets};
use gearbox_hal::{BackendConfig, PlantConfig};
use gearbox_sequencer::ClimbPlan;
use gearbox_types::{ActuatorId, ControlGains, GearboxError, HardwareMode};
use serde::{Deserialize, Serialize};

/// Default control period, seconds.
pub const DEFAULT_LOOP_PERIOD_S: f64 = 0.02;

fn default_loop_period_s() -> f64 {
    DEFAULT_LOOP_PERIOD_S
}

/// Overrides for one actuator.  Unset fields fall back to the preset.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ActuatorConfig {
    pub mode: HardwareMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_id: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gains: Option<ControlGains>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stale_fault_cycles: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settle_cycles: Option<u32>,
    /// Simulated mechanism; also supplies the unit conversion for real
    /// hardware.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plant: Option<PlantConfig>,
}

/// An actuator's fully merged configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedActuator {
    pub mode: HardwareMode,
    pub spec: ActuatorSpec,
    pub gains: ControlGains,
    pub backend: BackendConfig,
}

impl ActuatorConfig {
    /// Merge these overrides onto the preset for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`GearboxError::Configuration`] if the merged `ActuatorSpec` or
    /// the plant override is invalid.
    pub fn resolve(&self, id: ActuatorId, loop_period_s: f64) -> Result<ResolvedActuator, GearboxError> {
        let preset = presets::for_actuator(id);
        let mut spec = preset.spec;
        spec.min = self.min.unwrap_or(spec.min);
        spec.max = self.max.unwrap_or(spec.max);
        spec.tolerance = self.tolerance.unwrap_or(spec.tolerance);
        spec.stale_fault_cycles = self.stale_fault_cycles.unwrap_or(spec.stale_fault_cycles);
        spec.settle_cycles = self.settle_cycles.unwrap_or(spec.settle_cycles);
        spec.neutral_goal = spec.clamp(spec.neutral_goal);
        spec.validate()?;

        let plant = self.plant.unwrap_or(preset.plant);
        plant.validate()?;
        let mut backend = BackendConfig::new(id, plant, loop_period_s);
        backend.can_id = self.can_id;

        Ok(ResolvedActuator {
            mode: self.mode,
            spec,
            gains: self.gains.unwrap_or(preset.gains),
            backend,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    #[serde(default = "default_loop_period_s")]
    pub loop_period_s: f64,
    #[serde(with = "actuator_table")]
    pub actuators: BTreeMap<ActuatorId, ActuatorConfig>,
    pub climb: ClimbPlan,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            loop_period_s: DEFAULT_LOOP_PERIOD_S,
            actuators: ActuatorId::ALL
                .into_iter()
                .map(|id| (id, ActuatorConfig::default()))
                .collect(),
            climb: ClimbPlan::default(),
        }
    }
}

impl RobotConfig {
    /// Overrides for `id`, or the defaults when it has no table.
    pub fn actuator(&self, id: ActuatorId) -> ActuatorConfig {
        self.actuators.get(&id).cloned().unwrap_or_default()
    }

    /// Put every actuator into `mode`.
    pub fn set_mode(&mut self, mode: HardwareMode) {
        for id in ActuatorId::ALL {
            self.actuators.entry(id).or_default().mode = mode;
        }
    }

    /// # Errors
    ///
    /// Returns [`GearboxError::Configuration`] for a non-positive loop period,
    /// an invalid actuator override, or an invalid climb plan.
    pub fn validate(&self) -> Result<(), GearboxError> {
        if !(self.loop_period_s.is_finite() && self.loop_period_s > 0.0) {
            return Err(GearboxError::Configuration(format!(
                "loop_period_s must be positive, got {}",
                self.loop_period_s
            )));
        }
        for id in ActuatorId::ALL {
            self.actuator(id).resolve(id, self.loop_period_s)?;
        }
        self.climb.validate()
    }
}

/// `[actuators.<id>]` tables keyed by the actuator's configuration name.
mod actuator_table {
    use std::collections::BTreeMap;

    use gearbox_types::ActuatorId;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::ActuatorConfig;

    pub fn serialize<S: Serializer>(table: &BTreeMap<ActuatorId, ActuatorConfig>, s: S) -> Result<S::Ok, S::Error> {
        s.collect_map(table.iter().map(|(id, cfg)| (id.as_str(), cfg)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeMap<ActuatorId, ActuatorConfig>, D::Error> {
        BTreeMap::<String, ActuatorConfig>::deserialize(d)?
            .into_iter()
            .map(|(key, cfg)| {
                key.parse::<ActuatorId>()
                    .map(|id| (id, cfg))
                    .map_err(serde::de::Error::custom)
            })
            .collect()
    }
}
