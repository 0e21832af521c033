//! Deterministic DC-motor-plus-load physics.
//!
//! A [`Plant`] models one or more [`DcMotor`]s driving a load through a fixed
//! reduction.  State is the output-shaft angle `θ` and rate `ω`; each call to
//! [`Plant::step`] integrates them over one control period with a fixed
//! number of RK4 sub-steps:
//!
//! ```text
//! ω_m    = G·ω
//! I      = clamp((V − ω_m / Kv) / R, ±I_limit)
//! I_loss = I_free · ω_m / ω_free
//! α      = (G·Kt·(I − I_loss) − τ_gravity(θ)) / J
//! ```
//!
//! Modelling the free current as a viscous loss makes the unloaded steady
//! state land exactly on the datasheet free speed.  There is no randomness:
//! the same voltage history from the same initial state always reproduces the
//! same trajectory bit for bit.
//!
//! Positions and velocities are reported in *mechanism units*:
//!
//! | [`Load`] | Position | Velocity |
//! |---|---|---|
//! | `Roller` | rotations | rotations/s |
//! | `Elevator` | metres | m/s |
//! | `Arm` | radians | rad/s |

use std::f64::consts::TAU;

use gearbox_types::GearboxError;
use serde::{Deserialize, Serialize};

use crate::motor::DcMotor;

const GRAVITY_M_PER_S2: f64 = 9.81;

/// What the gearbox output drives.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Load {
    /// Free-spinning inertia (flywheel, feeder, intake rollers).
    Roller { moi_kg_m2: f64 },
    /// Carriage lifted by a cable drum.
    Elevator { carriage_mass_kg: f64, drum_radius_m: f64 },
    /// Rotating arm; `θ = 0` is horizontal.
    Arm { moi_kg_m2: f64, mass_kg: f64, com_length_m: f64 },
}

impl Load {
    fn inertia(&self) -> f64 {
        match *self {
            Load::Roller { moi_kg_m2 } => moi_kg_m2,
            Load::Elevator {
                carriage_mass_kg,
                drum_radius_m,
            } => carriage_mass_kg * drum_radius_m * drum_radius_m,
            Load::Arm { moi_kg_m2, .. } => moi_kg_m2,
        }
    }

    fn gravity_torque(&self, theta: f64) -> f64 {
        match *self {
            Load::Roller { .. } => 0.0,
            Load::Elevator {
                carriage_mass_kg,
                drum_radius_m,
            } => carriage_mass_kg * GRAVITY_M_PER_S2 * drum_radius_m,
            Load::Arm {
                mass_kg,
                com_length_m,
                ..
            } => mass_kg * GRAVITY_M_PER_S2 * com_length_m * theta.cos(),
        }
    }

    /// Mechanism units per radian of output shaft.
    fn units_per_radian(&self) -> f64 {
        match *self {
            Load::Roller { .. } => 1.0 / TAU,
            Load::Elevator { drum_radius_m, .. } => drum_radius_m,
            Load::Arm { .. } => 1.0,
        }
    }
}

fn default_substeps() -> u32 {
    20
}

/// Physical description of one mechanism.
///
/// Also used by the real backend to convert rotor rotations into mechanism
/// units, so simulation and hardware report in the same units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlantConfig {
    pub motor: DcMotor,
    /// Rotor turns per output turn.
    pub gearing: f64,
    pub load: Load,
    #[serde(default)]
    pub current_limit_a: Option<f64>,
    /// Hard stops in mechanism units.
    #[serde(default)]
    pub hard_limits: Option<(f64, f64)>,
    #[serde(default)]
    pub initial_position: f64,
    #[serde(default = "default_substeps")]
    pub substeps: u32,
}

impl PlantConfig {
    pub fn new(motor: DcMotor, gearing: f64, load: Load) -> Self {
        Self {
            motor,
            gearing,
            load,
            current_limit_a: None,
            hard_limits: None,
            initial_position: 0.0,
            substeps: default_substeps(),
        }
    }

    pub fn with_current_limit(mut self, amps: f64) -> Self {
        self.current_limit_a = Some(amps);
        self
    }

    pub fn with_hard_limits(mut self, min: f64, max: f64) -> Self {
        self.hard_limits = Some((min, max));
        self
    }

    pub fn with_initial_position(mut self, position: f64) -> Self {
        self.initial_position = position;
        self
    }

    /// Reject a description the integrator cannot step without producing
    /// NaN or infinite state.
    ///
    /// # Errors
    ///
    /// Returns [`GearboxError::Configuration`] naming the first offending
    /// field: a non-positive or non-finite gearing, inertia, mass, drum
    /// radius or motor constant, zero sub-steps, an inverted hard-limit
    /// pair, or a non-finite current limit or initial position.
    pub fn validate(&self) -> Result<(), GearboxError> {
        let motor = &self.motor;
        positive("motor.nominal_volts", motor.nominal_volts)?;
        positive("motor.stall_torque_nm", motor.stall_torque_nm)?;
        positive("motor.stall_current_a", motor.stall_current_a)?;
        positive("motor.free_speed_rad_per_s", motor.free_speed_rad_per_s)?;
        if !(motor.free_current_a.is_finite() && motor.free_current_a >= 0.0) {
            return Err(invalid("motor.free_current_a", motor.free_current_a));
        }
        // Back-EMF constant must stay positive once winding loss is taken out.
        positive("motor back-EMF headroom", motor.nominal_volts - motor.resistance_ohms() * motor.free_current_a)?;
        positive("gearing", self.gearing)?;

        match self.load {
            Load::Roller { moi_kg_m2 } => positive("load.moi_kg_m2", moi_kg_m2)?,
            Load::Elevator {
                carriage_mass_kg,
                drum_radius_m,
            } => {
                positive("load.carriage_mass_kg", carriage_mass_kg)?;
                positive("load.drum_radius_m", drum_radius_m)?;
            }
            Load::Arm {
                moi_kg_m2,
                mass_kg,
                com_length_m,
            } => {
                positive("load.moi_kg_m2", moi_kg_m2)?;
                if !(mass_kg.is_finite() && mass_kg >= 0.0) {
                    return Err(invalid("load.mass_kg", mass_kg));
                }
                if !(com_length_m.is_finite() && com_length_m >= 0.0) {
                    return Err(invalid("load.com_length_m", com_length_m));
                }
            }
        }

        if let Some(limit) = self.current_limit_a {
            positive("current_limit_a", limit)?;
        }
        if let Some((min, max)) = self.hard_limits {
            if !(min.is_finite() && max.is_finite() && min <= max) {
                return Err(GearboxError::Configuration(format!(
                    "plant hard_limits must be a finite (min, max) pair with min <= max, got ({min}, {max})"
                )));
            }
        }
        if !self.initial_position.is_finite() {
            return Err(invalid("initial_position", self.initial_position));
        }
        if self.substeps == 0 {
            return Err(GearboxError::Configuration("plant substeps must be at least 1".into()));
        }
        Ok(())
    }

    /// Mechanism units travelled per rotor rotation.
    pub fn units_per_rotor_rotation(&self) -> f64 {
        TAU * self.load.units_per_radian() / self.gearing
    }

    /// Unloaded output speed at `volts`, in mechanism units/s.
    pub fn free_speed_at(&self, volts: f64) -> f64 {
        self.motor.free_speed_at(volts) / self.gearing * self.load.units_per_radian()
    }

    /// Holding voltage against gravity at `position` (mechanism units).
    pub fn gravity_volts(&self, position: f64) -> f64 {
        let theta = position / self.load.units_per_radian();
        let torque = self.load.gravity_torque(theta);
        torque * self.motor.resistance_ohms() / (self.motor.kt_nm_per_amp() * self.gearing)
    }
}

fn invalid(field: &str, value: f64) -> GearboxError {
    GearboxError::Configuration(format!("plant {field} is out of range: {value}"))
}

fn positive(field: &str, value: f64) -> Result<(), GearboxError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, value))
    }
}

/// Integrator state for one simulated mechanism.
#[derive(Debug, Clone)]
pub struct Plant {
    config: PlantConfig,
    theta: f64,
    omega: f64,
    current_a: f64,
    applied_volts: f64,
    time_s: f64,
}

impl Plant {
    pub fn new(config: PlantConfig) -> Self {
        let theta = config.initial_position / config.load.units_per_radian();
        Self {
            config,
            theta,
            omega: 0.0,
            current_a: 0.0,
            applied_volts: 0.0,
            time_s: 0.0,
        }
    }

    pub fn config(&self) -> &PlantConfig {
        &self.config
    }

    /// Advance the plant by `dt` seconds with `volts` held constant.
    pub fn step(&mut self, volts: f64, dt: f64) {
        if dt <= 0.0 {
            return;
        }
        let substeps = self.config.substeps.max(1);
        let h = dt / f64::from(substeps);

        for _ in 0..substeps {
            let (k1t, k1w) = self.derivatives(self.theta, self.omega, volts);
            let (k2t, k2w) = self.derivatives(self.theta + 0.5 * h * k1t, self.omega + 0.5 * h * k1w, volts);
            let (k3t, k3w) = self.derivatives(self.theta + 0.5 * h * k2t, self.omega + 0.5 * h * k2w, volts);
            let (k4t, k4w) = self.derivatives(self.theta + h * k3t, self.omega + h * k3w, volts);

            self.theta += h / 6.0 * (k1t + 2.0 * k2t + 2.0 * k3t + k4t);
            self.omega += h / 6.0 * (k1w + 2.0 * k2w + 2.0 * k3w + k4w);
            self.enforce_hard_limits();
        }

        self.applied_volts = volts;
        self.current_a = self.supply_current(self.omega, volts);
        self.time_s += dt;
    }

    pub fn position(&self) -> f64 {
        self.theta * self.config.load.units_per_radian()
    }

    pub fn velocity(&self) -> f64 {
        self.omega * self.config.load.units_per_radian()
    }

    pub fn current_amps(&self) -> f64 {
        self.current_a
    }

    pub fn applied_volts(&self) -> f64 {
        self.applied_volts
    }

    pub fn time_s(&self) -> f64 {
        self.time_s
    }

    fn supply_current(&self, omega: f64, volts: f64) -> f64 {
        let raw = self.config.motor.current_a(omega * self.config.gearing, volts);
        match self.config.current_limit_a {
            Some(limit) => raw.clamp(-limit.abs(), limit.abs()),
            None => raw,
        }
    }

    fn derivatives(&self, theta: f64, omega: f64, volts: f64) -> (f64, f64) {
        let motor = &self.config.motor;
        let rotor_speed = omega * self.config.gearing;
        let current = self.supply_current(omega, volts);
        let loss = motor.free_current_a * rotor_speed / motor.free_speed_rad_per_s;
        let drive = self.config.gearing * motor.kt_nm_per_amp() * (current - loss);
        let alpha = (drive - self.config.load.gravity_torque(theta)) / self.config.load.inertia();
        (omega, alpha)
    }

    fn enforce_hard_limits(&mut self) {
        let Some((min, max)) = self.config.hard_limits else {
            return;
        };
        let per_radian = self.config.load.units_per_radian();
        let (lo, hi) = (min / per_radian, max / per_radian);
        if self.theta < lo {
            self.theta = lo;
            self.omega = self.omega.max(0.0);
        } else if self.theta > hi {
            self.theta = hi;
            self.omega = self.omega.min(0.0);
        }
    }
}
