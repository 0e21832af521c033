//! Feedforward volts computed from [`ControlGains`] and the current goal.
//!
//! ```text
//! ff = ks·sign(r) + kv·v_ref + gravity(position)
//! ```
//!
//! | Control | `r` | `v_ref` |
//! |---|---|---|
//! | velocity | goal | goal |
//! | position | goal − position | 0 |
//!
//! The gravity term depends on the mechanism ([`GravityModel`]): zero for
//! rollers, `kg` for an elevator carriage, `kg·cos θ` for an arm.

use gearbox_hal::MAX_VOLTS;
use gearbox_types::ControlGains;
use serde::{Deserialize, Serialize};

/// How gravity loads a mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GravityModel {
    #[default]
    None,
    /// Constant load regardless of position (elevator).
    Constant,
    /// Load proportional to `cos θ`, position in radians from horizontal (arm).
    Cosine,
}

impl GravityModel {
    pub fn volts(self, kg: f64, position: f64) -> f64 {
        match self {
            GravityModel::None => 0.0,
            GravityModel::Constant => kg,
            GravityModel::Cosine => kg * position.cos(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Feedforward {
    pub ks: f64,
    pub kv: f64,
    pub kg: f64,
    pub gravity: GravityModel,
}

impl Feedforward {
    pub fn new(gains: &ControlGains, gravity: GravityModel) -> Self {
        Self {
            ks: gains.ks,
            kv: gains.kv,
            kg: gains.kg,
            gravity,
        }
    }

    /// Feedforward for tracking velocity `goal`.
    pub fn velocity(&self, goal: f64, position: f64) -> f64 {
        let volts = self.ks * sign(goal, 0.0) + self.kv * goal + self.gravity.volts(self.kg, position);
        volts.clamp(-MAX_VOLTS, MAX_VOLTS)
    }

    /// Feedforward for holding position `goal`.  Static friction is only
    /// compensated while the error is larger than `deadband`.
    pub fn position(&self, goal: f64, position: f64, deadband: f64) -> f64 {
        let volts = self.ks * sign(goal - position, deadband) + self.gravity.volts(self.kg, position);
        volts.clamp(-MAX_VOLTS, MAX_VOLTS)
    }
}

fn sign(x: f64, deadband: f64) -> f64 {
    if x > deadband {
        1.0
    } else if x < -deadband {
        -1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn ff(gravity: GravityModel) -> Feedforward {
        Feedforward::new(&ControlGains::pid(1.0, 0.0, 0.0).with_feedforward(0.2, 0.12, 0.5), gravity)
    }

    #[test]
    fn velocity_feedforward_is_static_plus_velocity() {
        let f = ff(GravityModel::None);
        assert!((f.velocity(50.0, 0.0) - (0.2 + 6.0)).abs() < 1e-12);
        assert!((f.velocity(-50.0, 0.0) + (0.2 + 6.0)).abs() < 1e-12);
        assert_eq!(f.velocity(0.0, 0.0), 0.0);
    }

    #[test]
    fn velocity_feedforward_is_clamped() {
        let f = ff(GravityModel::None);
        assert_eq!(f.velocity(1000.0, 0.0), MAX_VOLTS);
    }

    #[test]
    fn constant_gravity_does_not_depend_on_position() {
        let f = ff(GravityModel::Constant);
        assert!((f.position(0.5, 0.5, 0.01) - 0.5).abs() < 1e-12);
        assert!((f.position(1.0, 1.0, 0.01) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn cosine_gravity_vanishes_when_vertical() {
        let f = ff(GravityModel::Cosine);
        assert!((f.position(0.0, 0.0, 0.01) - 0.5).abs() < 1e-12);
        assert!(f.position(FRAC_PI_2, FRAC_PI_2, 0.01).abs() < 1e-12);
    }

    #[test]
    fn static_term_respects_deadband() {
        let f = ff(GravityModel::None);
        assert_eq!(f.position(1.005, 1.0, 0.01), 0.0);
        assert!((f.position(1.5, 1.0, 0.01) - 0.2).abs() < 1e-12);
        assert!((f.position(0.5, 1.0, 0.01) + 0.2).abs() < 1e-12);
    }

    #[test]
    fn no_gravity_model_ignores_kg() {
        assert_eq!(GravityModel::None.volts(3.0, 0.0), 0.0);
    }
}
