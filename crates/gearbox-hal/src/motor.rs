//! Brushless DC motor catalogue.
//!
//! A [`DcMotor`] is described by its datasheet points (stall torque, stall
//! current, free current, free speed at nominal voltage).  The linear motor
//! constants used by the [`Plant`][crate::plant::Plant] are derived from
//! those:
//!
//! | Constant | Formula |
//! |---|---|
//! | winding resistance `R` | `V_nom / I_stall` |
//! | speed constant `Kv` (rad/s per V) | `ω_free / (V_nom − R·I_free)` |
//! | torque constant `Kt` (N·m per A) | `τ_stall / I_stall` |
//!
//! Ganging `n` identical motors on one gearbox multiplies torque and current;
//! the free speed is unchanged.

use serde::{Deserialize, Serialize};

const RPM_TO_RAD_PER_S: f64 = std::f64::consts::TAU / 60.0;

/// Datasheet description of one or more identical motors sharing a gearbox.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DcMotor {
    pub nominal_volts: f64,
    pub stall_torque_nm: f64,
    pub stall_current_a: f64,
    pub free_current_a: f64,
    pub free_speed_rad_per_s: f64,
}

impl DcMotor {
    fn from_datasheet(
        nominal_volts: f64,
        stall_torque_nm: f64,
        stall_current_a: f64,
        free_current_a: f64,
        free_speed_rpm: f64,
        count: u32,
    ) -> Self {
        let n = f64::from(count.max(1));
        Self {
            nominal_volts,
            stall_torque_nm: stall_torque_nm * n,
            stall_current_a: stall_current_a * n,
            free_current_a: free_current_a * n,
            free_speed_rad_per_s: free_speed_rpm * RPM_TO_RAD_PER_S,
        }
    }

    /// CTRE Kraken X60.
    pub fn kraken_x60(count: u32) -> Self {
        Self::from_datasheet(12.0, 7.09, 366.0, 2.0, 6000.0, count)
    }

    /// CTRE Falcon 500.
    pub fn falcon_500(count: u32) -> Self {
        Self::from_datasheet(12.0, 4.69, 257.0, 1.5, 6380.0, count)
    }

    /// REV NEO Vortex.
    pub fn neo_vortex(count: u32) -> Self {
        Self::from_datasheet(12.0, 3.6, 211.0, 3.6, 6784.0, count)
    }

    pub fn resistance_ohms(&self) -> f64 {
        self.nominal_volts / self.stall_current_a
    }

    pub fn kv_rad_per_s_per_volt(&self) -> f64 {
        self.free_speed_rad_per_s / (self.nominal_volts - self.resistance_ohms() * self.free_current_a)
    }

    pub fn kt_nm_per_amp(&self) -> f64 {
        self.stall_torque_nm / self.stall_current_a
    }

    /// Supply current drawn at rotor speed `speed_rad_per_s` with `volts`
    /// applied, before any current limit.
    pub fn current_a(&self, speed_rad_per_s: f64, volts: f64) -> f64 {
        (volts - speed_rad_per_s / self.kv_rad_per_s_per_volt()) / self.resistance_ohms()
    }

    /// Free-speed of the rotor at `volts`, rad/s.
    pub fn free_speed_at(&self, volts: f64) -> f64 {
        self.free_speed_rad_per_s * volts / self.nominal_volts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kraken_constants_match_datasheet() {
        let m = DcMotor::kraken_x60(1);
        assert!((m.resistance_ohms() - 12.0 / 366.0).abs() < 1e-12);
        assert!((m.kt_nm_per_amp() - 7.09 / 366.0).abs() < 1e-12);
        assert!((m.free_speed_rad_per_s - 200.0 * std::f64::consts::PI).abs() < 1e-9);
        // Stall: full voltage at zero speed draws stall current.
        assert!((m.current_a(0.0, 12.0) - 366.0).abs() < 1e-9);
    }

    #[test]
    fn ganged_motors_double_torque_not_speed() {
        let one = DcMotor::falcon_500(1);
        let two = DcMotor::falcon_500(2);
        assert!((two.stall_torque_nm - 2.0 * one.stall_torque_nm).abs() < 1e-12);
        assert!((two.free_speed_rad_per_s - one.free_speed_rad_per_s).abs() < 1e-12);
        assert!((two.kt_nm_per_amp() - one.kt_nm_per_amp()).abs() < 1e-12);
        assert!((two.kv_rad_per_s_per_volt() - one.kv_rad_per_s_per_volt()).abs() < 1e-9);
    }

    #[test]
    fn current_at_free_speed_equals_free_current() {
        let m = DcMotor::neo_vortex(1);
        let i = m.current_a(m.free_speed_rad_per_s, m.nominal_volts);
        assert!((i - m.free_current_a).abs() < 1e-9);
    }
}
