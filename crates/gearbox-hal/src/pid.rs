//! Backend feedback law: the loop a motor controller would otherwise run in
//! firmware.
//!
//! [`SimActuatorIo`](crate::SimActuatorIo) keeps one [`PidController`] per
//! actuator and evaluates it once per control period against the plant's
//! measurement.  Output is volts:
//!
//! | Term | Contribution |
//! |---|---|
//! | P | `kp · e` |
//! | I | `ki · ∫e dt`, held inside the output range |
//! | D | `−kd · d(measurement)/dt` |
//!
//! Differentiating the measurement instead of the error means a goal step
//! moves the output through P and I only.  The integral is clamped by
//! back-calculation, so after saturation it unwinds as soon as the error
//! changes sign.
//!
//! # Example
//!
//! ```rust
//! use gearbox_hal::pid::PidController;
//!
//! let mut pid = PidController::new(0.5, 0.0, 0.0);
//! pid.set_output_limits(-12.0, 12.0);
//! pid.set_set_point(50.0); // rot/s
//!
//! let volts = pid.update(0.0, 0.02);
//! assert_eq!(volts, 12.0);
//! ```

#[derive(Debug, Clone)]
pub struct PidController {
    kp: f64,
    ki: f64,
    kd: f64,
    set_point: f64,
    /// `∫e dt`, kept so that `ki · integral` never leaves the output range.
    integral: f64,
    /// Previous measurement; `None` until the first update after a reset.
    last_measurement: Option<f64>,
    output_min: f64,
    output_max: f64,
}

impl PidController {
    /// Output starts unbounded; backends set the bus range with
    /// [`set_output_limits`](Self::set_output_limits).
    pub fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self {
            kp,
            ki,
            kd,
            set_point: 0.0,
            integral: 0.0,
            last_measurement: None,
            output_min: f64::NEG_INFINITY,
            output_max: f64::INFINITY,
        }
    }

    /// Retune in place.  The accumulated error is kept.
    pub fn set_gains(&mut self, kp: f64, ki: f64, kd: f64) {
        self.kp = kp;
        self.ki = ki;
        self.kd = kd;
    }

    pub fn set_set_point(&mut self, set_point: f64) {
        self.set_point = set_point;
    }

    /// Bounds both the output and the integral contribution.
    pub fn set_output_limits(&mut self, min: f64, max: f64) {
        self.output_min = min;
        self.output_max = max;
    }

    /// Volts currently supplied by the integral term.
    pub fn integral_output(&self) -> f64 {
        self.ki * self.integral
    }

    /// One step of the loop, `dt` seconds after the previous one.
    ///
    /// A non-positive `dt` yields `0.0` and leaves the state untouched.
    pub fn update(&mut self, measurement: f64, dt: f64) -> f64 {
        if dt <= 0.0 {
            return 0.0;
        }

        let error = self.set_point - measurement;
        self.integral = self.bounded_integral(self.integral + error * dt);

        let rate = self.last_measurement.map_or(0.0, |prev| (measurement - prev) / dt);
        self.last_measurement = Some(measurement);

        self.limit(self.kp * error + self.ki * self.integral - self.kd * rate)
    }

    /// Forget the accumulated error and the previous measurement.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.last_measurement = None;
    }

    fn bounded_integral(&self, integral: f64) -> f64 {
        // With no integral gain there is nothing to saturate.
        if self.ki.abs() <= f64::EPSILON {
            return integral;
        }
        self.limit(self.ki * integral) / self.ki
    }

    fn limit(&self, volts: f64) -> f64 {
        volts.clamp(self.output_min, self.output_max)
    }
}
