//! `gearbox-control` – closed-loop actuator control.
//!
//! One generic [`ActuatorController`][controller::ActuatorController] serves
//! every degree of freedom; what differs between a flywheel and an arm pivot
//! is data ([`ActuatorSpec`][controller::ActuatorSpec], gains, gravity model),
//! not code.
//!
//! # Modules
//!
//! - [`feedforward`] – static, velocity and gravity feedforward terms.
//! - [`health`] – [`FreshnessMonitor`][health::FreshnessMonitor]: cycle-counted
//!   input staleness detection.
//! - [`controller`] – the controller itself, its spec, commands and fault flag.
//! - [`presets`] – specs, gains and simulated plants for the robot's five
//!   actuators.

pub mod controller;
pub mod feedforward;
pub mod health;
pub mod presets;

pub use controller::{ActuatorController, ActuatorSpec, ControlKind, ControllerFault, HalCommand};
pub use feedforward::{Feedforward, GravityModel};
pub use health::{FreshnessMonitor, InputHealth};
pub use presets::Preset;
