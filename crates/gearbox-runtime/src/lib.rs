//! `gearbox-runtime` – robot assembly and process plumbing.
//!
//! Turns a [`RobotConfig`][config::RobotConfig] into a running
//! [`Robot`][robot::Robot]: one backend and one controller per actuator, plus
//! the climb sequencer, all wired once at startup.
//!
//! # Modules
//!
//! - [`config`] – [`RobotConfig`][config::RobotConfig]: loop period,
//!   per-actuator overrides (hardware mode, CAN id, gains, limits) and the
//!   climb transition table.
//! - [`robot`] – [`Robot`][robot::Robot]: the composition root and its
//!   read-only [`RobotSnapshot`][robot::RobotSnapshot].
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: global
//!   `tracing` subscriber setup.

pub mod config;
pub mod robot;
pub mod telemetry;

pub use config::{ActuatorConfig, ResolvedActuator, RobotConfig};
pub use robot::{ActuatorSnapshot, Robot, RobotSnapshot};
