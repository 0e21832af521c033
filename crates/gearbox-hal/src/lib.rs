//! `gearbox-hal` – Hardware Abstraction Layer
//!
//! Everything below the actuator controllers: the per-actuator IO contract,
//! the backends that satisfy it, and the single place where a
//! [`HardwareMode`][gearbox_types::HardwareMode] is turned into a backend.
//!
//! # Modules
//!
//! - [`io`] – [`ActuatorIo`][io::ActuatorIo]: the contract every backend
//!   implements (refresh inputs, open-loop volts, closed-loop velocity and
//!   position, stop, gains).
//! - [`pid`] – [`PidController`][pid::PidController]: the native control law
//!   used by backends that do not run one in firmware.
//! - [`motor`] – [`DcMotor`][motor::DcMotor]: catalogue of brushless motors
//!   and their derived electrical constants.
//! - [`plant`] – [`Plant`][plant::Plant]: deterministic DC-motor-plus-load
//!   physics integrated once per control period.
//! - [`sim`] – [`SimActuatorIo`][sim::SimActuatorIo]: simulated backend.
//! - [`inert`] – [`InertActuatorIo`][inert::InertActuatorIo]: no-op backend
//!   for replay or disabled hardware.
//! - [`real`] – [`RealActuatorIo`][real::RealActuatorIo]: motor-controller
//!   backend over the [`MotorDriver`][real::MotorDriver] protocol seam.
//! - [`registry`] – [`IoRegistry`][registry::IoRegistry]: mode → constructor
//!   factory table evaluated once at startup.

pub mod inert;
pub mod io;
pub mod motor;
pub mod pid;
pub mod plant;
pub mod real;
pub mod registry;
pub mod sim;

pub use inert::InertActuatorIo;
pub use io::{ActuatorIo, MAX_VOLTS};
pub use motor::DcMotor;
pub use pid::PidController;
pub use plant::{Load, Plant, PlantConfig};
pub use real::{DriverFault, DriverProvider, DriverSettings, MotorDriver, MotorStatus, RealActuatorIo};
pub use registry::{BackendConfig, IoConstructor, IoRegistry};
pub use sim::SimActuatorIo;
