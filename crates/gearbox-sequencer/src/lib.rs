//! `gearbox-sequencer` – the multi-stage climb routine.
//!
//! # Modules
//!
//! - [`plan`] – [`ClimbPlan`][plan::ClimbPlan]: the state → stage transition
//!   table, loaded from configuration.
//! - [`stage`] – [`StageRunner`][stage::StageRunner]: issues a stage's goal
//!   groups in order, gated by barriers, and the [`ActuatorSet`][stage::ActuatorSet]
//!   seam it drives actuators through.
//! - [`sequencer`] – [`ClimbSequencer`][sequencer::ClimbSequencer]: the
//!   NONE → … → DONE state machine.

pub mod plan;
pub mod sequencer;
pub mod stage;

pub use plan::{ClimbPlan, StagePlan, StageStep};
pub use sequencer::{AdvanceOutcome, ClimbSequencer, SequencerPrecondition};
pub use stage::{ActuatorSet, StageActuator, StageBlock, StageRunner, StageStatus};
