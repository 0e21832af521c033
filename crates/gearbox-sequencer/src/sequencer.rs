//! [`ClimbSequencer`] – the climb routine's finite-state machine.
//!
//! ```text
//! NONE ─▶ PIVOT_CLIMB ─▶ RETRACT_CLIMB ─▶ SCORE_TRAP ─▶ DONE ⟲
//! ```
//!
//! The state only moves forward, one step per [`advance`](ClimbSequencer::advance),
//! and `DONE` is absorbing.  [`reset`](ClimbSequencer::reset) is the only way
//! back to `NONE`.
//!
//! [`tick`](ClimbSequencer::tick) is the stage's own continuation: it drives
//! the [`StageRunner`] for the current state and calls `advance` exactly when
//! the runner reports the stage complete.  A faulted actuator blocks the
//! stage, so the state cannot move while the fault persists.
//!
//! `advance` only moves the state once the runner has observed the current
//! stage complete.  Calling it on an unsettled (or faulted) stage, or at
//! `DONE`, is a caller error: it is logged, recorded as a
//! [`SequencerPrecondition`] and otherwise ignored, never returned as an
//! error.
//!
//! # Example
//!
//! ```rust
//! use std::collections::BTreeMap;
//!
//! use gearbox_control::ActuatorController;
//! use gearbox_sequencer::{AdvanceOutcome, ClimbPlan, ClimbSequencer, StageStatus};
//! use gearbox_types::{ActuatorId, ClimbState};
//!
//! let mut actuators: BTreeMap<ActuatorId, ActuatorController> = BTreeMap::new();
//! let mut seq = ClimbSequencer::new(ClimbPlan::new());
//! assert_eq!(seq.current_state(), ClimbState::None);
//!
//! // The NONE stage has not been observed yet.
//! assert_eq!(seq.advance(), AdvanceOutcome::Rejected);
//! assert_eq!(seq.current_state(), ClimbState::None);
//!
//! // An empty stage completes on its first tick, which advances.
//! assert_eq!(seq.tick(&mut actuators), StageStatus::Complete);
//! assert_eq!(seq.current_state(), ClimbState::PivotClimb);
//! ```

use gearbox_types::ClimbState;
use tracing::{info, warn};

use crate::plan::ClimbPlan;
use crate::stage::{ActuatorSet, StageRunner, StageStatus};

/// Result of [`ClimbSequencer::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    Advanced(ClimbState),
    /// The current stage has not been observed complete; nothing changed.
    Rejected,
    /// Already at `DONE`; nothing changed.
    Terminal,
}

/// Caller precondition violated by the last [`ClimbSequencer::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerPrecondition {
    /// `advance` was called at `DONE`.
    Terminal,
    /// `advance` was called before `state`'s stage was observed complete.
    Unsettled { state: ClimbState },
}

pub struct ClimbSequencer {
    plan: ClimbPlan,
    state: ClimbState,
    runner: StageRunner,
    last_precondition: Option<SequencerPrecondition>,
}

impl ClimbSequencer {
    pub fn new(plan: ClimbPlan) -> Self {
        let runner = runner_for(&plan, ClimbState::None);
        Self {
            plan,
            state: ClimbState::None,
            runner,
            last_precondition: None,
        }
    }

    pub fn current_state(&self) -> ClimbState {
        self.state
    }

    pub fn plan(&self) -> &ClimbPlan {
        &self.plan
    }

    /// Precondition report of the most recent `advance`, if it violated one.
    pub fn last_precondition(&self) -> Option<SequencerPrecondition> {
        self.last_precondition
    }

    /// Move one state forward.
    pub fn advance(&mut self) -> AdvanceOutcome {
        if self.state.is_terminal() {
            warn!(state = %self.state, "advance called at terminal state");
            self.last_precondition = Some(SequencerPrecondition::Terminal);
            return AdvanceOutcome::Terminal;
        }

        if !self.runner.is_complete() {
            warn!(state = %self.state, "advance called before the stage settled, ignoring");
            self.last_precondition = Some(SequencerPrecondition::Unsettled { state: self.state });
            return AdvanceOutcome::Rejected;
        }
        self.last_precondition = None;

        let from = self.state;
        self.state = self.state.next();
        self.runner = runner_for(&self.plan, self.state);
        info!(%from, to = %self.state, "climb state advanced");
        AdvanceOutcome::Advanced(self.state)
    }

    /// Drive the current stage for one cycle, advancing when it completes.
    ///
    /// Returns the stage status observed this tick.  The next stage's first
    /// group is issued on the following tick.
    pub fn tick(&mut self, actuators: &mut dyn ActuatorSet) -> StageStatus {
        if self.state.is_terminal() {
            return StageStatus::Complete;
        }
        let status = self.runner.tick(actuators);
        if status == StageStatus::Complete {
            self.advance();
        }
        status
    }

    /// Stop every actuator the current stage has commanded.  The stage starts
    /// over on the next tick.
    pub fn cancel(&mut self, actuators: &mut dyn ActuatorSet) {
        let issued = self.runner.issued();
        for id in &issued {
            if let Some(actuator) = actuators.actuator(*id) {
                actuator.stop();
            }
        }
        self.runner.restart();
        info!(state = %self.state, stopped = issued.len(), "climb stage cancelled");
    }

    /// Return to `NONE`.
    pub fn reset(&mut self) {
        self.state = ClimbState::None;
        self.runner = runner_for(&self.plan, ClimbState::None);
        self.last_precondition = None;
        info!("climb sequencer reset");
    }
}

fn runner_for(plan: &ClimbPlan, state: ClimbState) -> StageRunner {
    StageRunner::new(plan.stage(state).cloned().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{StagePlan, StageStep};
    use crate::stage::tests::fakes;
    use gearbox_control::{ControllerFault, presets};
    use gearbox_types::ActuatorId;
    use std::collections::BTreeMap;

    const PIVOT: ActuatorId = ActuatorId::ElevatorPivot;
    const EXTENSION: ActuatorId = ActuatorId::ElevatorExtension;

    fn climb_plan() -> ClimbPlan {
        ClimbPlan::new()
            .with_stage(
                ClimbState::PivotClimb,
                StagePlan::new(vec![
                    StageStep::new(PIVOT, 1.2),
                    StageStep::new(EXTENSION, 0.8).then_wait(),
                    StageStep::new(EXTENSION, 0.1),
                ]),
            )
            .with_stage(
                ClimbState::RetractClimb,
                StagePlan::new(vec![StageStep::new(PIVOT, 0.4).then_wait(), StageStep::new(EXTENSION, 0.0)]),
            )
            .with_stage(
                ClimbState::ScoreTrap,
                StagePlan::new(vec![StageStep::new(EXTENSION, 1.1), StageStep::new(PIVOT, 1.5)]),
            )
    }

    #[test]
    fn four_settled_advances_reach_done_and_a_fifth_is_ignored() {
        let mut seq = ClimbSequencer::new(ClimbPlan::new());
        let mut set = fakes(&[], true);
        for expected in [
            ClimbState::PivotClimb,
            ClimbState::RetractClimb,
            ClimbState::ScoreTrap,
            ClimbState::Done,
        ] {
            // Empty stages complete as soon as they are observed.
            assert_eq!(seq.runner.tick(&mut set), StageStatus::Complete);
            assert_eq!(seq.advance(), AdvanceOutcome::Advanced(expected));
            assert_eq!(seq.last_precondition(), None);
        }
        assert_eq!(seq.advance(), AdvanceOutcome::Terminal);
        assert_eq!(seq.current_state(), ClimbState::Done);
        assert_eq!(seq.last_precondition(), Some(SequencerPrecondition::Terminal));
    }

    #[test]
    fn unsettled_advance_is_reported_and_ignored() {
        let mut seq = ClimbSequencer::new(climb_plan());
        let mut set = fakes(&[PIVOT, EXTENSION], false);
        // NONE has an empty stage but it was never ticked.
        assert_eq!(seq.advance(), AdvanceOutcome::Rejected);
        assert_eq!(
            seq.last_precondition(),
            Some(SequencerPrecondition::Unsettled { state: ClimbState::None })
        );
        assert_eq!(seq.current_state(), ClimbState::None);

        seq.tick(&mut set);
        assert_eq!(seq.current_state(), ClimbState::PivotClimb);
        seq.tick(&mut set);
        assert_eq!(seq.advance(), AdvanceOutcome::Rejected);
        assert_eq!(
            seq.last_precondition(),
            Some(SequencerPrecondition::Unsettled {
                state: ClimbState::PivotClimb
            })
        );
        assert_eq!(seq.current_state(), ClimbState::PivotClimb);
    }

    #[test]
    fn manual_advance_cannot_skip_a_faulted_stage() {
        let mut seq = ClimbSequencer::new(climb_plan());
        let mut set = fakes(&[PIVOT, EXTENSION], true);
        seq.tick(&mut set);
        assert_eq!(seq.current_state(), ClimbState::PivotClimb);
        set.get_mut(&PIVOT).unwrap().fault = Some(ControllerFault::Actuator {
            details: "bridge brownout".into(),
        });

        assert!(matches!(seq.tick(&mut set), StageStatus::Blocked(_)));
        assert_eq!(seq.advance(), AdvanceOutcome::Rejected);
        assert_eq!(seq.current_state(), ClimbState::PivotClimb);
        assert_eq!(
            seq.last_precondition(),
            Some(SequencerPrecondition::Unsettled {
                state: ClimbState::PivotClimb
            })
        );
    }

    #[test]
    fn tick_advances_once_per_completed_stage() {
        let mut seq = ClimbSequencer::new(climb_plan());
        let mut set = fakes(&[PIVOT, EXTENSION], true);

        // NONE: empty stage, advances immediately.
        assert_eq!(seq.tick(&mut set), StageStatus::Complete);
        assert_eq!(seq.current_state(), ClimbState::PivotClimb);

        // PIVOT_CLIMB: two groups, then complete.
        assert_eq!(seq.tick(&mut set), StageStatus::Running);
        assert_eq!(seq.tick(&mut set), StageStatus::Running);
        assert_eq!(seq.current_state(), ClimbState::PivotClimb);
        assert_eq!(seq.tick(&mut set), StageStatus::Complete);
        assert_eq!(seq.current_state(), ClimbState::RetractClimb);
        assert_eq!(seq.last_precondition(), None);
        assert_eq!(set[&EXTENSION].goals, vec![0.8, 0.1]);

        let mut ticks = 0;
        while seq.current_state() != ClimbState::Done {
            seq.tick(&mut set);
            ticks += 1;
            assert!(ticks < 10);
        }
        assert_eq!(set[&PIVOT].goals, vec![1.2, 0.4, 1.5]);
        assert_eq!(seq.tick(&mut set), StageStatus::Complete);
        assert_eq!(seq.current_state(), ClimbState::Done);
        assert_eq!(seq.last_precondition(), None);
    }

    #[test]
    fn fault_holds_the_state_until_it_clears() {
        let mut seq = ClimbSequencer::new(climb_plan());
        let mut set = fakes(&[PIVOT, EXTENSION], true);
        seq.tick(&mut set);
        seq.tick(&mut set);
        set.get_mut(&PIVOT).unwrap().fault = Some(ControllerFault::Actuator {
            details: "overtemp".into(),
        });

        for _ in 0..20 {
            assert!(matches!(seq.tick(&mut set), StageStatus::Blocked(_)));
            assert_eq!(seq.current_state(), ClimbState::PivotClimb);
        }

        set.get_mut(&PIVOT).unwrap().fault = None;
        seq.tick(&mut set);
        assert_eq!(seq.tick(&mut set), StageStatus::Complete);
        assert_eq!(seq.current_state(), ClimbState::RetractClimb);
    }

    #[test]
    fn cancel_stops_commanded_actuators_and_restarts_stage() {
        let mut seq = ClimbSequencer::new(climb_plan());
        let mut set = fakes(&[PIVOT, EXTENSION, ActuatorId::Feeder], false);
        seq.tick(&mut set);
        seq.tick(&mut set);

        seq.cancel(&mut set);
        assert_eq!(set[&PIVOT].stops, 1);
        assert_eq!(set[&EXTENSION].stops, 1);
        assert_eq!(set[&ActuatorId::Feeder].stops, 0);
        assert_eq!(seq.current_state(), ClimbState::PivotClimb);

        seq.tick(&mut set);
        assert_eq!(set[&PIVOT].goals, vec![1.2, 1.2]);
    }

    #[test]
    fn reset_returns_to_none() {
        let mut seq = ClimbSequencer::new(ClimbPlan::new());
        let mut set = fakes(&[], true);
        seq.tick(&mut set);
        seq.tick(&mut set);
        assert_eq!(seq.current_state(), ClimbState::RetractClimb);
        seq.advance();
        seq.reset();
        assert_eq!(seq.current_state(), ClimbState::None);
        assert_eq!(seq.last_precondition(), None);
    }

    #[test]
    fn done_tick_is_a_no_op() {
        let mut seq = ClimbSequencer::new(ClimbPlan::new());
        let mut set = fakes(&[], true);
        for _ in 0..4 {
            seq.tick(&mut set);
        }
        assert_eq!(seq.tick(&mut set), StageStatus::Complete);
        assert_eq!(seq.current_state(), ClimbState::Done);
        // tick at DONE never calls advance, so nothing is reported.
        assert_ne!(seq.last_precondition(), Some(SequencerPrecondition::Terminal));
    }

    #[test]
    fn climbs_simulated_controllers_to_done() {
        let mut controllers: BTreeMap<_, _> = [PIVOT, EXTENSION]
            .into_iter()
            .map(|id| (id, presets::for_actuator(id).simulated(0.02).unwrap()))
            .collect();
        let mut seq = ClimbSequencer::new(climb_plan());

        let mut cycles = 0;
        while seq.current_state() != ClimbState::Done {
            seq.tick(&mut controllers);
            for controller in controllers.values_mut() {
                controller.periodic();
            }
            cycles += 1;
            assert!(cycles < 2000, "stuck in {}", seq.current_state());
        }

        assert!((controllers[&PIVOT].inputs().position - 1.5).abs() < 0.02);
        assert!((controllers[&EXTENSION].inputs().position - 1.1).abs() < 0.01);
    }
}
