//! [`StageRunner`] – intra-stage scheduler.
//!
//! The runner walks a [`StagePlan`] one parallel group at a time.  Each
//! [`tick`](StageRunner::tick):
//!
//! 1. reports [`StageStatus::Blocked`] if any actuator of the stage is
//!    faulted or missing,
//! 2. otherwise waits ([`StageStatus::Running`]) until every step issued so
//!    far is settled,
//! 3. then issues the next group, or reports [`StageStatus::Complete`] when
//!    none is left.
//!
//! Actuators are reached through the [`ActuatorSet`] / [`StageActuator`]
//! seam, so the runner is testable without controllers or hardware.

use std::collections::{BTreeMap, BTreeSet};

use gearbox_control::{ActuatorController, ControllerFault};
use gearbox_types::ActuatorId;
use tracing::{debug, warn};

use crate::plan::StagePlan;

// ────────────────────────────────────────────────────────────────────────────
// Actuator seam
// ────────────────────────────────────────────────────────────────────────────

/// The part of a controller a stage needs.
pub trait StageActuator {
    fn set_goal(&mut self, goal: f64);
    fn is_settled(&self) -> bool;
    fn fault(&self) -> Option<ControllerFault>;
    fn stop(&mut self);
}

impl StageActuator for ActuatorController {
    fn set_goal(&mut self, goal: f64) {
        ActuatorController::set_goal(self, goal);
    }

    fn is_settled(&self) -> bool {
        ActuatorController::is_settled(self)
    }

    fn fault(&self) -> Option<ControllerFault> {
        ActuatorController::fault(self)
    }

    fn stop(&mut self) {
        ActuatorController::stop(self);
    }
}

/// Resolves actuator ids to the actuators a stage drives.
pub trait ActuatorSet {
    fn actuator(&mut self, id: ActuatorId) -> Option<&mut dyn StageActuator>;
}

impl<A: StageActuator> ActuatorSet for BTreeMap<ActuatorId, A> {
    fn actuator(&mut self, id: ActuatorId) -> Option<&mut dyn StageActuator> {
        self.get_mut(&id).map(|a| a as &mut dyn StageActuator)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Runner
// ────────────────────────────────────────────────────────────────────────────

/// Why a stage cannot make progress.
#[derive(Debug, Clone, PartialEq)]
pub enum StageBlock {
    Faulted { actuator: ActuatorId, fault: ControllerFault },
    Missing { actuator: ActuatorId },
}

#[derive(Debug, Clone, PartialEq)]
pub enum StageStatus {
    Running,
    Blocked(Vec<StageBlock>),
    Complete,
}

#[derive(Debug, Clone, Default)]
pub struct StageRunner {
    stage: StagePlan,
    next_group: usize,
    complete: bool,
    blocked: bool,
}

impl StageRunner {
    pub fn new(stage: StagePlan) -> Self {
        Self {
            stage,
            ..Self::default()
        }
    }

    pub fn stage(&self) -> &StagePlan {
        &self.stage
    }

    /// Whether the last tick observed the stage as complete.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Actuators that have been given a goal by this stage so far.
    pub fn issued(&self) -> BTreeSet<ActuatorId> {
        self.stage
            .groups()
            .iter()
            .take(self.next_group)
            .flat_map(|group| group.iter().map(|step| step.actuator))
            .collect()
    }

    /// Start the stage over; nothing is re-issued until the next tick.
    pub fn restart(&mut self) {
        self.next_group = 0;
        self.complete = false;
        self.blocked = false;
    }

    pub fn tick(&mut self, actuators: &mut dyn ActuatorSet) -> StageStatus {
        let blocks = self.blocks(actuators);
        if !blocks.is_empty() {
            if !self.blocked {
                warn!(?blocks, "stage blocked");
            }
            self.blocked = true;
            self.complete = false;
            return StageStatus::Blocked(blocks);
        }
        self.blocked = false;

        let groups = self.stage.groups();
        let settled = groups[..self.next_group]
            .iter()
            .flat_map(|group| group.iter())
            .all(|step| actuators.actuator(step.actuator).is_some_and(|a| a.is_settled()));
        if !settled {
            self.complete = false;
            return StageStatus::Running;
        }

        if let Some(group) = groups.get(self.next_group) {
            for step in group.iter() {
                if let Some(actuator) = actuators.actuator(step.actuator) {
                    actuator.set_goal(step.goal);
                }
            }
            debug!(group = self.next_group, steps = group.len(), "stage group issued");
            self.next_group += 1;
            self.complete = false;
            return StageStatus::Running;
        }

        self.complete = true;
        StageStatus::Complete
    }

    fn blocks(&self, actuators: &mut dyn ActuatorSet) -> Vec<StageBlock> {
        self.stage
            .actuators()
            .into_iter()
            .filter_map(|id| match actuators.actuator(id) {
                None => Some(StageBlock::Missing { actuator: id }),
                Some(a) => a.fault().map(|fault| StageBlock::Faulted { actuator: id, fault }),
            })
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::plan::StageStep;

    // ------------------------------------------------------------------
    // Test doubles
    // ------------------------------------------------------------------

    /// Records goals; settles whenever `settled` is set by the test, or
    /// immediately on every goal when `auto_settle` is on.
    #[derive(Default)]
    pub(crate) struct FakeActuator {
        pub goals: Vec<f64>,
        pub settled: bool,
        pub auto_settle: bool,
        pub fault: Option<ControllerFault>,
        pub stops: usize,
    }

    impl StageActuator for FakeActuator {
        fn set_goal(&mut self, goal: f64) {
            self.goals.push(goal);
            self.settled = self.auto_settle;
        }
        fn is_settled(&self) -> bool {
            self.settled
        }
        fn fault(&self) -> Option<ControllerFault> {
            self.fault.clone()
        }
        fn stop(&mut self) {
            self.stops += 1;
            self.settled = false;
        }
    }

    pub(crate) fn fakes(ids: &[ActuatorId], auto_settle: bool) -> BTreeMap<ActuatorId, FakeActuator> {
        ids.iter()
            .map(|&id| {
                (
                    id,
                    FakeActuator {
                        auto_settle,
                        ..FakeActuator::default()
                    },
                )
            })
            .collect()
    }

    const PIVOT: ActuatorId = ActuatorId::ElevatorPivot;
    const EXTENSION: ActuatorId = ActuatorId::ElevatorExtension;

    fn two_group_stage() -> StagePlan {
        StagePlan::new(vec![
            StageStep::new(PIVOT, 1.2),
            StageStep::new(EXTENSION, 0.8).then_wait(),
            StageStep::new(EXTENSION, 0.1),
        ])
    }

    // ------------------------------------------------------------------
    // Tests
    // ------------------------------------------------------------------

    #[test]
    fn empty_stage_completes_on_first_tick() {
        let mut runner = StageRunner::new(StagePlan::default());
        let mut set = fakes(&[], false);
        assert_eq!(runner.tick(&mut set), StageStatus::Complete);
        assert!(runner.is_complete());
    }

    #[test]
    fn parallel_steps_are_issued_together() {
        let mut runner = StageRunner::new(two_group_stage());
        let mut set = fakes(&[PIVOT, EXTENSION], false);
        assert_eq!(runner.tick(&mut set), StageStatus::Running);
        assert_eq!(set[&PIVOT].goals, vec![1.2]);
        assert_eq!(set[&EXTENSION].goals, vec![0.8]);
        assert_eq!(runner.issued(), BTreeSet::from([PIVOT, EXTENSION]));
    }

    #[test]
    fn barrier_holds_next_group_until_all_settled() {
        let mut runner = StageRunner::new(two_group_stage());
        let mut set = fakes(&[PIVOT, EXTENSION], false);
        runner.tick(&mut set);

        set.get_mut(&PIVOT).unwrap().settled = true;
        assert_eq!(runner.tick(&mut set), StageStatus::Running);
        assert_eq!(set[&EXTENSION].goals, vec![0.8]);

        set.get_mut(&EXTENSION).unwrap().settled = true;
        assert_eq!(runner.tick(&mut set), StageStatus::Running);
        assert_eq!(set[&EXTENSION].goals, vec![0.8, 0.1]);
        assert!(!runner.is_complete());
    }

    #[test]
    fn completes_once_last_group_settles() {
        let mut runner = StageRunner::new(two_group_stage());
        let mut set = fakes(&[PIVOT, EXTENSION], true);
        assert_eq!(runner.tick(&mut set), StageStatus::Running);
        assert_eq!(runner.tick(&mut set), StageStatus::Running);
        assert_eq!(runner.tick(&mut set), StageStatus::Complete);
        // Goals are issued once only.
        assert_eq!(runner.tick(&mut set), StageStatus::Complete);
        assert_eq!(set[&EXTENSION].goals, vec![0.8, 0.1]);
    }

    #[test]
    fn fault_blocks_the_stage() {
        let mut runner = StageRunner::new(two_group_stage());
        let mut set = fakes(&[PIVOT, EXTENSION], true);
        runner.tick(&mut set);
        let fault = ControllerFault::SensorStale { cycles: 5 };
        set.get_mut(&EXTENSION).unwrap().fault = Some(fault.clone());

        assert_eq!(
            runner.tick(&mut set),
            StageStatus::Blocked(vec![StageBlock::Faulted {
                actuator: EXTENSION,
                fault
            }])
        );
        assert_eq!(set[&EXTENSION].goals, vec![0.8]);

        set.get_mut(&EXTENSION).unwrap().fault = None;
        assert_eq!(runner.tick(&mut set), StageStatus::Running);
        assert_eq!(set[&EXTENSION].goals, vec![0.8, 0.1]);
    }

    #[test]
    fn missing_actuator_blocks_the_stage() {
        let mut runner = StageRunner::new(two_group_stage());
        let mut set = fakes(&[PIVOT], true);
        assert_eq!(
            runner.tick(&mut set),
            StageStatus::Blocked(vec![StageBlock::Missing { actuator: EXTENSION }])
        );
        assert!(set[&PIVOT].goals.is_empty());
    }

    #[test]
    fn restart_reissues_from_the_first_group() {
        let mut runner = StageRunner::new(two_group_stage());
        let mut set = fakes(&[PIVOT, EXTENSION], true);
        runner.tick(&mut set);
        runner.tick(&mut set);
        runner.restart();
        assert!(runner.issued().is_empty());
        runner.tick(&mut set);
        assert_eq!(set[&PIVOT].goals, vec![1.2, 1.2]);
    }
}
