//! Climb transition table.
//!
//! A [`ClimbPlan`] maps each [`ClimbState`] to the [`StagePlan`] executed
//! while the sequencer is in that state.  A stage is an ordered list of
//! [`StageStep`]s; a step with `barrier = true` closes the current parallel
//! group, so the steps after it are only issued once every earlier step has
//! settled.
//!
//! ```text
//! steps:   pivot→1.2   extension→0.8 |   extension→0.1   pivot→0.4
//!          └──────── group 0 ────────┘   └──────── group 1 ───────┘
//! ```
//!
//! The plan is configuration data.  In TOML it lives under `[climb]`:
//!
//! ```toml
//! [[climb.pivot_climb.steps]]
//! actuator = "elevator_pivot"
//! goal = 1.2
//!
//! [[climb.pivot_climb.steps]]
//! actuator = "elevator_extension"
//! goal = 0.8
//! barrier = true
//! ```
//!
//! A state without an entry has an empty stage; `done` may not have one.

use std::collections::{BTreeMap, BTreeSet};

use gearbox_types::{ActuatorId, ClimbState, GearboxError};
use serde::{Deserialize, Serialize};

/// One actuator goal inside a stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageStep {
    pub actuator: ActuatorId,
    pub goal: f64,
    /// Close the current parallel group after this step.
    #[serde(default)]
    pub barrier: bool,
}

impl StageStep {
    pub fn new(actuator: ActuatorId, goal: f64) -> Self {
        Self {
            actuator,
            goal,
            barrier: false,
        }
    }

    pub fn then_wait(mut self) -> Self {
        self.barrier = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StagePlan {
    #[serde(default)]
    pub steps: Vec<StageStep>,
}

impl StagePlan {
    pub fn new(steps: Vec<StageStep>) -> Self {
        Self { steps }
    }

    /// Split the steps into parallel groups at each barrier.
    pub fn groups(&self) -> Vec<&[StageStep]> {
        let mut groups = Vec::new();
        let mut start = 0;
        for (i, step) in self.steps.iter().enumerate() {
            if step.barrier {
                groups.push(&self.steps[start..=i]);
                start = i + 1;
            }
        }
        if start < self.steps.len() {
            groups.push(&self.steps[start..]);
        }
        groups
    }

    /// Every actuator the stage touches.
    pub fn actuators(&self) -> BTreeSet<ActuatorId> {
        self.steps.iter().map(|s| s.actuator).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// State → stage table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, StagePlan>", into = "BTreeMap<String, StagePlan>")]
pub struct ClimbPlan {
    stages: BTreeMap<ClimbState, StagePlan>,
}

impl ClimbPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stage(mut self, state: ClimbState, stage: StagePlan) -> Self {
        self.stages.insert(state, stage);
        self
    }

    pub fn stage(&self, state: ClimbState) -> Option<&StagePlan> {
        self.stages.get(&state)
    }

    /// # Errors
    ///
    /// Returns [`GearboxError::Configuration`] if `done` has a stage or any
    /// goal is not finite.
    pub fn validate(&self) -> Result<(), GearboxError> {
        if self.stages.get(&ClimbState::Done).is_some_and(|s| !s.is_empty()) {
            return Err(GearboxError::Configuration("the done state cannot have a stage".into()));
        }
        for (state, stage) in &self.stages {
            if let Some(step) = stage.steps.iter().find(|s| !s.goal.is_finite()) {
                return Err(GearboxError::Configuration(format!(
                    "{state}: goal for {} is not a number",
                    step.actuator
                )));
            }
        }
        Ok(())
    }
}

impl TryFrom<BTreeMap<String, StagePlan>> for ClimbPlan {
    type Error = GearboxError;

    fn try_from(raw: BTreeMap<String, StagePlan>) -> Result<Self, Self::Error> {
        let stages = raw
            .into_iter()
            .map(|(key, stage)| Ok((key.parse::<ClimbState>()?, stage)))
            .collect::<Result<BTreeMap<_, _>, GearboxError>>()?;
        let plan = Self { stages };
        plan.validate()?;
        Ok(plan)
    }
}

impl From<ClimbPlan> for BTreeMap<String, StagePlan> {
    fn from(plan: ClimbPlan) -> Self {
        plan.stages
            .into_iter()
            .map(|(state, stage)| (state.as_str().to_string(), stage))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_split_after_barriers() {
        let stage = StagePlan::new(vec![
            StageStep::new(ActuatorId::ElevatorPivot, 1.2),
            StageStep::new(ActuatorId::ElevatorExtension, 0.8).then_wait(),
            StageStep::new(ActuatorId::ElevatorExtension, 0.1),
            StageStep::new(ActuatorId::ElevatorPivot, 0.4).then_wait(),
            StageStep::new(ActuatorId::Feeder, 10.0),
        ]);
        let groups = stage.groups();
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[1].len(), 2);
        assert_eq!(groups[2][0].actuator, ActuatorId::Feeder);
    }

    #[test]
    fn trailing_barrier_adds_no_empty_group() {
        let stage = StagePlan::new(vec![StageStep::new(ActuatorId::Feeder, 1.0).then_wait()]);
        assert_eq!(stage.groups().len(), 1);
        assert!(StagePlan::default().groups().is_empty());
    }

    #[test]
    fn plan_round_trips_through_json_with_state_keys() {
        let json = r#"{
            "pivot_climb": { "steps": [
                { "actuator": "elevator_pivot", "goal": 1.2 },
                { "actuator": "elevator_extension", "goal": 0.8, "barrier": true }
            ] },
            "retract_climb": { "steps": [] }
        }"#;
        let plan: ClimbPlan = serde_json::from_str(json).unwrap();
        let stage = plan.stage(ClimbState::PivotClimb).unwrap();
        assert_eq!(stage.steps.len(), 2);
        assert!(stage.steps[1].barrier);
        assert!(!stage.steps[0].barrier);
        assert!(plan.stage(ClimbState::RetractClimb).unwrap().is_empty());
        assert!(plan.stage(ClimbState::ScoreTrap).is_none());

        let back: ClimbPlan = serde_json::from_str(&serde_json::to_string(&plan).unwrap()).unwrap();
        assert_eq!(back, plan);
    }

    #[test]
    fn unknown_state_key_is_rejected() {
        let result = serde_json::from_str::<ClimbPlan>(r#"{ "hang": { "steps": [] } }"#);
        assert!(result.is_err());
    }

    #[test]
    fn done_cannot_have_a_stage() {
        let plan = ClimbPlan::new().with_stage(
            ClimbState::Done,
            StagePlan::new(vec![StageStep::new(ActuatorId::Feeder, 1.0)]),
        );
        assert!(plan.validate().is_err());
    }

    #[test]
    fn non_finite_goal_is_rejected() {
        let plan = ClimbPlan::new().with_stage(
            ClimbState::PivotClimb,
            StagePlan::new(vec![StageStep::new(ActuatorId::ElevatorPivot, f64::NAN)]),
        );
        assert!(matches!(plan.validate(), Err(GearboxError::Configuration(_))));
    }
}
