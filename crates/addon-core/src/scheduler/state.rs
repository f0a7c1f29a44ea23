//! Per-add-on lifecycle and the deployment report

use addon_values::FlatValues;
use serde::Serialize;
use uuid::Uuid;

use crate::deployer::DeploymentReceipt;
use crate::error::Error;

/// Lifecycle of one add-on within a run.
///
/// ```text
/// Pending -> Ready -> Running -> Completed
///    |         |         |
///    +---------+---------+-----> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddOnState {
    /// Waiting on at least one prerequisite
    Pending,
    /// All prerequisites completed; eligible to run
    Ready,
    Running,
    Completed,
    Failed,
}

impl AddOnState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_become(self, next: AddOnState) -> bool {
        use AddOnState::*;
        matches!(
            (self, next),
            (Pending, Ready)
                | (Ready, Running)
                | (Running, Completed)
                | (Pending | Ready | Running, Failed)
        )
    }
}

impl std::fmt::Display for AddOnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Why an add-on ended up [`AddOnState::Failed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// A required computed value was missing
    MissingRequiredValue { path: String },
    /// Composition failed for another reason (e.g. a path conflict)
    Compose { message: String },
    /// The deployer reported failure on the last attempt
    Deploy { message: String },
    /// A prerequisite failed, directly or transitively
    PrerequisiteFailed { prerequisite: String },
}

impl FailureReason {
    pub(crate) fn from_compose(error: &Error) -> Self {
        match error {
            Error::MissingRequiredValue { path, .. } => Self::MissingRequiredValue { path: path.clone() },
            other => Self::Compose {
                message: other.to_string(),
            },
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRequiredValue { path } => write!(f, "missing required value '{path}'"),
            Self::Compose { message } => write!(f, "composition failed: {message}"),
            Self::Deploy { message } => write!(f, "deploy failed: {message}"),
            Self::PrerequisiteFailed { prerequisite } => {
                write!(f, "prerequisite '{prerequisite}' failed")
            }
        }
    }
}

/// One state transition, numbered in the order it was observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleEvent {
    pub sequence: usize,
    pub addon: String,
    pub state: AddOnState,
}

/// Final result for one add-on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddOnOutcome {
    pub name: String,
    pub state: AddOnState,
    /// Deploy attempts made; 0 if the deployer was never called
    pub attempts: u32,
    /// Flattened values handed to the deployer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<FlatValues>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<DeploymentReceipt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
}

impl AddOnOutcome {
    pub(crate) fn pending(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: AddOnState::Pending,
            attempts: 0,
            values: None,
            receipt: None,
            failure: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.state == AddOnState::Completed
    }
}

/// Everything a deployment run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentReport {
    pub run_id: Uuid,
    /// One outcome per add-on, in declaration order
    pub outcomes: Vec<AddOnOutcome>,
    /// Every state transition, in observed order
    pub events: Vec<ScheduleEvent>,
}

impl DeploymentReport {
    pub fn outcome(&self, name: &str) -> Option<&AddOnOutcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }

    pub fn state_of(&self, name: &str) -> Option<AddOnState> {
        self.outcome(name).map(|o| o.state)
    }

    /// True if every add-on completed.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(AddOnOutcome::is_completed)
    }

    pub fn completed(&self) -> Vec<&str> {
        self.names_in(AddOnState::Completed)
    }

    pub fn failed(&self) -> Vec<&str> {
        self.names_in(AddOnState::Failed)
    }

    /// Sequence number of the event moving `name` into `state`.
    pub fn event_index(&self, name: &str, state: AddOnState) -> Option<usize> {
        self.events
            .iter()
            .find(|e| e.addon == name && e.state == state)
            .map(|e| e.sequence)
    }

    /// Add-ons in the order they started running.
    pub fn start_order(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter(|e| e.state == AddOnState::Running)
            .map(|e| e.addon.as_str())
            .collect()
    }

    fn names_in(&self, state: AddOnState) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.state == state)
            .map(|o| o.name.as_str())
            .collect()
    }
}

/// Mutable run bookkeeping: current outcomes plus the event log.
#[derive(Debug)]
pub(crate) struct RunState {
    pub(crate) outcomes: Vec<AddOnOutcome>,
    pub(crate) events: Vec<ScheduleEvent>,
}

impl RunState {
    pub(crate) fn new<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            outcomes: names.into_iter().map(AddOnOutcome::pending).collect(),
            events: Vec::new(),
        }
    }

    pub(crate) fn state(&self, index: usize) -> AddOnState {
        self.outcomes[index].state
    }

    pub(crate) fn transition(&mut self, index: usize, next: AddOnState) {
        let outcome = &mut self.outcomes[index];
        debug_assert!(
            outcome.state.can_become(next),
            "illegal transition {} -> {} for '{}'",
            outcome.state,
            next,
            outcome.name
        );
        tracing::info!(addon = %outcome.name, from = %outcome.state, to = %next, "State transition");
        outcome.state = next;
        self.events.push(ScheduleEvent {
            sequence: self.events.len(),
            addon: outcome.name.clone(),
            state: next,
        });
    }

    pub(crate) fn fail(&mut self, index: usize, reason: FailureReason) {
        tracing::warn!(addon = %self.outcomes[index].name, reason = %reason, "Add-on failed");
        self.outcomes[index].failure = Some(reason);
        self.transition(index, AddOnState::Failed);
    }

    pub(crate) fn into_report(self, run_id: Uuid) -> DeploymentReport {
        DeploymentReport {
            run_id,
            outcomes: self.outcomes,
            events: self.events,
        }
    }
}
