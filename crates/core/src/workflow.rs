//! Phase state machine: `init -> discovery -> materialization -> final`.

use crate::events::{Event, EventBus};
use serde::Serialize;
use smelter_api::Resource;
use std::sync::Arc;
use thiserror::Error;

/// A phase collection after it stopped accepting resources.
pub type FrozenResources = Arc<Vec<Resource>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Init,
    Discovery,
    Materialization,
    Final,
}

/// Append-only resources registered during one phase.
#[derive(Debug, Default)]
pub struct ResourcesCollection {
    resources: Vec<Resource>,
}

impl ResourcesCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, resource: Resource) {
        self.resources.push(resource);
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn freeze(self) -> FrozenResources {
        Arc::new(self.resources)
    }
}

pub enum WorkflowStep {
    Init,
    Discovery {
        collection: ResourcesCollection,
    },
    Materialization {
        discovered: FrozenResources,
        collection: ResourcesCollection,
    },
    Final {
        discovered: FrozenResources,
        materialized: FrozenResources,
    },
}

impl WorkflowStep {
    pub fn kind(&self) -> StepKind {
        match self {
            WorkflowStep::Init => StepKind::Init,
            WorkflowStep::Discovery { .. } => StepKind::Discovery,
            WorkflowStep::Materialization { .. } => StepKind::Materialization,
            WorkflowStep::Final { .. } => StepKind::Final,
        }
    }

    fn snapshot(&self) -> StepSnapshot {
        let (discovered, materialized) = match self {
            WorkflowStep::Init | WorkflowStep::Discovery { .. } => (None, None),
            WorkflowStep::Materialization { discovered, .. } => (Some(discovered.clone()), None),
            WorkflowStep::Final {
                discovered,
                materialized,
            } => (Some(discovered.clone()), Some(materialized.clone())),
        };
        StepSnapshot {
            kind: self.kind(),
            discovered,
            materialized,
        }
    }
}

/// What observers see of a step: its kind plus the collections it has frozen.
#[derive(Debug, Clone)]
pub struct StepSnapshot {
    pub kind: StepKind,
    pub discovered: Option<FrozenResources>,
    pub materialized: Option<FrozenResources>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("workflow is already final")]
    AlreadyFinal,
    #[error("cannot register resources in the {0:?} step")]
    NotCollecting(StepKind),
}

pub struct Workflow {
    step: WorkflowStep,
    events: EventBus,
}

impl Workflow {
    pub fn new(events: EventBus) -> Self {
        Self {
            step: WorkflowStep::Init,
            events,
        }
    }

    pub fn step(&self) -> &WorkflowStep {
        &self.step
    }

    pub fn kind(&self) -> StepKind {
        self.step.kind()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.step, WorkflowStep::Final { .. })
    }

    /// Move to the next step, freezing the current collection.
    pub fn try_advance(&mut self) -> Result<StepKind, WorkflowError> {
        let previous_snapshot = self.step.snapshot();
        let previous = std::mem::replace(&mut self.step, WorkflowStep::Init);
        let next = match previous {
            WorkflowStep::Init => WorkflowStep::Discovery {
                collection: ResourcesCollection::new(),
            },
            WorkflowStep::Discovery { collection } => WorkflowStep::Materialization {
                discovered: collection.freeze(),
                collection: ResourcesCollection::new(),
            },
            WorkflowStep::Materialization {
                discovered,
                collection,
            } => WorkflowStep::Final {
                discovered,
                materialized: collection.freeze(),
            },
            final_step @ WorkflowStep::Final { .. } => {
                self.step = final_step;
                return Err(WorkflowError::AlreadyFinal);
            }
        };

        self.step = next;
        let current = self.step.snapshot();
        tracing::info!(
            from = ?previous_snapshot.kind,
            to = ?current.kind,
            "workflow advanced"
        );
        self.events.emit(Event::StateMutated {
            previous: previous_snapshot,
            current,
        });
        Ok(self.step.kind())
    }

    /// [`try_advance`](Self::try_advance) for callers that treat advancing
    /// past `final` as a bug.
    pub fn advance(&mut self) -> StepKind {
        match self.try_advance() {
            Ok(kind) => kind,
            Err(e) => panic!("invalid workflow transition: {e}"),
        }
    }

    pub fn register(&mut self, resource: Resource) -> Result<(), WorkflowError> {
        match &mut self.step {
            WorkflowStep::Discovery { collection }
            | WorkflowStep::Materialization { collection, .. } => {
                collection.register(resource);
                Ok(())
            }
            other => Err(WorkflowError::NotCollecting(other.kind())),
        }
    }

    /// The collection currently accepting resources.
    pub fn collecting(&self) -> Option<&ResourcesCollection> {
        match &self.step {
            WorkflowStep::Discovery { collection }
            | WorkflowStep::Materialization { collection, .. } => Some(collection),
            _ => None,
        }
    }

    pub fn discovered(&self) -> Option<&FrozenResources> {
        match &self.step {
            WorkflowStep::Materialization { discovered, .. }
            | WorkflowStep::Final { discovered, .. } => Some(discovered),
            _ => None,
        }
    }

    pub fn materialized(&self) -> Option<&FrozenResources> {
        match &self.step {
            WorkflowStep::Final { materialized, .. } => Some(materialized),
            _ => None,
        }
    }
}
