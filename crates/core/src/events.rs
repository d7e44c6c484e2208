//! Typed notifications and their fan-out.
//!
//! Every emission reaches every subscriber, synchronously and in
//! subscription order. The core never subscribes to its own bus.

use crate::classify::Outcome;
use crate::workflow::StepSnapshot;
use serde::Serialize;
use smelter_api::{AnnotationCatalog, Language, Resource};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticCategory {
    Content,
    Annotation,
    Classification,
    Route,
    Directive,
    Foundry,
}

/// A recoverable problem attached to one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub category: DiagnosticCategory,
    pub path: PathBuf,
    pub message: String,
}

impl Diagnostic {
    pub fn new(
        category: DiagnosticCategory,
        path: impl Into<PathBuf>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A walked resource after classification, before registration.
#[derive(Debug, Clone)]
pub struct ResourceEncountered {
    pub resource: Resource,
    pub supplier: String,
    pub catalog: Arc<AnnotationCatalog>,
    pub language: Option<Language>,
    pub classification: Outcome,
    pub routing: Outcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct DirectiveMaterialized {
    pub resource: Resource,
    #[serde(skip)]
    pub before: String,
    #[serde(skip)]
    pub after: String,
    pub expanded: usize,
    pub changed: bool,
    pub written: bool,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FoundryMaterialized {
    pub resource: Resource,
    pub command: PathBuf,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub cwd: PathBuf,
    /// Derived output file; `None` when the generator runs for side effects.
    pub output: Option<PathBuf>,
    pub dry_run: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub enum Event {
    ResourceEncountered(Box<ResourceEncountered>),
    ResourceMutated { resource: Resource, reason: String },
    DirectiveMaterialized(DirectiveMaterialized),
    FoundryMaterialized(FoundryMaterialized),
    StateMutated {
        previous: StepSnapshot,
        current: StepSnapshot,
    },
    Diagnostic(Diagnostic),
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::ResourceEncountered(_) => "resource:encountered",
            Event::ResourceMutated { .. } => "resource:mutated",
            Event::DirectiveMaterialized(_) => "directive:materialized",
            Event::FoundryMaterialized(_) => "foundry:materialized",
            Event::StateMutated { .. } => "state:mutated",
            Event::Diagnostic(_) => "diagnostic",
        }
    }
}

pub trait EventSubscriber: Send + Sync {
    fn on_event(&self, event: &Event);
}

impl<F> EventSubscriber for F
where
    F: Fn(&Event) + Send + Sync,
{
    fn on_event(&self, event: &Event) {
        self(event)
    }
}

struct ChannelSubscriber {
    tx: mpsc::UnboundedSender<Event>,
}

impl EventSubscriber for ChannelSubscriber {
    fn on_event(&self, event: &Event) {
        // a dropped receiver only stops that consumer
        let _ = self.tx.send(event.clone());
    }
}

/// Logs every event at `debug`.
pub struct TracingSubscriber;

impl EventSubscriber for TracingSubscriber {
    fn on_event(&self, event: &Event) {
        match event {
            Event::ResourceEncountered(e) => tracing::debug!(
                path = %e.resource.rel_path.display(),
                nature = %e.resource.nature_kind(),
                items = e.catalog.len(),
                "{}",
                event.name()
            ),
            Event::ResourceMutated { resource, reason } => tracing::debug!(
                path = %resource.rel_path.display(),
                reason = %reason,
                "{}",
                event.name()
            ),
            Event::StateMutated { previous, current } => tracing::debug!(
                from = ?previous.kind,
                to = ?current.kind,
                "{}",
                event.name()
            ),
            Event::Diagnostic(d) => tracing::debug!(
                path = %d.path.display(),
                category = ?d.category,
                "{}: {}",
                event.name(),
                d.message
            ),
            Event::DirectiveMaterialized(d) => tracing::debug!(
                path = %d.resource.path.display(),
                changed = d.changed,
                written = d.written,
                "{}",
                event.name()
            ),
            Event::FoundryMaterialized(f) => tracing::debug!(
                path = %f.resource.path.display(),
                output = ?f.output,
                error = ?f.error,
                "{}",
                event.name()
            ),
        }
    }
}

#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<RwLock<Vec<Arc<dyn EventSubscriber>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, subscriber: Arc<dyn EventSubscriber>) {
        self.subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(subscriber);
    }

    /// Subscribe a channel that receives a clone of every later event.
    pub fn channel(&self) -> mpsc::UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribe(Arc::new(ChannelSubscriber { tx }));
        rx
    }

    pub fn emit(&self, event: Event) {
        let subscribers = self
            .subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for subscriber in subscribers {
            subscriber.on_event(&event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}
