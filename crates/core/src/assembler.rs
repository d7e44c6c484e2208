//! Two-phase assembly: discover, materialize side effects, rediscover.
//!
//! Each candidate is read, annotated, classified, routed and registered
//! before the next one is requested. Recoverable failures become
//! [`Diagnostic`]s; the workflow always reaches `final`.

use crate::classify::{Outcome, classify_resource};
use crate::config::AssemblyConfig;
use crate::content::ContentError;
use crate::directive::{DirectiveProcessor, FileIncludeRenderer, IncludeRenderer};
use crate::error::Result;
use crate::events::{
    Diagnostic, DiagnosticCategory, DirectiveMaterialized, Event, EventBus, FoundryMaterialized,
    ResourceEncountered,
};
use crate::forest::PathForest;
use crate::foundry::{self, FoundryMaterializer, ProcessRunner, TokioProcessRunner};
use crate::languages::LanguageRegistry;
use crate::route::detect_route;
use crate::supplier::{Candidate, FsSupplier, ResourceSupplier};
use crate::workflow::{FrozenResources, Workflow};
use futures::StreamExt;
use serde::Serialize;
use smelter_annotate::{AnnotationExtractor, ItemValidator};
use smelter_api::{AnnotationCatalog, Resource};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Everything one run produced.
#[derive(Debug, Clone, Serialize)]
pub struct AssemblyReport {
    pub discovered: FrozenResources,
    pub materialized: FrozenResources,
    pub forest: PathForest,
    pub diagnostics: Vec<Diagnostic>,
    pub directives: Vec<DirectiveMaterialized>,
    pub foundries: Vec<FoundryMaterialized>,
    pub cancelled: bool,
}

impl AssemblyReport {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

#[derive(Default)]
struct RunState {
    diagnostics: Vec<Diagnostic>,
    directives: Vec<DirectiveMaterialized>,
    foundries: Vec<FoundryMaterialized>,
}

pub struct Assembler {
    suppliers: Vec<Arc<dyn ResourceSupplier>>,
    registry: Arc<LanguageRegistry>,
    config: AssemblyConfig,
    extractor: AnnotationExtractor,
    directives: DirectiveProcessor,
    foundries: FoundryMaterializer,
    events: EventBus,
    cancel: CancellationToken,
}

impl Assembler {
    pub fn builder(registry: Arc<LanguageRegistry>, config: AssemblyConfig) -> AssemblerBuilder {
        AssemblerBuilder {
            registry,
            config,
            suppliers: Vec::new(),
            events: EventBus::new(),
            renderer: Arc::new(FileIncludeRenderer),
            runner: Arc::new(TokioProcessRunner),
            validator: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &AssemblyConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<LanguageRegistry> {
        &self.registry
    }

    pub async fn run(&self) -> Result<AssemblyReport> {
        let mut workflow = Workflow::new(self.events.clone());
        let mut state = RunState::default();

        workflow.try_advance()?;
        self.walk(&mut workflow, &mut state).await?;

        if !self.cancel.is_cancelled() {
            let discovered: Vec<Resource> = workflow
                .collecting()
                .map(|c| c.resources().to_vec())
                .unwrap_or_default();
            self.expand_directives(&discovered, &mut state).await;
            self.run_foundries(&discovered, &mut state).await;
        }

        workflow.try_advance()?;
        if !self.cancel.is_cancelled() {
            self.walk(&mut workflow, &mut state).await?;
        }
        workflow.try_advance()?;

        let (Some(discovered), Some(materialized)) =
            (workflow.discovered().cloned(), workflow.materialized().cloned())
        else {
            return Err(crate::error::SmelterError::Internal(
                "workflow finished without frozen collections".to_string(),
            ));
        };
        let forest = PathForest::build(discovered.iter().chain(materialized.iter()));
        let cancelled = self.cancel.is_cancelled();
        info!(
            discovered = discovered.len(),
            materialized = materialized.len(),
            routes = forest.len(),
            diagnostics = state.diagnostics.len(),
            cancelled,
            "assembly finished"
        );

        Ok(AssemblyReport {
            discovered,
            materialized,
            forest,
            diagnostics: state.diagnostics,
            directives: state.directives,
            foundries: state.foundries,
            cancelled,
        })
    }

    async fn walk(&self, workflow: &mut Workflow, state: &mut RunState) -> Result<()> {
        let phase = workflow.kind();
        for supplier in &self.suppliers {
            if self.cancel.is_cancelled() {
                break;
            }
            let mut candidates = match supplier.candidates(self.cancel.clone()).await {
                Ok(stream) => stream,
                Err(e) => {
                    self.report(
                        state,
                        Diagnostic::new(
                            DiagnosticCategory::Content,
                            supplier.root(),
                            e.to_string(),
                        ),
                    );
                    continue;
                }
            };
            while let Some(candidate) = candidates.next().await {
                if self.cancel.is_cancelled() {
                    break;
                }
                let resource = self.encounter(candidate, state).await;
                workflow.register(resource)?;
            }
        }
        let count = workflow.collecting().map(|c| c.len()).unwrap_or_default();
        info!(phase = ?phase, resources = count, "walk finished");
        Ok(())
    }

    async fn encounter(&self, candidate: Candidate, state: &mut RunState) -> Resource {
        let mut resource = Resource::new(
            candidate.path.clone(),
            candidate.rel_path.clone(),
            candidate.supplier.clone(),
        );
        resource.language = candidate
            .language
            .as_ref()
            .map(|spec| spec.name.clone());

        let catalog = match &candidate.language {
            Some(spec) => match candidate.text().await {
                Ok(text) => self.extractor.extract(&text, &spec.comments),
                Err(ContentError::InvalidUtf8(_)) => {
                    debug!(
                        path = %candidate.rel_path.display(),
                        "skipping non-text content"
                    );
                    AnnotationCatalog::default()
                }
                Err(e) => {
                    self.report(
                        state,
                        Diagnostic::new(
                            DiagnosticCategory::Content,
                            &candidate.path,
                            e.to_string(),
                        ),
                    );
                    AnnotationCatalog::default()
                }
            },
            None => AnnotationCatalog::default(),
        };
        for issue in &catalog.issues {
            self.report(
                state,
                Diagnostic::new(
                    DiagnosticCategory::Annotation,
                    &candidate.path,
                    format!(
                        "{} at {}:{}",
                        issue.message, issue.location.line, issue.location.column
                    ),
                ),
            );
        }

        let namespaces = &self.config.namespaces;
        let classified = classify_resource(&mut resource, &catalog, &namespaces.resource);
        if let Err(e) = &classified {
            self.report(
                state,
                Diagnostic::new(
                    DiagnosticCategory::Classification,
                    &candidate.path,
                    e.to_string(),
                ),
            );
        }
        let routed = detect_route(&mut resource, &catalog, &namespaces.route);
        if let Err(e) = &routed {
            self.report(
                state,
                Diagnostic::new(DiagnosticCategory::Route, &candidate.path, e.to_string()),
            );
        }

        let classification = Outcome::from_result(&classified);
        let routing = Outcome::from_result(&routed);
        debug!(
            path = %candidate.rel_path.display(),
            nature = %resource.nature_kind(),
            annotations = catalog.len(),
            "resource encountered"
        );
        self.events
            .emit(Event::ResourceEncountered(Box::new(ResourceEncountered {
                resource: resource.clone(),
                supplier: candidate.supplier.clone(),
                catalog: Arc::new(catalog),
                language: resource.language.clone(),
                classification,
                routing,
            })));

        let mut reasons = Vec::new();
        if let Ok(Some(nature)) = &classified {
            reasons.push(format!("classified as {nature}"));
        }
        if let Ok(Some(path)) = &routed {
            reasons.push(format!("routed at {path}"));
        }
        if !reasons.is_empty() {
            self.events.emit(Event::ResourceMutated {
                resource: resource.clone(),
                reason: reasons.join(", "),
            });
        }
        resource
    }

    async fn expand_directives(&self, resources: &[Resource], state: &mut RunState) {
        if !self.config.include.enabled {
            return;
        }
        for resource in resources.iter().filter(|r| r.language.is_some()) {
            if self.cancel.is_cancelled() {
                return;
            }
            match self.directives.materialize(resource).await {
                Ok(Some(outcome)) => {
                    for error in &outcome.errors {
                        self.report(
                            state,
                            Diagnostic::new(
                                DiagnosticCategory::Directive,
                                &resource.path,
                                error.clone(),
                            ),
                        );
                    }
                    state.directives.push(outcome);
                }
                Ok(None) | Err(ContentError::InvalidUtf8(_)) => {}
                Err(e) => self.report(
                    state,
                    Diagnostic::new(DiagnosticCategory::Content, &resource.path, e.to_string()),
                ),
            }
        }
    }

    async fn run_foundries(&self, resources: &[Resource], state: &mut RunState) {
        if !self.config.foundry.enabled {
            return;
        }
        for resource in foundry::run_order(resources) {
            if self.cancel.is_cancelled() {
                return;
            }
            let outcome = self.foundries.materialize(resource).await;
            if let Some(error) = &outcome.error {
                self.report(
                    state,
                    Diagnostic::new(DiagnosticCategory::Foundry, &resource.path, error.clone()),
                );
            }
            state.foundries.push(outcome);
        }
    }

    fn report(&self, state: &mut RunState, diagnostic: Diagnostic) {
        warn!(
            category = ?diagnostic.category,
            path = %diagnostic.path.display(),
            "{}",
            diagnostic.message
        );
        self.events.emit(Event::Diagnostic(diagnostic.clone()));
        state.diagnostics.push(diagnostic);
    }
}

pub struct AssemblerBuilder {
    registry: Arc<LanguageRegistry>,
    config: AssemblyConfig,
    suppliers: Vec<Arc<dyn ResourceSupplier>>,
    events: EventBus,
    renderer: Arc<dyn IncludeRenderer>,
    runner: Arc<dyn ProcessRunner>,
    validator: Option<ItemValidator>,
    cancel: CancellationToken,
}

impl AssemblerBuilder {
    pub fn supplier(mut self, supplier: Arc<dyn ResourceSupplier>) -> Self {
        self.suppliers.push(supplier);
        self
    }

    /// Add a filesystem supplier configured from the assembly config.
    pub fn fs_root(self, root: impl Into<PathBuf>) -> Self {
        let supplier = FsSupplier::new(root, self.registry.clone())
            .respect_gitignore(self.config.respect_gitignore)
            .include_hidden(self.config.include_hidden)
            .default_language(self.config.default_language.clone());
        self.supplier(Arc::new(supplier))
    }

    pub fn events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn IncludeRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn runner(mut self, runner: Arc<dyn ProcessRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn validator(mut self, validator: ItemValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn build(self) -> Result<Assembler> {
        let mut extractor = AnnotationExtractor::new((&self.config.annotations).into())?;
        if let Some(validator) = self.validator {
            extractor = extractor.with_validator(validator);
        }
        let dry_run = self.config.dry_run;
        let directives = DirectiveProcessor::new(
            self.config.include.clone(),
            self.registry.clone(),
            self.renderer,
            self.events.clone(),
            dry_run,
        );
        let foundries = FoundryMaterializer::new(
            self.config.foundry.clone(),
            self.runner,
            self.events.clone(),
            dry_run,
        );
        Ok(Assembler {
            suppliers: self.suppliers,
            registry: self.registry,
            config: self.config,
            extractor,
            directives,
            foundries,
            events: self.events,
            cancel: self.cancel,
        })
    }
}
