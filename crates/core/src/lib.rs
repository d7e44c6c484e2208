pub mod error;
pub mod logging;

pub mod assembler;
pub mod classify;
pub mod config;
pub mod content;
pub mod directive;
pub mod events;
pub mod forest;
pub mod foundry;
pub mod languages;
pub mod route;
pub mod supplier;
pub mod workflow;

pub use assembler::{Assembler, AssemblerBuilder, AssemblyReport};
pub use config::AssemblyConfig;
pub use error::{Result, SmelterError};
pub use events::{Diagnostic, Event, EventBus, EventSubscriber};
pub use languages::LanguageRegistry;
pub use workflow::{StepKind, Workflow, WorkflowStep};
