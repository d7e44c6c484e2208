use smelter_core::config::AssemblyConfig;
use smelter_core::events::{EventBus, TracingSubscriber};
use smelter_core::{Assembler, LanguageRegistry};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The registry every entry point starts from: all built-in languages.
pub fn default_registry() -> Arc<LanguageRegistry> {
    Arc::new(LanguageRegistry::seeded())
}

/// `explicit` when given, otherwise `<root>/smelter.json`, otherwise defaults.
pub fn load_config(root: &Path, explicit: Option<&Path>) -> smelter_core::Result<AssemblyConfig> {
    match explicit {
        Some(path) => AssemblyConfig::from_file(path),
        None => AssemblyConfig::load(root),
    }
}

/// Bootstraps an assembler over one filesystem root.
///
/// Events are mirrored to the log; callers add their own subscribers
/// through [`Assembler::events`].
pub fn build_default_assembler(
    root: PathBuf,
    config: AssemblyConfig,
) -> smelter_core::Result<Assembler> {
    let events = EventBus::new();
    events.subscribe(Arc::new(TracingSubscriber));

    let registry = default_registry();
    if let Some(name) = &config.default_language
        && registry.get(name).is_err()
    {
        tracing::error!(
            "Unknown default language `{}`, falling back to detection only",
            name
        );
    }

    Assembler::builder(registry, config)
        .fs_root(root)
        .events(events)
        .build()
}

/// Initializes the logging system for a specific component.
/// This delegates to the core logging module.
pub fn init_logging(component: &str, to_stderr: bool) -> Option<impl Drop> {
    Some(smelter_core::logging::init_logging(component, to_stderr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_config_wins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("smelter.json"), r#"{"dry_run": false}"#).unwrap();
        let other = dir.path().join("other.json");
        std::fs::write(&other, r#"{"dry_run": true}"#).unwrap();

        assert!(!load_config(dir.path(), None).unwrap().dry_run);
        assert!(load_config(dir.path(), Some(&other)).unwrap().dry_run);
        assert!(load_config(dir.path(), Some(&dir.path().join("nope.json"))).is_err());
    }

    #[tokio::test]
    async fn test_default_assembler_runs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.sql"), "-- @resource.nature sql\n").unwrap();
        let assembler =
            build_default_assembler(dir.path().to_path_buf(), AssemblyConfig::default()).unwrap();
        assert_eq!(assembler.events().subscriber_count(), 1);
        let report = assembler.run().await.unwrap();
        assert_eq!(report.discovered.len(), 1);
    }
}
