//! Executable generators ("foundries") and their captured output.

use crate::config::FoundryConfig;
use crate::content;
use crate::events::{Event, EventBus, FoundryMaterialized};
use crate::route::split_file_name;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use smelter_api::{Nature, Resource};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use thiserror::Error;

/// Marker inserted into derived output names.
pub const AUTO_MARKER: &str = "auto";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecMode {
    /// Any execute bit in the file mode.
    Posix,
    /// Extension listed in the configured executable extensions.
    Windows,
    /// Nothing is executable.
    None,
}

impl ExecMode {
    pub fn native() -> Self {
        if cfg!(windows) {
            ExecMode::Windows
        } else {
            ExecMode::Posix
        }
    }
}

#[derive(Debug, Error)]
pub enum FoundryError {
    #[error("{0} is not executable")]
    NotExecutable(PathBuf),
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with code {code:?}: {stderr}")]
    NonZeroExit {
        program: PathBuf,
        code: Option<i32>,
        stderr: String,
    },
    #[error("cannot write output {path}: {message}")]
    Output { path: PathBuf, message: String },
}

/// Executability lookups, cached per absolute path.
pub struct ExecutableCheck {
    mode: ExecMode,
    windows_extensions: Vec<String>,
    cache: DashMap<PathBuf, bool>,
}

impl ExecutableCheck {
    pub fn new(mode: ExecMode, windows_extensions: Vec<String>) -> Self {
        Self {
            mode,
            windows_extensions: windows_extensions
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            cache: DashMap::new(),
        }
    }

    pub async fn is_executable(&self, path: &Path) -> bool {
        match self.mode {
            ExecMode::None => false,
            ExecMode::Windows => path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| self.windows_extensions.contains(&e.to_lowercase())),
            ExecMode::Posix => {
                if let Some(cached) = self.cache.get(path) {
                    return *cached;
                }
                let executable = posix_executable(path).await;
                self.cache.insert(path.to_path_buf(), executable);
                executable
            }
        }
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(unix)]
async fn posix_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
async fn posix_executable(_path: &Path) -> bool {
    false
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub code: Option<i32>,
}

/// Runs a process to completion. A non-zero exit is an `Ok` with
/// `success == false`; only spawn failures are errors.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, spec: &ProcessSpec) -> Result<ProcessOutput, FoundryError>;
}

pub struct TokioProcessRunner;

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, spec: &ProcessSpec) -> Result<ProcessOutput, FoundryError> {
        let mut command = tokio::process::Command::new(&spec.program);
        command
            .args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }
        let output = command
            .output()
            .await
            .map_err(|source| FoundryError::Spawn {
                program: spec.program.clone(),
                source,
            })?;
        Ok(ProcessOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            success: output.status.success(),
            code: output.status.code(),
        })
    }
}

/// `report.pre.sql` -> `report.auto.sql`. `None` when the name has fewer
/// than two extensions or already carries the marker.
pub fn derive_output_path(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?.to_str()?;
    let (stem, mut extensions) = split_file_name(name);
    if extensions.len() < 2 {
        return None;
    }
    let stage = extensions.len() - 2;
    if extensions[stage] == AUTO_MARKER {
        return None;
    }
    extensions[stage] = AUTO_MARKER.to_string();
    Some(path.with_file_name(format!("{}.{}", stem, extensions.join("."))))
}

/// Foundries in run order: independent ones first, then those declaring
/// dependencies, each group in walk order.
pub fn run_order(resources: &[Resource]) -> Vec<&Resource> {
    let mut foundries: Vec<&Resource> = resources.iter().filter(|r| r.is_foundry()).collect();
    foundries.sort_by_key(|r| has_dependencies(r));
    foundries
}

fn has_dependencies(resource: &Resource) -> bool {
    matches!(&resource.nature, Nature::Foundry(meta) if meta.dependencies)
}

pub struct FoundryMaterializer {
    config: FoundryConfig,
    check: ExecutableCheck,
    runner: Arc<dyn ProcessRunner>,
    events: EventBus,
    dry_run: bool,
}

impl FoundryMaterializer {
    pub fn new(
        config: FoundryConfig,
        runner: Arc<dyn ProcessRunner>,
        events: EventBus,
        dry_run: bool,
    ) -> Self {
        let check = ExecutableCheck::new(config.exec_mode, config.windows_extensions.clone());
        Self {
            config,
            check,
            runner,
            events,
            dry_run,
        }
    }

    pub fn executable_check(&self) -> &ExecutableCheck {
        &self.check
    }

    /// Run one foundry and write its stdout to the derived path.
    pub async fn materialize(&self, resource: &Resource) -> FoundryMaterialized {
        let output = derive_output_path(&resource.path);
        let cwd = self
            .config
            .cwd
            .clone()
            .or_else(|| resource.path.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));
        let mut env = self.config.env.clone();
        env.insert(
            "SMELTER_SOURCE".to_string(),
            resource.path.to_string_lossy().into_owned(),
        );
        if let Some(output) = &output {
            env.insert(
                "SMELTER_OUTPUT".to_string(),
                output.to_string_lossy().into_owned(),
            );
        }
        let spec = ProcessSpec {
            program: resource.path.clone(),
            args: Vec::new(),
            cwd: Some(cwd.clone()),
            env,
        };

        let error = self.execute(resource, &spec, output.as_deref()).await.err();
        match &error {
            Some(e) => tracing::warn!(
                path = %resource.rel_path.display(),
                "foundry failed: {}",
                e
            ),
            None => tracing::debug!(
                path = %resource.rel_path.display(),
                output = ?output,
                dry_run = self.dry_run,
                "foundry materialized"
            ),
        }

        let event = FoundryMaterialized {
            resource: resource.clone(),
            command: spec.program,
            args: spec.args,
            env: spec.env,
            cwd,
            output,
            dry_run: self.dry_run,
            error: error.map(|e| e.to_string()),
        };
        self.events.emit(Event::FoundryMaterialized(event.clone()));
        event
    }

    async fn execute(
        &self,
        resource: &Resource,
        spec: &ProcessSpec,
        output: Option<&Path>,
    ) -> Result<(), FoundryError> {
        if !self.check.is_executable(&resource.path).await {
            return Err(FoundryError::NotExecutable(resource.path.clone()));
        }
        if self.dry_run {
            return Ok(());
        }

        let cleanup = matches!(&resource.nature, Nature::Foundry(meta) if meta.cleanup);
        if cleanup && let Some(stale) = output {
            match tokio::fs::remove_file(stale).await {
                Ok(()) => tracing::debug!(path = %stale.display(), "removed stale output"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(FoundryError::Output {
                        path: stale.to_path_buf(),
                        message: e.to_string(),
                    });
                }
            }
        }

        let result = self.runner.run(spec).await?;
        if !result.success {
            return Err(FoundryError::NonZeroExit {
                program: spec.program.clone(),
                code: result.code,
                stderr: result.stderr.trim().to_string(),
            });
        }
        if let Some(path) = output {
            content::write_text(path, &result.stdout)
                .await
                .map_err(|e| FoundryError::Output {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
        }
        Ok(())
    }
}
