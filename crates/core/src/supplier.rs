use crate::content::{self, ContentError};
use crate::error::Result;
use crate::languages::LanguageRegistry;
use async_trait::async_trait;
use futures::Stream;
use ignore::WalkBuilder;
use smelter_api::LanguageSpec;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Bytes read from an extensionless file to look for a shebang.
const SHEBANG_PROBE_LEN: usize = 256;

/// One walked file, before it becomes a resource.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub path: PathBuf,
    pub rel_path: PathBuf,
    pub supplier: String,
    pub language: Option<Arc<LanguageSpec>>,
}

impl Candidate {
    pub async fn text(&self) -> std::result::Result<String, ContentError> {
        content::read_text(&self.path).await
    }
}

/// A source of candidates for one root.
#[async_trait]
pub trait ResourceSupplier: Send + Sync {
    fn name(&self) -> &str;

    fn root(&self) -> &Path;

    /// Start enumerating. The stream ends early once `cancel` fires.
    async fn candidates(&self, cancel: CancellationToken) -> Result<CandidateStream>;
}

/// Candidates in walk order, cut short by cancellation.
pub struct CandidateStream {
    rx: mpsc::Receiver<Candidate>,
    cancel: CancellationToken,
}

impl CandidateStream {
    pub fn new(rx: mpsc::Receiver<Candidate>, cancel: CancellationToken) -> Self {
        Self { rx, cancel }
    }
}

impl Stream for CandidateStream {
    type Item = Candidate;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Candidate>> {
        if self.cancel.is_cancelled() {
            self.rx.close();
            return Poll::Ready(None);
        }
        self.rx.poll_recv(cx)
    }
}

/// Filesystem walker over one root.
#[derive(Clone)]
pub struct FsSupplier {
    name: String,
    root: PathBuf,
    registry: Arc<LanguageRegistry>,
    respect_gitignore: bool,
    include_hidden: bool,
    default_language: Option<String>,
}

impl FsSupplier {
    pub fn new(root: impl Into<PathBuf>, registry: Arc<LanguageRegistry>) -> Self {
        Self {
            name: "fs".to_string(),
            root: root.into(),
            registry,
            respect_gitignore: true,
            include_hidden: false,
            default_language: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn respect_gitignore(mut self, yes: bool) -> Self {
        self.respect_gitignore = yes;
        self
    }

    pub fn include_hidden(mut self, yes: bool) -> Self {
        self.include_hidden = yes;
        self
    }

    pub fn default_language(mut self, name: Option<String>) -> Self {
        self.default_language = name;
        self
    }

    fn walk(&self, tx: &mpsc::Sender<Candidate>, cancel: &CancellationToken) -> usize {
        let gitignore = self.respect_gitignore;
        let walker = WalkBuilder::new(&self.root)
            .hidden(!self.include_hidden)
            .git_ignore(gitignore)
            .git_exclude(gitignore)
            .git_global(gitignore)
            .ignore(gitignore)
            .require_git(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        let mut sent = 0;
        for entry in walker {
            if cancel.is_cancelled() {
                tracing::debug!(supplier = %self.name, "walk cancelled");
                break;
            }
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(supplier = %self.name, "skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let path = entry.into_path();
            let rel_path = path.strip_prefix(&self.root).unwrap_or(&path).to_path_buf();
            let language = match self.registry.by_path(&path) {
                Some(spec) => Some(spec),
                None => {
                    let probe = probe_first_line(&path);
                    self.registry.detect_or_default(
                        &path,
                        probe.as_deref(),
                        self.default_language.as_deref(),
                    )
                }
            };
            let candidate = Candidate {
                path,
                rel_path,
                supplier: self.name.clone(),
                language,
            };
            if tx.blocking_send(candidate).is_err() {
                break;
            }
            sent += 1;
        }
        sent
    }
}

fn probe_first_line(path: &Path) -> Option<String> {
    let mut file = std::fs::File::open(path).ok()?;
    let mut buf = [0u8; SHEBANG_PROBE_LEN];
    let n = file.read(&mut buf).ok()?;
    let text = String::from_utf8_lossy(&buf[..n]);
    text.lines().next().map(str::to_string)
}

#[async_trait]
impl ResourceSupplier for FsSupplier {
    fn name(&self) -> &str {
        &self.name
    }

    fn root(&self) -> &Path {
        &self.root
    }

    async fn candidates(&self, cancel: CancellationToken) -> Result<CandidateStream> {
        if !self.root.is_dir() {
            return Err(ContentError::NotFound(self.root.clone()).into());
        }
        let (tx, rx) = mpsc::channel(64);
        let walker = self.clone();
        let walk_cancel = cancel.clone();

        tokio::task::spawn_blocking(move || {
            let sent = walker.walk(&tx, &walk_cancel);
            tracing::debug!(
                supplier = %walker.name,
                root = %walker.root.display(),
                sent,
                "walk finished"
            );
        });

        Ok(CandidateStream::new(rx, cancel))
    }
}
