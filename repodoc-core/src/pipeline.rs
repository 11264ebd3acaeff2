//! High-level pipeline: fetch → generate → assemble for one repository.
//!
//! A run walks the states `Idle → Fetching → Generating → Assembling → Done`,
//! or ends in `Aborted` on a fatal error or cancellation.
//!
//! # Scheduling
//! Documentation requests are issued one at a time, with a fixed spacing
//! between consecutive dispatches whatever their outcome. At most one request
//! is ever in flight.
//!
//! # Failure policy
//! - Traversal errors abort the run before any request is sent.
//! - `RateLimited`, `BadResponse` and transport failures become a `Failure`
//!   result for that file; the run continues.
//! - `Auth` aborts the run at once; no further requests are dispatched. The
//!   sections produced so far travel with the returned [`RunError`].
//!
//! # Cancellation
//! Checked before every dispatch and while waiting out the spacing, never in
//! the middle of a request. A cancelled run ends in `Aborted` with a document
//! marked partial.
//!
//! # Progress
//! Events go through a bounded channel with `try_send`. A slow listener loses
//! events; it never stalls the run.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::client::ModelConfig;
use crate::contract::{DocClient, DocRequest, FileRecord, RepositoryBrowser};
use crate::document::{assemble, AggregatedDocument, GenerationResult};
use crate::download::{fetch_all, InclusionPolicy, SkippedFile};
use crate::error::{DocgenError, ErrorKind};
use crate::locator::RepositoryLocator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Fetching,
    Generating,
    Assembling,
    Done,
    Aborted,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Done | RunState::Aborted)
    }

    /// Whether a run may move from `self` to `next`. Generation over an
    /// already fetched file list leaves `Idle` for `Generating` directly.
    pub fn can_advance_to(self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Idle, Fetching | Generating)
                | (Fetching, Generating | Done | Aborted)
                | (Generating, Assembling | Aborted)
                | (Assembling, Done | Aborted)
        )
    }
}

/// Run-wide settings; read-only for the duration of a run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub model: ModelConfig,
    /// Replaces the default per-file instruction when set.
    pub instruction: Option<String>,
    /// Minimum delay between two consecutive documentation requests.
    pub request_spacing: Duration,
    /// Upper bound on concurrent file reads during traversal.
    pub fetch_concurrency: usize,
    pub policy: InclusionPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            model: ModelConfig::default(),
            instruction: None,
            request_spacing: Duration::from_secs(5),
            fetch_concurrency: 4,
            policy: InclusionPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressPhase {
    /// About to send the request for `path`.
    Dispatching,
    /// The request for `path` finished; `failed` carries the failure kind.
    Finished { failed: Option<ErrorKind> },
}

/// Progress of a run. `completed` never decreases within one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub completed: usize,
    pub total: usize,
    pub path: String,
    pub phase: ProgressPhase,
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.phase {
            ProgressPhase::Dispatching => write!(
                f,
                "[{}/{}] Generating documentation for: {}",
                self.completed + 1,
                self.total,
                self.path
            ),
            ProgressPhase::Finished { failed: None } => {
                write!(f, "[{}/{}] Done: {}", self.completed, self.total, self.path)
            }
            ProgressPhase::Finished { failed: Some(kind) } => write!(
                f,
                "[{}/{}] Failed ({kind}): {}",
                self.completed, self.total, self.path
            ),
        }
    }
}

/// Non-blocking producer side of the progress channel.
#[derive(Debug, Clone, Default)]
pub struct ProgressSink {
    tx: Option<mpsc::Sender<ProgressEvent>>,
}

impl ProgressSink {
    /// A sink and its receiver; at most `capacity` events are buffered.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (ProgressSink { tx: Some(tx) }, rx)
    }

    /// A sink that discards everything.
    pub fn disabled() -> Self {
        Self::default()
    }

    fn emit(&self, event: ProgressEvent) {
        let Some(tx) = &self.tx else { return };
        match tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                debug!(path = %event.path, "Progress listener is behind, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

/// Caller side of cooperative cancellation.
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

/// Pipeline side of cooperative cancellation.
#[derive(Debug, Clone)]
pub struct CancelToken(watch::Receiver<bool>);

impl CancelToken {
    /// A token that is never cancelled.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        CancelToken(rx)
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once cancellation is requested; pends forever if it never is.
    pub async fn cancelled(&self) {
        let mut rx = self.0.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

pub fn cancellation() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle(tx), CancelToken(rx))
}

/// A completed run, or one that was cancelled and finalised cleanly.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub document: AggregatedDocument,
    pub state: RunState,
    /// One result per dispatched request, in traversal order.
    pub results: Vec<GenerationResult>,
    /// Eligible files left out because they were not UTF-8 text.
    pub skipped: Vec<SkippedFile>,
}

/// A run that ended on a fatal error.
#[derive(Debug, Error)]
#[error("generation run aborted: {error}")]
pub struct RunError {
    #[source]
    pub error: DocgenError,
    /// Sections assembled before the abort, when generation had started.
    pub partial: Option<AggregatedDocument>,
}

impl RunError {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

impl From<DocgenError> for RunError {
    fn from(error: DocgenError) -> Self {
        RunError {
            error,
            partial: None,
        }
    }
}

/// Outcome of the dispatch loop before assembly.
struct Dispatched {
    results: HashMap<String, GenerationResult>,
    cancelled: bool,
}

/// The generation pipeline, generic over its collaborators.
pub struct Pipeline<B: ?Sized, C: ?Sized> {
    browser: Arc<B>,
    client: Arc<C>,
    config: PipelineConfig,
}

impl<B: ?Sized, C: ?Sized> Clone for Pipeline<B, C> {
    fn clone(&self) -> Self {
        Pipeline {
            browser: Arc::clone(&self.browser),
            client: Arc::clone(&self.client),
            config: self.config.clone(),
        }
    }
}

impl<B, C> Pipeline<B, C>
where
    B: RepositoryBrowser + ?Sized,
    C: DocClient + ?Sized,
{
    pub fn new(browser: Arc<B>, client: Arc<C>, config: PipelineConfig) -> Self {
        Pipeline {
            browser,
            client,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run fetch, generation and assembly for `locator`.
    pub async fn run(
        &self,
        locator: &RepositoryLocator,
        cancel: &CancelToken,
        progress: &ProgressSink,
    ) -> Result<RunOutcome, RunError> {
        let span = info_span!("generation_run", run_id = %Uuid::new_v4(), repo = %locator);
        async move {
            let mut state = RunState::Idle;
            transition(&mut state, RunState::Fetching);

            let files = match fetch_all(
                &*self.browser,
                locator,
                &self.config.policy,
                self.config.fetch_concurrency,
            )
            .await
            {
                Ok(files) => files,
                Err(e) => {
                    error!(error = %e, "Repository fetch failed");
                    transition(&mut state, RunState::Aborted);
                    return Err(RunError::from(e));
                }
            };

            let title = locator.to_string();
            if files.is_empty() {
                info!("No eligible files found in the repository");
                transition(&mut state, RunState::Done);
                return Ok(RunOutcome {
                    document: AggregatedDocument::empty(title),
                    state,
                    results: Vec::new(),
                    skipped: files.skipped,
                });
            }

            let mut outcome = self
                .generate(&title, &files.files, cancel, progress)
                .await?;
            outcome.skipped = files.skipped;
            Ok(outcome)
        }
        .instrument(span)
        .await
    }

    /// Generating and Assembling phases for an already fetched file list.
    pub async fn generate(
        &self,
        title: &str,
        files: &[FileRecord],
        cancel: &CancelToken,
        progress: &ProgressSink,
    ) -> Result<RunOutcome, RunError> {
        let order: Vec<String> = files.iter().map(|f| f.path.clone()).collect();
        let mut state = RunState::Idle;
        transition(&mut state, RunState::Generating);

        let dispatched = match self.dispatch(files, cancel, progress).await {
            Ok(dispatched) => dispatched,
            Err((error, results)) => {
                transition(&mut state, RunState::Aborted);
                return Err(RunError {
                    error,
                    partial: Some(assemble(title, &order, results, true)),
                });
            }
        };

        transition(&mut state, RunState::Assembling);
        Ok(finish(title, &order, dispatched.results, dispatched.cancelled))
    }

    /// Re-request every file without a successful previous result, which
    /// covers failures and files a cancelled run never dispatched, and merge
    /// the new results into a fresh document.
    pub async fn retry_failed(
        &self,
        title: &str,
        files: &[FileRecord],
        previous: &RunOutcome,
        cancel: &CancelToken,
        progress: &ProgressSink,
    ) -> Result<RunOutcome, RunError> {
        let succeeded: HashSet<&str> = previous
            .results
            .iter()
            .filter(|r| !r.is_failure())
            .map(GenerationResult::path)
            .collect();
        let retry: Vec<FileRecord> = files
            .iter()
            .filter(|f| !succeeded.contains(f.path.as_str()))
            .cloned()
            .collect();
        info!(count = retry.len(), "Retrying files without documentation");

        let order: Vec<String> = files.iter().map(|f| f.path.clone()).collect();
        let mut merged: HashMap<String, GenerationResult> = previous
            .results
            .iter()
            .filter(|r| succeeded.contains(r.path()))
            .map(|r| (r.path().to_string(), r.clone()))
            .collect();

        match self.dispatch(&retry, cancel, progress).await {
            Ok(dispatched) => {
                merged.extend(dispatched.results);
                Ok(finish(title, &order, merged, dispatched.cancelled))
            }
            Err((error, results)) => {
                merged.extend(results);
                Err(RunError {
                    error,
                    partial: Some(assemble(title, &order, merged, true)),
                })
            }
        }
    }

    async fn dispatch(
        &self,
        files: &[FileRecord],
        cancel: &CancelToken,
        progress: &ProgressSink,
    ) -> Result<Dispatched, (DocgenError, HashMap<String, GenerationResult>)> {
        let total = files.len();
        let mut results = HashMap::with_capacity(total);

        for (index, file) in files.iter().enumerate() {
            if index > 0 {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(self.config.request_spacing) => {}
                }
            }
            if cancel.is_cancelled() {
                warn!(completed = index, total, "Run cancelled before dispatch");
                return Ok(Dispatched {
                    results,
                    cancelled: true,
                });
            }

            progress.emit(ProgressEvent {
                completed: index,
                total,
                path: file.path.clone(),
                phase: ProgressPhase::Dispatching,
            });

            let req = DocRequest::for_file(
                file,
                self.config.instruction.as_deref(),
                &self.config.model,
            );
            let result = match self.client.request(&req).await {
                Ok(text) => {
                    info!(path = %file.path, chars = text.len(), "Documentation generated");
                    GenerationResult::Success {
                        path: file.path.clone(),
                        text,
                    }
                }
                Err(e) if e.is_fatal() => {
                    error!(path = %file.path, error = %e, "Fatal error, aborting run");
                    return Err((e, results));
                }
                Err(e) => {
                    warn!(path = %file.path, error = %e, "Documentation request failed for file");
                    GenerationResult::Failure {
                        path: file.path.clone(),
                        kind: e.kind(),
                        message: e.to_string(),
                    }
                }
            };

            let failed = match &result {
                GenerationResult::Failure { kind, .. } => Some(*kind),
                GenerationResult::Success { .. } => None,
            };
            results.insert(file.path.clone(), result);
            progress.emit(ProgressEvent {
                completed: index + 1,
                total,
                path: file.path.clone(),
                phase: ProgressPhase::Finished { failed },
            });
        }

        Ok(Dispatched {
            results,
            cancelled: false,
        })
    }
}

impl<B, C> Pipeline<B, C>
where
    B: RepositoryBrowser + ?Sized + 'static,
    C: DocClient + ?Sized + 'static,
{
    /// Start a run on the tokio runtime and return a handle to it.
    pub fn spawn(&self, locator: RepositoryLocator, progress_capacity: usize) -> RunHandle {
        let (cancel_handle, token) = cancellation();
        let (sink, rx) = ProgressSink::channel(progress_capacity);
        let pipeline = self.clone();
        let task = tokio::spawn(async move { pipeline.run(&locator, &token, &sink).await });
        RunHandle {
            cancel: Arc::new(cancel_handle),
            task,
            progress: Some(rx),
        }
    }
}

/// Control over a spawned run.
pub struct RunHandle {
    cancel: Arc<CancelHandle>,
    task: JoinHandle<Result<RunOutcome, RunError>>,
    progress: Option<mpsc::Receiver<ProgressEvent>>,
}

impl RunHandle {
    /// Request cancellation; honoured at the next dispatch boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A cancel handle that outlives [`RunHandle::join`], e.g. for a signal listener.
    pub fn canceller(&self) -> Arc<CancelHandle> {
        Arc::clone(&self.cancel)
    }

    /// The progress receiver. Returns `None` after the first call.
    pub fn take_progress(&mut self) -> Option<mpsc::Receiver<ProgressEvent>> {
        self.progress.take()
    }

    /// Wait for the run to finish.
    pub async fn join(self) -> Result<RunOutcome, RunError> {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Err(RunError::from(DocgenError::Cancelled)),
        }
    }
}

fn finish(
    title: &str,
    order: &[String],
    results: HashMap<String, GenerationResult>,
    cancelled: bool,
) -> RunOutcome {
    let ordered: Vec<GenerationResult> = order
        .iter()
        .filter_map(|path| results.get(path).cloned())
        .collect();
    // A document that lacks a section for any file is partial, cancelled or not.
    let partial = cancelled || ordered.len() < order.len();
    let document = assemble(title, order, results, partial);
    let state = if partial {
        RunState::Aborted
    } else {
        RunState::Done
    };
    info!(
        ?state,
        sections = document.sections.len(),
        failed = document.failed_sections().count(),
        "Document assembled"
    );
    RunOutcome {
        document,
        state,
        results: ordered,
        skipped: Vec::new(),
    }
}

fn transition(state: &mut RunState, next: RunState) {
    debug_assert!(
        state.can_advance_to(next),
        "illegal run state transition {state:?} -> {next:?}"
    );
    debug!(from = ?*state, to = ?next, "Run state transition");
    *state = next;
}
