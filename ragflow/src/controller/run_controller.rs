//! The run controller and its per-run driver task.

use futures::StreamExt;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};

use super::run::{RunHandle, RunId};
use crate::adapter::{BackendEvent, StreamEventAdapter};
use crate::cancellation::CancellationToken;
use crate::config::{ControllerConfig, RunConfig};
use crate::core::{OverallStatus, PipelineState};
use crate::errors::{RagflowError, TransportError};
use crate::events::{
    EventSink, NoOpEventSink, PIPELINE_RESET, RUN_CANCELLED, RUN_COMPLETED, RUN_FAILED,
    RUN_STARTED,
};
use crate::observability::{run_span, RunTimer};
use crate::reducer::{Diagnostic, PipelineAction, PipelineStore};
use crate::transport::{EventStream, RunRequest, StreamTransport};
use crate::utils::{Clock, SystemClock};

struct ActiveRun {
    run_id: RunId,
    token: CancellationToken,
}

/// State shared between the controller and its driver tasks.
struct Shared {
    store: PipelineStore,
    active: Option<ActiveRun>,
    state_tx: watch::Sender<PipelineState>,
}

impl Shared {
    fn dispatch_all(&mut self, actions: &[PipelineAction]) {
        for action in actions {
            // Rejections are logged and kept as diagnostics by the store.
            let _ = self.store.dispatch(action);
        }
        self.state_tx.send_replace(self.store.state().clone());
    }

    fn is_current(&self, run_id: RunId, token: &CancellationToken) -> bool {
        !token.is_cancelled() && self.active.as_ref().map(|a| a.run_id) == Some(run_id)
    }

    /// Applies a batch only if `run_id` still owns the state.
    fn apply_if_current(
        &mut self,
        run_id: RunId,
        token: &CancellationToken,
        actions: &[PipelineAction],
    ) -> bool {
        if !self.is_current(run_id, token) {
            debug!(actions = actions.len(), "Discarding actions from a stale run");
            return false;
        }
        self.dispatch_all(actions);
        true
    }
}

/// Runs queries against the backend and exposes the resulting state.
///
/// At most one run is active. Starting a run cancels the previous one, and
/// events of a cancelled run never reach the state.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use ragflow::prelude::*;
///
/// # async fn demo() -> Result<(), RagflowError> {
/// let transport = HttpSseTransport::new(SseTransportConfig::new("http://localhost:8080"))?;
/// let controller = RunController::new(Arc::new(transport));
///
/// let config = RunConfig::new(GeneratorConfig::new("openai", "gpt-4o-mini"))
///     .with_steps([StepId::Classification]);
/// controller.start("What is a vector index?", config)?;
///
/// let mut updates = controller.subscribe();
/// while updates.changed().await.is_ok() {
///     let state = updates.borrow_and_update().clone();
///     println!("{:?}: {}", state.overall_status, state.answer_text());
///     if state.is_terminal() {
///         break;
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct RunController {
    transport: Arc<dyn StreamTransport>,
    config: ControllerConfig,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn EventSink>,
    shared: Arc<Mutex<Shared>>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl RunController {
    /// Creates a controller with default configuration.
    #[must_use]
    pub fn new(transport: Arc<dyn StreamTransport>) -> Self {
        let config = ControllerConfig::default();
        let (state_tx, _) = watch::channel(PipelineState::idle());
        Self {
            transport,
            shared: Arc::new(Mutex::new(Shared {
                store: PipelineStore::with_max_diagnostics(config.max_diagnostics),
                active: None,
                state_tx,
            })),
            config,
            clock: Arc::new(SystemClock),
            sink: Arc::new(NoOpEventSink),
            driver: Mutex::new(None),
        }
    }

    /// Sets the controller configuration.
    #[must_use]
    pub fn with_config(mut self, config: ControllerConfig) -> Self {
        self.shared.lock().store = PipelineStore::with_max_diagnostics(config.max_diagnostics)
            .with_clock(Arc::clone(&self.clock));
        self.config = config;
        self
    }

    /// Sets the clock used for step timestamps and diagnostics.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        {
            let mut shared = self.shared.lock();
            let store = std::mem::take(&mut shared.store);
            shared.store = store.with_clock(Arc::clone(&clock));
        }
        self.clock = clock;
        self
    }

    /// Sets the lifecycle event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Gets the controller configuration.
    #[must_use]
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Starts a run, cancelling any active one.
    ///
    /// Returns as soon as the run is set up; events are consumed by a task
    /// spawned on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`RagflowError::Config`] for an invalid `config` or controller
    /// configuration and [`RagflowError::NoRuntime`] outside a tokio runtime.
    /// None of them touches the current state.
    pub fn start(
        &self,
        query: impl Into<String>,
        config: RunConfig,
    ) -> Result<RunHandle, RagflowError> {
        config.validate()?;
        self.config.validate()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| RagflowError::NoRuntime(e.to_string()))?;

        let run_id = RunId::new();
        let token = CancellationToken::new();
        let mut adapter = StreamEventAdapter::new(&config, Arc::clone(&self.clock));
        let enabled: Vec<_> = config.enabled_steps.iter().map(|s| s.as_str()).collect();

        {
            let mut shared = self.shared.lock();
            if let Some(previous) = shared.active.take() {
                previous.token.cancel("superseded by a new run");
            }
            if shared.store.state().is_running() {
                debug!("Clearing state left by a cancelled run");
                shared.dispatch_all(&[PipelineAction::Reset]);
            }
            shared.dispatch_all(&adapter.begin());
            shared.active = Some(ActiveRun {
                run_id,
                token: token.clone(),
            });
        }

        info!(run_id = %run_id, steps = ?enabled, "Run started");
        self.sink.try_emit(
            RUN_STARTED,
            Some(serde_json::json!({ "run_id": run_id, "enabled_steps": enabled })),
        );

        let driver = Driver {
            run_id,
            token: token.clone(),
            adapter,
            request: RunRequest::new(run_id, query, config),
            transport: Arc::clone(&self.transport),
            shared: Arc::clone(&self.shared),
            sink: Arc::clone(&self.sink),
            idle_timeout: self.config.idle_timeout(),
            transport_error_message: self.config.transport_error_message.clone(),
        };
        let task = runtime.spawn(driver.run().instrument(run_span(&run_id)));
        *self.driver.lock() = Some(task);

        Ok(RunHandle::new(run_id, token))
    }

    /// Cancels any active run and returns the pipeline to idle.
    pub fn reset(&self) {
        {
            let mut shared = self.shared.lock();
            if let Some(active) = shared.active.take() {
                active.token.cancel("pipeline reset");
            }
            shared.dispatch_all(&[PipelineAction::Reset]);
        }
        info!("Pipeline reset");
        self.sink.try_emit(PIPELINE_RESET, None);
    }

    /// Current state snapshot.
    #[must_use]
    pub fn state(&self) -> PipelineState {
        self.shared.lock().store.state().clone()
    }

    /// Receiver that sees a new snapshot after every applied batch.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.shared.lock().state_tx.subscribe()
    }

    /// Rejected transitions and skipped backend events, oldest first.
    #[must_use]
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.shared.lock().store.diagnostics()
    }

    /// The run currently owning the state, if any.
    #[must_use]
    pub fn active_run(&self) -> Option<RunId> {
        self.shared.lock().active.as_ref().map(|a| a.run_id)
    }

    /// Waits for the most recently started driver task to exit.
    pub async fn join(&self) {
        let task = self.driver.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Run driver task failed");
            }
        }
    }
}

impl Drop for RunController {
    fn drop(&mut self) {
        if let Some(active) = self.shared.lock().active.take() {
            active.token.cancel("controller dropped");
        }
    }
}

impl std::fmt::Debug for RunController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunController")
            .field("config", &self.config)
            .field("active_run", &self.active_run())
            .finish_non_exhaustive()
    }
}

enum Next {
    Cancelled,
    Event(Result<Option<BackendEvent>, TransportError>),
}

/// Consumes one run's stream and feeds the shared store.
struct Driver {
    run_id: RunId,
    token: CancellationToken,
    adapter: StreamEventAdapter,
    request: RunRequest,
    transport: Arc<dyn StreamTransport>,
    shared: Arc<Mutex<Shared>>,
    sink: Arc<dyn EventSink>,
    idle_timeout: Option<Duration>,
    transport_error_message: String,
}

impl Driver {
    async fn run(mut self) {
        let timer = RunTimer::start();

        let open = self.transport.open(self.request.clone());
        let opened = tokio::select! {
            biased;
            () = self.token.cancelled() => None,
            opened = within(self.idle_timeout, open) => Some(opened),
        };
        let mut stream = match opened {
            None => return self.cancelled().await,
            Some(Ok(stream)) => stream,
            Some(Err(e)) => return self.transport_failed(&e, &timer).await,
        };
        debug!("Event stream opened");

        loop {
            let next = tokio::select! {
                biased;
                () = self.token.cancelled() => Next::Cancelled,
                next = next_event(&mut stream, self.idle_timeout) => Next::Event(next),
            };
            match next {
                Next::Cancelled => {
                    drop(stream);
                    return self.cancelled().await;
                }
                Next::Event(Ok(Some(event))) => {
                    let actions = self.adapter.handle(event);
                    if !self.apply(&actions) {
                        return self.cancelled().await;
                    }
                    if self.adapter.is_finished() {
                        break;
                    }
                }
                Next::Event(Err(TransportError::Decode(reason))) => {
                    let mut shared = self.shared.lock();
                    if shared.is_current(self.run_id, &self.token) {
                        shared.store.record_undecodable(reason);
                    }
                }
                Next::Event(Ok(None)) => {
                    return self.transport_failed(&TransportError::Closed, &timer).await;
                }
                Next::Event(Err(e)) => return self.transport_failed(&e, &timer).await,
            }
        }

        drop(stream);
        self.finished(&timer).await;
    }

    /// Applies a batch if this run still owns the state.
    fn apply(&self, actions: &[PipelineAction]) -> bool {
        self.shared
            .lock()
            .apply_if_current(self.run_id, &self.token, actions)
    }

    fn release(&self) {
        let mut shared = self.shared.lock();
        if shared.active.as_ref().map(|a| a.run_id) == Some(self.run_id) {
            shared.active = None;
        }
    }

    async fn finished(&self, timer: &RunTimer) {
        let state = self.shared.lock().store.state().clone();
        self.release();
        let duration_ms = timer.elapsed_ms();

        match state.overall_status {
            OverallStatus::Complete => {
                info!(
                    duration_ms,
                    hits = state.hits().len(),
                    answer_chars = state.answer_text().len(),
                    "Run completed"
                );
                self.sink
                    .emit(
                        RUN_COMPLETED,
                        Some(serde_json::json!({
                            "run_id": self.run_id,
                            "duration_ms": duration_ms,
                            "hits": state.hits().len(),
                        })),
                    )
                    .await;
            }
            OverallStatus::Error => {
                let error = state.error.unwrap_or_default();
                warn!(duration_ms, error = %error, "Run failed");
                self.sink
                    .emit(
                        RUN_FAILED,
                        Some(serde_json::json!({
                            "run_id": self.run_id,
                            "duration_ms": duration_ms,
                            "error": error,
                        })),
                    )
                    .await;
            }
            status => warn!(status = %status, "Run finished in a non-terminal state"),
        }
    }

    async fn transport_failed(&mut self, cause: &TransportError, timer: &RunTimer) {
        warn!(error = %cause, "Transport failed");
        let actions = self.adapter.fail(self.transport_error_message.clone());
        if !self.apply(&actions) {
            return self.cancelled().await;
        }
        self.release();
        self.sink
            .emit(
                RUN_FAILED,
                Some(serde_json::json!({
                    "run_id": self.run_id,
                    "duration_ms": timer.elapsed_ms(),
                    "error": self.transport_error_message,
                    "cause": cause.to_string(),
                })),
            )
            .await;
    }

    async fn cancelled(&self) {
        self.release();
        let reason = self.token.reason();
        info!(reason = ?reason, "Run cancelled");
        self.sink
            .emit(
                RUN_CANCELLED,
                Some(serde_json::json!({ "run_id": self.run_id, "reason": reason })),
            )
            .await;
    }
}

/// Awaits a transport future, failing with `IdleTimeout` once `limit` passes.
async fn within<T>(
    limit: Option<Duration>,
    fut: impl Future<Output = Result<T, TransportError>>,
) -> Result<T, TransportError> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| TransportError::IdleTimeout {
                seconds: limit.as_secs_f64(),
            })?,
        None => fut.await,
    }
}

async fn next_event(
    stream: &mut EventStream,
    idle_timeout: Option<Duration>,
) -> Result<Option<BackendEvent>, TransportError> {
    within(idle_timeout, async { stream.next().await.transpose() }).await
}
