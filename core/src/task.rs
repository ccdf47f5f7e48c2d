//! One request lifecycle, from start to the terminal callback.
//!
//! # Design
//! A `FetchTask` is driven by whatever context awaits [`FetchTask::run`].
//! That context shows the progress indicator, hands the blocking retry loop
//! to tokio's blocking pool, and when the loop is done (or the task is
//! cancelled) dismisses the indicator and calls the listener. Callbacks
//! therefore land back on the caller's context, never on the worker.
//!
//! The lifecycle is `Created -> Running -> {Succeeded | Failed | Cancelled}`.
//! The terminal transition is a compare-and-swap out of `Running`, so the
//! listener hears from a task at most once.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

use crate::client::FetchClient;
use crate::config::FetchConfig;
use crate::error::FetchError;
use crate::http::Transport;
use crate::listener::{AlwaysActive, Connectivity, DeliveryTarget, ProgressIndicator, ResultListener};
use crate::retry::fetch_with_retry;
use crate::transport::UreqTransport;
use crate::types::{FetchResult, RequestDescriptor};

/// Where a task is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    Created,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl Lifecycle {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Lifecycle::Succeeded | Lifecycle::Failed | Lifecycle::Cancelled
        )
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Lifecycle::Created,
            1 => Lifecycle::Running,
            2 => Lifecycle::Succeeded,
            3 => Lifecycle::Failed,
            _ => Lifecycle::Cancelled,
        }
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Lifecycle::Created => "created",
            Lifecycle::Running => "running",
            Lifecycle::Succeeded => "succeeded",
            Lifecycle::Failed => "failed",
            Lifecycle::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Shared, read-only view of a task's [`Lifecycle`].
#[derive(Debug, Clone)]
pub struct TaskState(Arc<AtomicU8>);

impl TaskState {
    fn new() -> Self {
        Self(Arc::new(AtomicU8::new(Lifecycle::Created as u8)))
    }

    pub fn get(&self) -> Lifecycle {
        Lifecycle::from_u8(self.0.load(Ordering::Acquire))
    }

    fn transition(&self, from: Lifecycle, to: Lifecycle) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// What the listener gets told once the work is over.
enum Delivery {
    Fetched(FetchResult),
    Failed,
    Nothing,
}

/// Fetches one resource off the caller's context and reports one outcome.
pub struct FetchTask {
    descriptor: RequestDescriptor,
    connectivity: Arc<dyn Connectivity>,
    listener: Arc<dyn ResultListener>,
    transport: Option<Arc<dyn Transport>>,
    indicator: Option<Box<dyn ProgressIndicator>>,
    delivery_target: Arc<dyn DeliveryTarget>,
    config: FetchConfig,
    cancel: CancellationToken,
    state: TaskState,
}

impl FetchTask {
    /// Nothing is validated here; a bad descriptor fails when the task runs.
    pub fn new<C, L>(connectivity: C, descriptor: RequestDescriptor, listener: Arc<L>) -> Self
    where
        C: Connectivity + 'static,
        L: ResultListener + 'static,
    {
        Self {
            descriptor,
            connectivity: Arc::new(connectivity),
            listener,
            transport: None,
            indicator: None,
            delivery_target: Arc::new(AlwaysActive),
            config: FetchConfig::default(),
            cancel: CancellationToken::new(),
            state: TaskState::new(),
        }
    }

    /// Replace the default `ureq` transport.
    pub fn with_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    pub fn with_progress_indicator(mut self, indicator: impl ProgressIndicator + 'static) -> Self {
        self.indicator = Some(Box::new(indicator));
        self
    }

    pub fn with_delivery_target(mut self, target: impl DeliveryTarget + 'static) -> Self {
        self.delivery_target = Arc::new(target);
        self
    }

    pub fn with_config(mut self, config: FetchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn descriptor(&self) -> &RequestDescriptor {
        &self.descriptor
    }

    /// Cancelling this token before or during [`run`](Self::run) ends the
    /// task as `Cancelled` without a listener callback.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> TaskState {
        self.state.clone()
    }

    /// Spawn [`run`](Self::run) on the current tokio runtime.
    ///
    /// # Panics
    /// Outside a tokio runtime.
    pub fn start(self) -> FetchHandle {
        self.spawn_on(&Handle::current())
    }

    /// Spawn [`run`](Self::run) on `runtime`. Callbacks then fire on one of
    /// its workers.
    pub fn spawn_on(self, runtime: &Handle) -> FetchHandle {
        let cancel = self.cancel.clone();
        let state = self.state.clone();
        let span = tracing::info_span!("fetch", url = self.descriptor.url().unwrap_or("<none>"));
        let join = runtime.spawn(self.run().instrument(span));
        FetchHandle {
            cancel,
            state,
            join,
        }
    }

    /// Drive the whole lifecycle on the awaiting context and return the
    /// terminal state.
    ///
    /// Dropping the returned future before it completes ends the task as
    /// `Cancelled`: a shown indicator is dismissed, the worker stops before
    /// its next attempt, and the listener is not called.
    pub async fn run(mut self) -> Lifecycle {
        if self.cancel.is_cancelled() {
            self.state.transition(Lifecycle::Created, Lifecycle::Cancelled);
            debug!("task cancelled before it started");
            return Lifecycle::Cancelled;
        }
        if !self.state.transition(Lifecycle::Created, Lifecycle::Running) {
            return self.state.get();
        }

        let worker_cancel = self.cancel.child_token();
        let mut guard = RunGuard {
            state: self.state.clone(),
            indicator: self.pre_execute(),
            worker_cancel: worker_cancel.clone(),
        };

        let transport = self
            .transport
            .take()
            .unwrap_or_else(|| Arc::new(UreqTransport::new(&self.config)));
        let client = FetchClient::new(transport);
        let descriptor = self.descriptor.clone();
        let connectivity = Arc::clone(&self.connectivity);
        let work = tokio::task::spawn_blocking(move || {
            fetch_with_retry(&client, &descriptor, &*connectivity, &worker_cancel)
        });

        let cancel = self.cancel.clone();
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            joined = work => Some(joined),
        };

        self.complete(outcome, &mut guard)
    }

    /// Show the indicator if there is one, it is wanted, and the delivery
    /// target is still alive. Returns the indicator only if it was shown.
    fn pre_execute(&mut self) -> Option<Box<dyn ProgressIndicator>> {
        let mut indicator = self.indicator.take()?;
        if !self.config.show_progress {
            return None;
        }
        if !self.delivery_target.is_active() {
            debug!("delivery target inactive, not showing progress");
            return None;
        }
        indicator.show();
        Some(indicator)
    }

    fn complete(
        &mut self,
        outcome: Option<Result<Result<FetchResult, FetchError>, JoinError>>,
        guard: &mut RunGuard,
    ) -> Lifecycle {
        let (terminal, delivery) = match outcome {
            None | Some(Ok(Err(FetchError::Cancelled))) => (Lifecycle::Cancelled, Delivery::Nothing),
            Some(Ok(Ok(result))) => (Lifecycle::Succeeded, Delivery::Fetched(result)),
            Some(Ok(Err(FetchError::Offline))) => (Lifecycle::Cancelled, Delivery::Failed),
            Some(Ok(Err(e))) => {
                warn!(error = %e, "fetch failed");
                (Lifecycle::Failed, Delivery::Failed)
            }
            Some(Err(e)) => {
                error!(error = %e, "fetch worker did not finish");
                (Lifecycle::Failed, Delivery::Failed)
            }
        };

        guard.dismiss();

        // The owner may cancel up to the terminal transition; whatever the
        // worker produced is stale then.
        let (terminal, delivery) = if self.cancel.is_cancelled() {
            (Lifecycle::Cancelled, Delivery::Nothing)
        } else {
            (terminal, delivery)
        };
        if !self.state.transition(Lifecycle::Running, terminal) {
            return self.state.get();
        }

        info!(state = %terminal, "fetch finished");
        match delivery {
            Delivery::Fetched(result) => self.listener.on_response_fetched(result),
            Delivery::Failed => self.listener.on_request_failed(),
            Delivery::Nothing => {}
        }
        terminal
    }
}

/// Finishes a running task whose `run` future is dropped before `complete`.
struct RunGuard {
    state: TaskState,
    /// Present only while a shown indicator awaits dismissal.
    indicator: Option<Box<dyn ProgressIndicator>>,
    worker_cancel: CancellationToken,
}

impl RunGuard {
    fn dismiss(&mut self) {
        if let Some(mut indicator) = self.indicator.take() {
            indicator.dismiss();
        }
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.worker_cancel.cancel();
        self.dismiss();
        if self.state.transition(Lifecycle::Running, Lifecycle::Cancelled) {
            debug!("fetch dropped while running");
        }
    }
}

/// Owner's side of a spawned [`FetchTask`].
#[derive(Debug)]
pub struct FetchHandle {
    cancel: CancellationToken,
    state: TaskState,
    join: JoinHandle<Lifecycle>,
}

impl FetchHandle {
    /// Ask the task to stop. An in-flight request is not interrupted, but its
    /// result is discarded and the listener is not called. Has no effect once
    /// the task is terminal, including while its terminal callback runs.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn state(&self) -> Lifecycle {
        self.state.get()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn task_state(&self) -> TaskState {
        self.state.clone()
    }

    /// Wait for the task to reach a terminal state.
    pub async fn join(self) -> Lifecycle {
        match self.join.await {
            Ok(state) => state,
            Err(e) => {
                error!(error = %e, "fetch task aborted");
                self.state.get()
            }
        }
    }
}
