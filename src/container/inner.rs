//! Live container internals: state, side effects, jobs and the event loop.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use futures::future::{AbortHandle, Abortable, Aborted, BoxFuture, FutureExt};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::container::context::{IntentContext, IntentOptions};
use crate::container::event_loop::{self, IntentTask};
use crate::container::job::{self, IntentJob, JobStatus};
use crate::container::lifecycle::{Lifecycle, LifecyclePhase};
use crate::error::{IntentFailure, OrbitError};
use crate::flow::{SideEffectChannel, SideEffectStream, StateHolder, StateStream, SubscriptionTracker};
use crate::mvi::{SideEffect, State};
use crate::pipeline::{Pipeline, PluginRegistry};
use crate::settings::Settings;
use crate::testing::Item;

pub(crate) type OnCreate<S, SE> =
    Arc<dyn Fn(IntentContext<S, SE>) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    /// `on_create` fires on first observation or first intent.
    Production,
    /// `on_create` fires only through the test session; side effects go to the tap.
    Test,
}

pub(crate) struct CoreParts<S, SE> {
    pub initial_state: S,
    pub settings: Settings,
    pub registry: Arc<PluginRegistry>,
    pub on_create: Option<OnCreate<S, SE>>,
    pub mode: Mode,
    pub tap: Option<mpsc::UnboundedSender<Item<S, SE>>>,
}

pub(crate) struct Core<S, SE> {
    id: Uuid,
    settings: Settings,
    state: StateHolder<S>,
    side_effects: SideEffectChannel<SE>,
    subscriptions: SubscriptionTracker,
    pipeline: Pipeline,
    lifecycle: Lifecycle,
    intents: mpsc::UnboundedSender<IntentTask>,
    jobs: Mutex<HashMap<Uuid, AbortHandle>>,
    active_jobs: watch::Sender<usize>,
    on_create: Option<OnCreate<S, SE>>,
    on_create_pending: AtomicBool,
    mode: Mode,
    tap: Mutex<Option<mpsc::UnboundedSender<Item<S, SE>>>>,
    reduce_lock: Mutex<()>,
    unhandled: Mutex<Vec<IntentFailure>>,
}

impl<S: State, SE: SideEffect> Core<S, SE> {
    /// Build the core and spawn its event loop.
    pub(crate) fn start(parts: CoreParts<S, SE>) -> Result<Arc<Self>, OrbitError> {
        let runtime = match parts.settings.event_loop() {
            Some(handle) => handle.clone(),
            None => Handle::try_current().map_err(|_| OrbitError::NoRuntime)?,
        };

        let (intents, receiver) = mpsc::unbounded_channel();
        let (active_jobs, _) = watch::channel(0usize);
        let pipeline = Pipeline::new(
            parts.registry,
            Arc::clone(parts.settings.idling_resource()),
        );

        let core = Arc::new(Self {
            id: Uuid::new_v4(),
            state: StateHolder::new(parts.initial_state),
            side_effects: SideEffectChannel::new(parts.settings.side_effect_buffer()),
            subscriptions: SubscriptionTracker::new(),
            pipeline,
            lifecycle: Lifecycle::new(),
            intents,
            jobs: Mutex::new(HashMap::new()),
            active_jobs,
            on_create: parts.on_create,
            on_create_pending: AtomicBool::new(true),
            mode: parts.mode,
            tap: Mutex::new(parts.tap),
            reduce_lock: Mutex::new(()),
            unhandled: Mutex::new(Vec::new()),
            settings: parts.settings,
        });

        runtime.spawn(event_loop::run(core.id, receiver, core.lifecycle.watch()));
        core.lifecycle.activate();
        debug!(
            container = %core.id,
            mode = ?core.mode,
            plugins = ?core.pipeline.registry().names(),
            "Container started"
        );
        Ok(core)
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.settings
    }

    pub(crate) fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub(crate) fn subscriptions(&self) -> &SubscriptionTracker {
        &self.subscriptions
    }

    pub(crate) fn state(&self) -> S {
        self.state.current()
    }

    pub(crate) fn phase(&self) -> LifecyclePhase {
        self.lifecycle.phase()
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.lifecycle.is_cancelled()
    }

    pub(crate) async fn cancelled(&self) {
        self.lifecycle.cancelled().await
    }

    pub(crate) fn ensure_active(&self) -> Result<(), OrbitError> {
        if self.lifecycle.is_cancelled() {
            return Err(OrbitError::ContainerCancelled);
        }
        Ok(())
    }

    pub(crate) fn state_stream(self: &Arc<Self>) -> StateStream<S> {
        if self.mode == Mode::Production {
            self.initialise_if_needed();
        }
        self.state.subscribe().with_token(self.subscriptions.acquire())
    }

    pub(crate) fn side_effect_stream(self: &Arc<Self>) -> SideEffectStream<SE> {
        if self.mode == Mode::Production {
            self.initialise_if_needed();
        }
        self.side_effects
            .subscribe()
            .with_token(self.subscriptions.acquire())
    }

    /// Dispatch an intent from host code.
    pub(crate) fn dispatch<F, Fut>(
        self: &Arc<Self>,
        options: IntentOptions,
        body: F,
    ) -> Result<IntentJob, OrbitError>
    where
        F: FnOnce(IntentContext<S, SE>) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.ensure_active()?;
        match self.mode {
            Mode::Production => self.initialise_if_needed(),
            // Any intent closes the window for `run_on_create`.
            Mode::Test => self.on_create_pending.store(false, Ordering::SeqCst),
        }
        self.launch(options, body)
    }

    /// Explicit `on_create` trigger used by test sessions.
    pub(crate) fn run_on_create(self: &Arc<Self>) -> Result<IntentJob, OrbitError> {
        self.ensure_active()?;
        if !self.claim_on_create() {
            return Err(OrbitError::OnCreateAlreadyInvoked);
        }
        let on_create = self.on_create.clone();
        self.launch(IntentOptions::named("on_create"), move |ctx| async move {
            match on_create {
                Some(on_create) => on_create(ctx).await,
                None => Ok(()),
            }
        })
    }

    fn claim_on_create(&self) -> bool {
        self.on_create_pending
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn initialise_if_needed(self: &Arc<Self>) {
        if !self.claim_on_create() {
            return;
        }
        let Some(on_create) = self.on_create.clone() else {
            return;
        };
        debug!(container = %self.id, "Running on_create");
        if let Err(err) = self.launch(IntentOptions::named("on_create"), move |ctx| on_create(ctx)) {
            warn!(container = %self.id, error = %err, "on_create was not launched");
        }
    }

    fn launch<F, Fut>(self: &Arc<Self>, options: IntentOptions, body: F) -> Result<IntentJob, OrbitError>
    where
        F: FnOnce(IntentContext<S, SE>) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let intent_id = Uuid::new_v4();
        let name = options.name_arc();
        let register_idling = options
            .register_idling_override()
            .unwrap_or_else(|| self.settings.register_idling());
        let context = IntentContext::new(Arc::clone(self), intent_id, name.clone(), register_idling);

        let (abort, registration) = AbortHandle::new_pair();
        let (done_tx, done_rx) = oneshot::channel();
        let status = Arc::new(AtomicU8::new(JobStatus::Active as u8));

        self.jobs.lock().insert(intent_id, abort.clone());
        self.active_jobs.send_modify(|count| *count += 1);

        // Captured by the task so it also runs when the task is dropped unpolled.
        let cleanup = scopeguard::guard(
            (Arc::clone(self), Arc::clone(&status)),
            move |(core, status)| {
                job::settle(&status, JobStatus::Cancelled);
                core.finish_job(intent_id);
            },
        );

        let core = Arc::clone(self);
        let task_status = Arc::clone(&status);
        let task_name = name.clone();
        let task = async move {
            let _cleanup = cleanup;
            let body = AssertUnwindSafe(async move { body(context).await }).catch_unwind();
            let outcome = match Abortable::new(body, registration).await {
                Ok(Ok(Ok(()))) => Ok(()),
                Ok(Ok(Err(err))) => Err(IntentFailure::from_body_error(err)),
                Ok(Err(panic)) => Err(IntentFailure::from_panic(panic)),
                Err(Aborted) => Err(IntentFailure::Cancelled),
            };
            let result = core.resolve(intent_id, task_name.as_deref(), outcome);
            let settled = match &result {
                Ok(()) => JobStatus::Completed,
                Err(failure) if failure.is_cancelled() => JobStatus::Cancelled,
                Err(_) => JobStatus::Failed,
            };
            job::settle(&task_status, settled);
            let _ = done_tx.send(result);
        };

        if self.intents.send(task.boxed()).is_err() {
            if self.lifecycle.is_cancelled() {
                return Err(OrbitError::ContainerCancelled);
            }
            return Err(OrbitError::EventLoopStopped);
        }
        // A cancel that raced the registration above still has to reach this job.
        if self.lifecycle.is_cancelled() {
            abort.abort();
        }

        Ok(IntentJob::new(intent_id, name, abort, status, done_rx))
    }

    /// Apply the failure policy. Returns what the job resolves to.
    fn resolve(
        &self,
        intent_id: Uuid,
        name: Option<&str>,
        outcome: Result<(), IntentFailure>,
    ) -> Result<(), IntentFailure> {
        let failure = match outcome {
            Ok(()) => return Ok(()),
            Err(failure) if failure.is_cancelled() => {
                debug!(container = %self.id, intent = %intent_id, name = ?name, "Intent cancelled");
                return Err(failure);
            }
            Err(failure) => failure,
        };

        match self.settings.exception_handler() {
            Some(handler) => {
                debug!(
                    container = %self.id,
                    intent = %intent_id,
                    name = ?name,
                    error = %failure,
                    "Intent failure routed to exception handler"
                );
                let handled = std::panic::catch_unwind(AssertUnwindSafe(|| handler(&failure)));
                if handled.is_err() {
                    error!(container = %self.id, intent = %intent_id, "Exception handler panicked");
                }
                Ok(())
            }
            None => {
                error!(
                    container = %self.id,
                    intent = %intent_id,
                    name = ?name,
                    error = %failure,
                    "Unhandled intent failure, cancelling container"
                );
                self.unhandled.lock().push(failure.clone());
                self.cancel();
                Err(failure)
            }
        }
    }

    fn finish_job(&self, intent_id: Uuid) {
        if self.jobs.lock().remove(&intent_id).is_some() {
            self.active_jobs.send_modify(|count| *count = count.saturating_sub(1));
        }
    }

    /// Commit a reduction and mirror it to the test tap.
    pub(crate) fn commit<F>(&self, reducer: F) -> bool
    where
        F: FnOnce(&S) -> S,
    {
        let _serial = self.reduce_lock.lock();
        match self.state.update(reducer) {
            Some(next) => {
                if let Some(tap) = self.tap.lock().as_ref() {
                    let _ = tap.send(Item::State(next));
                }
                true
            }
            None => false,
        }
    }

    pub(crate) fn post(&self, side_effect: SE) -> Result<(), OrbitError> {
        self.ensure_active()?;
        if let Some(tap) = self.tap.lock().as_ref() {
            return tap
                .send(Item::SideEffect(side_effect))
                .map_err(|_| OrbitError::ContainerCancelled);
        }
        if self.side_effects.post(side_effect) {
            Ok(())
        } else {
            Err(OrbitError::ContainerCancelled)
        }
    }

    /// Wait until no intent is in flight.
    pub(crate) async fn join_intents(&self) {
        let mut active = self.active_jobs.subscribe();
        let _ = active.wait_for(|count| *count == 0).await;
    }

    pub(crate) fn active_intents(&self) -> usize {
        *self.active_jobs.borrow()
    }

    pub(crate) fn take_unhandled(&self) -> Vec<IntentFailure> {
        std::mem::take(&mut *self.unhandled.lock())
    }

    pub(crate) fn cancel(&self) {
        if !self.lifecycle.cancel() {
            return;
        }
        let handles: Vec<AbortHandle> = self.jobs.lock().values().cloned().collect();
        for handle in &handles {
            handle.abort();
        }
        self.state.close();
        self.side_effects.close();
        self.tap.lock().take();
        self.settings.idling_resource().close();
        debug!(container = %self.id, aborted = handles.len(), "Container cancelled");
    }
}
