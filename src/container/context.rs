use std::future::Future;
use std::panic;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use uuid::Uuid;

use crate::container::inner::Core;
use crate::error::OrbitError;
use crate::mvi::{Reducer, SideEffect, State};
use crate::pipeline::{Operator, StageContext};

/// Per-dispatch options.
#[derive(Debug, Clone, Default)]
pub struct IntentOptions {
    name: Option<Arc<str>>,
    register_idling: Option<bool>,
}

impl IntentOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<Arc<str>>) -> Self {
        Self::new().name(name)
    }

    /// Label used in logs and plugin stage contexts.
    pub fn name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Override [`Settings::register_idling`](crate::Settings::register_idling) for this intent.
    pub fn register_idling(mut self, register: bool) -> Self {
        self.register_idling = Some(register);
        self
    }

    pub(crate) fn name_arc(&self) -> Option<Arc<str>> {
        self.name.clone()
    }

    pub(crate) fn register_idling_override(&self) -> Option<bool> {
        self.register_idling
    }
}

/// Handle given to an intent body.
///
/// Every operation runs as a pipeline stage and fails with
/// [`OrbitError::ContainerCancelled`] once the container is cancelled.
/// Returning that error from the body (via `?`) ends the intent as
/// cancelled, not failed.
pub struct IntentContext<S, SE> {
    core: Arc<Core<S, SE>>,
    intent_id: Uuid,
    name: Option<Arc<str>>,
    register_idling: bool,
}

impl<S, SE> Clone for IntentContext<S, SE> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
            intent_id: self.intent_id,
            name: self.name.clone(),
            register_idling: self.register_idling,
        }
    }
}

impl<S: State, SE: SideEffect> IntentContext<S, SE> {
    pub(crate) fn new(
        core: Arc<Core<S, SE>>,
        intent_id: Uuid,
        name: Option<Arc<str>>,
        register_idling: bool,
    ) -> Self {
        Self {
            core,
            intent_id,
            name,
            register_idling,
        }
    }

    pub fn intent_id(&self) -> Uuid {
        self.intent_id
    }

    pub fn container_id(&self) -> Uuid {
        self.core.id()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Fresh snapshot; reflects every reduction committed so far.
    pub fn state(&self) -> S {
        self.core.state()
    }

    pub fn is_active(&self) -> bool {
        !self.core.is_cancelled()
    }

    fn stage(&self, operator: Operator) -> StageContext {
        StageContext {
            container_id: self.core.id(),
            intent_id: self.intent_id,
            intent_name: self.name.clone(),
            operator,
        }
    }

    async fn run_stage<T, Fut>(&self, operator: Operator, work: Fut) -> Result<T, OrbitError>
    where
        Fut: Future<Output = T>,
    {
        self.core.ensure_active()?;
        self.core
            .pipeline()
            .run(self.stage(operator), self.register_idling, work)
            .await
    }

    /// Atomically replace the state with `reducer(&current)`.
    ///
    /// Returns whether a new value was committed; a result equal to the
    /// current state is not emitted.
    pub async fn reduce<F>(&self, reducer: F) -> Result<bool, OrbitError>
    where
        F: FnOnce(&S) -> S + Send,
    {
        let core = &self.core;
        self.run_stage(Operator::Reduce, async move { core.commit(reducer) })
            .await
    }

    /// [`reduce`](Self::reduce) through a [`Reducer`] implementation.
    pub async fn reduce_with<R>(&self, action: R::Action) -> Result<bool, OrbitError>
    where
        R: Reducer<State = S>,
    {
        self.reduce(move |state| R::reduce(state, action)).await
    }

    /// Deliver a one-shot event to at most one side-effect subscriber.
    pub async fn post_side_effect(&self, side_effect: SE) -> Result<(), OrbitError> {
        let core = &self.core;
        self.run_stage(Operator::SideEffect, async move { core.post(side_effect) })
            .await?
    }

    /// Run `work` off the event loop, on the intent-launching runtime when
    /// one is configured. Cancelling the intent aborts the spawned task.
    pub async fn transform<T, Fut>(&self, work: Fut) -> Result<T, OrbitError>
    where
        T: Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let launching = self.core.settings().intent_launching().cloned();
        let joined = self
            .run_stage(Operator::Transform, async move {
                let handle = match launching {
                    Some(runtime) => runtime.spawn(work),
                    None => tokio::spawn(work),
                };
                let _abort_on_drop = scopeguard::guard(handle.abort_handle(), |abort| abort.abort());
                handle.await
            })
            .await?;
        match joined {
            Ok(value) => Ok(value),
            Err(err) if err.is_panic() => panic::resume_unwind(err.into_panic()),
            Err(_) => Err(OrbitError::ContainerCancelled),
        }
    }

    /// Run a child body inline. It shares this intent's job, so cancelling
    /// the parent cancels it, and its failure is the parent's failure.
    pub async fn sub_intent<F, Fut>(&self, body: F) -> anyhow::Result<()>
    where
        F: FnOnce(IntentContext<S, SE>) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let child = self.clone();
        self.run_stage(Operator::SubIntent, body(child)).await?
    }

    /// Run `block` while the container has at least one subscriber.
    ///
    /// The block starts once a subscriber is present. When the last one
    /// leaves, the block is cancelled after the configured stop timeout and
    /// restarted from scratch on the next subscription. Returns only when
    /// the intent or the container is cancelled.
    pub async fn repeat_on_subscription<F, Fut>(&self, mut block: F) -> Result<(), OrbitError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        let core = &self.core;
        let stop_timeout = core.settings().repeat_on_subscription_stop_timeout();
        let work = async move {
            let mut subscribers = core.subscriptions().watch();
            loop {
                if !wait_count(&mut subscribers, |count| count > 0).await {
                    return;
                }
                tracing::trace!(container = %core.id(), "Subscriber present, starting repeated block");

                tokio::select! {
                    _ = block() => {
                        // Finished on its own; wait for the next subscription cycle.
                        if !wait_count(&mut subscribers, |count| count == 0).await {
                            return;
                        }
                    }
                    stopped = wait_unsubscribed(&mut subscribers, stop_timeout) => {
                        if !stopped {
                            return;
                        }
                        tracing::trace!(container = %core.id(), "No subscribers, stopped repeated block");
                    }
                }
            }
        };
        self.run_stage(Operator::RepeatOnSubscription, work).await
    }

    /// Run `work` as a custom pipeline stage.
    ///
    /// Fails with [`OrbitError::PluginMissing`] unless a registered plugin
    /// claims `operator`.
    pub async fn operator<T, Fut>(&self, operator: Operator, work: Fut) -> Result<T, OrbitError>
    where
        Fut: Future<Output = T>,
    {
        self.run_stage(operator, work).await
    }
}

/// Resolves `true` once the subscriber count has stayed at zero for
/// `grace`, or `false` if the count can no longer change.
async fn wait_unsubscribed(subscribers: &mut watch::Receiver<usize>, grace: Duration) -> bool {
    loop {
        if !wait_count(subscribers, |count| count == 0).await {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(grace) => return true,
            resubscribed = wait_count(subscribers, |count| count > 0) => {
                if !resubscribed {
                    return false;
                }
            }
        }
    }
}

/// `false` once the tracker is gone.
async fn wait_count(subscribers: &mut watch::Receiver<usize>, predicate: fn(usize) -> bool) -> bool {
    subscribers.wait_for(|count| predicate(*count)).await.is_ok()
}
