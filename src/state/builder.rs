//! The state builder and the bound states it produces.

use crate::action::Action;
use crate::runtime::{Runtime, RuntimeError};
use crate::state::{
    ExecutionContext, HandlerReturn, IntoStateReturns, StateReturn, StateTransition,
    TransitionMode,
};
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

type HandlerFn<D> = Arc<dyn Fn(D, Value, HandlerContext<D>) -> HandlerReturn + Send + Sync>;

/// Fluent definition of a state's dispatch table.
///
/// The table is closed at [`StateBuilder::build`]: an action kind either has
/// a handler or the state reports it unhandled. There is no default arm.
///
/// # Example
///
/// ```rust
/// use flywheel::state::state;
///
/// let counter = state::<i64>("Counter")
///     .on("Add", |total: i64, payload, cx| {
///         let amount = payload.as_i64().unwrap_or(0);
///         cx.update(total + amount)
///     })
///     .build();
///
/// let transition = counter.with(10);
/// assert_eq!(transition.name(), "Counter");
/// ```
pub struct StateBuilder<D> {
    name: String,
    handlers: HashMap<String, HandlerFn<D>>,
}

/// Start defining a named state over data `D`.
pub fn state<D: Clone + Send + Sync + 'static>(name: impl Into<String>) -> StateBuilder<D> {
    StateBuilder {
        name: name.into(),
        handlers: HashMap::new(),
    }
}

/// Start defining a state with a generated (unique) name.
pub fn anonymous_state<D: Clone + Send + Sync + 'static>() -> StateBuilder<D> {
    state(format!("AnonymousState-{}", Uuid::new_v4().simple()))
}

impl<D: Clone + Send + Sync + 'static> StateBuilder<D> {
    /// Handle `kind` synchronously. The handler receives an owned clone of
    /// the state's data, the action payload, and a [`HandlerContext`].
    pub fn on<R>(
        mut self,
        kind: impl Into<String>,
        handler: impl Fn(D, Value, HandlerContext<D>) -> R + Send + Sync + 'static,
    ) -> Self
    where
        R: IntoStateReturns,
    {
        self.handlers.insert(
            kind.into(),
            Arc::new(move |data, payload, cx| {
                HandlerReturn::Sync(handler(data, payload, cx).into_returns())
            }),
        );
        self
    }

    /// Handle `kind` asynchronously. The future is awaited by the runtime
    /// before any later queue item runs.
    pub fn on_async<R, Fut>(
        mut self,
        kind: impl Into<String>,
        handler: impl Fn(D, Value, HandlerContext<D>) -> Fut + Send + Sync + 'static,
    ) -> Self
    where
        R: IntoStateReturns,
        Fut: Future<Output = R> + Send + 'static,
    {
        self.handlers.insert(
            kind.into(),
            Arc::new(move |data, payload, cx| {
                let fut = handler(data, payload, cx);
                HandlerReturn::Pending(Box::pin(async move { Ok(fut.await.into_returns()) }))
            }),
        );
        self
    }

    /// Async handler whose future may itself fail. Engine helpers use this
    /// to propagate child-runtime errors.
    pub(crate) fn on_raw_async(
        mut self,
        kind: impl Into<String>,
        handler: impl Fn(
                D,
                Value,
                HandlerContext<D>,
            ) -> BoxFuture<'static, Result<Vec<StateReturn>, RuntimeError>>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.handlers.insert(
            kind.into(),
            Arc::new(move |data, payload, cx| {
                HandlerReturn::Pending(handler(data, payload, cx))
            }),
        );
        self
    }

    /// Close the dispatch table and bind the state.
    pub fn build(self) -> BoundState<D> {
        BoundState {
            inner: Arc::new(BoundInner {
                name: Arc::from(self.name.as_str()),
                id: Uuid::new_v4(),
                handlers: self.handlers,
            }),
        }
    }
}

struct BoundInner<D> {
    name: Arc<str>,
    id: Uuid,
    handlers: HashMap<String, HandlerFn<D>>,
}

/// A built state: a named factory for [`StateTransition`]s.
///
/// Cloning is cheap (shared inner); all clones share one identity, so
/// [`StateTransition::produced_by`] matches across them.
pub struct BoundState<D> {
    inner: Arc<BoundInner<D>>,
}

impl<D> Clone for BoundState<D> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<D: Clone + Send + Sync + 'static> BoundState<D> {
    /// The state's name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub(crate) fn id(&self) -> Uuid {
        self.inner.id
    }

    /// An append-mode transition into this state carrying `data`.
    pub fn with(&self, data: D) -> StateTransition {
        self.transition(data, TransitionMode::Append)
    }

    /// An update-mode transition: same state, new data, history head folded
    /// in place with no Exit/Enter replay.
    pub fn update(&self, data: D) -> StateTransition {
        self.transition(data, TransitionMode::Update)
    }

    pub(crate) fn transition(&self, data: D, mode: TransitionMode) -> StateTransition {
        let bound = self.clone();
        let dispatch_data = data.clone();
        let executor: Arc<dyn Fn(&Action, &ExecutionContext) -> HandlerReturn + Send + Sync> =
            Arc::new(move |action, cx| {
                let handler = match bound.inner.handlers.get(action.kind()) {
                    Some(handler) => handler,
                    None => return HandlerReturn::Unhandled,
                };
                let handler_cx = HandlerContext {
                    state: bound.clone(),
                    runtime: cx.runtime.clone(),
                };
                (**handler)(dispatch_data.clone(), action.payload().clone(), handler_cx)
            });

        StateTransition {
            name: self.inner.name.clone(),
            data: Arc::new(data),
            mode,
            state_id: self.inner.id,
            executor,
        }
    }
}

/// Handed to every handler invocation: the state being dispatched and the
/// runtime (if any) performing the dispatch.
pub struct HandlerContext<D> {
    state: BoundState<D>,
    runtime: Option<Runtime>,
}

impl<D> Clone for HandlerContext<D> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            runtime: self.runtime.clone(),
        }
    }
}

impl<D: Clone + Send + Sync + 'static> HandlerContext<D> {
    /// Stay in this state with new data (update mode).
    pub fn update(&self, data: D) -> StateReturn {
        self.state.update(data).into()
    }

    /// Re-enter this state with new data, replaying the full Exit/Enter
    /// protocol (append mode).
    pub fn reenter(&self, data: D) -> StateReturn {
        self.state.with(data).into()
    }

    /// Submit a further action to the dispatching runtime without waiting
    /// for it. The action is processed after the current submission's causal
    /// subtree settles.
    ///
    /// A warning is logged (and the action dropped) when the dispatch is
    /// detached from any runtime.
    pub fn trigger(&self, action: Action) {
        match &self.runtime {
            Some(runtime) => runtime.enqueue_detached(action),
            None => tracing::warn!(kind = %action.kind(), "trigger outside a runtime; action dropped"),
        }
    }

    /// Submit `action` after `delay`. Backed by a spawned timer; the action
    /// joins the queue like any other detached submission.
    pub fn trigger_after(&self, action: Action, delay: Duration) {
        match &self.runtime {
            Some(runtime) => {
                let runtime = runtime.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    runtime.enqueue_detached(action);
                });
            }
            None => tracing::warn!(kind = %action.kind(), "trigger_after outside a runtime; action dropped"),
        }
    }

    /// The runtime performing this dispatch, when there is one.
    pub fn runtime(&self) -> Option<&Runtime> {
        self.runtime.as_ref()
    }

    /// The dispatching runtime's parent machine, when nested.
    pub fn parent(&self) -> Option<Runtime> {
        self.runtime.as_ref().and_then(|r| r.parent())
    }
}
