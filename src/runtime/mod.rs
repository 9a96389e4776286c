//! The serializing action processor.
//!
//! A [`Runtime`] owns one [`Context`] and a FIFO queue of work. Submitted
//! actions join the tail; everything a queue item produces (effects, further
//! actions, transitions) is prepended ahead of unrelated work, so one
//! submission's entire causal subtree settles before the next submission
//! starts. A single drainer processes the queue at a time; handler futures
//! are awaited inline, so no two executors ever run concurrently against
//! one context.

mod error;
mod queue;

pub use error::RuntimeError;

use crate::action::{enter, exit, before_enter, Action, ActionCreator, BEFORE_ENTER, ENTER, EXIT};
use crate::context::{Context, LogLevel};
use crate::effect::{self, internal_effect, Effect};
use crate::history::History;
use crate::state::{
    BoundState, ExecutionContext, HandlerReturn, StateReturn, StateTransition, TransitionMode,
};
use crate::subscription::Subscription;
use futures::future::BoxFuture;
use queue::{QueueItem, Root, WorkItem};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::oneshot;

type ContextListener = Arc<dyn Fn(&Context) + Send + Sync>;
type OutputListener = Arc<dyn Fn(&Action) + Send + Sync>;

struct RuntimeInner {
    context: parking_lot::Mutex<Context>,
    queue: parking_lot::Mutex<VecDeque<QueueItem>>,
    drain: tokio::sync::Mutex<()>,
    context_subs: parking_lot::Mutex<Vec<(u64, ContextListener)>>,
    output_subs: parking_lot::Mutex<Vec<(u64, OutputListener)>>,
    sources: parking_lot::Mutex<HashMap<String, (Subscription, u64)>>,
    next_sub_id: AtomicU64,
    valid_actions: HashSet<String>,
    fallback: Option<BoundState<StateTransition>>,
    parent: Option<Weak<RuntimeInner>>,
}

/// A cheaply clonable handle to one machine.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

/// Build a runtime over `context`.
///
/// `action_names` declares the actions this machine answers for (matched
/// case-insensitively by [`Runtime::can_handle`]); `fallback` is consulted
/// when the current state declines an action, receiving the declining
/// transition as its data; `parent` links a nested machine upward for
/// escalation. The parent link is weak, so a child handle on history never
/// keeps a dropped parent alive.
pub fn create_runtime(
    context: Context,
    action_names: &[&str],
    fallback: Option<BoundState<StateTransition>>,
    parent: Option<&Runtime>,
) -> Runtime {
    Runtime {
        inner: Arc::new(RuntimeInner {
            context: parking_lot::Mutex::new(context),
            queue: parking_lot::Mutex::new(VecDeque::new()),
            drain: tokio::sync::Mutex::new(()),
            context_subs: parking_lot::Mutex::new(Vec::new()),
            output_subs: parking_lot::Mutex::new(Vec::new()),
            sources: parking_lot::Mutex::new(HashMap::new()),
            next_sub_id: AtomicU64::new(0),
            valid_actions: action_names.iter().map(|n| n.to_lowercase()).collect(),
            fallback,
            parent: parent.map(|p| Arc::downgrade(&p.inner)),
        }),
    }
}

impl Runtime {
    /// Submit an action and wait for its entire causal subtree to settle.
    ///
    /// Submissions are processed in arrival order; a submission's produced
    /// work runs ahead of any later submission. The future is boxed so
    /// escalation can recurse through the parent chain.
    pub fn run(&self, action: Action) -> BoxFuture<'static, Result<(), RuntimeError>> {
        let runtime = self.clone();
        Box::pin(async move {
            let (root, receiver) = Root::new(false);
            runtime.push_back(WorkItem::Action(action), root);
            runtime.drive().await;
            settle(receiver).await
        })
    }

    /// Submit an action forwarded by a parent machine. The parent's drive
    /// loop is awaiting this call, so the action's escalation stays inside
    /// this runtime instead of waiting on a lock the caller already holds.
    pub(crate) async fn run_forwarded(&self, action: Action) -> Result<(), RuntimeError> {
        let (root, receiver) = Root::new_forwarded();
        self.push_back(WorkItem::Action(action), root);
        self.drive().await;
        settle(receiver).await
    }

    /// Bind one action creator to this runtime.
    pub fn bind(&self, creator: &ActionCreator) -> BoundAction {
        BoundAction {
            creator: creator.clone(),
            runtime: self.clone(),
        }
    }

    /// Bind several action creators at once, in order.
    pub fn bind_actions(&self, creators: &[ActionCreator]) -> Vec<BoundAction> {
        creators.iter().map(|c| self.bind(c)).collect()
    }

    /// Observe context changes. The listener receives a cloned snapshot
    /// exactly once per successfully completed submission, in completion
    /// order.
    pub fn on_context_change(
        &self,
        listener: impl Fn(&Context) + Send + Sync + 'static,
    ) -> Unsubscribe {
        let id = self.inner.next_sub_id.fetch_add(1, Ordering::Relaxed);
        self.inner.context_subs.lock().push((id, Arc::new(listener)));

        let weak = Arc::downgrade(&self.inner);
        Unsubscribe::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.context_subs.lock().retain(|(i, _)| *i != id);
            }
        })
    }

    /// Observe every action emitted through the `output` effect.
    pub fn on_output(&self, listener: impl Fn(&Action) + Send + Sync + 'static) -> Unsubscribe {
        let id = self.inner.next_sub_id.fetch_add(1, Ordering::Relaxed);
        self.inner.output_subs.lock().push((id, Arc::new(listener)));

        let weak = Arc::downgrade(&self.inner);
        Unsubscribe::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.output_subs.lock().retain(|(i, _)| *i != id);
            }
        })
    }

    /// Observe outputs of one kind only. An action returned by the handler
    /// is submitted back to this runtime.
    pub fn respond_to_output(
        &self,
        kind: impl Into<String>,
        handler: impl Fn(&Action) -> Option<Action> + Send + Sync + 'static,
    ) -> Unsubscribe {
        let kind = kind.into();
        let weak = Arc::downgrade(&self.inner);
        self.on_output(move |action| {
            if !action.is_kind(&kind) {
                return;
            }
            if let Some(follow_up) = handler(action) {
                if let Some(inner) = weak.upgrade() {
                    Runtime { inner }.enqueue_detached(follow_up);
                }
            }
        })
    }

    /// The current state, if an effect has not drained the history.
    pub fn current_state(&self) -> Option<StateTransition> {
        self.inner.context.lock().current_state().cloned()
    }

    /// A snapshot of the transition history.
    pub fn current_history(&self) -> History {
        self.inner.context.lock().history().clone()
    }

    /// A snapshot of the whole context.
    pub fn context(&self) -> Context {
        self.inner.context.lock().clone()
    }

    /// Does this machine declare `action`? Case-insensitive.
    pub fn can_handle(&self, action: &Action) -> bool {
        self.inner
            .valid_actions
            .contains(&action.kind().to_lowercase())
    }

    /// The parent machine, when this runtime is nested and the parent is
    /// still alive.
    pub fn parent(&self) -> Option<Runtime> {
        self.inner
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|inner| Runtime { inner })
    }

    /// Drop every context-change and output subscriber and release every
    /// registered action source.
    pub fn disconnect(&self) {
        self.inner.context_subs.lock().clear();
        self.inner.output_subs.lock().clear();
        let sources: Vec<(Subscription, u64)> =
            self.inner.sources.lock().drain().map(|(_, v)| v).collect();
        for (source, id) in sources {
            source.unlisten(id);
        }
    }

    /// Queue an action without waiting on it. Used by `trigger` and wired
    /// subscriptions; failures are logged, not delivered.
    pub(crate) fn enqueue_detached(&self, action: Action) {
        self.push_back(WorkItem::Action(action), Root::detached());
        self.ensure_driven();
    }

    fn push_back(&self, item: WorkItem, root: Root) {
        self.inner.queue.lock().push_back(QueueItem { item, root });
    }

    fn ensure_driven(&self) {
        let runtime = self.clone();
        tokio::spawn(async move {
            runtime.drive().await;
        });
    }

    /// Drain the queue. Only one drainer runs at a time; a second caller
    /// blocks here until the first finishes, then drains whatever is left.
    async fn drive(&self) {
        let _guard = self.inner.drain.lock().await;
        loop {
            let next = self.inner.queue.lock().pop_front();
            let Some(QueueItem { item, root }) = next else {
                break;
            };

            match self.process(item, &root).await {
                Ok(produced) => {
                    root.add_children(produced.len());
                    {
                        let mut queue = self.inner.queue.lock();
                        for item in produced.into_iter().rev() {
                            queue.push_front(QueueItem {
                                item: item.into(),
                                root: root.clone(),
                            });
                        }
                    }
                    if root.complete_one() {
                        self.notify_context_change();
                    }
                }
                Err(error) => self.fail_root(&root, error),
            }
        }
    }

    async fn process(&self, item: WorkItem, root: &Root) -> Result<Vec<StateReturn>, RuntimeError> {
        match item {
            WorkItem::Action(action) => self.process_action(action, root.forwarded()).await,
            WorkItem::Transition(transition) => self.process_transition(transition),
            WorkItem::Effect(eff) => Ok(self.process_effect(eff)),
        }
    }

    async fn process_action(
        &self,
        action: Action,
        forwarded: bool,
    ) -> Result<Vec<StateReturn>, RuntimeError> {
        let (current, allow_unhandled) = {
            let context = self.inner.context.lock();
            let current = match context.current_state() {
                Some(current) => current.clone(),
                None => {
                    return Err(RuntimeError::MissingCurrentState {
                        history: context
                            .history()
                            .names()
                            .into_iter()
                            .map(str::to_owned)
                            .collect(),
                        action,
                    })
                }
            };
            (current, context.allow_unhandled())
        };

        // Lifecycle markers ride ahead of whatever the handler produces, so
        // every entry/exit is observable even when the state has no handler.
        let mut returns = Vec::new();
        if action.is_kind(ENTER) {
            returns.push(StateReturn::Effect(effect::entered(&current)));
        } else if action.is_kind(EXIT) {
            returns.push(StateReturn::Effect(effect::exited(&current)));
        }

        let cx = ExecutionContext::with_runtime(self.clone());
        match current.execute(&action, &cx) {
            HandlerReturn::Sync(produced) => {
                returns.extend(produced);
                Ok(returns)
            }
            HandlerReturn::Pending(future) => {
                returns.extend(future.await?);
                Ok(returns)
            }
            HandlerReturn::Unhandled => {
                // Exit and BeforeEnter are optional protocol actions.
                if action.is_kind(EXIT) || action.is_kind(BEFORE_ENTER) {
                    return Ok(returns);
                }
                if allow_unhandled {
                    return Ok(returns);
                }
                self.escalate(current, action, returns, forwarded).await
            }
        }
    }

    /// Current state declined: consult the fallback, then the parent chain.
    /// Forwarded actions skip the parent hop; the parent's drive loop is the
    /// caller and is holding its own drain lock.
    async fn escalate(
        &self,
        current: StateTransition,
        action: Action,
        mut returns: Vec<StateReturn>,
        forwarded: bool,
    ) -> Result<Vec<StateReturn>, RuntimeError> {
        tracing::debug!(
            error = %RuntimeError::StateDidNotRespondToAction {
                state: current.name().to_owned(),
                action: action.clone(),
            },
            "escalating"
        );

        let mut consulted = vec![current.name().to_owned()];

        if let Some(fallback) = &self.inner.fallback {
            let transition = fallback.with(current.clone());
            let cx = ExecutionContext::with_runtime(self.clone());
            match transition.execute(&action, &cx) {
                HandlerReturn::Sync(produced) => {
                    returns.extend(produced);
                    return Ok(returns);
                }
                HandlerReturn::Pending(future) => {
                    returns.extend(future.await?);
                    return Ok(returns);
                }
                HandlerReturn::Unhandled => consulted.push(fallback.name().to_owned()),
            }
        }

        if !forwarded {
            if let Some(parent) = self.parent() {
                match parent.run(action.clone()).await {
                    Ok(()) => return Ok(returns),
                    Err(RuntimeError::NoStatesRespondToAction { states, .. }) => {
                        consulted.extend(states);
                    }
                    Err(other) => return Err(other),
                }
            }
        }

        Err(RuntimeError::NoStatesRespondToAction {
            states: consulted,
            action,
        })
    }

    fn process_transition(
        &self,
        next: StateTransition,
    ) -> Result<Vec<StateReturn>, RuntimeError> {
        let current = self.inner.context.lock().current_state().cloned();
        let is_updating = next.mode() == TransitionMode::Update
            && current
                .as_ref()
                .map(|c| c.name() == next.name())
                .unwrap_or(false);

        if is_updating {
            Ok(self.update_state(next))
        } else {
            Ok(enter_protocol(next, current.is_some()))
        }
    }

    /// Same state, new data: fold the history head in place, no Exit/Enter.
    fn update_state(&self, next: StateTransition) -> Vec<StateReturn> {
        let name = next.name().to_owned();
        let push = internal_effect("nextState", json!({ "name": name.clone() }), move |ctx| {
            ctx.history_mut().push(next.clone());
            ctx.history_mut().remove_previous();
        });
        vec![
            StateReturn::Effect(push),
            StateReturn::Effect(effect::log(format!("Update: {name}"))),
        ]
    }

    fn process_effect(&self, eff: Effect) -> Vec<StateReturn> {
        match eff.label() {
            "goBack" => self.handle_go_back(),
            "output" => {
                if let Some(action) = eff.attached_action() {
                    let listeners: Vec<OutputListener> = self
                        .inner
                        .output_subs
                        .lock()
                        .iter()
                        .map(|(_, l)| l.clone())
                        .collect();
                    for listener in listeners {
                        (*listener)(action);
                    }
                }
                Vec::new()
            }
            "subscribe" => {
                if let (Some(key), Some(source)) =
                    (eff.data()["key"].as_str(), eff.attached_source())
                {
                    self.wire_source(key.to_owned(), source.clone());
                }
                Vec::new()
            }
            "unsubscribe" => {
                if let Some(key) = eff.data()["key"].as_str() {
                    if let Some((source, id)) = self.inner.sources.lock().remove(key) {
                        source.unlisten(id);
                    }
                }
                Vec::new()
            }
            _ => {
                let mut context = self.inner.context.lock();
                eff.execute(&mut context);
                Vec::new()
            }
        }
    }

    /// Re-push the previous history entry with the full Exit/Enter protocol.
    fn handle_go_back(&self) -> Vec<StateReturn> {
        let previous = self.inner.context.lock().history().previous().cloned();
        match previous {
            Some(previous) => enter_protocol(previous.reenter(), true),
            None => {
                let context = self.inner.context.lock();
                context.emit_log(
                    LogLevel::Warn,
                    "goBack with no previous state; ignored",
                    &Value::Null,
                );
                Vec::new()
            }
        }
    }

    fn wire_source(&self, key: String, source: Subscription) {
        let weak = Arc::downgrade(&self.inner);
        let id = source.listen(move |action| {
            if let Some(inner) = weak.upgrade() {
                Runtime { inner }.enqueue_detached(action);
            }
        });

        if let Some((old_source, old_id)) = self.inner.sources.lock().insert(key, (source, id)) {
            old_source.unlisten(old_id);
        }
    }

    fn fail_root(&self, root: &Root, error: RuntimeError) {
        let fatal = matches!(
            error,
            RuntimeError::MissingCurrentState { .. } | RuntimeError::UnknownStateReturnType { .. }
        );

        if root.lenient() && matches!(error, RuntimeError::NoStatesRespondToAction { .. }) {
            {
                let context = self.inner.context.lock();
                context.emit_log(LogLevel::Warn, &error.to_string(), &Value::Null);
            }
            self.inner.queue.lock().retain(|qi| !qi.root.same(root));
            if root.resolve_ok() {
                self.notify_context_change();
            }
            return;
        }

        if !root.fail(error.clone()) {
            tracing::warn!(error = %error, "detached submission failed");
        }

        if fatal {
            let drained: Vec<QueueItem> = self.inner.queue.lock().drain(..).collect();
            for abandoned in drained {
                if !abandoned.root.same(root) {
                    let delivered = abandoned.root.fail(RuntimeError::Abandoned {
                        cause: error.to_string(),
                    });
                    if !delivered {
                        tracing::warn!(cause = %error, "detached submission abandoned");
                    }
                }
            }
        } else {
            self.inner.queue.lock().retain(|qi| !qi.root.same(root));
        }
    }

    fn notify_context_change(&self) {
        let listeners: Vec<ContextListener> = self
            .inner
            .context_subs
            .lock()
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        if listeners.is_empty() {
            return;
        }

        let snapshot = self.inner.context.lock().clone();
        for listener in listeners {
            (*listener)(&snapshot);
        }
    }
}

/// The Exit → push → log → BeforeEnter → Enter sequence for landing on a
/// new history entry.
fn enter_protocol(next: StateTransition, has_current: bool) -> Vec<StateReturn> {
    let name = next.name().to_owned();
    let push = internal_effect("nextState", json!({ "name": name.clone() }), move |ctx| {
        ctx.history_mut().push(next.clone());
    });

    let mut returns = Vec::new();
    if has_current {
        returns.push(StateReturn::Action(exit()));
    }
    returns.push(StateReturn::Effect(push));
    returns.push(StateReturn::Effect(effect::log(format!("Enter: {name}"))));
    returns.push(StateReturn::Action(before_enter()));
    returns.push(StateReturn::Action(enter()));
    returns
}

async fn settle(
    receiver: oneshot::Receiver<Result<(), RuntimeError>>,
) -> Result<(), RuntimeError> {
    match receiver.await {
        Ok(result) => result,
        Err(_) => Err(RuntimeError::Abandoned {
            cause: "runtime dropped before the submission settled".to_owned(),
        }),
    }
}

/// One action creator pre-bound to a runtime.
///
/// Sends are lenient: an action no state responds to is logged as a warning
/// instead of failing, matching how view-layer callers use bound actions.
#[derive(Clone)]
pub struct BoundAction {
    creator: ActionCreator,
    runtime: Runtime,
}

impl BoundAction {
    pub fn kind(&self) -> &str {
        self.creator.kind()
    }

    /// Queue the action and return immediately.
    pub fn send(&self, payload: impl Into<Value>) -> RunHandle {
        let (root, receiver) = Root::new(true);
        self.runtime
            .push_back(WorkItem::Action(self.creator.with(payload)), root);
        self.runtime.ensure_driven();
        RunHandle { receiver }
    }
}

/// Completion handle for a [`BoundAction::send`].
pub struct RunHandle {
    receiver: oneshot::Receiver<Result<(), RuntimeError>>,
}

impl RunHandle {
    /// Wait for the submission's causal subtree to settle.
    pub async fn settled(self) -> Result<(), RuntimeError> {
        settle(self.receiver).await
    }
}

/// Cancels a context-change or output subscription when invoked.
pub struct Unsubscribe(Option<Box<dyn FnOnce() + Send>>);

impl Unsubscribe {
    fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self(Some(Box::new(cancel)))
    }

    /// Remove the listener. Idempotent.
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.0.take() {
            cancel();
        }
    }
}
