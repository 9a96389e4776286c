//! Queue items and submission roots.
//!
//! Every top-level submission gets a [`Root`]: a counter over the queue
//! items in that submission's causal subtree plus a one-shot completion
//! channel. Items produced while processing a rooted item join the same
//! root; the root settles when its count drains to zero.

use crate::action::Action;
use crate::effect::Effect;
use crate::runtime::RuntimeError;
use crate::state::{StateReturn, StateTransition};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::oneshot;

/// One unit of queued work.
#[derive(Debug)]
pub(crate) enum WorkItem {
    Action(Action),
    Transition(StateTransition),
    Effect(Effect),
}

impl From<StateReturn> for WorkItem {
    fn from(value: StateReturn) -> Self {
        match value {
            StateReturn::Action(action) => WorkItem::Action(action),
            StateReturn::Transition(transition) => WorkItem::Transition(transition),
            StateReturn::Effect(effect) => WorkItem::Effect(effect),
        }
    }
}

pub(crate) struct QueueItem {
    pub(crate) item: WorkItem,
    pub(crate) root: Root,
}

struct RootState {
    pending: usize,
    sender: Option<oneshot::Sender<Result<(), RuntimeError>>>,
    settled: bool,
}

struct RootInner {
    lenient: bool,
    forwarded: bool,
    state: Mutex<RootState>,
}

/// Completion tracker shared by every queue item of one submission.
#[derive(Clone)]
pub(crate) struct Root {
    inner: Arc<RootInner>,
}

impl Root {
    /// A root whose completion is awaited. `lenient` roots downgrade
    /// `NoStatesRespondToAction` to a logged warning.
    pub(crate) fn new(lenient: bool) -> (Self, oneshot::Receiver<Result<(), RuntimeError>>) {
        let (sender, receiver) = oneshot::channel();
        let root = Self {
            inner: Arc::new(RootInner {
                lenient,
                forwarded: false,
                state: Mutex::new(RootState {
                    pending: 1,
                    sender: Some(sender),
                    settled: false,
                }),
            }),
        };
        (root, receiver)
    }

    /// A root for actions a parent machine forwards into a child runtime.
    /// The parent's drive loop is awaiting this submission, so escalation
    /// must stay inside the child instead of climbing back up.
    pub(crate) fn new_forwarded() -> (Self, oneshot::Receiver<Result<(), RuntimeError>>) {
        let (sender, receiver) = oneshot::channel();
        let root = Self {
            inner: Arc::new(RootInner {
                lenient: false,
                forwarded: true,
                state: Mutex::new(RootState {
                    pending: 1,
                    sender: Some(sender),
                    settled: false,
                }),
            }),
        };
        (root, receiver)
    }

    /// A root nobody awaits (trigger/subscription submissions). Failures are
    /// logged instead of delivered.
    pub(crate) fn detached() -> Self {
        Self {
            inner: Arc::new(RootInner {
                lenient: true,
                forwarded: false,
                state: Mutex::new(RootState {
                    pending: 1,
                    sender: None,
                    settled: false,
                }),
            }),
        }
    }

    pub(crate) fn lenient(&self) -> bool {
        self.inner.lenient
    }

    pub(crate) fn forwarded(&self) -> bool {
        self.inner.forwarded
    }

    pub(crate) fn same(&self, other: &Root) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Account for `n` newly queued items in this root's subtree.
    pub(crate) fn add_children(&self, n: usize) {
        self.inner.state.lock().pending += n;
    }

    /// One item of this root finished. Returns `true` when that settles the
    /// root successfully.
    pub(crate) fn complete_one(&self) -> bool {
        let mut state = self.inner.state.lock();
        state.pending = state.pending.saturating_sub(1);
        if state.pending == 0 && !state.settled {
            state.settled = true;
            if let Some(sender) = state.sender.take() {
                let _ = sender.send(Ok(()));
            }
            return true;
        }
        false
    }

    /// Settle successfully right now (lenient downgrade path). Returns
    /// `true` if this call settled the root.
    pub(crate) fn resolve_ok(&self) -> bool {
        let mut state = self.inner.state.lock();
        if state.settled {
            return false;
        }
        state.settled = true;
        if let Some(sender) = state.sender.take() {
            let _ = sender.send(Ok(()));
        }
        true
    }

    /// Settle with a failure. Later completions are ignored. Returns `true`
    /// when the error reached an awaiter; a detached root (or one whose
    /// receiver was dropped) reports `false` so the caller can log instead.
    pub(crate) fn fail(&self, error: RuntimeError) -> bool {
        let mut state = self.inner.state.lock();
        if state.settled {
            return true;
        }
        state.settled = true;
        match state.sender.take() {
            Some(sender) => sender.send(Err(error)).is_ok(),
            None => false,
        }
    }
}
