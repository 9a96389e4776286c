//! States, transitions, and handler results.
//!
//! A state is defined once with [`state`] (or [`anonymous_state`]) and bound
//! to a name and a closed dispatch table of action handlers. Calling
//! [`BoundState::with`] produces a [`StateTransition`], the value the
//! runtime pushes onto history and dispatches actions against.
//!
//! Handlers return values convertible into [`StateReturn`]s: further
//! effects, actions, or transitions for the runtime to process in order.

mod builder;
mod matcher;
mod nested;
mod wait;

pub use builder::{anonymous_state, state, BoundState, HandlerContext, StateBuilder};
pub use matcher::{match_state, Matcher};
pub use nested::{state_with_nested, Nested};
pub use wait::{wait_state, WaitStateOptions};

use crate::action::Action;
use crate::effect::Effect;
use crate::runtime::{Runtime, RuntimeError};
use futures::future::BoxFuture;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// A single item a handler hands back to the runtime.
#[derive(Clone, Debug)]
pub enum StateReturn {
    /// A deferred side effect to execute.
    Effect(Effect),
    /// A further action to dispatch against the (then-)current state.
    Action(Action),
    /// A state transition to apply.
    Transition(StateTransition),
}

impl From<Effect> for StateReturn {
    fn from(effect: Effect) -> Self {
        StateReturn::Effect(effect)
    }
}

impl From<Action> for StateReturn {
    fn from(action: Action) -> Self {
        StateReturn::Action(action)
    }
}

impl From<StateTransition> for StateReturn {
    fn from(transition: StateTransition) -> Self {
        StateReturn::Transition(transition)
    }
}

/// What a state did with a dispatched action.
pub enum HandlerReturn {
    /// No handler for this action kind; the runtime escalates.
    Unhandled,
    /// Handled synchronously.
    Sync(Vec<StateReturn>),
    /// Handled, result pending; the runtime awaits it inline.
    Pending(BoxFuture<'static, Result<Vec<StateReturn>, RuntimeError>>),
}

impl fmt::Debug for HandlerReturn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerReturn::Unhandled => write!(f, "Unhandled"),
            HandlerReturn::Sync(items) => f.debug_tuple("Sync").field(items).finish(),
            HandlerReturn::Pending(_) => write!(f, "Pending(..)"),
        }
    }
}

/// Conversion accepted from handler bodies.
///
/// Lets a handler return `()`, a single effect/action/transition, an
/// `Option`, or an already-built `Vec<StateReturn>`.
pub trait IntoStateReturns {
    fn into_returns(self) -> Vec<StateReturn>;
}

impl IntoStateReturns for () {
    fn into_returns(self) -> Vec<StateReturn> {
        Vec::new()
    }
}

impl IntoStateReturns for StateReturn {
    fn into_returns(self) -> Vec<StateReturn> {
        vec![self]
    }
}

impl IntoStateReturns for Effect {
    fn into_returns(self) -> Vec<StateReturn> {
        vec![self.into()]
    }
}

impl IntoStateReturns for Action {
    fn into_returns(self) -> Vec<StateReturn> {
        vec![self.into()]
    }
}

impl IntoStateReturns for StateTransition {
    fn into_returns(self) -> Vec<StateReturn> {
        vec![self.into()]
    }
}

impl IntoStateReturns for Vec<StateReturn> {
    fn into_returns(self) -> Vec<StateReturn> {
        self
    }
}

impl<T: IntoStateReturns> IntoStateReturns for Option<T> {
    fn into_returns(self) -> Vec<StateReturn> {
        match self {
            Some(value) => value.into_returns(),
            None => Vec::new(),
        }
    }
}

/// How a transition lands on history.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionMode {
    /// Push a new entry (full Exit/Enter protocol).
    Append,
    /// Fold the history head in place (same state, new data; no Exit/Enter).
    Update,
}

/// Where a dispatched handler is running: which runtime (if any) owns the
/// dispatch, and through it, the runtime's parent.
#[derive(Clone, Default)]
pub struct ExecutionContext {
    pub(crate) runtime: Option<Runtime>,
}

impl ExecutionContext {
    /// A context with no runtime attached. Dispatches made through it cannot
    /// trigger further actions or reach a parent machine.
    pub fn detached() -> Self {
        Self { runtime: None }
    }

    pub(crate) fn with_runtime(runtime: Runtime) -> Self {
        Self {
            runtime: Some(runtime),
        }
    }

    /// The runtime performing this dispatch.
    pub fn runtime(&self) -> Option<&Runtime> {
        self.runtime.as_ref()
    }

    /// The dispatching runtime's parent, if it is a nested machine.
    pub fn parent(&self) -> Option<Runtime> {
        self.runtime.as_ref().and_then(|r| r.parent())
    }
}

type TransitionExecutor = Arc<dyn Fn(&Action, &ExecutionContext) -> HandlerReturn + Send + Sync>;

/// A state plus the data it was entered with.
///
/// Produced by [`BoundState::with`] / [`BoundState::update`]; these are the
/// entries that live on [`History`](crate::history::History). The data is
/// type-erased here and recovered with [`StateTransition::data`].
#[derive(Clone)]
pub struct StateTransition {
    pub(crate) name: Arc<str>,
    pub(crate) data: Arc<dyn Any + Send + Sync>,
    pub(crate) mode: TransitionMode,
    pub(crate) state_id: Uuid,
    pub(crate) executor: TransitionExecutor,
}

impl fmt::Debug for StateTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateTransition")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("state_id", &self.state_id)
            .finish_non_exhaustive()
    }
}

impl StateTransition {
    /// The state's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The transition's history mode.
    pub fn mode(&self) -> TransitionMode {
        self.mode
    }

    /// Case-sensitive name comparison.
    pub fn is_named(&self, name: &str) -> bool {
        self.name.as_ref() == name
    }

    /// Identity check: was this transition produced by `bound`?
    ///
    /// Matches on the state's construction identity, not its name, so two
    /// distinct states sharing a name are told apart.
    pub fn produced_by<D: Clone + Send + Sync + 'static>(&self, bound: &BoundState<D>) -> bool {
        self.state_id == bound.id()
    }

    /// Recover the typed data this transition carries.
    ///
    /// Returns `None` if `D` is not the type the state was built with.
    pub fn data<D: 'static>(&self) -> Option<&D> {
        self.data.downcast_ref::<D>()
    }

    /// An append-mode copy of this transition: re-entering the same state
    /// with the same data, replaying the full Exit/Enter protocol.
    pub fn reenter(&self) -> StateTransition {
        let mut copy = self.clone();
        copy.mode = TransitionMode::Append;
        copy
    }

    pub(crate) fn execute(&self, action: &Action, cx: &ExecutionContext) -> HandlerReturn {
        (*self.executor)(action, cx)
    }
}
