//! Action values and action creators.
//!
//! An [`Action`] is an immutable `{kind, payload}` message submitted to a
//! runtime. Actions are value types: two actions are equal when their kind
//! and payload are equal, and nothing else about them carries identity.
//!
//! [`ActionCreator`] is the typed constructor/matcher pair: it builds actions
//! of a fixed kind and recognizes them again with [`ActionCreator::is`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Kind of the lifecycle action fired when a state becomes current.
pub const ENTER: &str = "Enter";

/// Kind of the lifecycle action fired against a state being left.
pub const EXIT: &str = "Exit";

/// Kind of the lifecycle action fired just before `Enter`, used by nested
/// machines to wire themselves to the runtime entering the state.
pub const BEFORE_ENTER: &str = "BeforeEnter";

/// An immutable message processed by a runtime.
///
/// # Example
///
/// ```rust
/// use flywheel::action::Action;
///
/// let action = Action::new("Add", 2);
/// assert_eq!(action.kind(), "Add");
/// assert_eq!(action.payload(), &serde_json::json!(2));
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Action {
    kind: String,
    payload: Value,
}

impl Action {
    /// Build an action from a kind and payload.
    pub fn new(kind: impl Into<String>, payload: impl Into<Value>) -> Self {
        Self {
            kind: kind.into(),
            payload: payload.into(),
        }
    }

    /// The action's kind tag.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The action's payload.
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Exact (case-sensitive) kind comparison.
    pub fn is_kind(&self, kind: &str) -> bool {
        self.kind == kind
    }
}

/// A pure factory for actions of one kind, plus the matching type guard.
///
/// # Example
///
/// ```rust
/// use flywheel::action::create_action;
///
/// let add = create_action("Add");
/// let multiply = create_action("Multiply");
///
/// let action = add.with(2);
/// assert!(add.is(&action));
/// assert!(!multiply.is(&action));
/// ```
#[derive(Clone, Debug)]
pub struct ActionCreator {
    kind: Arc<str>,
}

impl ActionCreator {
    /// The kind every action built by this creator will carry.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Build an action carrying `payload`.
    pub fn with(&self, payload: impl Into<Value>) -> Action {
        Action::new(self.kind.as_ref(), payload)
    }

    /// Build an action with a null payload.
    pub fn make(&self) -> Action {
        Action::new(self.kind.as_ref(), Value::Null)
    }

    /// Type guard: does `action` belong to this creator?
    pub fn is(&self, action: &Action) -> bool {
        action.kind() == self.kind.as_ref()
    }
}

/// Build an [`ActionCreator`] for the given kind.
pub fn create_action(kind: impl Into<String>) -> ActionCreator {
    ActionCreator {
        kind: Arc::from(kind.into().as_str()),
    }
}

/// The `Enter` lifecycle action.
pub fn enter() -> Action {
    Action::new(ENTER, Value::Null)
}

/// The `Exit` lifecycle action.
pub fn exit() -> Action {
    Action::new(EXIT, Value::Null)
}

/// The `BeforeEnter` lifecycle action.
///
/// View bindings submit this once, before [`enter`], so nested machines get
/// a chance to construct their child runtime.
pub fn before_enter() -> Action {
    Action::new(BEFORE_ENTER, Value::Null)
}
