//! Deferred side-effect descriptors.
//!
//! Handlers never mutate a [`Context`](crate::context::Context) directly:
//! they return [`Effect`]s, and the runtime executes each one in queue order.
//! An effect pairs a label (for logging and engine dispatch) with a data
//! payload and an executor closure.
//!
//! A handful of labels are reserved for the engine. The public [`effect`]
//! constructor rejects them; the built-in constructors in this module are the
//! only way to produce them.

use crate::action::Action;
use crate::context::{Context, LogLevel};
use crate::state::StateTransition;
use crate::subscription::Subscription;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Executor closure run by the runtime when the effect is processed.
pub type EffectFn = Arc<dyn Fn(&mut Context) + Send + Sync>;

/// Labels the engine interprets itself. User effects may not use them.
pub const RESERVED_LABELS: &[&str] = &[
    "goBack",
    "log",
    "error",
    "warn",
    "noop",
    "exited",
    "entered",
    "subscribe",
    "unsubscribe",
    "output",
    "nextState",
    "task",
    "timeout",
];

/// Failure constructing an [`Effect`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EffectError {
    /// The label is interpreted by the engine and cannot be user-defined.
    #[error("effect label '{0}' is reserved")]
    ReservedLabel(String),
}

/// Engine payload riding along with certain built-in effects.
#[derive(Clone)]
pub(crate) enum Attachment {
    None,
    /// `output` carries the action to fan out to output subscribers.
    Action(Action),
    /// `subscribe` carries the source to wire into the runtime.
    Source(Subscription),
}

/// A labeled, deferred side effect.
///
/// # Example
///
/// ```rust
/// use flywheel::effect::effect;
/// use serde_json::json;
///
/// let save = effect("persistName", json!({ "name": "Ada" }), |_ctx| {
///     // write somewhere
/// })
/// .unwrap();
///
/// assert_eq!(save.label(), "persistName");
/// assert!(effect("goBack", json!(null), |_ctx| {}).is_err());
/// ```
#[derive(Clone)]
pub struct Effect {
    label: Arc<str>,
    data: Value,
    executor: EffectFn,
    pub(crate) attachment: Attachment,
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("label", &self.label)
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}

impl Effect {
    /// The effect's label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The effect's data payload.
    pub fn data(&self) -> &Value {
        &self.data
    }

    pub(crate) fn execute(&self, context: &mut Context) {
        (*self.executor)(context);
    }

    pub(crate) fn attached_action(&self) -> Option<&Action> {
        match &self.attachment {
            Attachment::Action(action) => Some(action),
            _ => None,
        }
    }

    pub(crate) fn attached_source(&self) -> Option<&Subscription> {
        match &self.attachment {
            Attachment::Source(source) => Some(source),
            _ => None,
        }
    }
}

/// Build a user-defined effect.
///
/// Rejects [`RESERVED_LABELS`] with [`EffectError::ReservedLabel`].
pub fn effect(
    label: impl Into<String>,
    data: Value,
    executor: impl Fn(&mut Context) + Send + Sync + 'static,
) -> Result<Effect, EffectError> {
    let label = label.into();
    if RESERVED_LABELS.contains(&label.as_str()) {
        return Err(EffectError::ReservedLabel(label));
    }
    Ok(Effect {
        label: Arc::from(label.as_str()),
        data,
        executor: Arc::new(executor),
        attachment: Attachment::None,
    })
}

/// Engine-internal constructor that may use reserved labels.
pub(crate) fn internal_effect(
    label: &str,
    data: Value,
    executor: impl Fn(&mut Context) + Send + Sync + 'static,
) -> Effect {
    Effect {
        label: Arc::from(label),
        data,
        executor: Arc::new(executor),
        attachment: Attachment::None,
    }
}

/// An effect that does nothing. Useful as an explicit "handled, no output".
pub fn noop() -> Effect {
    internal_effect("noop", Value::Null, |_| {})
}

fn log_effect(level: LogLevel, label: &str, message: impl Into<String>, data: Value) -> Effect {
    let message = message.into();
    let log_data = data.clone();
    internal_effect(
        label,
        json!({ "message": message.clone(), "data": data }),
        move |ctx| {
            ctx.emit_log(level, &message, &log_data);
        },
    )
}

/// Log an informational message through the context's logger.
pub fn log(message: impl Into<String>) -> Effect {
    log_effect(LogLevel::Log, "log", message, Value::Null)
}

/// Log an informational message with structured data.
pub fn log_with(message: impl Into<String>, data: Value) -> Effect {
    log_effect(LogLevel::Log, "log", message, data)
}

/// Log a warning.
pub fn warn(message: impl Into<String>) -> Effect {
    log_effect(LogLevel::Warn, "warn", message, Value::Null)
}

/// Log an error.
pub fn error(message: impl Into<String>) -> Effect {
    log_effect(LogLevel::Error, "error", message, Value::Null)
}

/// Return to the previous state in history, replaying its Exit/Enter
/// protocol. A no-op (with a warning) when there is no previous state.
pub fn go_back() -> Effect {
    internal_effect("goBack", Value::Null, |_| {})
}

/// Emit an action to the runtime's output subscribers.
///
/// Outputs are how a machine talks to the world (or to a parent machine)
/// without knowing who is listening.
pub fn output(action: Action) -> Effect {
    let mut built = internal_effect(
        "output",
        json!({ "kind": action.kind(), "payload": action.payload() }),
        |_| {},
    );
    built.attachment = Attachment::Action(action);
    built
}

/// Wire an external action source into the runtime under `key`.
///
/// Every action the source emits is submitted to the runtime as if passed to
/// `run`. Release it again with [`unsubscribe`] using the same key.
pub fn subscribe(key: impl Into<String>, source: Subscription) -> Effect {
    let key = key.into();
    let mut built = internal_effect("subscribe", json!({ "key": key }), |_| {});
    built.attachment = Attachment::Source(source);
    built
}

/// Release an action source previously wired with [`subscribe`].
pub fn unsubscribe(key: impl Into<String>) -> Effect {
    internal_effect("unsubscribe", json!({ "key": key.into() }), |_| {})
}

/// Marker emitted when a state's `Enter` action is processed.
pub(crate) fn entered(transition: &StateTransition) -> Effect {
    let name = transition.name().to_owned();
    internal_effect("entered", json!({ "name": name.clone() }), move |_| {
        tracing::debug!(state = %name, "entered");
    })
}

/// Marker emitted when a state's `Exit` action is processed.
pub(crate) fn exited(transition: &StateTransition) -> Effect {
    let name = transition.name().to_owned();
    internal_effect("exited", json!({ "name": name.clone() }), move |_| {
        tracing::debug!(state = %name, "exited");
    })
}
