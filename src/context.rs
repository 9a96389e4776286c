//! Machine context: one history plus engine options.
//!
//! A [`Context`] is the complete mutable state of one machine. Each runtime
//! owns exactly one context; contexts are never shared between runtimes, and
//! subscribers observe cloned snapshots rather than live references.

use crate::history::{History, HistoryError};
use crate::state::StateTransition;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Severity passed to log sinks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Log,
    Warn,
    Error,
}

/// Replacement sink for the engine's `log`/`warn`/`error` effects and
/// transition logging. Receives the level, the message, and any structured
/// data the effect carried.
pub type CustomLogger = Arc<dyn Fn(LogLevel, &str, &Value) + Send + Sync>;

/// Behavior knobs fixed at context construction.
#[derive(Clone, Default)]
pub struct ContextOptions {
    /// Upper bound on history length. `None` means unbounded.
    pub max_history: Option<usize>,
    /// When `true`, an action no state responds to is a silent no-op instead
    /// of a `NoStatesRespondToAction` failure.
    pub allow_unhandled: bool,
    /// Emit `Enter:`/`Update:` transition logs and effect logs through the
    /// default `tracing` sink. Ignored when `custom_logger` is set.
    pub enable_logging: bool,
    /// Overrides the default sink entirely; receives every log the engine
    /// would emit, whether or not `enable_logging` is set.
    pub custom_logger: Option<CustomLogger>,
}

impl fmt::Debug for ContextOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextOptions")
            .field("max_history", &self.max_history)
            .field("allow_unhandled", &self.allow_unhandled)
            .field("enable_logging", &self.enable_logging)
            .field("custom_logger", &self.custom_logger.as_ref().map(|_| "..."))
            .finish()
    }
}

/// The complete state of one machine.
#[derive(Clone)]
pub struct Context {
    history: History,
    options: ContextOptions,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("history", &self.history)
            .field("options", &self.options)
            .finish()
    }
}

impl Context {
    /// The transition history, current state first.
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Mutable access to the history, for effect executors that reshape it.
    pub fn history_mut(&mut self) -> &mut History {
        &mut self.history
    }

    /// Shorthand for `history().current()`.
    pub fn current_state(&self) -> Option<&StateTransition> {
        self.history.current()
    }

    pub fn allow_unhandled(&self) -> bool {
        self.options.allow_unhandled
    }

    pub(crate) fn emit_log(&self, level: LogLevel, message: &str, data: &Value) {
        if let Some(logger) = &self.options.custom_logger {
            (**logger)(level, message, data);
            return;
        }
        if !self.options.enable_logging {
            return;
        }
        match level {
            LogLevel::Log => tracing::info!(%data, "{message}"),
            LogLevel::Warn => tracing::warn!(%data, "{message}"),
            LogLevel::Error => tracing::error!(%data, "{message}"),
        }
    }
}

/// Build a context from an initial set of transitions (current first).
///
/// # Example
///
/// ```rust
/// use flywheel::context::{create_initial_context, ContextOptions};
/// use flywheel::state::state;
///
/// let idle = state::<()>("Idle").build();
/// let ctx = create_initial_context(vec![idle.with(())], ContextOptions::default()).unwrap();
/// assert_eq!(ctx.current_state().map(|t| t.name()), Some("Idle"));
/// ```
pub fn create_initial_context(
    transitions: Vec<StateTransition>,
    options: ContextOptions,
) -> Result<Context, HistoryError> {
    let history = History::new(transitions, options.max_history)?;
    Ok(Context { history, options })
}
