//! Runtime failure taxonomy.

use crate::action::Action;
use crate::history::HistoryError;
use thiserror::Error;

/// Everything that can fail while processing submitted actions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    /// An effect executor drained the history, leaving no state to dispatch
    /// against. Fatal: the whole queue is cleared.
    #[error("no current state while dispatching '{kind}' (history: {history:?})", kind = action.kind())]
    MissingCurrentState {
        action: Action,
        history: Vec<String>,
    },

    /// A single state declined an action. Internal stepping stone on the way
    /// to fallback/parent escalation; surfaces only through diagnostics.
    #[error("state '{state}' did not respond to '{kind}'", kind = action.kind())]
    StateDidNotRespondToAction { state: String, action: Action },

    /// Every consulted state (current, fallback, parent chain) declined the
    /// action. Fails the originating submission only.
    #[error("no states respond to '{kind}' (consulted: {states:?})", kind = action.kind())]
    NoStatesRespondToAction { states: Vec<String>, action: Action },

    /// A queue item of a shape the engine does not recognize. Fatal: the
    /// whole queue is cleared.
    #[error("unknown state return type: {detail}")]
    UnknownStateReturnType { detail: String },

    /// The submission was queued behind one that failed fatally and was
    /// never processed.
    #[error("submission abandoned: {cause}")]
    Abandoned { cause: String },

    /// An engine helper constructed an invalid history.
    #[error(transparent)]
    InvalidHistory(#[from] HistoryError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_states_error_names_every_consulted_state() {
        let err = RuntimeError::NoStatesRespondToAction {
            states: vec!["A".into(), "Fallback".into()],
            action: Action::new("Go", serde_json::Value::Null),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("'Go'"));
        assert!(rendered.contains("Fallback"));
    }
}
