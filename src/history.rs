//! Bounded navigation history.
//!
//! A [`History`] is the ordered stack of [`StateTransition`]s a machine has
//! moved through. The front entry is the current state; the entry behind it
//! is the previous state. A history is never constructed empty, and pushing
//! past `max_history` silently drops the oldest entries.

use crate::state::StateTransition;
use std::collections::VecDeque;
use thiserror::Error;

/// Failure constructing a [`History`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    /// A history must contain at least one initial state.
    #[error("history must contain at least one previous (or initial) state")]
    Empty,
}

/// Ordered, bounded stack of state transitions. Front = current.
///
/// # Example
///
/// ```rust
/// use flywheel::history::History;
/// use flywheel::state::state;
///
/// let idle = state::<()>("Idle").build();
/// let busy = state::<()>("Busy").build();
///
/// let mut history = History::new(vec![idle.with(())], None).unwrap();
/// history.push(busy.with(()));
///
/// assert_eq!(history.current().map(|t| t.name()), Some("Busy"));
/// assert_eq!(history.previous().map(|t| t.name()), Some("Idle"));
/// assert_eq!(history.len(), 2);
/// ```
#[derive(Clone, Debug)]
pub struct History {
    items: VecDeque<StateTransition>,
    max_len: usize,
}

impl History {
    /// Build a history from transitions ordered current-first.
    ///
    /// Fails with [`HistoryError::Empty`] when `items` is empty. A
    /// `max_len` of `None` means unbounded.
    pub fn new(items: Vec<StateTransition>, max_len: Option<usize>) -> Result<Self, HistoryError> {
        if items.is_empty() {
            return Err(HistoryError::Empty);
        }

        let mut history = Self {
            items: items.into(),
            max_len: max_len.unwrap_or(usize::MAX).max(1),
        };
        history.truncate();
        Ok(history)
    }

    /// The current (most recent) transition.
    ///
    /// Only `None` if an effect executor has drained the history by hand;
    /// the runtime reports that as a `MissingCurrentState` failure.
    pub fn current(&self) -> Option<&StateTransition> {
        self.items.front()
    }

    /// The transition behind the current one.
    pub fn previous(&self) -> Option<&StateTransition> {
        self.items.get(1)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Push a new current transition, dropping the oldest entries once the
    /// bound is exceeded. The current and previous entries are always kept.
    pub fn push(&mut self, item: StateTransition) {
        self.items.push_front(item);
        self.truncate();
    }

    /// Remove and return the current transition.
    pub fn pop(&mut self) -> Option<StateTransition> {
        self.items.pop_front()
    }

    /// Replace the current transition's predecessor in place: the head is
    /// kept, the entry behind it is dropped, everything older is untouched.
    /// Used by `update`-mode transitions to fold the history head.
    pub fn remove_previous(&mut self) {
        if self.items.len() > 1 {
            if let Some(head) = self.pop() {
                self.pop();
                self.push(head);
            }
        }
    }

    /// Iterate transitions, current first.
    pub fn iter(&self) -> impl Iterator<Item = &StateTransition> {
        self.items.iter()
    }

    /// State names, current first. Handy for diagnostics.
    pub fn names(&self) -> Vec<&str> {
        self.items.iter().map(|t| t.name()).collect()
    }

    fn truncate(&mut self) {
        while self.items.len() > self.max_len {
            self.items.pop_back();
        }
    }
}
