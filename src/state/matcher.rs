//! Match a transition back to the state that produced it.
//!
//! [`StateTransition::produced_by`] answers "did this state make that
//! transition?" for one state; [`match_state`] builds the full dispatch on
//! top of it: try a list of candidate states in order and run the first
//! matching arm with the transition's typed data.

use crate::state::{BoundState, StateTransition};

/// Fluent dispatch over which state produced a transition.
///
/// Arms are tried in declaration order against the transition's construction
/// identity, so two states sharing a name are still told apart. The first
/// matching arm runs; later arms are skipped.
///
/// # Example
///
/// ```rust
/// use flywheel::state::{match_state, state};
///
/// let loading = state::<u32>("Loading").build();
/// let failed = state::<String>("Failed").build();
///
/// let transition = loading.with(3);
/// let label = match_state(&transition)
///     .when(&loading, |attempt| format!("attempt {attempt}"))
///     .when(&failed, |reason| reason.clone())
///     .otherwise(|| "idle".to_owned());
///
/// assert_eq!(label, "attempt 3");
/// ```
pub struct Matcher<'a, R> {
    transition: &'a StateTransition,
    result: Option<R>,
}

/// Start matching `transition` against candidate states.
pub fn match_state<R>(transition: &StateTransition) -> Matcher<'_, R> {
    Matcher {
        transition,
        result: None,
    }
}

impl<'a, R> Matcher<'a, R> {
    /// Run `handler` with the transition's data when `bound` produced it and
    /// no earlier arm matched.
    pub fn when<D: Clone + Send + Sync + 'static>(
        mut self,
        bound: &BoundState<D>,
        handler: impl FnOnce(&D) -> R,
    ) -> Self {
        if self.result.is_none() && self.transition.produced_by(bound) {
            if let Some(data) = self.transition.data::<D>() {
                self.result = Some(handler(data));
            }
        }
        self
    }

    /// The first matching arm's result, or `None` when no arm matched.
    pub fn run(self) -> Option<R> {
        self.result
    }

    /// The first matching arm's result, or `fallback()`.
    pub fn otherwise(self, fallback: impl FnOnce() -> R) -> R {
        self.result.unwrap_or_else(fallback)
    }
}
