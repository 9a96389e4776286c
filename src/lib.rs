//! Flywheel: an action-driven state machine runtime
//!
//! A machine is a bounded history of states plus a serializing queue of
//! work. States are defined once with a closed table of action handlers;
//! handlers never mutate anything directly. They return effects, further
//! actions, and transitions, and the runtime processes them in order. One
//! submitted action's entire causal subtree settles before the next
//! submission starts.
//!
//! # Core Concepts
//!
//! - **Action**: an immutable `{kind, payload}` message submitted to a runtime
//! - **State**: a named dispatch table over typed data, built with [`state`]
//! - **Effect**: a labeled, deferred side effect executed by the runtime
//! - **History**: the bounded stack of entered states, current first
//! - **Runtime**: the serializing processor tying it all together
//!
//! # Example
//!
//! ```rust
//! use flywheel::action::{create_action, enter};
//! use flywheel::context::{create_initial_context, ContextOptions};
//! use flywheel::runtime::create_runtime;
//! use flywheel::state::state;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), flywheel::runtime::RuntimeError> {
//! let add = create_action("Add");
//!
//! let counter = state::<i64>("Counter")
//!     .on("Enter", |_total, _payload, _cx| ())
//!     .on("Add", |total: i64, payload, cx| {
//!         cx.update(total + payload.as_i64().unwrap_or(0))
//!     })
//!     .build();
//!
//! let context = create_initial_context(vec![counter.with(0)], ContextOptions::default())?;
//! let runtime = create_runtime(context, &["Add"], None, None);
//!
//! runtime.run(enter()).await?;
//! runtime.run(add.with(40)).await?;
//! runtime.run(add.with(2)).await?;
//!
//! let current = runtime.current_state().ok_or(flywheel::runtime::RuntimeError::Abandoned {
//!     cause: "no state".into(),
//! })?;
//! assert_eq!(current.data::<i64>(), Some(&42));
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod context;
pub mod effect;
pub mod history;
#[macro_use]
mod macros;
pub mod runtime;
pub mod snapshot;
pub mod state;
pub mod subscription;

// Re-export commonly used types
pub use action::{before_enter, create_action, enter, exit, Action, ActionCreator};
pub use context::{create_initial_context, Context, ContextOptions, CustomLogger, LogLevel};
pub use effect::{effect, go_back, log, noop, output, subscribe, unsubscribe, Effect, EffectError};
pub use history::{History, HistoryError};
pub use runtime::{create_runtime, BoundAction, Runtime, RuntimeError, Unsubscribe};
pub use snapshot::{HistorySnapshot, SnapshotError, StateCatalog};
pub use state::{
    anonymous_state, match_state, state, state_with_nested, wait_state, BoundState,
    HandlerContext, HandlerReturn, Matcher, Nested, StateReturn, StateTransition,
    TransitionMode, WaitStateOptions,
};
pub use subscription::Subscription;
