//! Two-level machine composition.
//!
//! A parent state built with [`state_with_nested`] owns a child runtime for
//! as long as the state is current. The child is created when the parent
//! state's `BeforeEnter` runs, and declared child actions sent to the parent
//! are forwarded into the child, each followed by a local update so parent
//! subscribers observe the change.

use crate::action::{before_enter, enter, ActionCreator, BEFORE_ENTER};
use crate::context::{create_initial_context, ContextOptions};
use crate::runtime::{create_runtime, Runtime};
use crate::state::{BoundState, StateBuilder, StateTransition};
use std::ops::Deref;

/// Parent-state data plus the child runtime handle.
///
/// Dereferences to the wrapped data, so parent handlers read their own
/// fields directly.
#[derive(Clone)]
pub struct Nested<D> {
    pub(crate) data: D,
    pub(crate) child: Option<Runtime>,
}

impl<D> Nested<D> {
    /// Wrap initial parent data. The child handle is attached by the
    /// `BeforeEnter` protocol, not by the caller.
    pub fn new(data: D) -> Self {
        Self { data, child: None }
    }

    /// The parent's own data.
    pub fn data(&self) -> &D {
        &self.data
    }

    /// The child runtime, once the state has been entered.
    pub fn child(&self) -> Option<&Runtime> {
        self.child.as_ref()
    }
}

impl<D> Deref for Nested<D> {
    type Target = D;

    fn deref(&self) -> &D {
        &self.data
    }
}

/// Attach a nested machine to a state definition.
///
/// On `BeforeEnter` the state builds a fresh child runtime seeded with
/// `initial_child`, runs the child's `Enter`, and stores the handle in its
/// data. Each action kind in `child_actions` gains a forwarding handler:
/// the action is run to completion inside the child, then the parent state
/// updates in place so its own context-change subscribers fire.
///
/// The child's parent handle is the runtime dispatching the parent state.
/// Actions submitted to the child directly escalate upward when unhandled;
/// forwarded actions settle inside the child, failing the submission with
/// `NoStatesRespondToAction` when nothing there handles them. The parent's
/// drive loop is awaiting the forward, so handing the action back up would
/// wait on a lock the forwarder already holds.
pub fn state_with_nested<D: Clone + Send + Sync + 'static>(
    builder: StateBuilder<Nested<D>>,
    initial_child: StateTransition,
    child_actions: Vec<ActionCreator>,
) -> BoundState<Nested<D>> {
    let child_kinds: Vec<String> = child_actions
        .iter()
        .map(|creator| creator.kind().to_owned())
        .collect();

    let mut builder = builder.on_raw_async(BEFORE_ENTER, move |data: Nested<D>, _payload, cx| {
        let initial = initial_child.clone();
        let kinds = child_kinds.clone();
        Box::pin(async move {
            let context = create_initial_context(vec![initial], ContextOptions::default())?;
            let names: Vec<&str> = kinds.iter().map(String::as_str).collect();
            let child = create_runtime(context, &names, None, cx.runtime());
            child.run_forwarded(before_enter()).await?;
            child.run_forwarded(enter()).await?;
            Ok(vec![cx.update(Nested {
                data: data.data,
                child: Some(child),
            })])
        })
    });

    for creator in child_actions {
        builder = builder.on_raw_async(
            creator.kind().to_owned(),
            move |data: Nested<D>, payload, cx| {
                let forwarded = creator.with(payload);
                Box::pin(async move {
                    match &data.child {
                        Some(child) => child.run_forwarded(forwarded).await?,
                        None => {
                            tracing::warn!(
                                kind = %forwarded.kind(),
                                "child action before nested runtime exists; dropped"
                            );
                        }
                    }
                    Ok(vec![cx.update(data)])
                })
            },
        );
    }

    builder.build()
}
