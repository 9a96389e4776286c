//! Request/response wait states.
//!
//! A wait state models "ask the outside world, hold until it answers". On
//! `Enter` it emits the request as an output; when the matching response
//! action arrives, a user-supplied transition function decides where to go.
//! An optional timeout fires a `TimedOut` action through the normal queue.

use crate::action::{create_action, ActionCreator, ENTER};
use crate::effect::{noop, output};
use crate::state::{state, BoundState, StateReturn};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const TIMED_OUT: &str = "TimedOut";

/// Knobs for [`wait_state`].
pub struct WaitStateOptions<D> {
    /// State name; defaults to `WaitFor<response kind>`.
    pub name: Option<String>,
    /// Fire a `TimedOut` action after this long in the state.
    pub timeout: Option<Duration>,
    /// What to do on timeout; defaults to a no-op (keep waiting).
    pub on_timeout: Option<Arc<dyn Fn(D) -> Vec<StateReturn> + Send + Sync>>,
}

impl<D> Default for WaitStateOptions<D> {
    fn default() -> Self {
        Self {
            name: None,
            timeout: None,
            on_timeout: None,
        }
    }
}

/// Build a wait state. Its data is `(D, request payload)`: enter it with
/// `bound.with((data, payload))` and the request is emitted as
/// `output(request.with(payload))`.
///
/// # Example
///
/// ```rust,no_run
/// use flywheel::action::create_action;
/// use flywheel::state::{wait_state, WaitStateOptions};
///
/// let fetch = create_action("Fetch");
/// let fetched = create_action("Fetched");
/// let loaded = flywheel::state::state::<String>("Loaded").build();
///
/// let waiting = wait_state(
///     fetch,
///     fetched,
///     move |_data: (), payload| {
///         vec![loaded.with(payload.as_str().unwrap_or_default().to_owned()).into()]
///     },
///     WaitStateOptions::default(),
/// );
/// ```
pub fn wait_state<D: Clone + Send + Sync + 'static>(
    request: ActionCreator,
    response: ActionCreator,
    transition: impl Fn(D, Value) -> Vec<StateReturn> + Send + Sync + 'static,
    options: WaitStateOptions<D>,
) -> BoundState<(D, Value)> {
    let name = options
        .name
        .unwrap_or_else(|| format!("WaitFor{}", response.kind()));
    let timed_out = create_action(TIMED_OUT);
    let timeout = options.timeout;
    let on_timeout = options.on_timeout;
    let transition = Arc::new(transition);

    state::<(D, Value)>(name)
        .on(ENTER, move |(_, payload): (D, Value), _action_payload, cx| {
            if let Some(delay) = timeout {
                cx.trigger_after(timed_out.make(), delay);
            }
            output(request.with(payload))
        })
        .on(
            response.kind().to_owned(),
            move |(data, _): (D, Value), payload, _cx| (*transition)(data, payload),
        )
        .on(TIMED_OUT, move |(data, _): (D, Value), _payload, _cx| {
            match &on_timeout {
                Some(handler) => (**handler)(data),
                None => vec![noop().into()],
            }
        })
        .build()
}
