//! Ergonomic helpers for handler bodies.

/// Build a `Vec<StateReturn>` from a mixed list of effects, actions, and
/// transitions.
///
/// # Example
///
/// ```rust
/// use flywheel::action::create_action;
/// use flywheel::effect::log;
/// use flywheel::returns;
/// use flywheel::state::state;
///
/// let done = state::<()>("Done").build();
/// let finish = create_action("Finish");
///
/// let items = returns![log("wrapping up"), finish.make(), done.with(())];
/// assert_eq!(items.len(), 3);
/// ```
#[macro_export]
macro_rules! returns {
    () => {
        ::std::vec::Vec::<$crate::state::StateReturn>::new()
    };
    ($($item:expr),+ $(,)?) => {
        <[_]>::into_vec(::std::boxed::Box::new([
            $($crate::state::StateReturn::from($item)),+
        ]))
    };
}

#[cfg(test)]
mod tests {
    use crate::action::create_action;
    use crate::effect::noop;
    use crate::state::{state, StateReturn};

    #[test]
    fn empty_invocation_builds_an_empty_vec() {
        let items = returns![];
        assert!(items.is_empty());
    }

    #[test]
    fn mixed_items_convert_in_order() {
        let done = state::<()>("Done").build();
        let finish = create_action("Finish");

        let items = returns![noop(), finish.make(), done.with(())];

        assert!(matches!(items[0], StateReturn::Effect(_)));
        assert!(matches!(items[1], StateReturn::Action(_)));
        assert!(matches!(items[2], StateReturn::Transition(_)));
    }

    #[test]
    fn trailing_comma_is_accepted() {
        let items = returns![noop(),];
        assert_eq!(items.len(), 1);
    }
}
