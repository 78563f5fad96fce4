//! Builder API for ergonomic machine construction.
//!
//! This module provides fluent builders for states, transitions and whole
//! machines. States are addressed by string paths and resolved when the
//! machine is built; every definition problem is reported at once.

pub mod error;
pub mod machine;
pub mod state;
pub mod transition;

pub use error::{BuildError, DefinitionIssue};
pub use machine::MachineBuilder;
pub use state::StateBuilder;
pub use transition::{Branch, TransitionBuilder};

use crate::core::{Context, Event, Guard};

/// Create an unconditional transition on `event` to `target`.
///
/// # Example
///
/// ```
/// use parley::builder::{simple_transition, MachineBuilder, StateBuilder};
///
/// let machine = MachineBuilder::<()>::new("root")
///     .state(StateBuilder::new("idle").transition(simple_transition("click", "init")))
///     .state(StateBuilder::new("init"))
///     .build();
///
/// assert!(machine.is_ok());
/// ```
pub fn simple_transition<O>(
    event: impl Into<String>,
    target: impl Into<String>,
) -> TransitionBuilder<O> {
    TransitionBuilder::on(event).to(target)
}

/// Create a transition on `event` to `target` taken only when `guard` holds.
///
/// # Example
///
/// ```
/// use parley::builder::{guarded_transition, MachineBuilder, StateBuilder};
///
/// let machine = MachineBuilder::<()>::new("root")
///     .state(StateBuilder::new("menu").transition(guarded_transition(
///         "recognised",
///         "welcome",
///         |ctx, _event| ctx.get_str("choice") == Some("booking a meeting"),
///     )))
///     .state(StateBuilder::new("welcome"))
///     .build();
///
/// assert!(machine.is_ok());
/// ```
pub fn guarded_transition<O, F>(
    event: impl Into<String>,
    target: impl Into<String>,
    guard: F,
) -> TransitionBuilder<O>
where
    F: Fn(&Context, &Event) -> bool + Send + Sync + 'static,
{
    TransitionBuilder::on(event).when(Guard::new(guard)).to(target)
}
