//! Executable content and outbound effects.
//!
//! This module describes what a step *does* without doing it:
//!
//! - **Actions**: assign, raise, schedule, cancel, emit and log
//! - **Transitions**: triggers with guarded, ordered candidates
//! - **Effects**: instructions the session runtime executes after a step
//!
//! Keeping these as values lets the interpreter stay pure while the
//! imperative shell in [`crate::runtime`] performs the I/O.

mod action;
mod effect;
mod transition;

pub use action::{
    Action, ActionError, ActionFailure, AssignFn, EventFn, InputFn, InvokeDef, MessageFn,
    OutputFn, Phase,
};
pub use effect::Effect;
pub use transition::{Candidate, GuardError, Transition, Trigger};
