//! Core statechart types.
//!
//! This module contains the pure data the interpreter works on:
//! - Events and their identifiers
//! - The immutable context value
//! - State node kinds
//! - Guard predicates for transition control
//! - Immutable macrostep history
//!
//! Nothing in this module performs I/O.

mod context;
mod event;
mod guard;
mod history;
mod state;

pub use context::{Context, Updates};
pub use event::{
    done_invoke, done_state, error_invoke, Event, InvocationId, TimerId, INIT, INVOCATION_DONE,
    INVOCATION_ERROR, TIMER_FIRED,
};
pub use guard::Guard;
pub use history::{History, MacrostepRecord};
pub use state::{NodeId, StateKind};
