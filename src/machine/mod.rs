//! Machine definitions and the active configuration.
//!
//! - [`Machine`]: immutable state tree shared by every interpreter
//! - [`Configuration`]: the set of active states of one interpreter
//! - the resolver that picks transitions and computes exit and entry sets

mod configuration;
mod definition;
pub(crate) mod resolver;

pub use configuration::{Configuration, ConfigurationError};
pub use definition::{Ancestors, Machine, StateNode};
