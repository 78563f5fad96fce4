//! Parley: a statechart interpreter for spoken dialogue systems
//!
//! Parley follows the "pure core, imperative shell" split. The interpreter is
//! a deterministic function of its inputs: it consumes one event at a time,
//! updates an immutable context and a configuration of active states, and
//! returns the effects the outside world must carry out. The async session
//! runtime executes those effects on tokio and feeds every completion back in
//! as an event.
//!
//! # Core Concepts
//!
//! - **Machine**: an immutable tree of atomic, compound, parallel and final
//!   states, built with [`builder::MachineBuilder`]
//! - **Interpreter**: run-to-completion macrosteps over an external and an
//!   internal event queue
//! - **Effects**: outputs, timers and invocations, scoped to the state that
//!   created them and cancelled when it exits
//! - **Session**: the tokio shell around one interpreter
//!
//! # Example
//!
//! ```rust
//! use parley::builder::{MachineBuilder, StateBuilder, TransitionBuilder};
//! use parley::core::Event;
//! use parley::effects::Action;
//! use parley::runtime::{Interpreter, InterpreterOptions};
//! use std::sync::Arc;
//!
//! let machine = MachineBuilder::new("root")
//!     .state(StateBuilder::new("idle").on("click", "greeting"))
//!     .state(
//!         StateBuilder::new("greeting")
//!             .entry(Action::emit(|_ctx, _event| Ok("Hello!".to_string())))
//!             .transition(TransitionBuilder::on("done").to("idle")),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let mut interpreter = Interpreter::new(Arc::new(machine), InterpreterOptions::default());
//! interpreter.start().unwrap();
//!
//! let outcome = interpreter.send(Event::new("click")).unwrap();
//! assert!(interpreter.matches("greeting"));
//! assert_eq!(outcome.outputs().collect::<Vec<_>>(), vec!["Hello!"]);
//! ```

pub mod builder;
pub mod config;
pub mod core;
pub mod dialogue;
pub mod effects;
pub mod machine;
pub mod runtime;

// Re-export commonly used types
pub use builder::{BuildError, MachineBuilder, StateBuilder, TransitionBuilder};
pub use config::Settings;
pub use core::{Context, Event, Guard};
pub use effects::{Action, Effect};
pub use machine::Machine;
pub use runtime::{Interpreter, Session, SessionHandle, Snapshot};
