//! Running machines.
//!
//! [`Interpreter`] is the pure core: it processes one event at a time and
//! returns [`Effect`](crate::effects::Effect)s. [`Session`] is the async
//! shell that executes those effects on tokio.

pub mod error;
pub mod interpreter;
pub mod invocations;
pub mod session;
pub mod timers;

pub use error::{InterpreterError, SessionError};
pub use interpreter::{Interpreter, InterpreterOptions, Snapshot, Status, StepOutcome};
pub use invocations::{InvocationSupervisor, PendingInvocation};
pub use session::{
    ChannelSink, InvocationHandler, OutputSink, Services, Session, SessionHandle,
};
pub use timers::{PendingTimer, TimerService};
