//! Errors raised by the interpreter and the session runtime.

use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum InterpreterError {
    #[error("Interpreter has not been started. Call .start() first")]
    NotStarted,

    #[error("Interpreter was already started")]
    AlreadyStarted,

    #[error("Macrostep for '{event}' exceeded {limit} microsteps")]
    MicrostepLimit { event: String, limit: usize },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session has stopped and no longer accepts events")]
    Closed,

    #[error("No handler registered for invocation '{0}'")]
    MissingHandler(String),

    #[error(transparent)]
    Interpreter(#[from] InterpreterError),
}
