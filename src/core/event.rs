//! Events consumed by the interpreter.
//!
//! Every stimulus (a UI click, a speech result, a fired timer, a settled
//! invocation, an event raised by an action) is an [`Event`]. Raised and
//! externally delivered events share this representation and the same queue
//! discipline.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Tag of the event the runtime delivers when a scheduled timer elapses.
pub const TIMER_FIRED: &str = "timer-fired";

/// Tag of the event the runtime delivers when an invocation succeeds.
pub const INVOCATION_DONE: &str = "invocation-done";

/// Tag of the event the runtime delivers when an invocation fails.
pub const INVOCATION_ERROR: &str = "invocation-error";

/// Tag of the event passed to entry actions run by `start()`.
pub const INIT: &str = "parley.init";

static NULL: Value = Value::Null;

/// Name of the event raised when invocation `src` completes successfully.
pub fn done_invoke(src: &str) -> String {
    format!("done.invoke.{src}")
}

/// Name of the event raised when invocation `src` fails.
pub fn error_invoke(src: &str) -> String {
    format!("error.invoke.{src}")
}

/// Name of the event raised when compound or parallel state `id` completes.
pub fn done_state(id: &str) -> String {
    format!("done.state.{id}")
}

/// Identifier of a pending timer, unique within one interpreter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimerId(pub u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// Identifier of one invocation instance.
///
/// A fresh id is minted every time an invoking state is entered, so a
/// completion belonging to an earlier visit never correlates with a later one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvocationId(pub Uuid);

impl InvocationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for InvocationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InvocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// An event: a type tag plus a payload.
///
/// `Signal` covers every named event, whether raised by an action or
/// delivered from outside. The other variants are produced by the runtime for
/// timers and invocations; the interpreter translates live ones into signals
/// and absorbs stale ones.
///
/// # Example
///
/// ```rust
/// use parley::core::Event;
/// use serde_json::json;
///
/// let event = Event::with_data("speech-recognized", json!({ "utterance": "lunch" }));
/// assert_eq!(event.name(), "speech-recognized");
/// assert_eq!(event.field_str("utterance"), Some("lunch"));
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    Signal {
        name: String,
        #[serde(default)]
        data: Value,
    },
    TimerFired {
        timer: TimerId,
    },
    InvocationDone {
        invocation: InvocationId,
        #[serde(default)]
        data: Value,
    },
    InvocationError {
        invocation: InvocationId,
        error: String,
    },
}

impl Event {
    /// A named event without payload.
    pub fn new(name: impl Into<String>) -> Self {
        Event::Signal {
            name: name.into(),
            data: Value::Null,
        }
    }

    /// A named event carrying `data`.
    pub fn with_data(name: impl Into<String>, data: Value) -> Self {
        Event::Signal {
            name: name.into(),
            data,
        }
    }

    pub fn timer_fired(timer: TimerId) -> Self {
        Event::TimerFired { timer }
    }

    pub fn invocation_done(invocation: InvocationId, data: Value) -> Self {
        Event::InvocationDone { invocation, data }
    }

    pub fn invocation_error(invocation: InvocationId, error: impl Into<String>) -> Self {
        Event::InvocationError {
            invocation,
            error: error.into(),
        }
    }

    /// The type tag used for transition matching and logging.
    pub fn name(&self) -> &str {
        match self {
            Event::Signal { name, .. } => name,
            Event::TimerFired { .. } => TIMER_FIRED,
            Event::InvocationDone { .. } => INVOCATION_DONE,
            Event::InvocationError { .. } => INVOCATION_ERROR,
        }
    }

    /// The payload. Timer and error events have none.
    pub fn data(&self) -> &Value {
        match self {
            Event::Signal { data, .. } | Event::InvocationDone { data, .. } => data,
            Event::TimerFired { .. } | Event::InvocationError { .. } => &NULL,
        }
    }

    /// A string field of an object payload.
    pub fn field_str(&self, field: &str) -> Option<&str> {
        self.data().get(field).and_then(Value::as_str)
    }

    pub fn is(&self, name: &str) -> bool {
        self.name() == name
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Signal { name, .. } => f.write_str(name),
            Event::TimerFired { timer } => write!(f, "{TIMER_FIRED}({timer})"),
            Event::InvocationDone { invocation, .. } => write!(f, "{INVOCATION_DONE}({invocation})"),
            Event::InvocationError { invocation, .. } => {
                write!(f, "{INVOCATION_ERROR}({invocation})")
            }
        }
    }
}
