//! Executable content attached to states and transitions.
//!
//! Actions are data: the interpreter evaluates them against the current
//! context and triggering event and turns them into context updates, raised
//! events, timer operations and outbound effects.

use crate::core::{Context, Event, Updates};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Errors raised while evaluating a guard or an action.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ActionError {
    #[error("context key '{0}' is missing")]
    MissingContext(String),

    #[error("event payload field '{0}' is missing")]
    MissingPayload(String),

    #[error("action failed: {0}")]
    Failed(String),
}

/// Computes context updates.
pub type AssignFn = Arc<dyn Fn(&Context, &Event) -> Result<Updates, ActionError> + Send + Sync>;

/// Computes an event to raise or schedule.
pub type EventFn = Arc<dyn Fn(&Context, &Event) -> Result<Event, ActionError> + Send + Sync>;

/// Computes a domain output.
pub type OutputFn<O> = Arc<dyn Fn(&Context, &Event) -> Result<O, ActionError> + Send + Sync>;

/// Computes the input handed to an invocation.
pub type InputFn = Arc<dyn Fn(&Context, &Event) -> Result<Value, ActionError> + Send + Sync>;

/// Computes a log line.
pub type MessageFn = Arc<dyn Fn(&Context, &Event) -> String + Send + Sync>;

/// A single action.
///
/// `O` is the domain output type delivered by `Emit`.
///
/// # Example
///
/// ```rust
/// use parley::effects::Action;
/// use serde_json::json;
/// use std::time::Duration;
///
/// let actions: Vec<Action<String>> = vec![
///     Action::assign("choice", |_ctx, _event| Ok(json!("booking a meeting"))),
///     Action::raise("listen"),
///     Action::schedule("timeout", Duration::from_secs(10)).with_id("timeout"),
///     Action::emit(|_ctx, _event| Ok("hello".to_string())),
/// ];
/// assert_eq!(actions.len(), 4);
/// ```
pub enum Action<O> {
    /// Replace the context with the computed updates applied.
    Assign(AssignFn),
    /// Enqueue an event on the internal queue.
    Raise(EventFn),
    /// Deliver an event after `delay`, unless the owner state exits first.
    Schedule {
        event: EventFn,
        delay: Duration,
        id: Option<String>,
    },
    /// Cancel pending timers scheduled with this send id.
    Cancel(String),
    /// Produce a domain output.
    Emit(OutputFn<O>),
    /// Write a log line.
    Log(MessageFn),
}

impl<O> Action<O> {
    /// Assign one context key from a computed value.
    pub fn assign<F>(key: impl Into<String>, compute: F) -> Self
    where
        F: Fn(&Context, &Event) -> Result<Value, ActionError> + Send + Sync + 'static,
    {
        let key = key.into();
        Action::Assign(Arc::new(move |ctx, event| {
            Ok(vec![(key.clone(), compute(ctx, event)?)])
        }))
    }

    /// Assign any number of keys at once.
    pub fn assign_many<F>(compute: F) -> Self
    where
        F: Fn(&Context, &Event) -> Result<Updates, ActionError> + Send + Sync + 'static,
    {
        Action::Assign(Arc::new(compute))
    }

    /// Raise a payload-less event.
    pub fn raise(name: impl Into<String>) -> Self {
        let name = name.into();
        Action::Raise(Arc::new(move |_, _| Ok(Event::new(name.clone()))))
    }

    /// Raise a computed event.
    pub fn raise_with<F>(compute: F) -> Self
    where
        F: Fn(&Context, &Event) -> Result<Event, ActionError> + Send + Sync + 'static,
    {
        Action::Raise(Arc::new(compute))
    }

    /// Schedule a payload-less event.
    pub fn schedule(name: impl Into<String>, delay: Duration) -> Self {
        let name = name.into();
        Action::Schedule {
            event: Arc::new(move |_, _| Ok(Event::new(name.clone()))),
            delay,
            id: None,
        }
    }

    /// Attach a send id to a `Schedule` action. Other actions are unchanged.
    pub fn with_id(self, send_id: impl Into<String>) -> Self {
        match self {
            Action::Schedule { event, delay, .. } => Action::Schedule {
                event,
                delay,
                id: Some(send_id.into()),
            },
            other => other,
        }
    }

    pub fn cancel(send_id: impl Into<String>) -> Self {
        Action::Cancel(send_id.into())
    }

    pub fn emit<F>(compute: F) -> Self
    where
        F: Fn(&Context, &Event) -> Result<O, ActionError> + Send + Sync + 'static,
    {
        Action::Emit(Arc::new(compute))
    }

    pub fn log<F>(message: F) -> Self
    where
        F: Fn(&Context, &Event) -> String + Send + Sync + 'static,
    {
        Action::Log(Arc::new(message))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Action::Assign(_) => "assign",
            Action::Raise(_) => "raise",
            Action::Schedule { .. } => "schedule",
            Action::Cancel(_) => "cancel",
            Action::Emit(_) => "emit",
            Action::Log(_) => "log",
        }
    }
}

impl<O> Clone for Action<O> {
    fn clone(&self) -> Self {
        match self {
            Action::Assign(f) => Action::Assign(Arc::clone(f)),
            Action::Raise(f) => Action::Raise(Arc::clone(f)),
            Action::Schedule { event, delay, id } => Action::Schedule {
                event: Arc::clone(event),
                delay: *delay,
                id: id.clone(),
            },
            Action::Cancel(id) => Action::Cancel(id.clone()),
            Action::Emit(f) => Action::Emit(Arc::clone(f)),
            Action::Log(f) => Action::Log(Arc::clone(f)),
        }
    }
}

impl<O> fmt::Debug for Action<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Schedule { delay, id, .. } => f
                .debug_struct("Schedule")
                .field("delay", delay)
                .field("id", id)
                .finish(),
            Action::Cancel(id) => f.debug_tuple("Cancel").field(id).finish(),
            other => f.write_str(other.kind()),
        }
    }
}

/// Asynchronous operation started when a state is entered.
#[derive(Clone)]
pub struct InvokeDef {
    /// Name of the service to run; also names the `done.invoke.<src>` event.
    pub src: String,
    pub input: Option<InputFn>,
}

impl InvokeDef {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            input: None,
        }
    }

    pub fn with_input<F>(mut self, input: F) -> Self
    where
        F: Fn(&Context, &Event) -> Result<Value, ActionError> + Send + Sync + 'static,
    {
        self.input = Some(Arc::new(input));
        self
    }

    /// Evaluate the input, `null` when none is defined.
    pub fn input_for(&self, context: &Context, event: &Event) -> Result<Value, ActionError> {
        match &self.input {
            Some(input) => input(context, event),
            None => Ok(Value::Null),
        }
    }
}

impl fmt::Debug for InvokeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvokeDef").field("src", &self.src).finish()
    }
}

/// Where in a microstep a failure happened.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Guard,
    Exit,
    Transition,
    Entry,
    Invoke,
}

/// A guard or action error reported in a step outcome.
#[derive(Clone, Debug, PartialEq)]
pub struct ActionFailure {
    /// Path of the state whose block failed.
    pub state: String,
    pub phase: Phase,
    pub error: ActionError,
}

impl fmt::Display for ActionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} in '{}': {}", self.phase, self.state, self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn assign_builds_single_update() {
        let action: Action<()> = Action::assign("title", |_, event: &Event| {
            event
                .field_str("utterance")
                .map(|u| json!(u))
                .ok_or_else(|| ActionError::MissingPayload("utterance".into()))
        });

        let Action::Assign(compute) = action else {
            panic!("expected assign");
        };
        let event = Event::with_data("recognised", json!({ "utterance": "lunch" }));
        assert_eq!(
            compute(&Context::new(), &event).unwrap(),
            vec![("title".to_string(), json!("lunch"))]
        );
        assert_eq!(
            compute(&Context::new(), &Event::new("x")),
            Err(ActionError::MissingPayload("utterance".into()))
        );
    }

    #[test]
    fn raise_produces_named_event() {
        let Action::<()>::Raise(compute) = Action::raise("listen") else {
            panic!("expected raise");
        };
        let raised = compute(&Context::new(), &Event::new("x")).unwrap();
        assert_eq!(raised, Event::new("listen"));
    }

    #[test]
    fn with_id_only_touches_schedule() {
        let scheduled: Action<()> = Action::schedule("timeout", Duration::from_secs(1)).with_id("t");
        assert!(matches!(scheduled, Action::Schedule { id: Some(ref id), .. } if id == "t"));

        let raised: Action<()> = Action::raise("x").with_id("t");
        assert_eq!(raised.kind(), "raise");
    }

    #[test]
    fn invoke_input_defaults_to_null() {
        let plain = InvokeDef::new("authorize");
        assert_eq!(
            plain.input_for(&Context::new(), &Event::new("x")).unwrap(),
            Value::Null
        );

        let query = InvokeDef::new("kb_lookup").with_input(|ctx, _| {
            Ok(json!({ "query": ctx.get_str("celeb").unwrap_or_default() }))
        });
        let ctx = Context::from_values([("celeb", json!("ada lovelace"))]);
        assert_eq!(
            query.input_for(&ctx, &Event::new("x")).unwrap(),
            json!({ "query": "ada lovelace" })
        );
    }

    #[test]
    fn failure_display_names_state_and_phase() {
        let failure = ActionFailure {
            state: "dm.info".into(),
            phase: Phase::Entry,
            error: ActionError::MissingContext("title".into()),
        };
        assert_eq!(
            failure.to_string(),
            "Entry in 'dm.info': context key 'title' is missing"
        );
    }
}
