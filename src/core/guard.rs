//! Guard predicates for controlling transitions.
//!
//! Guards are pure functions over the current context and the triggering
//! event. They decide eligibility and have no side effects.

use super::context::Context;
use super::event::Event;
use crate::effects::ActionError;
use std::fmt;
use std::sync::Arc;

type Predicate = Arc<dyn Fn(&Context, &Event) -> Result<bool, ActionError> + Send + Sync>;

/// Pure predicate that determines whether a transition candidate is enabled.
///
/// # Example
///
/// ```rust
/// use parley::core::{Context, Event, Guard};
/// use serde_json::json;
///
/// let confident = Guard::new(|_ctx: &Context, event: &Event| {
///     event.data()["confidence"].as_f64().unwrap_or(0.0) > 0.5
/// })
/// .named("confident");
///
/// let ctx = Context::new();
/// let heard = Event::with_data("speech-recognized", json!({ "confidence": 0.9 }));
///
/// assert_eq!(confident.check(&ctx, &heard).unwrap(), true);
/// assert_eq!(confident.name(), "confident");
/// ```
#[derive(Clone)]
pub struct Guard {
    name: String,
    predicate: Predicate,
}

impl Guard {
    /// Create a guard from an infallible predicate.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&Context, &Event) -> bool + Send + Sync + 'static,
    {
        Guard {
            name: "anonymous".to_string(),
            predicate: Arc::new(move |ctx, event| Ok(predicate(ctx, event))),
        }
    }

    /// Create a guard whose evaluation can fail.
    ///
    /// The interpreter treats a failed guard as `false` and reports the error.
    pub fn fallible<F>(predicate: F) -> Self
    where
        F: Fn(&Context, &Event) -> Result<bool, ActionError> + Send + Sync + 'static,
    {
        Guard {
            name: "anonymous".to_string(),
            predicate: Arc::new(predicate),
        }
    }

    /// Attach a name used in logs and failure reports.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluate the predicate.
    pub fn check(&self, context: &Context, event: &Event) -> Result<bool, ActionError> {
        (self.predicate)(context, event)
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guard").field("name", &self.name).finish()
    }
}
