//! Transition types with guarded candidate targets.

use super::action::{Action, ActionError};
use crate::core::{Context, Event, Guard, NodeId};
use std::fmt;

/// What makes a transition eligible.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Trigger {
    /// A named event.
    Event(String),
    /// Eventless: checked after every microstep until none is enabled.
    Always,
}

impl Trigger {
    pub fn matches(&self, event: Option<&Event>) -> bool {
        match (self, event) {
            (Trigger::Event(name), Some(event)) => event.is(name),
            (Trigger::Always, None) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Event(name) => f.write_str(name),
            Trigger::Always => f.write_str("always"),
        }
    }
}

/// One branch of a transition.
///
/// An empty `targets` list makes the branch targetless: its actions run and
/// no state is exited or entered.
pub struct Candidate<O> {
    pub guard: Option<Guard>,
    pub targets: Vec<NodeId>,
    pub actions: Vec<Action<O>>,
    /// Internal branches do not exit a compound source when every target is
    /// one of its descendants.
    pub internal: bool,
}

impl<O> Candidate<O> {
    pub fn is_targetless(&self) -> bool {
        self.targets.is_empty()
    }
}

impl<O> Clone for Candidate<O> {
    fn clone(&self) -> Self {
        Self {
            guard: self.guard.clone(),
            targets: self.targets.clone(),
            actions: self.actions.clone(),
            internal: self.internal,
        }
    }
}

impl<O> fmt::Debug for Candidate<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Candidate")
            .field("guard", &self.guard)
            .field("targets", &self.targets)
            .field("actions", &self.actions)
            .field("internal", &self.internal)
            .finish()
    }
}

/// Guard failure observed while selecting a candidate.
#[derive(Clone, Debug, PartialEq)]
pub struct GuardError {
    pub guard: String,
    pub error: ActionError,
}

/// An outgoing transition of a state node.
pub struct Transition<O> {
    pub source: NodeId,
    pub trigger: Trigger,
    /// Guard shared by every candidate, checked first.
    pub guard: Option<Guard>,
    /// Candidates in declaration order; the first enabled one wins.
    pub candidates: Vec<Candidate<O>>,
}

impl<O> Transition<O> {
    /// Select the first enabled candidate (pure).
    ///
    /// A guard that fails to evaluate counts as `false`; its error is pushed
    /// onto `errors` and evaluation continues with the next candidate.
    pub fn select(
        &self,
        context: &Context,
        event: &Event,
        errors: &mut Vec<GuardError>,
    ) -> Option<usize> {
        if !Self::passes(self.guard.as_ref(), context, event, errors) {
            return None;
        }
        self.candidates
            .iter()
            .position(|c| Self::passes(c.guard.as_ref(), context, event, errors))
    }

    fn passes(
        guard: Option<&Guard>,
        context: &Context,
        event: &Event,
        errors: &mut Vec<GuardError>,
    ) -> bool {
        match guard {
            None => true,
            Some(guard) => match guard.check(context, event) {
                Ok(enabled) => enabled,
                Err(error) => {
                    errors.push(GuardError {
                        guard: guard.name().to_string(),
                        error,
                    });
                    false
                }
            },
        }
    }
}

impl<O> Clone for Transition<O> {
    fn clone(&self) -> Self {
        Self {
            source: self.source,
            trigger: self.trigger.clone(),
            guard: self.guard.clone(),
            candidates: self.candidates.clone(),
        }
    }
}

impl<O> fmt::Debug for Transition<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("source", &self.source)
            .field("trigger", &self.trigger)
            .field("candidates", &self.candidates)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn candidate(guard: Option<Guard>, target: usize) -> Candidate<()> {
        Candidate {
            guard,
            targets: vec![NodeId(target)],
            actions: Vec::new(),
            internal: false,
        }
    }

    fn choice_is(value: &'static str) -> Guard {
        Guard::new(move |ctx: &Context, _: &Event| ctx.get_str("choice") == Some(value))
    }

    #[test]
    fn trigger_matches_named_events_only() {
        let trigger = Trigger::Event("click".into());
        assert!(trigger.matches(Some(&Event::new("click"))));
        assert!(!trigger.matches(Some(&Event::new("listen"))));
        assert!(!trigger.matches(None));

        assert!(Trigger::Always.matches(None));
        assert!(!Trigger::Always.matches(Some(&Event::new("click"))));
    }

    #[test]
    fn first_enabled_candidate_wins() {
        let transition = Transition {
            source: NodeId(1),
            trigger: Trigger::Event("recognised".into()),
            guard: None,
            candidates: vec![
                candidate(Some(choice_is("booking a meeting")), 2),
                candidate(Some(choice_is("finding information")), 3),
                candidate(None, 4),
            ],
        };
        let event = Event::new("recognised");
        let mut errors = Vec::new();

        let info = Context::from_values([("choice", json!("finding information"))]);
        assert_eq!(transition.select(&info, &event, &mut errors), Some(1));

        let other = Context::from_values([("choice", json!("dancing"))]);
        assert_eq!(transition.select(&other, &event, &mut errors), Some(2));
        assert!(errors.is_empty());
    }

    #[test]
    fn transition_guard_blocks_every_candidate() {
        let transition = Transition {
            source: NodeId(1),
            trigger: Trigger::Always,
            guard: Some(Guard::new(|_: &Context, _: &Event| false)),
            candidates: vec![candidate(None, 2)],
        };
        let mut errors = Vec::new();
        assert_eq!(
            transition.select(&Context::new(), &Event::new("x"), &mut errors),
            None
        );
    }

    #[test]
    fn failing_guard_counts_as_false() {
        let failing = Guard::fallible(|_: &Context, _: &Event| {
            Err(ActionError::Failed("boom".into()))
        })
        .named("explodes");
        let transition = Transition {
            source: NodeId(1),
            trigger: Trigger::Event("e".into()),
            guard: None,
            candidates: vec![candidate(Some(failing), 2), candidate(None, 3)],
        };
        let mut errors = Vec::new();

        let selected = transition.select(&Context::new(), &Event::new("e"), &mut errors);

        assert_eq!(selected, Some(1));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].guard, "explodes");
    }
}
