//! Outbound instructions produced by a step.

use crate::core::{InvocationId, TimerId};
use serde_json::Value;
use std::time::Duration;

/// Something the runtime must do after a step.
///
/// The interpreter never performs I/O itself; it returns effects in the order
/// they were produced and the session runtime executes them.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect<O> {
    /// Domain output such as speech or microphone control.
    Output(O),
    /// Deliver `timer-fired(timer)` after `delay`.
    ScheduleTimer { timer: TimerId, delay: Duration },
    /// The timer's owner exited; the timer must not fire.
    CancelTimer { timer: TimerId },
    /// Run service `src` and report its completion as an event.
    StartInvocation {
        invocation: InvocationId,
        src: String,
        input: Value,
    },
    /// The invocation's owner exited; its completion will be ignored.
    CancelInvocation { invocation: InvocationId },
}

impl<O> Effect<O> {
    pub fn as_output(&self) -> Option<&O> {
        match self {
            Effect::Output(output) => Some(output),
            _ => None,
        }
    }

    pub fn is_output(&self) -> bool {
        matches!(self, Effect::Output(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn as_output_filters_domain_outputs() {
        let output: Effect<&str> = Effect::Output("speak");
        let timer: Effect<&str> = Effect::CancelTimer { timer: TimerId(1) };

        assert_eq!(output.as_output(), Some(&"speak"));
        assert!(output.is_output());
        assert_eq!(timer.as_output(), None);
    }
}
