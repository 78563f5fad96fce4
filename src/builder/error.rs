//! Build errors for machine definitions.

use thiserror::Error;

/// A single problem found while validating a definition.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DefinitionIssue {
    #[error("State key '{0}' is invalid. Keys are non-empty and contain no '.' or '#'")]
    InvalidKey(String),

    #[error("State '{0}' is defined more than once")]
    DuplicateState(String),

    #[error("Initial state '{initial}' is not a child of '{state}'")]
    UnknownInitial { state: String, initial: String },

    #[error("State '{0}' names an initial child but has no children")]
    InitialWithoutChildren(String),

    #[error("Final state '{0}' cannot have children")]
    FinalWithChildren(String),

    #[error("Parallel state '{0}' has no regions")]
    EmptyParallel(String),

    #[error("Final state '{0}' cannot be a region of a parallel state. Wrap it in a compound region")]
    FinalRegion(String),

    #[error("Transition '{event}' from '{state}' targets unknown state '{target}'")]
    UnknownTarget {
        state: String,
        event: String,
        target: String,
    },

    #[error("State '{0}' handles invocation completion but invokes nothing")]
    DoneWithoutInvoke(String),

    #[error("Transition '{event}' from '{state}' has no branches. Call .to(target) or .branch(..)")]
    EmptyTransition { state: String, event: String },

    #[error("Transition from '{0}' has no trigger. Use TransitionBuilder::on(event) or ::always()")]
    MissingTrigger(String),
}

/// Errors that can occur when building a machine definition.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("No states defined. Add at least one state with .state(..)")]
    NoStates,

    #[error("Definition has {} issue(s): {}", .0.len(), summarize(.0))]
    Invalid(Vec<DefinitionIssue>),
}

impl BuildError {
    /// Every issue found, empty for [`BuildError::NoStates`].
    pub fn issues(&self) -> &[DefinitionIssue] {
        match self {
            BuildError::NoStates => &[],
            BuildError::Invalid(issues) => issues,
        }
    }
}

fn summarize(issues: &[DefinitionIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
