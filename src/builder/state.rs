//! Builder for state nodes.

use super::transition::{Branch, TransitionBuilder};
use crate::core::{Context, Event};
use crate::effects::{Action, ActionError, InvokeDef};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum KindSpec {
    /// Atomic without children, compound with them.
    Auto,
    Parallel,
    Final,
}

/// Builder for one state node and its subtree.
///
/// # Example
///
/// ```rust
/// use parley::builder::StateBuilder;
/// use parley::effects::Action;
///
/// let ask: StateBuilder<()> = StateBuilder::new("ask").entry(Action::raise("listen"));
/// let menu = StateBuilder::new("menu")
///     .initial("prompt")
///     .on("timeout", ".prompt")
///     .state(StateBuilder::new("prompt").on("tts-finished", "ask"))
///     .state(ask);
/// ```
pub struct StateBuilder<O> {
    pub(crate) key: String,
    pub(crate) kind: KindSpec,
    pub(crate) initial: Option<String>,
    pub(crate) children: Vec<StateBuilder<O>>,
    pub(crate) entry: Vec<Action<O>>,
    pub(crate) exit: Vec<Action<O>>,
    pub(crate) transitions: Vec<TransitionBuilder<O>>,
    pub(crate) invoke: Option<InvokeDef>,
    pub(crate) on_done: Vec<Branch<O>>,
    pub(crate) on_error: Vec<Branch<O>>,
}

impl<O> StateBuilder<O> {
    /// A state that is atomic unless children are added.
    ///
    /// A compound state starts in its first child unless `.initial` says
    /// otherwise.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind: KindSpec::Auto,
            initial: None,
            children: Vec::new(),
            entry: Vec::new(),
            exit: Vec::new(),
            transitions: Vec::new(),
            invoke: None,
            on_done: Vec::new(),
            on_error: Vec::new(),
        }
    }

    /// A final state.
    pub fn final_state(key: impl Into<String>) -> Self {
        Self {
            kind: KindSpec::Final,
            ..Self::new(key)
        }
    }

    /// Make this state parallel: every child is a region.
    pub fn parallel(mut self) -> Self {
        self.kind = KindSpec::Parallel;
        self
    }

    pub fn initial(mut self, key: impl Into<String>) -> Self {
        self.initial = Some(key.into());
        self
    }

    /// Add a child state (or region, for parallel states).
    pub fn state(mut self, child: StateBuilder<O>) -> Self {
        self.children.push(child);
        self
    }

    pub fn entry(mut self, action: Action<O>) -> Self {
        self.entry.push(action);
        self
    }

    pub fn exit(mut self, action: Action<O>) -> Self {
        self.exit.push(action);
        self
    }

    /// Shorthand for an unguarded transition on `event` to `target`.
    pub fn on(self, event: impl Into<String>, target: impl Into<String>) -> Self {
        self.transition(TransitionBuilder::on(event).to(target))
    }

    pub fn transition(mut self, transition: TransitionBuilder<O>) -> Self {
        self.transitions.push(transition);
        self
    }

    /// Start service `src` whenever this state is entered.
    pub fn invoke(mut self, src: impl Into<String>) -> Self {
        self.invoke = Some(InvokeDef::new(src));
        self
    }

    /// Start service `src` with an input computed on entry.
    pub fn invoke_with<F>(mut self, src: impl Into<String>, input: F) -> Self
    where
        F: Fn(&Context, &Event) -> Result<Value, ActionError> + Send + Sync + 'static,
    {
        self.invoke = Some(InvokeDef::new(src).with_input(input));
        self
    }

    /// Branch taken when the invocation succeeds. Branches are tried in the
    /// order they are added.
    pub fn on_done(mut self, branch: Branch<O>) -> Self {
        self.on_done.push(branch);
        self
    }

    /// Branch taken when the invocation fails.
    pub fn on_error(mut self, branch: Branch<O>) -> Self {
        self.on_error.push(branch);
        self
    }
}
