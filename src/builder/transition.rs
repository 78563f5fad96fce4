//! Builders for transitions and their branches.

use crate::core::Guard;
use crate::effects::{Action, Trigger};

/// One candidate of a transition, before its targets are resolved.
///
/// Target syntax, relative to the transition's source state:
///
/// - `"#root.asrtts.idle"` or `"#asrtts.idle"`: absolute path
/// - `".nomatch"`: a child of the source (internal by default)
/// - `"idle"`: a sibling of the source
pub struct Branch<O> {
    pub(crate) targets: Vec<String>,
    pub(crate) guard: Option<Guard>,
    pub(crate) actions: Vec<Action<O>>,
    pub(crate) internal: Option<bool>,
}

impl<O> Branch<O> {
    /// A branch entering `target`.
    pub fn to(target: impl Into<String>) -> Self {
        Self {
            targets: vec![target.into()],
            ..Self::targetless()
        }
    }

    /// A branch that only runs its actions.
    pub fn targetless() -> Self {
        Self {
            targets: Vec::new(),
            guard: None,
            actions: Vec::new(),
            internal: None,
        }
    }

    /// Add another target, for entering states in several regions at once.
    pub fn also(mut self, target: impl Into<String>) -> Self {
        self.targets.push(target.into());
        self
    }

    pub fn when(mut self, guard: Guard) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn action(mut self, action: Action<O>) -> Self {
        self.actions.push(action);
        self
    }

    /// Do not exit the source when every target is one of its descendants.
    pub fn internal(mut self) -> Self {
        self.internal = Some(true);
        self
    }

    /// Exit and re-enter the source even when targeting its descendants.
    pub fn external(mut self) -> Self {
        self.internal = Some(false);
        self
    }

    fn is_blank(&self) -> bool {
        self.targets.is_empty() && self.guard.is_none() && self.actions.is_empty()
    }
}

/// Builder for constructing transitions with a fluent API.
///
/// `.when`, `.to` and `.action` shape a single implicit branch; `.branch`
/// appends explicit ones for multi-way choices.
///
/// # Example
///
/// ```rust
/// use parley::builder::{Branch, TransitionBuilder};
/// use parley::core::{Context, Event, Guard};
///
/// let wants_meeting = Guard::new(|ctx: &Context, _: &Event| {
///     ctx.get_str("choice") == Some("booking a meeting")
/// });
///
/// let recognised: TransitionBuilder<()> = TransitionBuilder::on("recognised")
///     .branch(Branch::to("welcome").when(wants_meeting))
///     .branch(Branch::to(".nomatch"));
/// ```
pub struct TransitionBuilder<O> {
    pub(crate) trigger: Option<Trigger>,
    pub(crate) guard: Option<Guard>,
    pub(crate) branches: Vec<Branch<O>>,
    current: Option<Branch<O>>,
}

impl<O> TransitionBuilder<O> {
    /// Create a transition builder without a trigger.
    pub fn new() -> Self {
        Self {
            trigger: None,
            guard: None,
            branches: Vec::new(),
            current: None,
        }
    }

    /// A transition taken on event `name`.
    pub fn on(name: impl Into<String>) -> Self {
        Self::new().trigger(Trigger::Event(name.into()))
    }

    /// An eventless transition.
    pub fn always() -> Self {
        Self::new().trigger(Trigger::Always)
    }

    pub fn trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    /// Guard shared by every branch, checked before any of them.
    pub fn guard(mut self, guard: Guard) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Guard of the implicit branch.
    pub fn when(self, guard: Guard) -> Self {
        self.shape(|b| b.when(guard))
    }

    /// Target of the implicit branch.
    pub fn to(self, target: impl Into<String>) -> Self {
        let target = target.into();
        self.shape(move |mut b| {
            b.targets.push(target);
            b
        })
    }

    /// Action of the implicit branch.
    pub fn action(self, action: Action<O>) -> Self {
        self.shape(|b| b.action(action))
    }

    pub fn internal(self) -> Self {
        self.shape(Branch::internal)
    }

    pub fn external(self) -> Self {
        self.shape(Branch::external)
    }

    /// Append an explicit branch after any implicit one.
    pub fn branch(mut self, branch: Branch<O>) -> Self {
        self.flush();
        self.branches.push(branch);
        self
    }

    fn flush(&mut self) {
        if let Some(current) = self.current.take() {
            if !current.is_blank() {
                self.branches.push(current);
            }
        }
    }

    fn shape(mut self, f: impl FnOnce(Branch<O>) -> Branch<O>) -> Self {
        let current = self.current.take().unwrap_or_else(Branch::targetless);
        self.current = Some(f(current));
        self
    }

    /// All branches in declaration order, blank implicit branch dropped.
    pub(crate) fn into_parts(mut self) -> (Option<Trigger>, Option<Guard>, Vec<Branch<O>>) {
        self.flush();
        (self.trigger, self.guard, self.branches)
    }
}

impl<O> Default for TransitionBuilder<O> {
    fn default() -> Self {
        Self::new()
    }
}
