//! Builder for constructing machine definitions.

use super::error::{BuildError, DefinitionIssue};
use super::state::{KindSpec, StateBuilder};
use super::transition::{Branch, TransitionBuilder};
use crate::core::{done_invoke, error_invoke, Context, NodeId, StateKind};
use crate::effects::{Candidate, Transition, Trigger};
use crate::machine::{Machine, StateNode};
use std::collections::HashMap;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

type Check = Validation<(), NonEmptyVec<DefinitionIssue>>;

/// Builder for constructing machine definitions with a fluent API.
///
/// Validation accumulates every problem in the definition and reports them
/// together.
///
/// # Example
///
/// ```rust
/// use parley::builder::{MachineBuilder, StateBuilder};
///
/// let machine = MachineBuilder::<()>::new("root")
///     .state(StateBuilder::new("idle").on("click", "init"))
///     .state(StateBuilder::new("init"))
///     .build()
///     .unwrap();
///
/// assert!(machine.lookup("init").is_some());
/// ```
pub struct MachineBuilder<O> {
    id: String,
    parallel: bool,
    initial: Option<String>,
    context: Context,
    states: Vec<StateBuilder<O>>,
    transitions: Vec<TransitionBuilder<O>>,
}

impl<O> MachineBuilder<O> {
    /// Create a builder for a machine whose root is named `id`.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parallel: false,
            initial: None,
            context: Context::new(),
            states: Vec::new(),
            transitions: Vec::new(),
        }
    }

    /// Make the root parallel: every top-level state is a region.
    pub fn parallel(mut self) -> Self {
        self.parallel = true;
        self
    }

    pub fn initial(mut self, key: impl Into<String>) -> Self {
        self.initial = Some(key.into());
        self
    }

    /// Context the interpreter starts with.
    pub fn context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    pub fn state(mut self, state: StateBuilder<O>) -> Self {
        self.states.push(state);
        self
    }

    /// Add several top-level states at once.
    pub fn states(mut self, states: impl IntoIterator<Item = StateBuilder<O>>) -> Self {
        self.states.extend(states);
        self
    }

    /// Add a transition declared on the root.
    pub fn transition(mut self, transition: TransitionBuilder<O>) -> Self {
        self.transitions.push(transition);
        self
    }

    /// Build the machine.
    ///
    /// Returns every definition issue found, not just the first.
    pub fn build(self) -> Result<Machine<O>, BuildError> {
        if self.states.is_empty() {
            return Err(BuildError::NoStates);
        }

        let mut root = StateBuilder::new(self.id.clone());
        root.kind = if self.parallel {
            KindSpec::Parallel
        } else {
            KindSpec::Auto
        };
        root.initial = self.initial;
        root.children = self.states;
        root.transitions = self.transitions;

        let mut flats = Vec::new();
        flatten(root, None, 0, &mut flats);

        let mut checks: Vec<Check> = Vec::new();
        let mut index = HashMap::with_capacity(flats.len());
        for (i, flat) in flats.iter().enumerate() {
            checks.push(check_key(&flat.node.key));
            if index.insert(flat.path.clone(), NodeId(i)).is_some() {
                checks.push(Validation::fail(DefinitionIssue::DuplicateState(
                    flat.path.clone(),
                )));
            }
        }

        let kinds: Vec<StateKind> = (0..flats.len())
            .map(|i| resolve_kind(&flats, i, &mut checks))
            .collect();

        let scope = Scope {
            machine_id: &self.id,
            index: &index,
        };
        let mut issues = Vec::new();
        let mut transitions = Vec::with_capacity(flats.len());
        for (i, flat) in flats.iter_mut().enumerate() {
            let source = NodeId(i);
            let mut built = Vec::new();
            for builder in std::mem::take(&mut flat.node.transitions) {
                if let Some(t) = scope.transition(source, &flat.path, builder, &mut issues) {
                    built.push(t);
                }
            }
            built.extend(completion_transitions(&scope, source, flat, &mut issues));
            transitions.push(built);
        }
        checks.extend(issues.into_iter().map(|issue| -> Check { Validation::fail(issue) }));

        match Validation::all_vec(checks).map(|_| ()) {
            Validation::Success(()) => {}
            Validation::Failure(errors) => {
                return Err(BuildError::Invalid(errors.iter().cloned().collect()));
            }
        }

        let nodes = flats
            .into_iter()
            .zip(kinds)
            .zip(transitions)
            .map(|((flat, kind), transitions)| StateNode {
                id: flat.path,
                key: flat.node.key,
                kind,
                parent: flat.parent,
                children: flat.children,
                depth: flat.depth,
                entry: flat.node.entry,
                exit: flat.node.exit,
                transitions,
                invoke: flat.node.invoke,
            })
            .collect();

        Ok(Machine {
            id: self.id,
            nodes,
            index,
            initial_context: self.context,
        })
    }
}

/// A state builder placed in the arena.
struct Flat<O> {
    path: String,
    parent: Option<NodeId>,
    depth: usize,
    children: Vec<NodeId>,
    node: StateBuilder<O>,
}

fn flatten<O>(
    mut node: StateBuilder<O>,
    parent: Option<NodeId>,
    depth: usize,
    out: &mut Vec<Flat<O>>,
) -> NodeId {
    let id = NodeId(out.len());
    let path = match parent {
        None => node.key.clone(),
        Some(p) if p.0 == 0 => node.key.clone(),
        Some(p) => format!("{}.{}", out[p.0].path, node.key),
    };
    let children = std::mem::take(&mut node.children);
    out.push(Flat {
        path,
        parent,
        depth,
        children: Vec::new(),
        node,
    });

    let child_ids = children
        .into_iter()
        .map(|child| flatten(child, Some(id), depth + 1, out))
        .collect();
    out[id.0].children = child_ids;
    id
}

fn check_key(key: &str) -> Check {
    if key.is_empty() || key.contains('.') || key.contains('#') {
        Validation::fail(DefinitionIssue::InvalidKey(key.to_string()))
    } else {
        Validation::success(())
    }
}

fn resolve_kind<O>(flats: &[Flat<O>], i: usize, checks: &mut Vec<Check>) -> StateKind {
    let flat = &flats[i];
    let has_children = !flat.children.is_empty();
    match flat.node.kind {
        KindSpec::Final => {
            if has_children {
                checks.push(Validation::fail(DefinitionIssue::FinalWithChildren(
                    flat.path.clone(),
                )));
            }
            StateKind::Final
        }
        KindSpec::Parallel => {
            if !has_children {
                checks.push(Validation::fail(DefinitionIssue::EmptyParallel(
                    flat.path.clone(),
                )));
            }
            for region in &flat.children {
                let region = &flats[region.0];
                if matches!(region.node.kind, KindSpec::Final) {
                    checks.push(Validation::fail(DefinitionIssue::FinalRegion(
                        region.path.clone(),
                    )));
                }
            }
            StateKind::Parallel
        }
        KindSpec::Auto if !has_children => {
            if flat.node.initial.is_some() {
                checks.push(Validation::fail(DefinitionIssue::InitialWithoutChildren(
                    flat.path.clone(),
                )));
            }
            StateKind::Atomic
        }
        KindSpec::Auto => {
            let initial = match &flat.node.initial {
                None => Some(flat.children[0]),
                Some(key) => flat
                    .children
                    .iter()
                    .copied()
                    .find(|c| flats[c.0].node.key == *key),
            };
            match initial {
                Some(initial) => StateKind::Compound { initial },
                None => {
                    checks.push(Validation::fail(DefinitionIssue::UnknownInitial {
                        state: flat.path.clone(),
                        initial: flat.node.initial.clone().unwrap_or_default(),
                    }));
                    StateKind::Compound {
                        initial: flat.children[0],
                    }
                }
            }
        }
    }
}

/// Resolves target strings against the arena.
struct Scope<'a> {
    machine_id: &'a str,
    index: &'a HashMap<String, NodeId>,
}

impl Scope<'_> {
    fn target_path(&self, source_path: &str, is_root: bool, target: &str) -> String {
        if let Some(absolute) = target.strip_prefix('#') {
            if absolute == self.machine_id {
                return absolute.to_string();
            }
            let prefix = format!("{}.", self.machine_id);
            return absolute.strip_prefix(&prefix).unwrap_or(absolute).to_string();
        }
        if let Some(child) = target.strip_prefix('.') {
            return if is_root {
                child.to_string()
            } else {
                format!("{source_path}.{child}")
            };
        }
        match source_path.rsplit_once('.') {
            Some((parent, _)) if !is_root => format!("{parent}.{target}"),
            _ => target.to_string(),
        }
    }

    fn transition<O>(
        &self,
        source: NodeId,
        source_path: &str,
        builder: TransitionBuilder<O>,
        issues: &mut Vec<DefinitionIssue>,
    ) -> Option<Transition<O>> {
        let (trigger, guard, branches) = builder.into_parts();
        let Some(trigger) = trigger else {
            issues.push(DefinitionIssue::MissingTrigger(source_path.to_string()));
            return None;
        };
        self.from_branches(source, source_path, trigger, guard, branches, issues)
    }

    fn from_branches<O>(
        &self,
        source: NodeId,
        source_path: &str,
        trigger: Trigger,
        guard: Option<crate::core::Guard>,
        branches: Vec<Branch<O>>,
        issues: &mut Vec<DefinitionIssue>,
    ) -> Option<Transition<O>> {
        if branches.is_empty() {
            issues.push(DefinitionIssue::EmptyTransition {
                state: source_path.to_string(),
                event: trigger.to_string(),
            });
            return None;
        }

        let is_root = source.0 == 0;
        let before = issues.len();
        let candidates = branches
            .into_iter()
            .map(|branch| {
                let relative_only = !branch.targets.is_empty()
                    && branch.targets.iter().all(|t| t.starts_with('.'));
                let targets = branch
                    .targets
                    .iter()
                    .filter_map(|target| {
                        let path = self.target_path(source_path, is_root, target);
                        let resolved = self.index.get(&path).copied();
                        if resolved.is_none() {
                            issues.push(DefinitionIssue::UnknownTarget {
                                state: source_path.to_string(),
                                event: trigger.to_string(),
                                target: target.clone(),
                            });
                        }
                        resolved
                    })
                    .collect();
                Candidate {
                    guard: branch.guard,
                    targets,
                    actions: branch.actions,
                    internal: branch.internal.unwrap_or(relative_only),
                }
            })
            .collect();

        (issues.len() == before).then_some(Transition {
            source,
            trigger,
            guard,
            candidates,
        })
    }
}

/// Transitions handling `done.invoke.<src>` and `error.invoke.<src>`.
fn completion_transitions<O>(
    scope: &Scope<'_>,
    source: NodeId,
    flat: &mut Flat<O>,
    issues: &mut Vec<DefinitionIssue>,
) -> Vec<Transition<O>> {
    let on_done = std::mem::take(&mut flat.node.on_done);
    let on_error = std::mem::take(&mut flat.node.on_error);
    if on_done.is_empty() && on_error.is_empty() {
        return Vec::new();
    }
    let Some(src) = flat.node.invoke.as_ref().map(|i| i.src.clone()) else {
        issues.push(DefinitionIssue::DoneWithoutInvoke(flat.path.clone()));
        return Vec::new();
    };

    [(done_invoke(&src), on_done), (error_invoke(&src), on_error)]
        .into_iter()
        .filter(|(_, branches)| !branches.is_empty())
        .filter_map(|(event, branches)| {
            scope.from_branches(
                source,
                &flat.path,
                Trigger::Event(event),
                None,
                branches,
                issues,
            )
        })
        .collect()
}
