//! Transition selection and exit/entry set computation.

use super::configuration::Configuration;
use super::definition::Machine;
use crate::core::{Context, Event, NodeId, StateKind};
use crate::effects::{Candidate, GuardError, Transition};
use std::collections::BTreeSet;

/// A transition chosen to fire in the current microstep.
pub(crate) struct Selected<'m, O> {
    pub transition: &'m Transition<O>,
    pub candidate: &'m Candidate<O>,
    /// Node the transition is scoped to. Nothing outside it is exited or
    /// entered. For targetless transitions this is the source.
    pub domain: NodeId,
    /// Active states the transition exits, unordered.
    pub exits: BTreeSet<NodeId>,
}

impl<O> Selected<'_, O> {
    pub fn is_targetless(&self) -> bool {
        self.candidate.is_targetless()
    }
}

/// A guard failure together with the node that declared it.
pub(crate) struct ResolveError {
    pub source: NodeId,
    pub error: GuardError,
}

/// Select the transitions enabled by `event`, or the eventless transitions
/// when `eventless` is set.
///
/// For each active leaf in document order the leaf and then its ancestors are
/// searched; the innermost node with an enabled transition wins for that
/// leaf. A transition reached from several leaves is selected once. When two
/// selections would exit a common state the earlier one is kept.
pub(crate) fn resolve<'m, O>(
    machine: &'m Machine<O>,
    config: &Configuration,
    context: &Context,
    event: &Event,
    eventless: bool,
    errors: &mut Vec<ResolveError>,
) -> Vec<Selected<'m, O>> {
    let trigger_event = if eventless { None } else { Some(event) };
    let mut selected: Vec<Selected<'m, O>> = Vec::new();

    for leaf in config.leaves(machine) {
        let Some((transition, candidate)) =
            first_enabled(machine, leaf, context, event, trigger_event, errors)
        else {
            continue;
        };

        if selected
            .iter()
            .any(|s| std::ptr::eq(s.transition, transition))
        {
            continue;
        }

        let domain = transition_domain(machine, transition.source, candidate);
        let exits = if candidate.is_targetless() {
            BTreeSet::new()
        } else {
            config
                .iter()
                .filter(|id| machine.is_descendant(*id, domain))
                .collect()
        };

        if selected
            .iter()
            .any(|s| !s.exits.is_disjoint(&exits))
        {
            continue;
        }

        selected.push(Selected {
            transition,
            candidate,
            domain,
            exits,
        });
    }

    selected
}

fn first_enabled<'m, O>(
    machine: &'m Machine<O>,
    leaf: NodeId,
    context: &Context,
    event: &Event,
    trigger_event: Option<&Event>,
    errors: &mut Vec<ResolveError>,
) -> Option<(&'m Transition<O>, &'m Candidate<O>)> {
    std::iter::once(leaf)
        .chain(machine.ancestors(leaf))
        .find_map(|node_id| {
            machine
                .node(node_id)
                .transitions()
                .iter()
                .filter(|t| t.trigger.matches(trigger_event))
                .find_map(|t| {
                    let mut guard_errors = Vec::new();
                    let chosen = t.select(context, event, &mut guard_errors);
                    errors.extend(guard_errors.into_iter().map(|error| ResolveError {
                        source: node_id,
                        error,
                    }));
                    chosen.map(|index| (t, &t.candidates[index]))
                })
        })
}

/// The node a transition is scoped to.
///
/// An internal candidate whose targets all lie inside a compound source is
/// scoped to the source. Otherwise the domain is the nearest compound proper
/// ancestor of the source that contains every target, falling back to the
/// root.
pub(crate) fn transition_domain<O>(
    machine: &Machine<O>,
    source: NodeId,
    candidate: &Candidate<O>,
) -> NodeId {
    if candidate.is_targetless() {
        return source;
    }

    let source_is_compound = machine.node(source).kind().is_compound();
    if candidate.internal
        && source_is_compound
        && candidate
            .targets
            .iter()
            .all(|t| machine.is_descendant(*t, source))
    {
        return source;
    }

    machine
        .ancestors(source)
        .find(|ancestor| {
            machine.node(*ancestor).kind().is_compound()
                && candidate
                    .targets
                    .iter()
                    .all(|t| machine.is_descendant(*t, *ancestor))
        })
        .unwrap_or_else(|| machine.root())
}

/// Order in which the states of `exits` are exited: innermost first, regions
/// of a parallel node in declaration order.
pub(crate) fn exit_order<O>(machine: &Machine<O>, exits: &BTreeSet<NodeId>) -> Vec<NodeId> {
    let mut order = Vec::with_capacity(exits.len());
    post_order(machine, machine.root(), exits, &mut order);
    order
}

fn post_order<O>(
    machine: &Machine<O>,
    id: NodeId,
    exits: &BTreeSet<NodeId>,
    order: &mut Vec<NodeId>,
) {
    for child in machine.node(id).children() {
        post_order(machine, *child, exits, order);
    }
    if exits.contains(&id) {
        order.push(id);
    }
}

/// States entered when a transition scoped to `domain` targets `targets`.
///
/// With no domain the root itself is entered, as `start()` does. The result
/// is completed with initial children of compound nodes and every region of
/// parallel nodes, and iterates in document order (outermost first).
pub(crate) fn entry_set<O>(
    machine: &Machine<O>,
    domain: Option<NodeId>,
    targets: &[NodeId],
) -> BTreeSet<NodeId> {
    let mut entries = BTreeSet::new();

    match domain {
        None => {
            entries.insert(machine.root());
        }
        Some(domain) => {
            for target in targets {
                entries.insert(*target);
                for ancestor in machine.ancestors(*target) {
                    if ancestor == domain {
                        break;
                    }
                    entries.insert(ancestor);
                }
            }
            // Regions of a parallel domain were exited with it.
            if machine.node(domain).kind().is_parallel() {
                entries.extend(machine.node(domain).children().iter().copied());
            }
        }
    }

    let mut pending: Vec<NodeId> = entries.iter().copied().collect();
    while let Some(id) = pending.pop() {
        let node = machine.node(id);
        match node.kind() {
            StateKind::Compound { initial } => {
                if !node.children().iter().any(|c| entries.contains(c)) {
                    entries.insert(initial);
                    pending.push(initial);
                }
            }
            StateKind::Parallel => {
                for child in node.children() {
                    if entries.insert(*child) {
                        pending.push(*child);
                    }
                }
            }
            StateKind::Atomic | StateKind::Final => {}
        }
    }

    entries
}
