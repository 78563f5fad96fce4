//! Immutable machine definitions.

use crate::core::{Context, NodeId, StateKind};
use crate::effects::{Action, InvokeDef, Transition};
use std::collections::HashMap;
use std::fmt;

/// One node of the state tree.
pub struct StateNode<O> {
    pub(crate) id: String,
    pub(crate) key: String,
    pub(crate) kind: StateKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) depth: usize,
    pub(crate) entry: Vec<Action<O>>,
    pub(crate) exit: Vec<Action<O>>,
    pub(crate) transitions: Vec<Transition<O>>,
    pub(crate) invoke: Option<InvokeDef>,
}

impl<O> StateNode<O> {
    /// Dot-separated path below the root, e.g. `dm.menu.prompt`.
    ///
    /// The root's id is the machine id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Last segment of the path.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kind(&self) -> StateKind {
        self.kind
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children of a compound node or regions of a parallel node, in
    /// declaration order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn entry(&self) -> &[Action<O>] {
        &self.entry
    }

    pub fn exit(&self) -> &[Action<O>] {
        &self.exit
    }

    pub fn transitions(&self) -> &[Transition<O>] {
        &self.transitions
    }

    pub fn invoke(&self) -> Option<&InvokeDef> {
        self.invoke.as_ref()
    }
}

impl<O> fmt::Debug for StateNode<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateNode")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("children", &self.children)
            .field("transitions", &self.transitions.len())
            .field("invoke", &self.invoke)
            .finish()
    }
}

/// A validated statechart definition.
///
/// Nodes live in an arena in document order; index 0 is the root. A machine
/// is built once (see [`crate::builder::MachineBuilder`]) and shared by every
/// interpreter through an `Arc`.
pub struct Machine<O> {
    pub(crate) id: String,
    pub(crate) nodes: Vec<StateNode<O>>,
    pub(crate) index: HashMap<String, NodeId>,
    pub(crate) initial_context: Context,
}

impl<O> Machine<O> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &StateNode<O> {
        &self.nodes[id.0]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &StateNode<O>)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn initial_context(&self) -> &Context {
        &self.initial_context
    }

    /// Find a node by path. The machine id names the root.
    pub fn lookup(&self, path: &str) -> Option<NodeId> {
        self.index.get(path).copied()
    }

    pub fn path(&self, id: NodeId) -> &str {
        &self.nodes[id.0].id
    }

    /// Proper ancestors of `id`, innermost first.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_, O> {
        Ancestors {
            machine: self,
            next: self.node(id).parent,
        }
    }

    /// Whether `node` is a proper descendant of `ancestor`.
    pub fn is_descendant(&self, node: NodeId, ancestor: NodeId) -> bool {
        self.ancestors(node).any(|a| a == ancestor)
    }
}

impl<O> fmt::Debug for Machine<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Machine")
            .field("id", &self.id)
            .field("nodes", &self.nodes)
            .finish()
    }
}

/// Iterator over the proper ancestors of a node.
pub struct Ancestors<'m, O> {
    machine: &'m Machine<O>,
    next: Option<NodeId>,
}

impl<O> Iterator for Ancestors<'_, O> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.machine.node(current).parent;
        Some(current)
    }
}
