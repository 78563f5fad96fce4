//! The set of active states.

use super::definition::Machine;
use crate::core::{NodeId, StateKind};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use thiserror::Error;

/// A broken structural invariant of a configuration.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("Root is not active")]
    InactiveRoot,

    #[error("State '{0}' is active but its parent is not")]
    Orphan(String),

    #[error("Compound state '{state}' has {active} active children")]
    ActiveChildren { state: String, active: usize },

    #[error("Parallel state '{state}' has {active} of {regions} regions active")]
    MissingRegions {
        state: String,
        active: usize,
        regions: usize,
    },
}

/// Active states of one interpreter.
///
/// Ids iterate in document order, so parents come before their children.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Configuration {
    active: BTreeSet<NodeId>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.active.contains(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.active.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub(crate) fn insert(&mut self, id: NodeId) {
        self.active.insert(id);
    }

    pub(crate) fn remove(&mut self, id: NodeId) {
        self.active.remove(&id);
    }

    /// Active atomic and final states, in document order.
    pub fn leaves<O>(&self, machine: &Machine<O>) -> Vec<NodeId> {
        self.iter()
            .filter(|id| machine.node(*id).kind().is_leaf())
            .collect()
    }

    /// Paths of the active leaves, in document order.
    pub fn leaf_paths<O>(&self, machine: &Machine<O>) -> Vec<String> {
        self.leaves(machine)
            .into_iter()
            .map(|id| machine.path(id).to_string())
            .collect()
    }

    /// Whether the state at `path` is active. Unknown paths never match.
    pub fn matches<O>(&self, machine: &Machine<O>, path: &str) -> bool {
        machine.lookup(path).is_some_and(|id| self.contains(id))
    }

    /// The active child of compound node `id`, if any.
    pub fn active_child<O>(&self, machine: &Machine<O>, id: NodeId) -> Option<NodeId> {
        machine
            .node(id)
            .children()
            .iter()
            .copied()
            .find(|child| self.contains(*child))
    }

    /// Nested JSON value of the configuration.
    ///
    /// A compound node maps to its active child's key (or an object keyed by
    /// it when the child has children of its own); a parallel node maps every
    /// region key to that region's value.
    pub fn value<O>(&self, machine: &Machine<O>) -> Value {
        self.value_of(machine, machine.root())
    }

    fn value_of<O>(&self, machine: &Machine<O>, id: NodeId) -> Value {
        let node = machine.node(id);
        match node.kind() {
            StateKind::Atomic | StateKind::Final => Value::Object(Map::new()),
            StateKind::Compound { .. } => match self.active_child(machine, id) {
                None => Value::Null,
                Some(child) if machine.node(child).kind().is_leaf() => {
                    Value::String(machine.node(child).key().to_string())
                }
                Some(child) => {
                    let mut map = Map::new();
                    map.insert(
                        machine.node(child).key().to_string(),
                        self.value_of(machine, child),
                    );
                    Value::Object(map)
                }
            },
            StateKind::Parallel => {
                let map = node
                    .children()
                    .iter()
                    .map(|child| {
                        (
                            machine.node(*child).key().to_string(),
                            self.value_of(machine, *child),
                        )
                    })
                    .collect();
                Value::Object(map)
            }
        }
    }

    /// Check the structural invariants of an active configuration.
    ///
    /// The root is active, every active non-root node has an active parent,
    /// an active compound node has exactly one active child, an active
    /// parallel node has all regions active.
    pub fn check<O>(&self, machine: &Machine<O>) -> Result<(), ConfigurationError> {
        if !self.contains(machine.root()) {
            return Err(ConfigurationError::InactiveRoot);
        }
        for id in self.iter() {
            let node = machine.node(id);
            if let Some(parent) = node.parent() {
                if !self.contains(parent) {
                    return Err(ConfigurationError::Orphan(node.id().to_string()));
                }
            }
            let active = node
                .children()
                .iter()
                .filter(|child| self.contains(**child))
                .count();
            match node.kind() {
                StateKind::Compound { .. } if active != 1 => {
                    return Err(ConfigurationError::ActiveChildren {
                        state: node.id().to_string(),
                        active,
                    });
                }
                StateKind::Parallel if active != node.children().len() => {
                    return Err(ConfigurationError::MissingRegions {
                        state: node.id().to_string(),
                        active,
                        regions: node.children().len(),
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{MachineBuilder, StateBuilder};
    use serde_json::json;

    fn machine() -> Machine<()> {
        MachineBuilder::new("root")
            .parallel()
            .state(
                StateBuilder::new("dm")
                    .state(StateBuilder::new("idle"))
                    .state(StateBuilder::new("menu").state(StateBuilder::new("prompt"))),
            )
            .state(StateBuilder::new("asrtts").state(StateBuilder::new("idle")))
            .build()
            .unwrap()
    }

    fn activate(machine: &Machine<()>, paths: &[&str]) -> Configuration {
        let mut config = Configuration::new();
        for path in paths {
            config.insert(machine.lookup(path).unwrap());
        }
        config
    }

    #[test]
    fn leaves_one_per_region() {
        let m = machine();
        let config = activate(&m, &["root", "dm", "dm.menu", "dm.menu.prompt", "asrtts", "asrtts.idle"]);

        assert_eq!(config.leaf_paths(&m), vec!["dm.menu.prompt", "asrtts.idle"]);
        assert!(config.check(&m).is_ok());
    }

    #[test]
    fn matches_ignores_unknown_paths() {
        let m = machine();
        let config = activate(&m, &["root", "dm", "dm.idle", "asrtts", "asrtts.idle"]);

        assert!(config.matches(&m, "dm.idle"));
        assert!(!config.matches(&m, "dm.menu"));
        assert!(!config.matches(&m, "dm.nowhere"));
    }

    #[test]
    fn value_nests_compound_children() {
        let m = machine();
        let config = activate(&m, &["root", "dm", "dm.menu", "dm.menu.prompt", "asrtts", "asrtts.idle"]);

        assert_eq!(
            config.value(&m),
            json!({ "dm": { "menu": "prompt" }, "asrtts": "idle" })
        );
    }

    #[test]
    fn check_rejects_missing_region() {
        let m = machine();
        let config = activate(&m, &["root", "dm", "dm.idle"]);
        assert_eq!(
            config.check(&m),
            Err(ConfigurationError::MissingRegions {
                state: "root".into(),
                active: 1,
                regions: 2
            })
        );
    }

    #[test]
    fn check_rejects_two_active_children() {
        let m = machine();
        let config = activate(
            &m,
            &["root", "dm", "dm.idle", "dm.menu", "dm.menu.prompt", "asrtts", "asrtts.idle"],
        );
        assert_eq!(
            config.check(&m),
            Err(ConfigurationError::ActiveChildren {
                state: "dm".into(),
                active: 2
            })
        );
    }

    #[test]
    fn check_rejects_orphans() {
        let m = machine();
        let mut config = activate(&m, &["root", "dm", "dm.idle", "asrtts", "asrtts.idle"]);
        config.insert(m.lookup("dm.menu.prompt").unwrap());
        assert_eq!(
            config.check(&m),
            Err(ConfigurationError::Orphan("dm.menu.prompt".into()))
        );
    }
}
