//! Interactive editing of a [`WorkflowGraph`].
//!
//! Every operation either applies completely or, when it names an unknown
//! id, changes nothing and returns `false` / `None`.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use nodes::{NodeStatus, StepType};
use serde_json::Value;
use tracing::debug;

use crate::graph::WorkflowGraph;
use crate::models::{connection_id, Connection, Node, Position};

static NODE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Process-unique node id: creation time plus a monotonic counter.
fn next_node_id() -> String {
    let seq = NODE_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("node_{}_{}", Utc::now().timestamp_millis(), seq)
}

impl WorkflowGraph {
    /// Create an idle, unconnected node of `step_type` at `(x, y)`.
    pub fn add_node(&mut self, step_type: StepType, x: f64, y: f64) -> String {
        let mut id = next_node_id();
        // Loaded steps may already use the same naming scheme.
        while self.contains(&id) {
            id = next_node_id();
        }

        self.nodes.push(Node {
            id: id.clone(),
            step_type,
            name: step_type.default_name(),
            position: Position::new(x, y),
            config: Value::Object(Default::default()),
            status: NodeStatus::Idle,
        });
        debug!("added node '{id}' ({step_type})");
        id
    }

    /// Replace the position of node `id`.
    pub fn move_node(&mut self, id: &str, x: f64, y: f64) -> bool {
        match self.nodes.iter_mut().find(|n| n.id == id) {
            Some(node) => {
                node.position = Position::new(x, y);
                true
            }
            None => false,
        }
    }

    /// Remove node `id` and every connection touching it.  Deleting the start
    /// step leaves the graph without one.
    ///
    /// Returns `false` (and changes nothing) if the node is already gone.
    pub fn delete_node(&mut self, id: &str) -> bool {
        let Some(index) = self.nodes.iter().position(|n| n.id == id) else {
            return false;
        };
        self.nodes.remove(index);
        self.connections.retain(|c| !c.touches(id));
        if self.start_step_id.as_deref() == Some(id) {
            self.start_step_id = None;
        }
        debug!("deleted node '{id}'");
        true
    }

    /// Replace the display name of node `id`.
    pub fn rename_node(&mut self, id: &str, name: impl Into<String>) -> bool {
        match self.nodes.iter_mut().find(|n| n.id == id) {
            Some(node) => {
                node.name = name.into();
                true
            }
            None => false,
        }
    }

    /// Shallow-merge the keys of `partial` into node `id`'s config.
    ///
    /// A non-object `partial` (or a non-object existing config) replaces the
    /// config wholesale.
    pub fn update_config(&mut self, id: &str, partial: Value) -> bool {
        let Some(node) = self.nodes.iter_mut().find(|n| n.id == id) else {
            return false;
        };
        match (&mut node.config, partial) {
            (Value::Object(existing), Value::Object(patch)) => {
                for (key, value) in patch {
                    existing.insert(key, value);
                }
            }
            (config, other) => *config = other,
        }
        true
    }

    /// Add the connection `from → to`.
    ///
    /// Returns the new connection id, or `None` if either endpoint is unknown
    /// or the connection already exists.
    pub fn connect(&mut self, from: &str, to: &str) -> Option<String> {
        if !self.contains(from) || !self.contains(to) {
            return None;
        }
        let id = connection_id(from, to);
        if self.connection(&id).is_some() {
            return None;
        }
        self.connections.push(Connection::new(from, to));
        Some(id)
    }

    /// Remove the connection with `connection_id`.
    pub fn disconnect(&mut self, connection_id: &str) -> bool {
        let before = self.connections.len();
        self.connections.retain(|c| c.id != connection_id);
        self.connections.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chain() -> WorkflowGraph {
        let mut graph = WorkflowGraph::new("wf", "chain");
        let a = graph.add_node(StepType::Input, 0.0, 0.0);
        let b = graph.add_node(StepType::Processing, 200.0, 0.0);
        let c = graph.add_node(StepType::Output, 400.0, 0.0);
        graph.connect(&a, &b).unwrap();
        graph.connect(&b, &c).unwrap();
        graph
    }

    #[test]
    fn add_node_creates_idle_unconnected_node() {
        let mut graph = WorkflowGraph::new("wf", "empty");
        let id = graph.add_node(StepType::Validation, 10.0, 20.0);

        let node = graph.node(&id).unwrap();
        assert_eq!(node.name, "New Validate");
        assert_eq!(node.status, NodeStatus::Idle);
        assert_eq!(node.position, Position::new(10.0, 20.0));
        assert_eq!(graph.outgoing(&id).count(), 0);
    }

    #[test]
    fn generated_ids_are_unique() {
        let mut graph = WorkflowGraph::new("wf", "many");
        let ids: Vec<_> = (0..50).map(|_| graph.add_node(StepType::Input, 0.0, 0.0)).collect();
        let unique: std::collections::HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn add_then_delete_restores_the_graph() {
        let mut graph = chain();
        let before = graph.clone();

        let id = graph.add_node(StepType::Condition, 5.0, 5.0);
        assert!(graph.delete_node(&id));
        assert_eq!(graph, before);
    }

    #[test]
    fn delete_removes_every_incident_connection() {
        let mut graph = chain();
        let middle = graph.nodes()[1].id.clone();

        assert!(graph.delete_node(&middle));
        assert!(graph.connections().iter().all(|c| !c.touches(&middle)));
        assert!(graph.connections().is_empty());

        // Idempotent.
        let after = graph.clone();
        assert!(!graph.delete_node(&middle));
        assert_eq!(graph, after);
    }

    #[test]
    fn deleting_the_start_step_clears_it() {
        let mut graph = chain();
        let first = graph.nodes()[0].id.clone();
        let second = graph.nodes()[1].id.clone();
        graph.start_step_id = Some(first.clone());

        assert!(graph.delete_node(&second));
        assert_eq!(graph.start_step_id(), Some(first.as_str()));

        assert!(graph.delete_node(&first));
        assert_eq!(graph.start_step_id(), None);
        assert_eq!(graph.to_definition().start_step_id, None);
    }

    #[test]
    fn unknown_ids_change_nothing() {
        let mut graph = chain();
        let before = graph.clone();

        assert!(!graph.move_node("nope", 1.0, 1.0));
        assert!(!graph.rename_node("nope", "x"));
        assert!(!graph.update_config("nope", json!({ "k": 1 })));
        assert_eq!(graph.connect("nope", &before.nodes()[0].id), None);
        assert!(!graph.disconnect("nope-nope"));
        assert_eq!(graph, before);
    }

    #[test]
    fn rename_and_config_leave_status_and_edges_alone() {
        let mut graph = chain();
        let id = graph.nodes()[0].id.clone();
        graph.set_status(&id, NodeStatus::Running);

        assert!(graph.rename_node(&id, "Upload"));
        assert!(graph.update_config(&id, json!({ "format": "pdf" })));
        assert!(graph.update_config(&id, json!({ "max_mb": 10 })));

        let node = graph.node(&id).unwrap();
        assert_eq!(node.name, "Upload");
        assert_eq!(node.config, json!({ "format": "pdf", "max_mb": 10 }));
        assert_eq!(node.status, NodeStatus::Running);
        assert_eq!(graph.outgoing(&id).count(), 1);
    }

    #[test]
    fn move_replaces_position() {
        let mut graph = chain();
        let id = graph.nodes()[2].id.clone();
        assert!(graph.move_node(&id, -3.0, 9.5));
        assert_eq!(graph.node(&id).unwrap().position, Position::new(-3.0, 9.5));
    }

    #[test]
    fn connect_rejects_duplicates_and_disconnect_removes() {
        let mut graph = chain();
        let a = graph.nodes()[0].id.clone();
        let c = graph.nodes()[2].id.clone();
        let b = graph.nodes()[1].id.clone();

        assert_eq!(graph.connect(&a, &b), None);
        let id = graph.connect(&a, &c).unwrap();
        assert_eq!(graph.connections().len(), 3);
        assert!(graph.disconnect(&id));
        assert_eq!(graph.connections().len(), 2);
    }
}
