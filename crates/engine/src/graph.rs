//! Graph construction: turn a workflow definition into nodes and connections.
//!
//! Rules enforced:
//! 1. Node IDs must be unique within the graph (later duplicates are dropped).
//! 2. Every connection must reference existing nodes (dangling edges are dropped).
//! 3. At most one connection per `(from, to)` pair.
//! 4. `start_step_id`, when given, must name one of the nodes.
//!
//! Each violation is reported as a [`GraphDiagnostic`]; the build still
//! returns the best-effort graph.  Cycles are allowed.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use nodes::NodeStatus;
use tracing::{debug, warn};

use crate::layout::LayoutStrategy;
use crate::models::{Connection, Node, Position};
use crate::{GraphDiagnostic, WorkflowDefinition};
use client::Step;

// ---------------------------------------------------------------------------
// WorkflowGraph
// ---------------------------------------------------------------------------

/// In-memory node/connection graph for one workflow.
///
/// Fields are private so the node/connection invariants can only be changed
/// through the mutation API in [`crate::mutation`].
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowGraph {
    pub(crate) workflow_id: String,
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) start_step_id: Option<String>,
    pub(crate) nodes: Vec<Node>,
    pub(crate) connections: Vec<Connection>,
}

/// Result of [`build_graph`].
#[derive(Debug, Clone)]
pub struct GraphBuild {
    pub graph: WorkflowGraph,
    pub diagnostics: Vec<GraphDiagnostic>,
}

impl WorkflowGraph {
    /// An empty graph for `workflow_id`.
    pub fn new(workflow_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            name: name.into(),
            description: None,
            start_step_id: None,
            nodes: Vec::new(),
            connections: Vec::new(),
        }
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entry step handed to the service on export, if it is still on the canvas.
    pub fn start_step_id(&self) -> Option<&str> {
        self.start_step_id.as_deref()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn connection(&self, id: &str) -> Option<&Connection> {
        self.connections.iter().find(|c| c.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    /// Connections leaving `node_id`, in declaration order.
    pub fn outgoing<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Connection> + 'a {
        self.connections.iter().filter(move |c| c.from == node_id)
    }

    /// Set every node back to [`NodeStatus::Idle`].
    pub fn reset_statuses(&mut self) {
        for node in &mut self.nodes {
            node.status = NodeStatus::Idle;
        }
    }

    pub(crate) fn set_status(&mut self, id: &str, status: NodeStatus) -> bool {
        match self.nodes.iter_mut().find(|n| n.id == id) {
            Some(node) => {
                node.status = status;
                true
            }
            None => false,
        }
    }

    pub(crate) fn set_animated(&mut self, connection_id: &str, animated: bool) -> bool {
        match self.connections.iter_mut().find(|c| c.id == connection_id) {
            Some(conn) => {
                conn.animated = animated;
                true
            }
            None => false,
        }
    }

    /// Longest-path depth of every node from the roots, in node order.
    ///
    /// Nodes that Kahn's algorithm cannot reach (members of a cycle, or
    /// anything downstream of one) are placed one column past the deepest
    /// reachable node.
    pub fn depths(&self) -> Vec<usize> {
        let index: HashMap<&str, usize> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.as_str(), i))
            .collect();

        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];
        let mut in_degree: Vec<usize> = vec![0; self.nodes.len()];
        for conn in &self.connections {
            let endpoints = (index.get(conn.from.as_str()), index.get(conn.to.as_str()));
            if let (Some(&from), Some(&to)) = endpoints {
                adjacency[from].push(to);
                in_degree[to] += 1;
            }
        }

        // Seed the queue with nodes that have no incoming edges.
        let mut queue: VecDeque<usize> = (0..self.nodes.len())
            .filter(|&i| in_degree[i] == 0)
            .collect();
        let mut depth: Vec<Option<usize>> = vec![None; self.nodes.len()];
        for &root in &queue {
            depth[root] = Some(0);
        }

        while let Some(current) = queue.pop_front() {
            let next_depth = depth[current].unwrap_or(0) + 1;
            for &neighbour in &adjacency[current] {
                let slot = &mut depth[neighbour];
                *slot = Some(slot.map_or(next_depth, |d| d.max(next_depth)));
                in_degree[neighbour] -= 1;
                if in_degree[neighbour] == 0 {
                    queue.push_back(neighbour);
                }
            }
        }

        // Nodes left with in-degree > 0 sit on or behind a cycle.
        let deepest = depth
            .iter()
            .zip(&in_degree)
            .filter(|(_, &deg)| deg == 0)
            .filter_map(|(d, _)| *d)
            .max();
        let overflow = deepest.map_or(0, |d| d + 1);

        depth
            .into_iter()
            .zip(in_degree)
            .map(|(d, deg)| if deg == 0 { d.unwrap_or(0) } else { overflow })
            .collect()
    }

    /// Rebuild a definition from the current graph.
    ///
    /// `next_steps` mirror the current connections and every step carries
    /// its canvas position.
    pub fn to_definition(&self) -> WorkflowDefinition {
        let steps: BTreeMap<String, Step> = self
            .nodes
            .iter()
            .map(|node| {
                let step = Step {
                    id: node.id.clone(),
                    step_type: node.step_type,
                    name: node.name.clone(),
                    x: Some(node.position.x),
                    y: Some(node.position.y),
                    config: node.config.clone(),
                    next_steps: self.outgoing(&node.id).map(|c| c.to.clone()).collect(),
                };
                (node.id.clone(), step)
            })
            .collect();

        WorkflowDefinition {
            id: self.workflow_id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            steps,
            start_step_id: self.start_step_id.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Build
// ---------------------------------------------------------------------------

/// Build the canvas graph for `workflow`.
///
/// Steps without stored coordinates are positioned by `layout`; steps with
/// both `x` and `y` keep them.
pub fn build_graph(workflow: &WorkflowDefinition, layout: &dyn LayoutStrategy) -> GraphBuild {
    let mut diagnostics = Vec::new();

    // -----------------------------------------------------------------------
    // 1. One node per step, unique IDs
    // -----------------------------------------------------------------------
    let mut seen_ids: HashSet<&str> = HashSet::new();
    let mut kept: Vec<&Step> = Vec::with_capacity(workflow.steps.len());
    for step in workflow.steps.values() {
        if !seen_ids.insert(step.id.as_str()) {
            diagnostics.push(GraphDiagnostic::DuplicateNodeId(step.id.clone()));
            continue;
        }
        kept.push(step);
    }

    let nodes: Vec<Node> = kept
        .iter()
        .map(|step| Node {
            id: step.id.clone(),
            step_type: step.step_type,
            name: step.name.clone(),
            position: match (step.x, step.y) {
                (Some(x), Some(y)) => Position::new(x, y),
                _ => Position::default(),
            },
            config: step.config.clone(),
            status: NodeStatus::Idle,
        })
        .collect();

    // -----------------------------------------------------------------------
    // 2. One connection per declared edge with both endpoints present
    // -----------------------------------------------------------------------
    let mut pairs: HashSet<(&str, &str)> = HashSet::new();
    let mut connections = Vec::new();
    for step in &kept {
        for next in &step.next_steps {
            if !seen_ids.contains(next.as_str()) {
                diagnostics.push(GraphDiagnostic::DanglingReference {
                    from: step.id.clone(),
                    to: next.clone(),
                });
                continue;
            }
            if !pairs.insert((step.id.as_str(), next.as_str())) {
                diagnostics.push(GraphDiagnostic::DuplicateConnection {
                    from: step.id.clone(),
                    to: next.clone(),
                });
                continue;
            }
            connections.push(Connection::new(step.id.as_str(), next.as_str()));
        }
    }

    let start_step_id = match &workflow.start_step_id {
        Some(id) if !seen_ids.contains(id.as_str()) => {
            diagnostics.push(GraphDiagnostic::UnknownStartStep(id.clone()));
            None
        }
        other => other.clone(),
    };

    let mut graph = WorkflowGraph {
        workflow_id: workflow.id.clone(),
        name: workflow.name.clone(),
        description: workflow.description.clone(),
        start_step_id,
        nodes,
        connections,
    };

    // -----------------------------------------------------------------------
    // 3. Layout for steps without stored coordinates
    // -----------------------------------------------------------------------
    let needs_layout: Vec<bool> = kept.iter().map(|s| s.x.is_none() || s.y.is_none()).collect();
    if needs_layout.iter().any(|&b| b) {
        let positions = layout.arrange(&graph);
        for ((node, position), needs) in graph.nodes.iter_mut().zip(positions).zip(needs_layout) {
            if needs {
                node.position = position;
            }
        }
    }

    for diagnostic in &diagnostics {
        warn!(workflow_id = %workflow.id, "{diagnostic}");
    }
    debug!(
        "built graph '{}' with {} nodes and {} connections",
        graph.workflow_id,
        graph.nodes.len(),
        graph.connections.len()
    );

    GraphBuild { graph, diagnostics }
}
