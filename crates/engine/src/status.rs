//! Snapshot → node status mapping and edge pulse scheduling.

use std::time::Duration;

use client::ExecutionSnapshot;
use nodes::NodeStatus;
use tracing::debug;

use crate::graph::WorkflowGraph;

/// Timing of the edge highlight emitted for each executed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseConfig {
    /// Wait before the edge lights up.
    pub delay: Duration,
    /// How long it stays lit.
    pub duration: Duration,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(500),
            duration: Duration::from_millis(1000),
        }
    }
}

/// Turn `connection_id` on after `delay`, off again `duration` later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledEvent {
    pub connection_id: String,
    pub delay: Duration,
    pub duration: Duration,
}

/// Output of [`map_snapshot`].
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub graph: WorkflowGraph,
    pub events: Vec<ScheduledEvent>,
}

/// Apply `snapshot` to a copy of `previous`.
///
/// The current step is marked running first; then every executed step takes
/// its reported status and schedules a pulse on each of its outgoing
/// connections.  A step listed in both places ends with its executed status.
/// Ids the graph does not know are skipped.
pub fn map_snapshot(
    previous: &WorkflowGraph,
    snapshot: &ExecutionSnapshot,
    pulse: &PulseConfig,
) -> StatusUpdate {
    let mut graph = previous.clone();
    let mut events = Vec::new();

    if let Some(current) = &snapshot.current_step {
        if !graph.set_status(&current.id, NodeStatus::Running) {
            debug!("current step '{}' is not on the canvas", current.id);
        }
    }

    for executed in &snapshot.steps_executed {
        if !graph.set_status(&executed.id, executed.status) {
            debug!("executed step '{}' is not on the canvas", executed.id);
            continue;
        }
        events.extend(graph.outgoing(&executed.id).map(|conn| ScheduledEvent {
            connection_id: conn.id.clone(),
            delay: pulse.delay,
            duration: pulse.duration,
        }));
    }

    StatusUpdate { graph, events }
}

#[cfg(test)]
mod tests {
    use super::*;
    use client::{ExecutionStatus, StepProgress, StepRef};
    use nodes::StepType;

    fn diamond() -> WorkflowGraph {
        let mut graph = WorkflowGraph::new("wf", "diamond");
        for _ in 0..4 {
            graph.add_node(StepType::Processing, 0.0, 0.0);
        }
        let ids: Vec<String> = graph.nodes().iter().map(|n| n.id.clone()).collect();
        graph.connect(&ids[0], &ids[1]);
        graph.connect(&ids[0], &ids[2]);
        graph.connect(&ids[1], &ids[3]);
        graph.connect(&ids[2], &ids[3]);
        graph
    }

    fn snapshot(current: Option<&str>, executed: &[(&str, NodeStatus)]) -> ExecutionSnapshot {
        ExecutionSnapshot {
            execution_id: "exec".into(),
            status: ExecutionStatus::Running,
            current_step: current.map(|id| StepRef { id: id.into(), name: None }),
            steps_executed: executed
                .iter()
                .map(|(id, status)| StepProgress { id: id.to_string(), status: *status })
                .collect(),
            error_message: None,
        }
    }

    #[test]
    fn current_step_becomes_running() {
        let graph = diamond();
        let first = graph.nodes()[0].id.clone();
        let snap = snapshot(Some(first.as_str()), &[]);
        let update = map_snapshot(&graph, &snap, &PulseConfig::default());

        assert_eq!(update.graph.node(&first).unwrap().status, NodeStatus::Running);
        assert!(update.events.is_empty());
        // Input untouched.
        assert_eq!(graph.node(&first).unwrap().status, NodeStatus::Idle);
    }

    #[test]
    fn executed_steps_pulse_every_outgoing_connection() {
        let graph = diamond();
        let ids: Vec<String> = graph.nodes().iter().map(|n| n.id.clone()).collect();
        let snap = snapshot(Some(ids[1].as_str()), &[(ids[0].as_str(), NodeStatus::Completed)]);
        let update = map_snapshot(&graph, &snap, &PulseConfig::default());

        assert_eq!(update.graph.node(&ids[0]).unwrap().status, NodeStatus::Completed);
        assert_eq!(update.graph.node(&ids[1]).unwrap().status, NodeStatus::Running);
        let pulsed: Vec<_> = update.events.iter().map(|e| e.connection_id.clone()).collect();
        assert_eq!(
            pulsed,
            vec![format!("{}-{}", ids[0], ids[1]), format!("{}-{}", ids[0], ids[2])]
        );
        assert!(update.events.iter().all(|e| e.delay == Duration::from_millis(500)
            && e.duration == Duration::from_millis(1000)));
    }

    #[test]
    fn executed_status_wins_over_current() {
        let graph = diamond();
        let id = graph.nodes()[3].id.clone();
        let snap = snapshot(Some(id.as_str()), &[(id.as_str(), NodeStatus::Failed)]);
        let update = map_snapshot(&graph, &snap, &PulseConfig::default());

        assert_eq!(update.graph.node(&id).unwrap().status, NodeStatus::Failed);
        // Sink node: nothing to pulse.
        assert!(update.events.is_empty());
    }

    #[test]
    fn unknown_ids_are_ignored() {
        let graph = diamond();
        let snap = snapshot(Some("ghost"), &[("phantom", NodeStatus::Completed)]);
        let update = map_snapshot(&graph, &snap, &PulseConfig::default());

        assert_eq!(update.graph, graph);
        assert!(update.events.is_empty());
    }

    #[test]
    fn connections_are_not_flipped_by_the_mapper() {
        let graph = diamond();
        let first = graph.nodes()[0].id.clone();
        let snap = snapshot(None, &[(first.as_str(), NodeStatus::Completed)]);
        let update = map_snapshot(&graph, &snap, &PulseConfig::default());

        assert!(update.graph.connections().iter().all(|c| !c.animated));
        assert_eq!(update.events.len(), 2);
    }
}
