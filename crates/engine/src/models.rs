//! Canvas view models derived from workflow steps.

use nodes::{NodeStatus, StepStyle, StepType};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Canvas coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A step as shown on the canvas, plus its transient execution status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub step_type: StepType,
    pub name: String,
    pub position: Position,
    pub config: Value,
    pub status: NodeStatus,
}

impl Node {
    /// Presentation attributes for this node's kind.
    pub fn style(&self) -> &'static StepStyle {
        self.step_type.style()
    }
}

/// Directed edge derived from a step's `next_steps`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// Always `"{from}-{to}"`.
    pub id: String,
    pub from: String,
    pub to: String,
    /// Highlighted while a pulse is active.
    pub animated: bool,
}

impl Connection {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        let from = from.into();
        let to = to.into();
        Self {
            id: connection_id(&from, &to),
            from,
            to,
            animated: false,
        }
    }

    /// `true` if `node_id` is either endpoint.
    pub fn touches(&self, node_id: &str) -> bool {
        self.from == node_id || self.to == node_id
    }
}

/// Identifier of the connection `from → to`.
pub fn connection_id(from: &str, to: &str) -> String {
    format!("{from}-{to}")
}
