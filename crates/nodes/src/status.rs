//! Per-node execution lifecycle.

use serde::{Deserialize, Serialize};

/// Transient execution status of a node on the canvas.
///
/// The execution service also reports `pending` and `skipped` for steps it
/// has not run; both read as [`NodeStatus::Idle`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    #[default]
    #[serde(alias = "pending", alias = "skipped")]
    Idle,
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}
