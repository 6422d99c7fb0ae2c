//! Step kinds and their presentation table.

use serde::{Deserialize, Serialize};

/// The kind of work a step performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Input,
    Processing,
    Validation,
    Output,
    Condition,
}

/// Presentation attributes shown by a renderer for a step kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepStyle {
    /// Short human label, also used for default node names.
    pub label: &'static str,
    /// Gradient classes used for the node body.
    pub color: &'static str,
    /// Icon identifier.
    pub icon: &'static str,
}

// Indexed by `StepType as usize`.
const STYLES: [StepStyle; 5] = [
    StepStyle {
        label: "Input",
        color: "from-blue-500 to-cyan-500",
        icon: "plus",
    },
    StepStyle {
        label: "Process",
        color: "from-purple-500 to-pink-500",
        icon: "zap",
    },
    StepStyle {
        label: "Validate",
        color: "from-yellow-500 to-orange-500",
        icon: "check-circle",
    },
    StepStyle {
        label: "Output",
        color: "from-green-500 to-emerald-500",
        icon: "arrow-right",
    },
    StepStyle {
        label: "Condition",
        color: "from-indigo-500 to-purple-500",
        icon: "settings",
    },
];

impl StepType {
    /// Every variant, in palette order.
    pub const ALL: [StepType; 5] = [
        StepType::Input,
        StepType::Processing,
        StepType::Validation,
        StepType::Output,
        StepType::Condition,
    ];

    /// Look up the presentation attributes for this kind.
    pub fn style(self) -> &'static StepStyle {
        &STYLES[self as usize]
    }

    /// Name given to a freshly created node of this kind, e.g. `"New Validate"`.
    pub fn default_name(self) -> String {
        format!("New {}", self.style().label)
    }

    /// Wire name of the variant.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Processing => "processing",
            Self::Validation => "validation",
            Self::Output => "output",
            Self::Condition => "condition",
        }
    }
}

impl std::fmt::Display for StepType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
