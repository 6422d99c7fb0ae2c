//! Initial node placement.
//!
//! Layout is a pluggable policy: it only decides positions and never touches
//! nodes, connections, or statuses.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::graph::WorkflowGraph;
use crate::models::Position;

/// Chooses a canvas position for every node of a graph.
pub trait LayoutStrategy {
    /// One position per node, in `graph.nodes()` order.
    fn arrange(&self, graph: &WorkflowGraph) -> Vec<Position>;
}

// ---------------------------------------------------------------------------
// LayeredLayout
// ---------------------------------------------------------------------------

/// Left-to-right columns by topological depth; rows in node order.
#[derive(Debug, Clone)]
pub struct LayeredLayout {
    pub origin: Position,
    pub column_gap: f64,
    pub row_gap: f64,
}

impl Default for LayeredLayout {
    fn default() -> Self {
        Self {
            origin: Position::new(100.0, 100.0),
            column_gap: 220.0,
            row_gap: 120.0,
        }
    }
}

impl LayoutStrategy for LayeredLayout {
    fn arrange(&self, graph: &WorkflowGraph) -> Vec<Position> {
        let depths = graph.depths();
        let mut rows_used: Vec<usize> = vec![0; depths.iter().max().map_or(0, |d| d + 1)];

        depths
            .into_iter()
            .map(|depth| {
                let row = rows_used[depth];
                rows_used[depth] += 1;
                Position::new(
                    self.origin.x + depth as f64 * self.column_gap,
                    self.origin.y + row as f64 * self.row_gap,
                )
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// ScatterLayout
// ---------------------------------------------------------------------------

/// Uniformly random placement inside `[min, max)`, reproducible per seed.
#[derive(Debug, Clone)]
pub struct ScatterLayout {
    pub seed: u64,
    pub min: Position,
    pub max: Position,
}

impl ScatterLayout {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            min: Position::new(100.0, 100.0),
            max: Position::new(700.0, 500.0),
        }
    }
}

impl LayoutStrategy for ScatterLayout {
    fn arrange(&self, graph: &WorkflowGraph) -> Vec<Position> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        graph
            .nodes()
            .iter()
            .map(|_| {
                Position::new(
                    rng.random_range(self.min.x..self.max.x),
                    rng.random_range(self.min.y..self.max.y),
                )
            })
            .collect()
    }
}
