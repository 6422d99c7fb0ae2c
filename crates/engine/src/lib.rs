//! `engine` crate — workflow graph model and execution tracking.
//!
//! - [`graph`] turns a [`WorkflowDefinition`] into nodes and connections,
//!   reporting malformed references as [`GraphDiagnostic`]s.
//! - [`mutation`] is the interactive editing API on [`WorkflowGraph`].
//! - [`poller`] is the execution state machine; [`status`] maps snapshots
//!   onto node state and edge pulses.
//! - [`session`] ties them together behind one owner, driven by [`timer`].

pub mod error;
pub mod graph;
pub mod layout;
pub mod models;
pub mod mutation;
pub mod poller;
pub mod session;
pub mod status;
pub mod timer;

pub use client::{ExecutionSnapshot, WorkflowDefinition};
pub use error::{EngineError, GraphDiagnostic};
pub use graph::{build_graph, GraphBuild, WorkflowGraph};
pub use layout::{LayeredLayout, LayoutStrategy, ScatterLayout};
pub use models::{Connection, Node, Position};
pub use poller::{FailureReason, Generation, Poller, PollerConfig, PollerState};
pub use session::{
    CanvasSession, ServiceReply, SessionConfig, SessionEvent, StartOutcome, TimerTask,
};
pub use status::{map_snapshot, PulseConfig, ScheduledEvent, StatusUpdate};
