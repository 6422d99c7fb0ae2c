//! `client` crate — the contract with the external execution service.
//!
//! Provides the wire models, the [`ExecutionService`] trait the engine drives,
//! a reqwest-backed implementation, and a scripted mock for tests.  No graph
//! or session logic lives here.

pub mod error;
pub mod http;
pub mod mock;
pub mod models;
pub mod service;

pub use error::ClientError;
pub use http::{ClientConfig, HttpExecutionService};
pub use models::{
    ExecutionSnapshot, ExecutionStatus, Step, StepProgress, StepRef, WorkflowDefinition,
};
pub use service::ExecutionService;
