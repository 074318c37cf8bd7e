//! `engine` crate — flow graph model, validation, handler registry and the
//! interpreter loop.

pub mod error;
pub mod executor;
pub mod graph;
pub mod models;
pub mod registry;
pub mod trace;

pub use error::EngineError;
pub use executor::{ExecuteOptions, ExecutorConfig, FlowExecutionResult, FlowExecutor, OUTPUT_ERROR};
pub use graph::{validate_flow, FlowIndex};
pub use models::{BlockCategory, Edge, FlowGraph, Node};
pub use registry::HandlerRegistry;
pub use trace::ExecutionStep;
