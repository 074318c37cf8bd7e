//! `nodes` crate — the `BlockHandler` trait and the bundled block handlers.
//!
//! Every block — bundled and custom alike — must implement [`BlockHandler`].
//! The engine crate dispatches execution through this trait object.

pub mod builtin;
pub mod coerce;
pub mod collaborators;
pub mod context;
pub mod error;
pub mod mock;
pub mod traits;

pub use builtin::{default_handlers, BuiltinBlock};
pub use collaborators::{Collaborators, KnowledgeSearch, LlmClient, Orchestrator};
pub use context::{ChatMessage, FlowContext, Source, Variables};
pub use error::HandlerError;
pub use traits::{BlockHandler, HandlerData, HandlerResult};
