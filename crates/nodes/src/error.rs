//! Handler-level error type.

use thiserror::Error;

/// Errors returned by a handler's `handle` method.
///
/// The bundled handlers absorb collaborator failures themselves and rarely
/// return these. The interpreter converts any that do escape into a fallback
/// result unless it runs in strict mode.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The node's `config` is unusable for this block.
    #[error("invalid block config: {0}")]
    InvalidConfig(String),

    /// An injected collaborator failed and the handler chose not to recover.
    #[error("collaborator failed: {0}")]
    Collaborator(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
