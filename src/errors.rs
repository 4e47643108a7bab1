//! Blockforge error handling.
//!
//! Everything that aborts an operation is a [`BlockforgeError`]. Semantic
//! problems found while validating a program are *not* errors; they are
//! [`crate::diagnostics::Diagnostic`] entries collected per node.
//!
//! Two families live here:
//!
//! - **Contract violations** (`ContractViolation`, `DuplicateKind`) signal a
//!   mistake by the author of a pass or plugin: mutating a sealed node,
//!   returning a non-node from a rewrite, registering a block type twice.
//! - **Input failures** (`UnsupportedFormatVersion`, `MalformedProgram`,
//!   `DocumentSyntax`, `Config`, `Io`, `UnknownPlatform`) reject something
//!   handed in from outside.

use miette::Diagnostic;
use thiserror::Error;

use crate::ast::Kind;

/// Convenience alias used throughout the crate.
pub type Result<T, E = BlockforgeError> = std::result::Result<T, E>;

/// Unified error type for all Blockforge failure modes.
#[derive(Debug, Error, Diagnostic)]
pub enum BlockforgeError {
    #[error("contract violation on {kind} node: {message}")]
    #[diagnostic(
        code(blockforge::contract),
        help("sealed nodes are immutable; build a new node or use a rewrite visitor")
    )]
    ContractViolation { kind: Kind, message: String },

    #[error("unsupported block-graph format version '{found}'")]
    #[diagnostic(code(blockforge::mapper::version), help("supported versions: {supported}"))]
    UnsupportedFormatVersion { found: String, supported: String },

    #[error("malformed program at block '{block_id}': {reason}")]
    #[diagnostic(code(blockforge::mapper::malformed))]
    MalformedProgram { block_id: String, reason: String },

    #[error("document is not a valid block graph: {0}")]
    #[diagnostic(code(blockforge::mapper::syntax))]
    DocumentSyntax(#[from] serde_json::Error),

    #[error("unknown platform '{name}'")]
    #[diagnostic(code(blockforge::platform), help("known platforms: {known}"))]
    UnknownPlatform { name: String, known: String },

    #[error("block type '{block_type}' is already registered")]
    #[diagnostic(code(blockforge::registry::duplicate))]
    DuplicateKind { block_type: String },

    #[error("invalid hardware configuration: {message}")]
    #[diagnostic(code(blockforge::config))]
    Config { message: String },

    #[error("i/o error on '{path}': {source}")]
    #[diagnostic(code(blockforge::io))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl BlockforgeError {
    /// Builds a `MalformedProgram` error for the block with the given id.
    pub fn malformed(block_id: impl Into<String>, reason: impl Into<String>) -> Self {
        BlockforgeError::MalformedProgram {
            block_id: block_id.into(),
            reason: reason.into(),
        }
    }

    /// Builds a `ContractViolation` for a node of the given kind.
    pub fn contract(kind: Kind, message: impl Into<String>) -> Self {
        BlockforgeError::ContractViolation {
            kind,
            message: message.into(),
        }
    }

    /// True for errors caused by a pass or plugin author rather than by input.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            BlockforgeError::ContractViolation { .. } | BlockforgeError::DuplicateKind { .. }
        )
    }
}
