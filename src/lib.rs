//! Blockforge: block-graph programs as a validated, immutable AST.
//!
//! The pipeline is document → [`mapper`] → [`ast::Program`] → [`validation`]
//! passes → diagnostics and a feature bean. The [`mapper`] also renders a
//! program back into a document so round trips can be checked, and
//! [`visit`] provides the dispatch shared by analysis and rewrite passes.

pub mod ast;
pub mod cli;
pub mod diagnostics;
pub mod document;
pub mod errors;
pub mod mapper;
pub mod validation;
pub mod visit;

pub use ast::{Kind, Node, NodeId, NodeRef, Phrase, Program};
pub use diagnostics::{Diagnostic, DiagnosticStore, Severity};
pub use document::Document;
pub use errors::{BlockforgeError, Result};
pub use mapper::{parse, render, KindRegistry, Mapper};
pub use validation::{run_validation, validate_parallel, HardwareConfig, ValidationOutcome};
pub use visit::{VisitResult, Visitor};
