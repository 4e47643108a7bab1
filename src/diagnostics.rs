//! Semantic diagnostics.
//!
//! A [`Diagnostic`] is a severity-tagged message attached to a node. Passes
//! never abort on a bad node; they record a diagnostic and keep walking.
//!
//! Two containers hold them:
//!
//! - [`Infos`] is the append-only side channel embedded in every node. It is
//!   the only part of a sealed node that may still change.
//! - [`DiagnosticStore`] is the private, per-run store keyed by [`NodeId`].
//!   Parallel runs over one shared tree each own a store and never contend;
//!   [`DiagnosticStore::annotate`] attaches a run's findings to a dedicated
//!   copy of the tree.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use im::{OrdMap, Vector};
use serde::Serialize;

use crate::ast::{Node, NodeId, Program};
use crate::errors::Result;

// ============================================================================
// SEVERITY AND CODES
// ============================================================================

/// Ordered so that `max()` yields the most serious entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable, dotted identifier of a diagnostic family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct DiagCode(pub &'static str);

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Codes emitted by the shipped passes.
pub mod codes {
    use super::DiagCode;

    pub const NOTE: DiagCode = DiagCode("note");

    pub const UNDECLARED_VARIABLE: DiagCode = DiagCode("variable.undeclared");
    pub const DUPLICATE_VARIABLE: DiagCode = DiagCode("variable.duplicate");
    pub const UNUSED_VARIABLE: DiagCode = DiagCode("variable.unused");
    pub const INVALID_NAME: DiagCode = DiagCode("name.invalid");

    pub const TYPE_MISMATCH: DiagCode = DiagCode("expr.type_mismatch");
    pub const MISSING_EXPRESSION: DiagCode = DiagCode("expr.missing");
    pub const INVALID_NUMBER: DiagCode = DiagCode("expr.invalid_number");

    pub const FLOW_OUTSIDE_LOOP: DiagCode = DiagCode("control.flow_outside_loop");
    pub const UNDEFINED_METHOD: DiagCode = DiagCode("method.undefined");
    pub const DUPLICATE_METHOD: DiagCode = DiagCode("method.duplicate");
    pub const UNKNOWN_BLOCK: DiagCode = DiagCode("block.unknown");

    pub const PORT_MISSING: DiagCode = DiagCode("config.port_missing");
    pub const PORT_WRONG_KIND: DiagCode = DiagCode("config.port_wrong_kind");
    pub const SENSOR_UNSUPPORTED: DiagCode = DiagCode("config.sensor_unsupported");
    pub const CAPABILITY_MISSING: DiagCode = DiagCode("config.capability_missing");
    pub const VALUE_OUT_OF_RANGE: DiagCode = DiagCode("robot.value_out_of_range");
    pub const TEXT_TOO_LONG: DiagCode = DiagCode("robot.text_too_long");
}

// ============================================================================
// DIAGNOSTIC
// ============================================================================

/// Where a diagnostic points: the node, and its block when it has one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub node: NodeId,
    pub block_id: Option<String>,
}

impl SourceLocation {
    pub fn of(node: &Node) -> Self {
        Self {
            node: node.id(),
            block_id: node.block_id().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagCode,
    pub message: String,
    pub location: Option<SourceLocation>,
}

impl Diagnostic {
    pub fn new(severity: Severity, code: DiagCode, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            location: None,
        }
    }

    pub fn error(code: DiagCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message)
    }

    pub fn warning(code: DiagCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, message)
    }

    pub fn info(code: DiagCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, code, message)
    }

    /// Pins the diagnostic to `node`.
    pub fn at(mut self, node: &Node) -> Self {
        self.location = Some(SourceLocation::of(node));
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.severity, self.code)?;
        match &self.location {
            Some(SourceLocation {
                block_id: Some(block),
                ..
            }) => write!(f, " at block '{block}'")?,
            Some(location) => write!(f, " at node {}", location.node)?,
            None => {}
        }
        write!(f, ": {}", self.message)
    }
}

// ============================================================================
// NODE SIDE CHANNEL
// ============================================================================

/// Append-only diagnostic list embedded in a node.
#[derive(Debug, Default)]
pub struct Infos(Mutex<Vec<Diagnostic>>);

impl Infos {
    pub fn push(&self, diagnostic: Diagnostic) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(diagnostic);
    }

    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Copies the current entries into an independent list.
impl Clone for Infos {
    fn clone(&self) -> Self {
        Infos(Mutex::new(self.snapshot()))
    }
}

// ============================================================================
// PER-RUN STORE
// ============================================================================

/// Diagnostics of one pass invocation, keyed by node identity.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticStore {
    entries: Vector<Diagnostic>,
    by_node: OrdMap<NodeId, Vector<usize>>,
}

impl DiagnosticStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `diagnostic` against `node`, filling in its location.
    pub fn push(&mut self, node: &Node, diagnostic: Diagnostic) {
        let diagnostic = diagnostic.at(node);
        let index = self.entries.len();
        self.entries.push_back(diagnostic);
        self.by_node
            .entry(node.id())
            .or_insert_with(Vector::new)
            .push_back(index);
    }

    /// Entries recorded against `id`, in insertion order.
    pub fn for_node(&self, id: NodeId) -> Vec<Diagnostic> {
        self.by_node
            .get(&id)
            .map(|indices| {
                indices
                    .iter()
                    .filter_map(|i| self.entries.get(*i).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All entries in global insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.entries.iter().filter(|d| d.severity == severity).count()
    }

    pub fn max_severity(&self) -> Option<Severity> {
        self.entries.iter().map(|d| d.severity).max()
    }

    /// The gate for code generation.
    pub fn has_errors(&self) -> bool {
        self.max_severity() == Some(Severity::Error)
    }

    pub fn to_vec(&self) -> Vec<Diagnostic> {
        self.entries.iter().cloned().collect()
    }

    /// A dedicated copy of `program` with this run's diagnostics appended to
    /// the matching nodes. The input tree is left untouched.
    pub fn annotate(&self, program: &Program) -> Result<Program> {
        let copy = program.deep_copy()?;
        copy.walk(|node| {
            for diagnostic in self.for_node(node.id()) {
                node.add_diagnostic(diagnostic);
            }
        });
        Ok(copy)
    }
}

// ============================================================================
// TESTS
// ============================================================================
