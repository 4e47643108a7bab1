//! AST module for block programs.
//!
//! A program is a strict tree of [`Node`]s shared through [`NodeRef`]
//! (`Arc<Node>`). Nodes are write-once: structural setters work until
//! [`Node::seal`] is called and fail with a contract violation afterwards.
//! The diagnostic side channel stays appendable for the node's whole life.
//!
//! # Examples
//!
//! ```rust
//! use blockforge::ast::{BlockProperties, Node, Phrase};
//! use blockforge::ast::phrase::BoolConst;
//!
//! let mut node = Node::new(
//!     BlockProperties::default(),
//!     None,
//!     Phrase::BoolConst(BoolConst { value: true }),
//! );
//! node.seal();
//! assert!(node.set_comment(None).is_err());
//! ```

// ============================================================================
// IMPORTS
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::diagnostics::{Diagnostic, Infos};
use crate::errors::{BlockforgeError, Result};

pub mod kind;
pub mod phrase;
pub mod program;
pub mod slots;

pub use kind::{Category, ExtensionSpec, FieldMode, FieldSpec, Kind, Mapped, CORE_BLOCK_KINDS};
pub use phrase::Phrase;
pub use program::{Instance, Program};
pub use slots::{SlotReader, SlotRef, SlotValue};

// ============================================================================
// CORE DATA STRUCTURES
// ============================================================================

/// Shared handle to a node. Rewrites share unchanged subtrees through it.
pub type NodeRef = Arc<Node>;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique node identity, the key of per-run diagnostic stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u64);

impl NodeId {
    pub fn fresh() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Editor-side attributes of a block.
///
/// `disabled` and `in_task` steer read-only traversal; the rest only has to
/// survive a round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockProperties {
    pub block_id: Option<String>,
    pub disabled: bool,
    pub collapsed: bool,
    pub inline: bool,
    pub deletable: bool,
    pub movable: bool,
    pub editable: bool,
    /// `Some(true)` forces inclusion, `Some(false)` excludes the block from
    /// read-only passes, `None` inherits from the enclosing chain.
    pub in_task: Option<bool>,
    /// Opaque editor mutation, kept verbatim.
    pub mutation: BTreeMap<String, String>,
}

impl Default for BlockProperties {
    fn default() -> Self {
        Self {
            block_id: None,
            disabled: false,
            collapsed: false,
            inline: false,
            deletable: true,
            movable: true,
            editable: true,
            in_task: None,
            mutation: BTreeMap::new(),
        }
    }
}

impl BlockProperties {
    pub fn with_block_id(block_id: impl Into<String>) -> Self {
        Self {
            block_id: Some(block_id.into()),
            ..Self::default()
        }
    }
}

/// User comment attached to a block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockComment {
    pub text: String,
    pub pinned: bool,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// One AST node: shared metadata plus its typed [`Phrase`].
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    properties: BlockProperties,
    comment: Option<BlockComment>,
    phrase: Phrase,
    sealed: bool,
    diagnostics: Infos,
}

// ============================================================================
// PUBLIC API IMPLEMENTATION
// ============================================================================

impl Node {
    /// Builds an unsealed node with a fresh id.
    pub fn new(properties: BlockProperties, comment: Option<BlockComment>, phrase: Phrase) -> Self {
        Self {
            id: NodeId::fresh(),
            properties,
            comment,
            phrase,
            sealed: false,
            diagnostics: Infos::default(),
        }
    }

    /// Builds, seals and shares a node in one step.
    pub fn sealed(properties: BlockProperties, comment: Option<BlockComment>, phrase: Phrase) -> NodeRef {
        Node::new(properties, comment, phrase).into_ref()
    }

    /// Seals the node and wraps it for sharing.
    pub fn into_ref(mut self) -> NodeRef {
        self.seal();
        Arc::new(self)
    }

    /// Idempotent.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> Kind {
        self.phrase.kind()
    }

    pub fn phrase(&self) -> &Phrase {
        &self.phrase
    }

    pub fn properties(&self) -> &BlockProperties {
        &self.properties
    }

    pub fn comment(&self) -> Option<&BlockComment> {
        self.comment.as_ref()
    }

    pub fn block_id(&self) -> Option<&str> {
        self.properties.block_id.as_deref()
    }

    /// The block id when known, otherwise the node id.
    pub fn label(&self) -> String {
        self.block_id()
            .map(str::to_string)
            .unwrap_or_else(|| self.id.to_string())
    }

    pub fn is_disabled(&self) -> bool {
        self.properties.disabled
    }

    pub fn in_task(&self) -> Option<bool> {
        self.properties.in_task
    }

    /// Whether read-only traversal reaches this node.
    pub fn is_active(&self) -> bool {
        !self.properties.disabled && self.properties.in_task != Some(false)
    }

    // ------------------------------------------------------------------------
    // Write-once setters
    // ------------------------------------------------------------------------

    fn ensure_unsealed(&self, what: &str) -> Result<()> {
        if self.sealed {
            return Err(BlockforgeError::contract(
                self.kind(),
                format!("cannot set {what} on a sealed node"),
            ));
        }
        Ok(())
    }

    pub fn set_properties(&mut self, properties: BlockProperties) -> Result<()> {
        self.ensure_unsealed("properties")?;
        self.properties = properties;
        Ok(())
    }

    pub fn set_comment(&mut self, comment: Option<BlockComment>) -> Result<()> {
        self.ensure_unsealed("comment")?;
        self.comment = comment;
        Ok(())
    }

    pub fn set_phrase(&mut self, phrase: Phrase) -> Result<()> {
        self.ensure_unsealed("phrase")?;
        self.phrase = phrase;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Diagnostics side channel
    // ------------------------------------------------------------------------

    /// Appends a diagnostic. Legal on sealed nodes.
    pub fn add_diagnostic(&self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Diagnostics in insertion order.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.snapshot()
    }

    // ------------------------------------------------------------------------
    // Derivation
    // ------------------------------------------------------------------------

    pub fn children(&self) -> Vec<&NodeRef> {
        self.phrase.children()
    }

    /// A sealed sibling with the same metadata, a new phrase and a fresh id.
    pub fn with_phrase(&self, phrase: Phrase) -> NodeRef {
        Node::sealed(self.properties.clone(), self.comment.clone(), phrase)
    }

    /// A dedicated copy of the whole subtree. Ids are kept so per-run
    /// diagnostics can be attached; each copy owns its own diagnostic list,
    /// seeded with the entries present now.
    pub fn deep_copy(&self) -> Result<NodeRef> {
        let phrase = self
            .phrase
            .map_children(&self.label(), |child| child.deep_copy())?;
        Ok(Arc::new(Node {
            id: self.id,
            properties: self.properties.clone(),
            comment: self.comment.clone(),
            phrase,
            sealed: true,
            diagnostics: self.diagnostics.clone(),
        }))
    }

    /// Indented outline of the subtree, one node per line.
    pub fn pretty(&self) -> String {
        let mut out = String::new();
        self.write_pretty(&mut out, 0, None);
        out
    }

    fn write_pretty(&self, out: &mut String, depth: usize, label: Option<&str>) {
        let _ = write!(out, "{:indent$}", "", indent = depth * 2);
        if let Some(label) = label {
            let _ = write!(out, "{label}: ");
        }
        let _ = write!(out, "{}", self.kind());
        if let Some(id) = self.block_id() {
            let _ = write!(out, " #{id}");
        }
        if self.properties.disabled {
            out.push_str(" [disabled]");
        }
        if self.properties.in_task == Some(false) {
            out.push_str(" [detached]");
        }

        let fields = self.kind().fields();
        let slots = self.phrase.slots();
        for (spec, slot) in fields.iter().zip(&slots) {
            if let SlotRef::Literal(text) = slot {
                let _ = write!(out, " {}={:?}", spec.external, text);
            }
        }
        out.push('\n');

        if let Phrase::StmtList(list) = &self.phrase {
            for stmt in &list.statements {
                stmt.write_pretty(out, depth + 1, None);
            }
            return;
        }
        for (spec, slot) in fields.iter().zip(&slots) {
            match slot {
                SlotRef::Literal(_) => {}
                SlotRef::Value(node) | SlotRef::Statement(node) => {
                    node.write_pretty(out, depth + 1, Some(spec.external))
                }
                SlotRef::OptionalStatement(node) => {
                    if let Some(node) = node {
                        node.write_pretty(out, depth + 1, Some(spec.external));
                    }
                }
                SlotRef::Repeated(nodes) => {
                    for (i, node) in nodes.iter().enumerate() {
                        let name = format!("{}{}", spec.external, i);
                        node.write_pretty(out, depth + 1, Some(&name));
                    }
                }
            }
        }
    }
}

/// Structural equality: ids and diagnostics are ignored.
impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.properties == other.properties
            && self.comment == other.comment
            && self.phrase == other.phrase
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::phrase::{NumConst, StmtList};
    use crate::diagnostics::{codes, Severity};

    fn num(text: &str) -> Node {
        Node::new(
            BlockProperties::with_block_id("n"),
            None,
            Phrase::NumConst(NumConst {
                value: text.to_string(),
            }),
        )
    }

    #[test]
    fn setters_work_until_sealed() {
        let mut node = num("1");
        node.set_comment(Some(BlockComment {
            text: "hi".to_string(),
            ..BlockComment::default()
        }))
        .unwrap();
        node.seal();
        node.seal();
        let err = node.set_properties(BlockProperties::default()).unwrap_err();
        assert!(err.is_contract_violation());
        assert!(node.set_phrase(Phrase::EmptyExpr).is_err());
        assert_eq!(node.comment().map(|c| c.text.as_str()), Some("hi"));
    }

    #[test]
    fn diagnostics_append_after_seal_in_order() {
        let node = num("1").into_ref();
        let a = Diagnostic::new(Severity::Warning, codes::UNUSED_VARIABLE, "a");
        let b = Diagnostic::new(Severity::Error, codes::TYPE_MISMATCH, "b");
        node.add_diagnostic(a.clone());
        node.add_diagnostic(b.clone());
        node.add_diagnostic(a.clone());
        assert_eq!(node.diagnostics(), vec![a.clone(), b, a]);
    }

    #[test]
    fn equality_ignores_identity() {
        let a = num("3").into_ref();
        let b = num("3").into_ref();
        assert_ne!(a.id(), b.id());
        assert_eq!(a, b);
        assert_ne!(a, num("4").into_ref());
    }

    #[test]
    fn deep_copy_keeps_ids_but_not_the_channel() {
        let leaf = num("1").into_ref();
        let list = Node::sealed(
            BlockProperties::default(),
            None,
            Phrase::StmtList(StmtList {
                statements: vec![leaf.clone()],
            }),
        );
        let copy = list.deep_copy().unwrap();
        assert_eq!(copy.id(), list.id());
        assert!(!Arc::ptr_eq(copy.children()[0], &leaf));
        copy.children()[0].add_diagnostic(Diagnostic::new(Severity::Info, codes::NOTE, "x"));
        assert!(leaf.diagnostics().is_empty());
    }

    #[test]
    fn active_flag_follows_disabled_and_in_task() {
        let mut node = num("1");
        assert!(node.is_active());
        let mut props = node.properties().clone();
        props.in_task = Some(false);
        node.set_properties(props.clone()).unwrap();
        assert!(!node.is_active());
        props.in_task = Some(true);
        props.disabled = true;
        node.set_properties(props).unwrap();
        assert!(!node.is_active());
    }

    #[test]
    fn pretty_lists_literals_and_slots() {
        let node = num("42").into_ref();
        assert_eq!(node.pretty(), "math_number #n NUM=\"42\"\n");
    }
}
