//! The external block-graph document.
//!
//! This is the wire format the editor saves: JSON with a `formatVersion`
//! tag, top-level `instances` (block chains placed on the canvas) and blocks
//! carrying named `fields` (literals), `values` (one child block) and
//! `statements` (a chain of blocks).
//!
//! Besides the serde model, the module defines document equivalence. Two
//! documents are equivalent when their canonical forms match; the canonical
//! form sorts slots by name, drops default visual flags, empty statement
//! slots and annotations.

// ============================================================================
// IMPORTS
// ============================================================================

use std::collections::BTreeMap;

use difference::Changeset;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::{BlockforgeError, Result};
use crate::mapper::check_version;

// ============================================================================
// CORE DATA STRUCTURES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub format_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub instances: Vec<InstanceDoc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstanceDoc {
    #[serde(default)]
    pub x: i64,
    #[serde(default)]
    pub y: i64,
    #[serde(default)]
    pub blocks: Vec<BlockDoc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BlockDoc {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub block_type: String,

    #[serde(default, skip_serializing_if = "is_false")]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub collapsed: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub inline: bool,
    #[serde(default = "yes", skip_serializing_if = "is_true")]
    pub deletable: bool,
    #[serde(default = "yes", skip_serializing_if = "is_true")]
    pub movable: bool,
    #[serde(default = "yes", skip_serializing_if = "is_true")]
    pub editable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_task: Option<bool>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub mutation: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<CommentDoc>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldDoc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<ValueDoc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub statements: Vec<StatementDoc>,

    /// Diagnostics written by a validation run. Ignored on input.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<AnnotationDoc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommentDoc {
    pub text: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub pinned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDoc {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValueDoc {
    pub name: String,
    pub block: BlockDoc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatementDoc {
    pub name: String,
    #[serde(default)]
    pub blocks: Vec<BlockDoc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationDoc {
    pub severity: String,
    pub code: String,
    pub message: String,
}

fn is_false(b: &bool) -> bool {
    !*b
}

fn is_true(b: &bool) -> bool {
    *b
}

fn yes() -> bool {
    true
}

// ============================================================================
// READING AND WRITING
// ============================================================================

impl Document {
    /// Parses a JSON document. The format version is checked before the
    /// body is interpreted, so documents from other format generations are
    /// reported as such rather than as syntax errors.
    pub fn from_json(text: &str) -> Result<Document> {
        let raw: serde_json::Value = serde_json::from_str(text)?;
        let version = raw
            .get("formatVersion")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();
        check_version(version)?;
        Ok(serde_json::from_value(raw)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Every block of the document in pre-order.
    pub fn blocks(&self) -> Vec<&BlockDoc> {
        fn go<'a>(block: &'a BlockDoc, out: &mut Vec<&'a BlockDoc>) {
            out.push(block);
            for value in &block.values {
                go(&value.block, out);
            }
            for statement in &block.statements {
                for child in &statement.blocks {
                    go(child, out);
                }
            }
        }
        let mut out = Vec::new();
        for instance in &self.instances {
            for block in &instance.blocks {
                go(block, &mut out);
            }
        }
        out
    }
}

impl BlockDoc {
    /// A bare block with default visual properties.
    pub fn new(id: impl Into<String>, block_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            block_type: block_type.into(),
            disabled: false,
            collapsed: false,
            inline: false,
            deletable: true,
            movable: true,
            editable: true,
            in_task: None,
            mutation: BTreeMap::new(),
            comment: None,
            fields: Vec::new(),
            values: Vec::new(),
            statements: Vec::new(),
            annotations: Vec::new(),
        }
    }
}

// ============================================================================
// EQUIVALENCE
// ============================================================================

fn canonical_block(block: &BlockDoc) -> BlockDoc {
    let mut out = block.clone();
    out.annotations.clear();
    out.fields.sort_by(|a, b| a.name.cmp(&b.name));
    out.values = block
        .values
        .iter()
        .map(|v| ValueDoc {
            name: v.name.clone(),
            block: canonical_block(&v.block),
        })
        .collect();
    out.values.sort_by(|a, b| a.name.cmp(&b.name));
    out.statements = block
        .statements
        .iter()
        .filter(|s| !s.blocks.is_empty())
        .map(|s| StatementDoc {
            name: s.name.clone(),
            blocks: s.blocks.iter().map(canonical_block).collect(),
        })
        .collect();
    out.statements.sort_by(|a, b| a.name.cmp(&b.name));
    out
}

/// The normal form used for equivalence, diffs and fingerprints.
pub fn canonicalize(doc: &Document) -> Document {
    Document {
        format_version: doc.format_version.clone(),
        description: doc.description.clone(),
        tags: doc.tags.clone(),
        instances: doc
            .instances
            .iter()
            .map(|i| InstanceDoc {
                x: i.x,
                y: i.y,
                blocks: i.blocks.iter().map(canonical_block).collect(),
            })
            .collect(),
    }
}

/// Pretty JSON of the canonical form. Defaults are skipped by the
/// serializer, so explicit and implicit defaults print the same.
pub fn canonical_json(doc: &Document) -> Result<String> {
    canonicalize(doc).to_json()
}

pub fn equivalent(a: &Document, b: &Document) -> bool {
    canonicalize(a) == canonicalize(b)
}

/// Line diff between the canonical forms of two documents.
pub fn diff(a: &Document, b: &Document) -> Result<Changeset> {
    Ok(Changeset::new(&canonical_json(a)?, &canonical_json(b)?, "\n"))
}

/// SHA-256 of the canonical form, hex encoded.
pub fn fingerprint(doc: &Document) -> Result<String> {
    let digest = Sha256::digest(canonical_json(doc)?.as_bytes());
    Ok(digest.iter().map(|byte| format!("{byte:02x}")).collect())
}

/// Reads a document from disk.
pub fn load(path: &std::path::Path) -> Result<Document> {
    let text = std::fs::read_to_string(path).map_err(|source| BlockforgeError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Document::from_json(&text)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = r#"{
        "formatVersion": "3.1",
        "instances": [{
            "x": 1, "y": 2,
            "blocks": [{
                "id": "a", "type": "robActions_motor_stop",
                "deletable": true,
                "fields": [{"name": "MOTORPORT", "value": "B"}],
                "statements": [{"name": "UNUSED", "blocks": []}],
                "annotations": [{"severity": "error", "code": "x", "message": "m"}]
            }]
        }]
    }"#;

    #[test]
    fn explicit_defaults_and_annotations_do_not_matter() {
        let doc = Document::from_json(SMALL).unwrap();
        let mut plain = BlockDoc::new("a", "robActions_motor_stop");
        plain.fields.push(FieldDoc {
            name: "MOTORPORT".to_string(),
            value: "B".to_string(),
        });
        let other = Document {
            format_version: "3.1".to_string(),
            description: String::new(),
            tags: vec![],
            instances: vec![InstanceDoc {
                x: 1,
                y: 2,
                blocks: vec![plain],
            }],
        };
        assert!(equivalent(&doc, &other));
        assert_eq!(fingerprint(&doc).unwrap(), fingerprint(&other).unwrap());
        assert_eq!(fingerprint(&doc).unwrap().len(), 64);
    }

    #[test]
    fn field_values_matter() {
        let doc = Document::from_json(SMALL).unwrap();
        let mut changed = doc.clone();
        changed.instances[0].blocks[0].fields[0].value = "C".to_string();
        assert!(!equivalent(&doc, &changed));
        let changes = diff(&doc, &changed).unwrap();
        assert!(changes.distance > 0);
    }

    #[test]
    fn unknown_version_is_reported_before_shape() {
        let err = Document::from_json(r#"{"formatVersion": "1.0", "xml": "<xml/>"}"#).unwrap_err();
        assert!(matches!(err, BlockforgeError::UnsupportedFormatVersion { .. }));
    }

    #[test]
    fn broken_json_is_a_syntax_error() {
        let err = Document::from_json("{ not json").unwrap_err();
        assert!(matches!(err, BlockforgeError::DocumentSyntax(_)));
    }

    #[test]
    fn serializer_skips_defaults() {
        let json = serde_json::to_string(&BlockDoc::new("z", "text")).unwrap();
        assert_eq!(json, r#"{"id":"z","type":"text"}"#);
    }
}
