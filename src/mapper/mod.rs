//! Graph ↔ AST mapper.
//!
//! [`Mapper::parse`] turns a [`Document`] into a sealed [`Program`] and
//! [`Mapper::render`] turns it back. Both directions are driven by the
//! per-kind [`FieldSpec`](crate::ast::FieldSpec) tables, looked up through a
//! [`KindRegistry`] that knows the core catalogue plus any plugin-registered
//! extension kinds.
//!
//! The round-trip contract: for every accepted document `D`,
//! `render(parse(D))` is [`equivalent`](crate::document::equivalent) to `D`,
//! and `parse(render(parse(D)))` equals `parse(D)` structurally.

// ============================================================================
// IMPORTS
// ============================================================================

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::ast::{ExtensionSpec, Kind, Program, CORE_BLOCK_KINDS};
use crate::document::Document;
use crate::errors::{BlockforgeError, Result};

mod parse;
mod render;

/// Format versions this mapper reads and writes.
pub const SUPPORTED_VERSIONS: &[&str] = &["3.0", "3.1"];

/// Version written on programs built without a source document.
pub const CURRENT_VERSION: &str = "3.1";

pub fn check_version(version: &str) -> Result<()> {
    if SUPPORTED_VERSIONS.contains(&version) {
        Ok(())
    } else {
        Err(BlockforgeError::UnsupportedFormatVersion {
            found: version.to_string(),
            supported: SUPPORTED_VERSIONS.join(", "),
        })
    }
}

// ============================================================================
// KIND REGISTRY
// ============================================================================

/// Block type → kind lookup used while parsing.
#[derive(Debug, Clone)]
pub struct KindRegistry {
    by_type: HashMap<&'static str, Kind>,
}

static CORE_REGISTRY: Lazy<KindRegistry> = Lazy::new(KindRegistry::with_core);

impl KindRegistry {
    /// A registry holding the core catalogue only.
    pub fn with_core() -> Self {
        let by_type = CORE_BLOCK_KINDS
            .iter()
            .filter_map(|kind| kind.block_type().map(|name| (name, *kind)))
            .collect();
        Self { by_type }
    }

    /// The shared core-only registry.
    pub fn core() -> &'static KindRegistry {
        &CORE_REGISTRY
    }

    /// Adds a plugin block type. Block types are unique across the registry.
    pub fn register_extension(&mut self, spec: &'static ExtensionSpec) -> Result<()> {
        if self.by_type.contains_key(spec.block_type) {
            return Err(BlockforgeError::DuplicateKind {
                block_type: spec.block_type.to_string(),
            });
        }
        tracing::debug!(block_type = spec.block_type, "registered extension kind");
        self.by_type.insert(spec.block_type, Kind::Extension(spec));
        Ok(())
    }

    pub fn lookup(&self, block_type: &str) -> Option<Kind> {
        self.by_type.get(block_type).copied()
    }

    pub fn contains(&self, block_type: &str) -> bool {
        self.by_type.contains_key(block_type)
    }

    /// Registered block types, sorted.
    pub fn block_types(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.by_type.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for KindRegistry {
    fn default() -> Self {
        Self::with_core()
    }
}

// ============================================================================
// MAPPER
// ============================================================================

/// Parses and renders documents against one registry.
#[derive(Debug, Clone, Copy)]
pub struct Mapper<'r> {
    registry: &'r KindRegistry,
}

impl<'r> Mapper<'r> {
    pub fn new(registry: &'r KindRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &'r KindRegistry {
        self.registry
    }

    /// Maps a document to a sealed program. Fails on the first structural
    /// problem; no partial program is returned.
    pub fn parse(&self, document: &Document) -> Result<Program> {
        parse::parse_document(self.registry, document)
    }

    pub fn parse_json(&self, text: &str) -> Result<Program> {
        self.parse(&Document::from_json(text)?)
    }

    /// Maps a program back to a document in canonical slot order.
    pub fn render(&self, program: &Program) -> Result<Document> {
        render::render_program(program)
    }

    pub fn render_json(&self, program: &Program) -> Result<String> {
        self.render(program)?.to_json()
    }
}

impl Default for Mapper<'static> {
    fn default() -> Self {
        Mapper::new(KindRegistry::core())
    }
}

/// Parses with the core catalogue.
pub fn parse(document: &Document) -> Result<Program> {
    Mapper::default().parse(document)
}

/// Renders any program; rendering needs no registry.
pub fn render(program: &Program) -> Result<Document> {
    render::render_program(program)
}
