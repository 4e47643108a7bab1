//! Slot values exchanged between the mapping table and typed node variants.
//!
//! [`SlotRef`] is the borrowed view a variant hands to the renderer;
//! [`SlotValue`] is the owned form the parser hands to a variant through a
//! [`SlotReader`].

use std::borrow::Cow;
use std::str::FromStr;

use crate::ast::kind::{FieldMode, FieldSpec};
use crate::ast::NodeRef;
use crate::errors::{BlockforgeError, Result};

/// Borrowed content of one table row.
#[derive(Debug, Clone)]
pub enum SlotRef<'a> {
    Literal(Cow<'a, str>),
    Value(&'a NodeRef),
    Statement(&'a NodeRef),
    OptionalStatement(Option<&'a NodeRef>),
    Repeated(Vec<&'a NodeRef>),
}

impl<'a> SlotRef<'a> {
    /// Child nodes referenced by this slot, in order.
    pub fn nodes(&self) -> Vec<&'a NodeRef> {
        match self {
            SlotRef::Literal(_) => Vec::new(),
            SlotRef::Value(node) | SlotRef::Statement(node) => vec![*node],
            SlotRef::OptionalStatement(node) => node.iter().copied().collect(),
            SlotRef::Repeated(nodes) => nodes.clone(),
        }
    }

    /// Owned copy with every child passed through `f`.
    pub fn map_nodes<F>(&self, f: &mut F) -> Result<SlotValue>
    where
        F: FnMut(&NodeRef) -> Result<NodeRef>,
    {
        Ok(match self {
            SlotRef::Literal(text) => SlotValue::Literal(text.to_string()),
            SlotRef::Value(node) => SlotValue::Value(f(*node)?),
            SlotRef::Statement(node) => SlotValue::Statement(f(*node)?),
            SlotRef::OptionalStatement(node) => {
                SlotValue::OptionalStatement(node.map(|n| f(n)).transpose()?)
            }
            SlotRef::Repeated(nodes) => {
                SlotValue::Repeated(nodes.iter().map(|n| f(*n)).collect::<Result<_>>()?)
            }
        })
    }
}

/// Owned content of one table row.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotValue {
    Literal(String),
    Value(NodeRef),
    Statement(NodeRef),
    OptionalStatement(Option<NodeRef>),
    Repeated(Vec<NodeRef>),
}

impl SlotValue {
    pub fn as_slot_ref(&self) -> SlotRef<'_> {
        match self {
            SlotValue::Literal(text) => SlotRef::Literal(Cow::Borrowed(text)),
            SlotValue::Value(node) => SlotRef::Value(node),
            SlotValue::Statement(node) => SlotRef::Statement(node),
            SlotValue::OptionalStatement(node) => SlotRef::OptionalStatement(node.as_ref()),
            SlotValue::Repeated(nodes) => SlotRef::Repeated(nodes.iter().collect()),
        }
    }

    fn mode_name(&self) -> &'static str {
        match self {
            SlotValue::Literal(_) => "literal",
            SlotValue::Value(_) => "value",
            SlotValue::Statement(_) => "statement",
            SlotValue::OptionalStatement(_) => "optional statement",
            SlotValue::Repeated(_) => "repeated slot",
        }
    }
}

/// Hands slot values to a variant constructor in table order.
pub struct SlotReader {
    block_id: String,
    fields: &'static [FieldSpec],
    values: std::vec::IntoIter<SlotValue>,
    cursor: usize,
}

impl SlotReader {
    pub fn new(block_id: impl Into<String>, fields: &'static [FieldSpec], values: Vec<SlotValue>) -> Self {
        Self {
            block_id: block_id.into(),
            fields,
            values: values.into_iter(),
            cursor: 0,
        }
    }

    pub fn block_id(&self) -> &str {
        &self.block_id
    }

    fn next_slot(&mut self) -> Result<(FieldSpec, SlotValue)> {
        let spec = self.fields.get(self.cursor).copied();
        self.cursor += 1;
        match (spec, self.values.next()) {
            (Some(spec), Some(value)) => Ok((spec, value)),
            _ => Err(BlockforgeError::malformed(
                &self.block_id,
                format!("slot table exhausted after {} entries", self.cursor - 1),
            )),
        }
    }

    fn mismatch(&self, spec: FieldSpec, found: &SlotValue) -> BlockforgeError {
        BlockforgeError::malformed(
            &self.block_id,
            format!(
                "slot {} ({}) holds a {} but {:?} was expected",
                spec.external,
                spec.internal,
                found.mode_name(),
                spec.mode
            ),
        )
    }

    pub fn literal(&mut self) -> Result<String> {
        match self.next_slot()? {
            (_, SlotValue::Literal(text)) => Ok(text),
            (spec, other) => Err(self.mismatch(spec, &other)),
        }
    }

    /// Reads a literal and converts it with `FromStr`.
    pub fn parsed<T: FromStr>(&mut self) -> Result<T> {
        let spec = self.fields.get(self.cursor).copied();
        let text = self.literal()?;
        text.parse::<T>().map_err(|_| {
            BlockforgeError::malformed(
                &self.block_id,
                format!(
                    "invalid value '{}' for field {}",
                    text,
                    spec.map_or("?", |s| s.external)
                ),
            )
        })
    }

    /// Reads a `TRUE`/`FALSE` literal.
    pub fn flag(&mut self) -> Result<bool> {
        let spec = self.fields.get(self.cursor).copied();
        let text = self.literal()?;
        parse_flag(&text).ok_or_else(|| {
            BlockforgeError::malformed(
                &self.block_id,
                format!(
                    "field {} must be TRUE or FALSE, found '{}'",
                    spec.map_or("?", |s| s.external),
                    text
                ),
            )
        })
    }

    pub fn value(&mut self) -> Result<NodeRef> {
        match self.next_slot()? {
            (_, SlotValue::Value(node)) => Ok(node),
            (spec, other) => Err(self.mismatch(spec, &other)),
        }
    }

    pub fn statement(&mut self) -> Result<NodeRef> {
        match self.next_slot()? {
            (_, SlotValue::Statement(node)) => Ok(node),
            (spec, other) => Err(self.mismatch(spec, &other)),
        }
    }

    pub fn optional_statement(&mut self) -> Result<Option<NodeRef>> {
        match self.next_slot()? {
            (_, SlotValue::OptionalStatement(node)) => Ok(node),
            (spec, other) => Err(self.mismatch(spec, &other)),
        }
    }

    pub fn repeated(&mut self) -> Result<Vec<NodeRef>> {
        match self.next_slot()? {
            (_, SlotValue::Repeated(nodes)) => Ok(nodes),
            (spec, other) => Err(self.mismatch(spec, &other)),
        }
    }

    /// Takes every remaining slot, checked against the table modes.
    pub fn rest(&mut self) -> Result<Vec<SlotValue>> {
        let mut out = Vec::new();
        while self.cursor < self.fields.len() {
            let (spec, value) = self.next_slot()?;
            let fits = matches!(
                (spec.mode, &value),
                (FieldMode::Literal, SlotValue::Literal(_))
                    | (FieldMode::Value, SlotValue::Value(_))
                    | (FieldMode::Statement, SlotValue::Statement(_))
                    | (FieldMode::OptionalStatement, SlotValue::OptionalStatement(_))
                    | (FieldMode::RepeatedValue, SlotValue::Repeated(_))
                    | (FieldMode::RepeatedStatement, SlotValue::Repeated(_))
            );
            if !fits {
                return Err(self.mismatch(spec, &value));
            }
            out.push(value);
        }
        Ok(out)
    }

    /// Fails if slots are left over after the constructor returned.
    pub fn finish(mut self) -> Result<()> {
        if self.values.next().is_some() || self.cursor != self.fields.len() {
            return Err(BlockforgeError::malformed(
                &self.block_id,
                format!(
                    "slot count mismatch: table has {} entries, {} consumed",
                    self.fields.len(),
                    self.cursor
                ),
            ));
        }
        Ok(())
    }
}

/// Parses the `TRUE`/`FALSE` spelling used by block fields.
pub fn parse_flag(text: &str) -> Option<bool> {
    match text {
        "TRUE" => Some(true),
        "FALSE" => Some(false),
        _ => None,
    }
}

pub fn flag_str(value: bool) -> &'static str {
    if value {
        "TRUE"
    } else {
        "FALSE"
    }
}
