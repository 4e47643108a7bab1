//! Document → AST.

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, trace};

use crate::ast::phrase::StmtList;
use crate::ast::{
    BlockComment, BlockProperties, FieldMode, Instance, Kind, Node, NodeRef, Phrase, Program,
    SlotReader, SlotValue,
};
use crate::document::{BlockDoc, CommentDoc, Document};
use crate::errors::{BlockforgeError, Result};
use crate::mapper::{check_version, KindRegistry};

pub(super) fn parse_document(registry: &KindRegistry, document: &Document) -> Result<Program> {
    check_version(&document.format_version)?;
    let mut parser = Parser {
        registry,
        seen: HashSet::new(),
    };
    let instances = document
        .instances
        .iter()
        .map(|instance| {
            Ok(Instance {
                x: instance.x,
                y: instance.y,
                body: parser.chain(&instance.blocks, None)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    debug!(
        version = %document.format_version,
        instances = instances.len(),
        blocks = parser.seen.len(),
        "parsed program"
    );
    Ok(Program {
        format_version: document.format_version.clone(),
        description: document.description.clone(),
        tags: document.tags.clone(),
        instances,
    })
}

struct Parser<'r> {
    registry: &'r KindRegistry,
    seen: HashSet<String>,
}

/// Named slots of one block, removed as the table consumes them.
struct Slots<'d> {
    fields: BTreeMap<&'d str, &'d str>,
    values: BTreeMap<&'d str, &'d BlockDoc>,
    statements: BTreeMap<&'d str, &'d [BlockDoc]>,
}

impl<'d> Slots<'d> {
    fn index(block: &'d BlockDoc) -> Result<Self> {
        let duplicate =
            |name: &str| BlockforgeError::malformed(&block.id, format!("duplicate slot '{name}'"));
        let mut fields = BTreeMap::new();
        for field in &block.fields {
            if fields.insert(field.name.as_str(), field.value.as_str()).is_some() {
                return Err(duplicate(&field.name));
            }
        }
        let mut values = BTreeMap::new();
        for value in &block.values {
            if values.insert(value.name.as_str(), &value.block).is_some() {
                return Err(duplicate(&value.name));
            }
        }
        let mut statements = BTreeMap::new();
        for statement in &block.statements {
            if statements
                .insert(statement.name.as_str(), statement.blocks.as_slice())
                .is_some()
            {
                return Err(duplicate(&statement.name));
            }
        }
        Ok(Self {
            fields,
            values,
            statements,
        })
    }

    fn leftover(&self) -> Option<&'d str> {
        self.fields
            .keys()
            .chain(self.values.keys())
            .chain(self.statements.keys())
            .next()
            .copied()
    }
}

/// Branches a mutation may declare beyond the numbered slots actually present.
const MAX_EMPTY_BRANCHES: usize = 64;

/// Whether `name` is `prefix` followed by digits.
fn is_numbered(name: &str, prefix: &str) -> bool {
    name.strip_prefix(prefix)
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
}

/// Index of a numbered slot name such as `IF2`, given the prefix `IF`.
/// Only the canonical spelling counts: `IF01` has no index.
fn numbered(name: &str, prefix: &str) -> Option<usize> {
    if !is_numbered(name, prefix) {
        return None;
    }
    let rest = &name[prefix.len()..];
    if rest.len() > 1 && rest.starts_with('0') {
        return None;
    }
    rest.parse().ok()
}

/// Removes every `prefix{n}` entry from `map`, keyed by `n`.
fn take_numbered<'d, T>(
    block_id: &str,
    map: &mut BTreeMap<&'d str, T>,
    prefix: &str,
) -> Result<BTreeMap<usize, T>> {
    let names: Vec<&'d str> = map
        .keys()
        .copied()
        .filter(|name| is_numbered(name, prefix))
        .collect();
    let mut found = BTreeMap::new();
    for name in names {
        let index = numbered(name, prefix).ok_or_else(|| {
            BlockforgeError::malformed(
                block_id,
                format!("slot '{name}' is not a {prefix}<n> slot name"),
            )
        })?;
        if let Some(slot) = map.remove(name) {
            if found.insert(index, slot).is_some() {
                return Err(BlockforgeError::malformed(
                    block_id,
                    format!("slot '{prefix}{index}' is given twice"),
                ));
            }
        }
    }
    Ok(found)
}

fn empty_expr() -> NodeRef {
    Node::sealed(BlockProperties::default(), None, Phrase::EmptyExpr)
}

fn properties(block: &BlockDoc) -> BlockProperties {
    BlockProperties {
        block_id: Some(block.id.clone()),
        disabled: block.disabled,
        collapsed: block.collapsed,
        inline: block.inline,
        deletable: block.deletable,
        movable: block.movable,
        editable: block.editable,
        in_task: block.in_task,
        mutation: block.mutation.clone(),
    }
}

fn comment(doc: &CommentDoc) -> BlockComment {
    BlockComment {
        text: doc.text.clone(),
        pinned: doc.pinned,
        width: doc.w,
        height: doc.h,
    }
}

impl Parser<'_> {
    /// Maps a chain of blocks. Inside a named statement slot, expression
    /// blocks are rejected; the canvas may hold loose expressions.
    fn chain(&mut self, blocks: &[BlockDoc], slot: Option<&str>) -> Result<NodeRef> {
        let statements = blocks
            .iter()
            .map(|block| {
                let node = self.block(block)?;
                match slot {
                    Some(slot) if node.kind().is_expression() => {
                        Err(BlockforgeError::malformed(
                            &block.id,
                            format!(
                                "expression block '{}' cannot sit in statement slot '{slot}'",
                                block.block_type
                            ),
                        ))
                    }
                    _ => Ok(node),
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Node::sealed(
            BlockProperties::default(),
            None,
            Phrase::StmtList(StmtList { statements }),
        ))
    }

    /// Maps the block plugged into value slot `slot`.
    fn value(&mut self, block: &BlockDoc, slot: &str) -> Result<NodeRef> {
        let node = self.block(block)?;
        if !node.kind().is_expression() {
            return Err(BlockforgeError::malformed(
                &block.id,
                format!(
                    "statement block '{}' cannot fill value slot '{slot}'",
                    block.block_type
                ),
            ));
        }
        Ok(node)
    }

    fn block(&mut self, block: &BlockDoc) -> Result<NodeRef> {
        if block.id.is_empty() {
            return Err(BlockforgeError::malformed(
                "",
                format!("'{}' block has an empty id", block.block_type),
            ));
        }
        if !self.seen.insert(block.id.clone()) {
            return Err(BlockforgeError::malformed(&block.id, "duplicate block id"));
        }
        let kind = self.registry.lookup(&block.block_type).ok_or_else(|| {
            BlockforgeError::malformed(
                &block.id,
                format!("unknown block type '{}'", block.block_type),
            )
        })?;
        trace!(block_id = %block.id, block_type = %block.block_type, "mapping block");

        let mut slots = Slots::index(block)?;
        let hint = kind.repeat_hint(&block.id, &block.mutation)?;
        let mut values = Vec::with_capacity(kind.fields().len());
        for spec in kind.fields() {
            let name = spec.external;
            let value = match spec.mode {
                FieldMode::Literal => {
                    let text = slots.fields.remove(name).ok_or_else(|| {
                        BlockforgeError::malformed(&block.id, format!("missing field '{name}'"))
                    })?;
                    SlotValue::Literal(text.to_string())
                }
                FieldMode::Value => SlotValue::Value(match slots.values.remove(name) {
                    Some(child) => self.value(child, name)?,
                    None => empty_expr(),
                }),
                FieldMode::Statement => {
                    let blocks = slots.statements.remove(name).unwrap_or(&[]);
                    SlotValue::Statement(self.chain(blocks, Some(name))?)
                }
                FieldMode::OptionalStatement => SlotValue::OptionalStatement(
                    match slots.statements.remove(name) {
                        Some(blocks) if !blocks.is_empty() => {
                            Some(self.chain(blocks, Some(name))?)
                        }
                        _ => None,
                    },
                ),
                FieldMode::RepeatedValue => {
                    let found = take_numbered(&block.id, &mut slots.values, name)?;
                    let count = repeat_count(&block.id, name, hint, &found)?;
                    let mut nodes = Vec::with_capacity(count);
                    for i in 0..count {
                        nodes.push(match found.get(&i) {
                            Some(child) => self.value(child, &format!("{name}{i}"))?,
                            None => empty_expr(),
                        });
                    }
                    SlotValue::Repeated(nodes)
                }
                FieldMode::RepeatedStatement => {
                    let found = take_numbered(&block.id, &mut slots.statements, name)?;
                    let count = repeat_count(&block.id, name, hint, &found)?;
                    let mut nodes = Vec::with_capacity(count);
                    for i in 0..count {
                        let slot = format!("{name}{i}");
                        let blocks = found.get(&i).copied().unwrap_or(&[]);
                        nodes.push(self.chain(blocks, Some(&slot))?);
                    }
                    SlotValue::Repeated(nodes)
                }
            };
            values.push(value);
        }
        if let Some(name) = slots.leftover() {
            return Err(BlockforgeError::malformed(
                &block.id,
                format!("slot '{name}' is not used by {}", block.block_type),
            ));
        }

        let phrase = Phrase::build(kind, SlotReader::new(&block.id, kind.fields(), values))?;
        if kind == Kind::If {
            check_else_mutation(block, &phrase)?;
        }
        Ok(Node::sealed(
            properties(block),
            block.comment.as_ref().map(comment),
            phrase,
        ))
    }
}

/// Number of numbered slots: the mutation's count when it declares one,
/// otherwise one past the highest index present. Counts that would fill more
/// than [`MAX_EMPTY_BRANCHES`] absent slots are refused.
fn repeat_count<T>(
    block_id: &str,
    prefix: &str,
    hint: Option<usize>,
    found: &BTreeMap<usize, T>,
) -> Result<usize> {
    let highest = found.keys().next_back().copied();
    let count = match (hint, highest) {
        (Some(count), Some(max)) if max >= count => {
            return Err(BlockforgeError::malformed(
                block_id,
                format!("slot '{prefix}{max}' exceeds the {count} declared by the mutation"),
            ))
        }
        (Some(count), _) => count,
        (None, Some(max)) => max.saturating_add(1),
        (None, None) => 0,
    };
    if count.saturating_sub(found.len()) > MAX_EMPTY_BRANCHES {
        return Err(BlockforgeError::malformed(
            block_id,
            format!(
                "{count} '{prefix}' slots declared but only {} present",
                found.len()
            ),
        ));
    }
    Ok(count)
}

/// An `ELSE` branch with content needs `else="1"` in the mutation.
fn check_else_mutation(block: &BlockDoc, phrase: &Phrase) -> Result<()> {
    let Phrase::If(stmt) = phrase else {
        return Ok(());
    };
    let declared = match block.mutation.get("else").map(String::as_str) {
        None | Some("0") => false,
        Some("1") => true,
        Some(other) => {
            return Err(BlockforgeError::malformed(
                &block.id,
                format!("mutation else='{other}' is not 0 or 1"),
            ))
        }
    };
    if stmt.otherwise.is_some() && !declared {
        return Err(BlockforgeError::malformed(
            &block.id,
            "ELSE branch present but the mutation declares none",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_slots_need_canonical_digits() {
        assert_eq!(numbered("IF0", "IF"), Some(0));
        assert_eq!(numbered("IF12", "IF"), Some(12));
        assert_eq!(numbered("IF", "IF"), None);
        assert_eq!(numbered("IF+1", "IF"), None);
        assert_eq!(numbered("DO0", "IF"), None);
        assert_eq!(numbered("IF01", "IF"), None);
        assert_eq!(numbered("IF00", "IF"), None);
        assert!(is_numbered("IF01", "IF"));
    }

    #[test]
    fn leading_zero_slot_is_rejected() {
        let mut map = BTreeMap::from([("IF0", 'a'), ("IF01", 'b')]);
        let err = take_numbered("c", &mut map, "IF").unwrap_err();
        assert!(err.to_string().contains("IF01"), "{err}");
    }

    #[test]
    fn repeat_count_respects_hint() {
        let one = BTreeMap::from([(0usize, ())]);
        let sparse = BTreeMap::from([(0usize, ()), (3, ())]);
        assert_eq!(repeat_count("b", "IF", Some(2), &one).unwrap(), 2);
        assert_eq!(repeat_count("b", "IF", None, &sparse).unwrap(), 4);
        let stray = BTreeMap::from([(1usize, ())]);
        assert!(repeat_count("b", "IF", Some(1), &stray).is_err());
    }

    #[test]
    fn repeat_count_caps_absent_slots() {
        let one = BTreeMap::from([(0usize, ())]);
        assert!(repeat_count("b", "IF", Some(1 + MAX_EMPTY_BRANCHES), &one).is_ok());
        assert!(repeat_count("b", "IF", Some(2 + MAX_EMPTY_BRANCHES), &one).is_err());
        let far = BTreeMap::from([(5_000_000usize, ())]);
        assert!(repeat_count("b", "A", None, &far).is_err());
    }
}
