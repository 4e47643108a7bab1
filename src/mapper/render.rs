//! AST → document.

use tracing::debug;

use crate::ast::{FieldMode, NodeRef, Phrase, Program, SlotRef};
use crate::document::{
    AnnotationDoc, BlockDoc, CommentDoc, Document, FieldDoc, InstanceDoc, StatementDoc, ValueDoc,
};
use crate::errors::{BlockforgeError, Result};

pub(super) fn render_program(program: &Program) -> Result<Document> {
    let instances = program
        .instances
        .iter()
        .map(|instance| {
            Ok(InstanceDoc {
                x: instance.x,
                y: instance.y,
                blocks: chain(&instance.body)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    debug!(instances = instances.len(), "rendered program");
    Ok(Document {
        format_version: program.format_version.clone(),
        description: program.description.clone(),
        tags: program.tags.clone(),
        instances,
    })
}

fn chain(node: &NodeRef) -> Result<Vec<BlockDoc>> {
    match node.phrase() {
        Phrase::StmtList(list) => list.statements.iter().map(block).collect(),
        _ => Err(BlockforgeError::contract(
            node.kind(),
            "statement slot must hold a statement list",
        )),
    }
}

fn statement(name: String, node: &NodeRef) -> Result<Option<StatementDoc>> {
    let blocks = chain(node)?;
    Ok((!blocks.is_empty()).then_some(StatementDoc { name, blocks }))
}

fn value(name: String, node: &NodeRef) -> Result<Option<ValueDoc>> {
    match node.phrase() {
        Phrase::EmptyExpr => Ok(None),
        Phrase::StmtList(_) => Err(BlockforgeError::contract(
            node.kind(),
            "value slot cannot hold a statement list",
        )),
        _ => Ok(Some(ValueDoc {
            name,
            block: block(node)?,
        })),
    }
}

fn block(node: &NodeRef) -> Result<BlockDoc> {
    let kind = node.kind();
    let block_type = kind
        .block_type()
        .ok_or_else(|| BlockforgeError::contract(kind, "structural node rendered as a block"))?;
    let props = node.properties();
    let mut doc = BlockDoc::new(node.label(), block_type);
    doc.disabled = props.disabled;
    doc.collapsed = props.collapsed;
    doc.inline = props.inline;
    doc.deletable = props.deletable;
    doc.movable = props.movable;
    doc.editable = props.editable;
    doc.in_task = props.in_task;
    doc.mutation = props.mutation.clone();
    doc.comment = node.comment().map(|c| CommentDoc {
        text: c.text.clone(),
        pinned: c.pinned,
        w: c.width,
        h: c.height,
    });
    doc.annotations = node
        .diagnostics()
        .into_iter()
        .map(|d| AnnotationDoc {
            severity: d.severity.to_string(),
            code: d.code.to_string(),
            message: d.message,
        })
        .collect();

    for (spec, slot) in kind.fields().iter().zip(node.phrase().slots()) {
        let name = spec.external;
        match slot {
            SlotRef::Literal(text) => doc.fields.push(FieldDoc {
                name: name.to_string(),
                value: text.into_owned(),
            }),
            SlotRef::Value(child) => doc.values.extend(value(name.to_string(), child)?),
            SlotRef::Statement(child) => {
                doc.statements.extend(statement(name.to_string(), child)?)
            }
            SlotRef::OptionalStatement(child) => {
                if let Some(child) = child {
                    doc.statements.extend(statement(name.to_string(), child)?);
                }
            }
            SlotRef::Repeated(children) => {
                for (i, child) in children.into_iter().enumerate() {
                    let numbered = format!("{name}{i}");
                    if spec.mode == FieldMode::RepeatedValue {
                        doc.values.extend(value(numbered, child)?);
                    } else {
                        doc.statements.extend(statement(numbered, child)?);
                    }
                }
            }
        }
    }
    Ok(doc)
}
