//! Tree rewriting.
//!
//! Rewrites build a new tree and share every unchanged subtree with the
//! original through `Arc`. [`rebuild_children`] is the building block;
//! [`ConstantFolder`] is the reference rewrite pass built on it.

use std::sync::Arc;

use tracing::trace;

use crate::ast::phrase::{ArithOp, Binary, BoolConst, CompareOp, LogicOp, Negate, NumConst};
use crate::ast::{NodeRef, Phrase};
use crate::errors::Result;
use crate::visit::{VisitResult, Visitor};

/// Rewrites every child of `node` with `visitor`. Returns `node` itself when
/// no child changed, otherwise a new sealed node with a fresh id.
pub fn rebuild_children<V>(node: &NodeRef, visitor: &mut V) -> Result<NodeRef>
where
    V: Visitor + ?Sized,
    V::Output: VisitResult,
{
    if node.children().is_empty() {
        return Ok(node.clone());
    }
    let mut changed = false;
    let phrase = node.phrase().map_children(&node.label(), |child| {
        let next = child.modify(visitor)?;
        changed |= !Arc::ptr_eq(&next, child);
        Ok(next)
    })?;
    if changed {
        Ok(node.with_phrase(phrase))
    } else {
        Ok(node.clone())
    }
}

/// Folds operators whose operands are constants.
///
/// Number results keep integer spelling when exact (`2 + 3` → `5`).
/// Division by zero and non-finite results are left alone.
#[derive(Debug, Default)]
pub struct ConstantFolder {
    folded: usize,
}

impl ConstantFolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of operator nodes replaced so far.
    pub fn folded(&self) -> usize {
        self.folded
    }

    fn replace(&mut self, node: &NodeRef, phrase: Phrase) -> NodeRef {
        self.folded += 1;
        trace!(node = %node.label(), kind = %node.kind(), "folded constant");
        node.with_phrase(phrase)
    }
}

fn number(node: &NodeRef) -> Option<f64> {
    match node.phrase() {
        Phrase::NumConst(num) => num.as_f64(),
        _ => None,
    }
}

fn boolean(node: &NodeRef) -> Option<bool> {
    match node.phrase() {
        Phrase::BoolConst(b) => Some(b.value),
        _ => None,
    }
}

/// Shortest spelling of a folded number.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

fn arith(op: ArithOp, a: f64, b: f64) -> Option<f64> {
    let result = match op {
        ArithOp::Add => a + b,
        ArithOp::Minus => a - b,
        ArithOp::Multiply => a * b,
        ArithOp::Divide if b == 0.0 => return None,
        ArithOp::Divide => a / b,
        ArithOp::Power => a.powf(b),
    };
    result.is_finite().then_some(result)
}

fn compare(op: CompareOp, a: f64, b: f64) -> bool {
    match op {
        CompareOp::Eq => a == b,
        CompareOp::Neq => a != b,
        CompareOp::Lt => a < b,
        CompareOp::Lte => a <= b,
        CompareOp::Gt => a > b,
        CompareOp::Gte => a >= b,
    }
}

impl Visitor for ConstantFolder {
    type Output = Result<NodeRef>;

    fn visit_default(&mut self, node: &NodeRef) -> Result<NodeRef> {
        rebuild_children(node, self)
    }

    fn visit_arithmetic(&mut self, node: &NodeRef, _expr: &Binary<ArithOp>) -> Result<NodeRef> {
        let node = rebuild_children(node, self)?;
        if let Phrase::Arithmetic(expr) = node.phrase() {
            if let (Some(a), Some(b)) = (number(&expr.left), number(&expr.right)) {
                if let Some(value) = arith(expr.op, a, b) {
                    let value = format_number(value);
                    return Ok(self.replace(&node, Phrase::NumConst(NumConst { value })));
                }
            }
        }
        Ok(node)
    }

    fn visit_compare(&mut self, node: &NodeRef, _expr: &Binary<CompareOp>) -> Result<NodeRef> {
        let node = rebuild_children(node, self)?;
        if let Phrase::Compare(expr) = node.phrase() {
            let folded = match (number(&expr.left), number(&expr.right)) {
                (Some(a), Some(b)) => Some(compare(expr.op, a, b)),
                _ => match (boolean(&expr.left), boolean(&expr.right), expr.op) {
                    (Some(a), Some(b), CompareOp::Eq) => Some(a == b),
                    (Some(a), Some(b), CompareOp::Neq) => Some(a != b),
                    _ => None,
                },
            };
            if let Some(value) = folded {
                return Ok(self.replace(&node, Phrase::BoolConst(BoolConst { value })));
            }
        }
        Ok(node)
    }

    fn visit_logic(&mut self, node: &NodeRef, _expr: &Binary<LogicOp>) -> Result<NodeRef> {
        let node = rebuild_children(node, self)?;
        if let Phrase::Logic(expr) = node.phrase() {
            if let (Some(a), Some(b)) = (boolean(&expr.left), boolean(&expr.right)) {
                let value = match expr.op {
                    LogicOp::And => a && b,
                    LogicOp::Or => a || b,
                };
                return Ok(self.replace(&node, Phrase::BoolConst(BoolConst { value })));
            }
        }
        Ok(node)
    }

    fn visit_negate(&mut self, node: &NodeRef, _expr: &Negate) -> Result<NodeRef> {
        let node = rebuild_children(node, self)?;
        if let Phrase::Negate(expr) = node.phrase() {
            if let Some(value) = boolean(&expr.operand) {
                return Ok(self.replace(&node, Phrase::BoolConst(BoolConst { value: !value })));
            }
        }
        Ok(node)
    }
}
