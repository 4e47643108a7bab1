//! Visitor dispatch over the node tree.
//!
//! One [`Visitor`] trait serves two traversals:
//!
//! - [`Node::accept`] is read-only. Disabled nodes and nodes with
//!   `in_task == Some(false)` are skipped and yield `None`; handlers recurse
//!   explicitly, so a skipped node hides its whole subtree.
//! - [`Node::modify`] rewrites. It visits every node regardless of flags and
//!   requires the handler result to convert into a node.
//!
//! Dispatch is an exhaustive match over [`Phrase`]. Every `visit_*` handler
//! defaults to [`Visitor::visit_default`], the one method a visitor must
//! write, so visitors keep compiling when kinds are added.

use std::sync::Arc;

use crate::ast::phrase::*;
use crate::ast::{Node, NodeRef, Phrase};
use crate::errors::{BlockforgeError, Result};

pub mod rewrite;

pub use rewrite::{rebuild_children, ConstantFolder};

// ============================================================================
// VISITOR TRAIT
// ============================================================================

pub trait Visitor {
    type Output;

    /// Fallback for every kind without a dedicated handler.
    fn visit_default(&mut self, node: &NodeRef) -> Self::Output;

    fn visit_main_task(&mut self, node: &NodeRef, _task: &MainTask) -> Self::Output {
        self.visit_default(node)
    }
    fn visit_var_declaration(&mut self, node: &NodeRef, _decl: &VarDeclaration) -> Self::Output {
        self.visit_default(node)
    }
    fn visit_stmt_list(&mut self, node: &NodeRef, _list: &StmtList) -> Self::Output {
        self.visit_default(node)
    }
    fn visit_if(&mut self, node: &NodeRef, _stmt: &IfStmt) -> Self::Output {
        self.visit_default(node)
    }
    fn visit_repeat_times(&mut self, node: &NodeRef, _stmt: &RepeatTimes) -> Self::Output {
        self.visit_default(node)
    }
    fn visit_while_until(&mut self, node: &NodeRef, _stmt: &WhileUntil) -> Self::Output {
        self.visit_default(node)
    }
    fn visit_for_loop(&mut self, node: &NodeRef, _stmt: &ForLoop) -> Self::Output {
        self.visit_default(node)
    }
    fn visit_flow_control(&mut self, node: &NodeRef, _stmt: &FlowControl) -> Self::Output {
        self.visit_default(node)
    }
    fn visit_assign(&mut self, node: &NodeRef, _stmt: &Assign) -> Self::Output {
        self.visit_default(node)
    }
    fn visit_wait_time(&mut self, node: &NodeRef, _stmt: &WaitTime) -> Self::Output {
        self.visit_default(node)
    }
    fn visit_method_def(&mut self, node: &NodeRef, _def: &MethodDef) -> Self::Output {
        self.visit_default(node)
    }
    fn visit_method_call(&mut self, node: &NodeRef, _call: &MethodCall) -> Self::Output {
        self.visit_default(node)
    }
    fn visit_num_const(&mut self, node: &NodeRef, _num: &NumConst) -> Self::Output {
        self.visit_default(node)
    }
    fn visit_bool_const(&mut self, node: &NodeRef, _value: &BoolConst) -> Self::Output {
        self.visit_default(node)
    }
    fn visit_string_const(&mut self, node: &NodeRef, _text: &StringConst) -> Self::Output {
        self.visit_default(node)
    }
    fn visit_var_ref(&mut self, node: &NodeRef, _var: &VarRef) -> Self::Output {
        self.visit_default(node)
    }
    fn visit_arithmetic(&mut self, node: &NodeRef, _expr: &Binary<ArithOp>) -> Self::Output {
        self.visit_default(node)
    }
    fn visit_compare(&mut self, node: &NodeRef, _expr: &Binary<CompareOp>) -> Self::Output {
        self.visit_default(node)
    }
    fn visit_logic(&mut self, node: &NodeRef, _expr: &Binary<LogicOp>) -> Self::Output {
        self.visit_default(node)
    }
    fn visit_negate(&mut self, node: &NodeRef, _expr: &Negate) -> Self::Output {
        self.visit_default(node)
    }
    fn visit_empty_expr(&mut self, node: &NodeRef) -> Self::Output {
        self.visit_default(node)
    }
    fn visit_motor_set_power(&mut self, node: &NodeRef, _action: &MotorSetPower) -> Self::Output {
        self.visit_default(node)
    }
    fn visit_motor_stop(&mut self, node: &NodeRef, _action: &MotorStop) -> Self::Output {
        self.visit_default(node)
    }
    fn visit_sensor_sample(&mut self, node: &NodeRef, _sensor: &SensorSample) -> Self::Output {
        self.visit_default(node)
    }
    fn visit_show_text(&mut self, node: &NodeRef, _action: &ShowText) -> Self::Output {
        self.visit_default(node)
    }
    fn visit_play_tone(&mut self, node: &NodeRef, _action: &PlayTone) -> Self::Output {
        self.visit_default(node)
    }
    fn visit_extension(&mut self, node: &NodeRef, _ext: &Extension) -> Self::Output {
        self.visit_default(node)
    }
}

/// Calls the handler matching the node's variant. Ignores traversal flags.
pub fn dispatch<V: Visitor + ?Sized>(node: &NodeRef, visitor: &mut V) -> V::Output {
    match node.phrase() {
        Phrase::MainTask(p) => visitor.visit_main_task(node, p),
        Phrase::VarDeclaration(p) => visitor.visit_var_declaration(node, p),
        Phrase::StmtList(p) => visitor.visit_stmt_list(node, p),
        Phrase::If(p) => visitor.visit_if(node, p),
        Phrase::RepeatTimes(p) => visitor.visit_repeat_times(node, p),
        Phrase::WhileUntil(p) => visitor.visit_while_until(node, p),
        Phrase::ForLoop(p) => visitor.visit_for_loop(node, p),
        Phrase::FlowControl(p) => visitor.visit_flow_control(node, p),
        Phrase::Assign(p) => visitor.visit_assign(node, p),
        Phrase::WaitTime(p) => visitor.visit_wait_time(node, p),
        Phrase::MethodDef(p) => visitor.visit_method_def(node, p),
        Phrase::MethodCall(p) => visitor.visit_method_call(node, p),
        Phrase::NumConst(p) => visitor.visit_num_const(node, p),
        Phrase::BoolConst(p) => visitor.visit_bool_const(node, p),
        Phrase::StringConst(p) => visitor.visit_string_const(node, p),
        Phrase::VarRef(p) => visitor.visit_var_ref(node, p),
        Phrase::Arithmetic(p) => visitor.visit_arithmetic(node, p),
        Phrase::Compare(p) => visitor.visit_compare(node, p),
        Phrase::Logic(p) => visitor.visit_logic(node, p),
        Phrase::Negate(p) => visitor.visit_negate(node, p),
        Phrase::EmptyExpr => visitor.visit_empty_expr(node),
        Phrase::MotorSetPower(p) => visitor.visit_motor_set_power(node, p),
        Phrase::MotorStop(p) => visitor.visit_motor_stop(node, p),
        Phrase::SensorSample(p) => visitor.visit_sensor_sample(node, p),
        Phrase::ShowText(p) => visitor.visit_show_text(node, p),
        Phrase::PlayTone(p) => visitor.visit_play_tone(node, p),
        Phrase::Extension(p) => visitor.visit_extension(node, p),
    }
}

// ============================================================================
// REWRITE RESULTS
// ============================================================================

/// Conversion of a handler result into the node a rewrite produced.
///
/// `Ok(None)` means the handler returned something that is not a node,
/// which `modify` reports as a contract violation.
pub trait VisitResult {
    fn into_node(self) -> Result<Option<NodeRef>>;
}

impl VisitResult for NodeRef {
    fn into_node(self) -> Result<Option<NodeRef>> {
        Ok(Some(self))
    }
}

impl VisitResult for Option<NodeRef> {
    fn into_node(self) -> Result<Option<NodeRef>> {
        Ok(self)
    }
}

impl VisitResult for Result<NodeRef> {
    fn into_node(self) -> Result<Option<NodeRef>> {
        self.map(Some)
    }
}

impl VisitResult for () {
    fn into_node(self) -> Result<Option<NodeRef>> {
        Ok(None)
    }
}

impl VisitResult for bool {
    fn into_node(self) -> Result<Option<NodeRef>> {
        Ok(None)
    }
}

// ============================================================================
// TRAVERSAL ENTRY POINTS
// ============================================================================

impl Node {
    /// Read-only visit. `None` when the node is excluded from passes.
    pub fn accept<V: Visitor + ?Sized>(self: &Arc<Self>, visitor: &mut V) -> Option<V::Output> {
        if !self.is_active() {
            return None;
        }
        Some(dispatch(self, visitor))
    }

    /// Rewriting visit. Reaches disabled and detached nodes too.
    pub fn modify<V>(self: &Arc<Self>, visitor: &mut V) -> Result<NodeRef>
    where
        V: Visitor + ?Sized,
        V::Output: VisitResult,
    {
        dispatch(self, visitor).into_node()?.ok_or_else(|| {
            BlockforgeError::contract(self.kind(), "rewrite visitor returned a non-node result")
        })
    }
}

/// Accepts every child of `node` in table order, dropping skipped ones.
pub fn accept_children<V: Visitor + ?Sized>(node: &NodeRef, visitor: &mut V) -> Vec<V::Output> {
    node.children()
        .into_iter()
        .filter_map(|child| child.accept(visitor))
        .collect()
}
