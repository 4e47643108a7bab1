//! The common validator/collector pass.
//!
//! [`CommonValidator`] implements every check shared by all targets and
//! hands hardware-facing blocks to the selected [`Platform`]. Findings go
//! into a [`Collector`], the private per-run context holding the run's
//! [`DiagnosticStore`] and [`FeatureBean`]. The shared tree is never touched.

use std::collections::{HashMap, HashSet};
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, trace};

use crate::ast::phrase::*;
use crate::ast::{Category, Node, NodeId, NodeRef, Phrase, Program};
use crate::diagnostics::{codes, DiagCode, Diagnostic, DiagnosticStore};
use crate::validation::bean::{self, FeatureBean};
use crate::validation::config::{ComponentCategory, HardwareConfig};
use crate::validation::platform::Platform;
use crate::validation::ValidationOutcome;
use crate::visit::{accept_children, Visitor};

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("identifier pattern is valid")
});

pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

// ============================================================================
// COLLECTOR
// ============================================================================

/// Per-run context: configuration in, diagnostics and facts out.
#[derive(Debug)]
pub struct Collector<'c> {
    config: &'c HardwareConfig,
    store: DiagnosticStore,
    bean: FeatureBean,
}

impl<'c> Collector<'c> {
    pub fn new(config: &'c HardwareConfig) -> Self {
        Self {
            config,
            store: DiagnosticStore::new(),
            bean: FeatureBean::new(),
        }
    }

    pub fn config(&self) -> &'c HardwareConfig {
        self.config
    }

    pub fn diagnostics(&self) -> &DiagnosticStore {
        &self.store
    }

    pub fn bean(&self) -> &FeatureBean {
        &self.bean
    }

    pub fn report(&mut self, node: &Node, diagnostic: Diagnostic) {
        trace!(node = %node.label(), code = %diagnostic.code, "diagnostic");
        self.store.push(node, diagnostic);
    }

    pub fn error(&mut self, node: &Node, code: DiagCode, message: impl Into<String>) {
        self.report(node, Diagnostic::error(code, message));
    }

    pub fn warning(&mut self, node: &Node, code: DiagCode, message: impl Into<String>) {
        self.report(node, Diagnostic::warning(code, message));
    }

    pub fn info(&mut self, node: &Node, code: DiagCode, message: impl Into<String>) {
        self.report(node, Diagnostic::info(code, message));
    }

    pub fn record(&mut self, feature: &str, fact: impl Into<String>) {
        self.bean.record(feature, fact);
    }

    /// Checks that a motor is configured on `port` and records it.
    pub fn require_motor(&mut self, node: &Node, port: &str) -> bool {
        match self.config.component(port) {
            None => {
                self.error(
                    node,
                    codes::PORT_MISSING,
                    format!("no motor is configured on port {port}"),
                );
                false
            }
            Some(component) if component.category != ComponentCategory::Motor => {
                self.error(
                    node,
                    codes::PORT_WRONG_KIND,
                    format!("port {port} holds a {}, not a motor", component.category),
                );
                false
            }
            Some(_) => {
                self.record(bean::MOTOR, port);
                true
            }
        }
    }

    /// Checks that a sensor of type `sensor` is configured on `port` and
    /// records it as `port:sensor`.
    pub fn require_sensor(&mut self, node: &Node, sensor: &str, port: &str) -> bool {
        match self.config.component(port) {
            None => {
                self.error(
                    node,
                    codes::PORT_MISSING,
                    format!("no sensor is configured on port {port}"),
                );
                false
            }
            Some(component) if component.category != ComponentCategory::Sensor => {
                self.error(
                    node,
                    codes::PORT_WRONG_KIND,
                    format!("port {port} holds a {}, not a sensor", component.category),
                );
                false
            }
            Some(component) if component.kind != sensor => {
                self.error(
                    node,
                    codes::PORT_WRONG_KIND,
                    format!(
                        "port {port} holds a {} sensor but the block reads {sensor}",
                        component.kind
                    ),
                );
                false
            }
            Some(_) => {
                self.record(bean::SENSOR, format!("{port}:{sensor}"));
                true
            }
        }
    }

    /// Checks an on-board capability and records `fact` under it.
    pub fn require_capability(&mut self, node: &Node, capability: &str, fact: &str) -> bool {
        if !self.config.has_capability(capability) {
            self.error(
                node,
                codes::CAPABILITY_MISSING,
                format!("the {} configuration has no {capability}", self.config.robot),
            );
            return false;
        }
        self.record(capability, fact);
        true
    }

    pub fn finish(self, platform: &'static str) -> ValidationOutcome {
        ValidationOutcome {
            platform,
            diagnostics: self.store,
            bean: self.bean,
        }
    }
}

// ============================================================================
// EXPRESSION TYPES
// ============================================================================

/// Static type of an expression as far as the checker can tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ty {
    Number,
    Boolean,
    String,
    /// Statements.
    Void,
    /// Missing or already reported; matches anything.
    Unknown,
}

impl Ty {
    fn fits(self, want: Ty) -> bool {
        self == want || self == Ty::Unknown || want == Ty::Unknown
    }
}

impl From<DataType> for Ty {
    fn from(value: DataType) -> Self {
        match value {
            DataType::Number => Ty::Number,
            DataType::Boolean => Ty::Boolean,
            DataType::String => Ty::String,
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Ty::Number => "Number",
            Ty::Boolean => "Boolean",
            Ty::String => "String",
            Ty::Void => "a statement",
            Ty::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

// ============================================================================
// COMMON VALIDATOR
// ============================================================================

#[derive(Debug, Clone)]
struct VarInfo {
    ty: Ty,
    declared_at: NodeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Declarations,
    Body,
}

/// Shared checks over one program for one platform.
pub struct CommonValidator<'c> {
    cx: Collector<'c>,
    platform: &'c dyn Platform,
    scope: im::HashMap<String, VarInfo>,
    declarations: Vec<(NodeRef, String)>,
    used: HashSet<NodeId>,
    methods: HashMap<String, NodeId>,
    loop_depth: usize,
    phase: Phase,
}

impl<'c> CommonValidator<'c> {
    pub fn new(platform: &'c dyn Platform, config: &'c HardwareConfig) -> Self {
        Self {
            cx: Collector::new(config),
            platform,
            scope: im::HashMap::new(),
            declarations: Vec::new(),
            used: HashSet::new(),
            methods: HashMap::new(),
            loop_depth: 0,
            phase: Phase::Declarations,
        }
    }

    /// Runs every check over `program` and returns the run's findings.
    ///
    /// Global declarations are read first so methods may use them wherever
    /// their chain sits on the canvas.
    pub fn run(mut self, program: &Program) -> ValidationOutcome {
        let top_level: Vec<&NodeRef> = program
            .instances
            .iter()
            .flat_map(|instance| instance.statements())
            .filter(|node| node.is_active())
            .collect();

        for node in &top_level {
            if let Phrase::MethodDef(def) = node.phrase() {
                self.define_method(node, def);
            }
        }

        for node in &top_level {
            if matches!(node.phrase(), Phrase::MainTask(_)) {
                node.accept(&mut self);
            }
        }
        self.phase = Phase::Body;
        for instance in &program.instances {
            instance.body.accept(&mut self);
        }

        for (node, name) in std::mem::take(&mut self.declarations) {
            if !self.used.contains(&node.id()) {
                self.cx.warning(
                    &node,
                    codes::UNUSED_VARIABLE,
                    format!("variable '{name}' is never used"),
                );
            }
        }

        debug!(
            platform = self.platform.name(),
            diagnostics = self.cx.diagnostics().len(),
            "validation finished"
        );
        self.cx.finish(self.platform.name())
    }

    fn define_method(&mut self, node: &NodeRef, def: &MethodDef) {
        if !is_identifier(&def.name) {
            self.cx.error(
                node,
                codes::INVALID_NAME,
                format!("'{}' is not a valid method name", def.name),
            );
        }
        if self.methods.contains_key(&def.name) {
            self.cx.error(
                node,
                codes::DUPLICATE_METHOD,
                format!("method '{}' is defined more than once", def.name),
            );
            return;
        }
        self.methods.insert(def.name.clone(), node.id());
        self.cx.record(bean::METHOD, def.name.clone());
    }

    /// Visits a value slot of `parent` and checks its type.
    fn expect(&mut self, parent: &NodeRef, child: &NodeRef, want: Ty, what: &str) -> Ty {
        if matches!(child.phrase(), Phrase::EmptyExpr) {
            self.cx.error(
                parent,
                codes::MISSING_EXPRESSION,
                format!("{} is missing its {what}", parent.kind()),
            );
            return Ty::Unknown;
        }
        let got = child.accept(self).unwrap_or(Ty::Unknown);
        if !got.fits(want) {
            self.cx.error(
                child,
                codes::TYPE_MISMATCH,
                format!("{what} must be {want}, found {got}"),
            );
            return Ty::Unknown;
        }
        got
    }

    fn body(&mut self, node: &NodeRef) {
        node.accept(self);
    }

    fn loop_body(&mut self, node: &NodeRef) {
        self.loop_depth += 1;
        self.body(node);
        self.loop_depth -= 1;
    }

    fn lookup(&mut self, node: &NodeRef, name: &str) -> Ty {
        match self.scope.get(name) {
            Some(info) => {
                self.used.insert(info.declared_at);
                info.ty
            }
            None => {
                self.cx.error(
                    node,
                    codes::UNDECLARED_VARIABLE,
                    format!("variable '{name}' is used before it is declared"),
                );
                Ty::Unknown
            }
        }
    }
}

impl Visitor for CommonValidator<'_> {
    type Output = Ty;

    fn visit_default(&mut self, node: &NodeRef) -> Ty {
        accept_children(node, self);
        Ty::Unknown
    }

    fn visit_stmt_list(&mut self, _node: &NodeRef, list: &StmtList) -> Ty {
        for stmt in &list.statements {
            stmt.accept(self);
        }
        Ty::Void
    }

    fn visit_main_task(&mut self, _node: &NodeRef, task: &MainTask) -> Ty {
        if self.phase == Phase::Declarations {
            self.body(&task.declarations);
        }
        Ty::Void
    }

    fn visit_var_declaration(&mut self, node: &NodeRef, decl: &VarDeclaration) -> Ty {
        let declared = Ty::from(decl.data_type);
        if !is_identifier(&decl.name) {
            self.cx.error(
                node,
                codes::INVALID_NAME,
                format!("'{}' is not a valid variable name", decl.name),
            );
        }
        self.expect(node, &decl.value, declared, "initial value");
        if self.scope.contains_key(&decl.name) {
            self.cx.error(
                node,
                codes::DUPLICATE_VARIABLE,
                format!("variable '{}' is declared more than once", decl.name),
            );
            return Ty::Void;
        }
        self.scope.insert(
            decl.name.clone(),
            VarInfo {
                ty: declared,
                declared_at: node.id(),
            },
        );
        self.declarations.push((node.clone(), decl.name.clone()));
        self.cx.record(bean::VARIABLE, decl.name.clone());
        Ty::Void
    }

    fn visit_if(&mut self, node: &NodeRef, stmt: &IfStmt) -> Ty {
        for (condition, branch) in stmt.conditions.iter().zip(&stmt.branches) {
            self.expect(node, condition, Ty::Boolean, "condition");
            self.body(branch);
        }
        if let Some(otherwise) = &stmt.otherwise {
            self.body(otherwise);
        }
        Ty::Void
    }

    fn visit_repeat_times(&mut self, node: &NodeRef, stmt: &RepeatTimes) -> Ty {
        self.expect(node, &stmt.times, Ty::Number, "repeat count");
        self.loop_body(&stmt.body);
        Ty::Void
    }

    fn visit_while_until(&mut self, node: &NodeRef, stmt: &WhileUntil) -> Ty {
        self.expect(node, &stmt.condition, Ty::Boolean, "condition");
        self.loop_body(&stmt.body);
        Ty::Void
    }

    fn visit_for_loop(&mut self, node: &NodeRef, stmt: &ForLoop) -> Ty {
        if !is_identifier(&stmt.var) {
            self.cx.error(
                node,
                codes::INVALID_NAME,
                format!("'{}' is not a valid variable name", stmt.var),
            );
        }
        self.expect(node, &stmt.from, Ty::Number, "start value");
        self.expect(node, &stmt.to, Ty::Number, "end value");
        self.expect(node, &stmt.by, Ty::Number, "step");

        let saved = self.scope.clone();
        self.scope.insert(
            stmt.var.clone(),
            VarInfo {
                ty: Ty::Number,
                declared_at: node.id(),
            },
        );
        self.loop_body(&stmt.body);
        self.scope = saved;
        Ty::Void
    }

    fn visit_flow_control(&mut self, node: &NodeRef, stmt: &FlowControl) -> Ty {
        if self.loop_depth == 0 {
            self.cx.error(
                node,
                codes::FLOW_OUTSIDE_LOOP,
                format!("{} is only allowed inside a loop", stmt.flow),
            );
        }
        Ty::Void
    }

    fn visit_assign(&mut self, node: &NodeRef, stmt: &Assign) -> Ty {
        let target = self.lookup(node, &stmt.name);
        self.expect(node, &stmt.value, target, "assigned value");
        Ty::Void
    }

    fn visit_wait_time(&mut self, node: &NodeRef, stmt: &WaitTime) -> Ty {
        self.expect(node, &stmt.duration, Ty::Number, "duration");
        Ty::Void
    }

    fn visit_method_def(&mut self, _node: &NodeRef, def: &MethodDef) -> Ty {
        let depth = std::mem::replace(&mut self.loop_depth, 0);
        let saved = self.scope.clone();
        self.body(&def.body);
        self.scope = saved;
        self.loop_depth = depth;
        Ty::Void
    }

    fn visit_method_call(&mut self, node: &NodeRef, call: &MethodCall) -> Ty {
        if !self.methods.contains_key(&call.name) {
            self.cx.error(
                node,
                codes::UNDEFINED_METHOD,
                format!("method '{}' is not defined", call.name),
            );
        }
        Ty::Void
    }

    fn visit_num_const(&mut self, node: &NodeRef, num: &NumConst) -> Ty {
        if num.as_f64().is_none() {
            self.cx.error(
                node,
                codes::INVALID_NUMBER,
                format!("'{}' is not a number", num.value),
            );
            return Ty::Unknown;
        }
        Ty::Number
    }

    fn visit_bool_const(&mut self, _node: &NodeRef, _value: &BoolConst) -> Ty {
        Ty::Boolean
    }

    fn visit_string_const(&mut self, _node: &NodeRef, _text: &StringConst) -> Ty {
        Ty::String
    }

    fn visit_var_ref(&mut self, node: &NodeRef, var: &VarRef) -> Ty {
        self.lookup(node, &var.name)
    }

    fn visit_arithmetic(&mut self, node: &NodeRef, expr: &Binary<ArithOp>) -> Ty {
        self.expect(node, &expr.left, Ty::Number, "left operand");
        self.expect(node, &expr.right, Ty::Number, "right operand");
        Ty::Number
    }

    fn visit_compare(&mut self, node: &NodeRef, expr: &Binary<CompareOp>) -> Ty {
        let operand = if expr.op.is_ordering() {
            Ty::Number
        } else {
            Ty::Unknown
        };
        let left = self.expect(node, &expr.left, operand, "left operand");
        let right = self.expect(node, &expr.right, operand, "right operand");
        if !left.fits(right) {
            self.cx.error(
                node,
                codes::TYPE_MISMATCH,
                format!("cannot compare {left} with {right}"),
            );
        }
        Ty::Boolean
    }

    fn visit_logic(&mut self, node: &NodeRef, expr: &Binary<LogicOp>) -> Ty {
        self.expect(node, &expr.left, Ty::Boolean, "left operand");
        self.expect(node, &expr.right, Ty::Boolean, "right operand");
        Ty::Boolean
    }

    fn visit_negate(&mut self, node: &NodeRef, expr: &Negate) -> Ty {
        self.expect(node, &expr.operand, Ty::Boolean, "operand");
        Ty::Boolean
    }

    fn visit_empty_expr(&mut self, _node: &NodeRef) -> Ty {
        Ty::Unknown
    }

    fn visit_motor_set_power(&mut self, node: &NodeRef, action: &MotorSetPower) -> Ty {
        self.expect(node, &action.power, Ty::Number, "power");
        self.platform.check_motor(&mut self.cx, node, action);
        Ty::Void
    }

    fn visit_motor_stop(&mut self, node: &NodeRef, action: &MotorStop) -> Ty {
        self.platform.check_motor_stop(&mut self.cx, node, action);
        Ty::Void
    }

    fn visit_sensor_sample(&mut self, node: &NodeRef, sensor: &SensorSample) -> Ty {
        self.platform.check_sensor(&mut self.cx, node, sensor);
        if sensor.is_boolean() {
            Ty::Boolean
        } else {
            Ty::Number
        }
    }

    fn visit_show_text(&mut self, node: &NodeRef, action: &ShowText) -> Ty {
        self.expect(node, &action.text, Ty::Unknown, "text");
        self.platform.check_show_text(&mut self.cx, node, action);
        Ty::Void
    }

    fn visit_play_tone(&mut self, node: &NodeRef, action: &PlayTone) -> Ty {
        self.expect(node, &action.frequency, Ty::Number, "frequency");
        self.expect(node, &action.duration, Ty::Number, "duration");
        self.platform.check_tone(&mut self.cx, node, action);
        Ty::Void
    }

    fn visit_extension(&mut self, node: &NodeRef, ext: &Extension) -> Ty {
        let known = self
            .platform
            .extension_kinds()
            .iter()
            .any(|spec| **spec == *ext.spec);
        if !known {
            self.cx.error(
                node,
                codes::UNKNOWN_BLOCK,
                format!(
                    "block '{}' is not available on {}",
                    ext.block_type(),
                    self.platform.name()
                ),
            );
            return Ty::Unknown;
        }
        accept_children(node, self);
        self.platform.check_extension(&mut self.cx, node, ext);
        if ext.spec.category == Category::Expression {
            Ty::Unknown
        } else {
            Ty::Void
        }
    }
}
