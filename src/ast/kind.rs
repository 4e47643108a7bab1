//! Node kinds and the declarative mapping table.
//!
//! Every node variant registers how its internal fields correspond to the
//! named slots of an external block through a static [`FieldSpec`] table. The
//! same table drives parsing and rendering, so a new variant only needs a
//! table entry plus its own [`Mapped`] implementation.

use std::fmt;

use crate::ast::slots::{SlotReader, SlotRef};
use crate::errors::Result;

// ============================================================================
// FIELD TABLE
// ============================================================================

/// How an external slot is represented in the AST.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldMode {
    /// A plain string value typed by the user (`<field>`).
    Literal,
    /// A single child expression (`<value>`). Absent slots map to `EmptyExpr`.
    Value,
    /// A statement list (`<statement>`). Absent slots map to an empty list.
    Statement,
    /// A statement list that is either present with content or absent.
    OptionalStatement,
    /// Numbered value slots `NAME0`, `NAME1`, ...
    RepeatedValue,
    /// Numbered statement slots `NAME0`, `NAME1`, ...
    RepeatedStatement,
}

impl FieldMode {
    pub fn is_repeated(self) -> bool {
        matches!(self, FieldMode::RepeatedValue | FieldMode::RepeatedStatement)
    }
}

/// One row of a mapping table: external slot name, internal field name, mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldSpec {
    pub external: &'static str,
    pub internal: &'static str,
    pub mode: FieldMode,
}

impl FieldSpec {
    pub const fn new(external: &'static str, internal: &'static str, mode: FieldMode) -> Self {
        Self {
            external,
            internal,
            mode,
        }
    }

    pub const fn literal(external: &'static str, internal: &'static str) -> Self {
        Self::new(external, internal, FieldMode::Literal)
    }

    pub const fn value(external: &'static str, internal: &'static str) -> Self {
        Self::new(external, internal, FieldMode::Value)
    }

    pub const fn statement(external: &'static str, internal: &'static str) -> Self {
        Self::new(external, internal, FieldMode::Statement)
    }
}

/// Implemented by every typed node variant that corresponds to an external block.
///
/// `slots()` must yield one entry per row of `FIELDS`, in table order, and
/// `from_slots()` must consume the reader in the same order.
pub trait Mapped: Sized {
    const KIND: Kind;
    const FIELDS: &'static [FieldSpec];

    fn slots(&self) -> Vec<SlotRef<'_>>;

    fn from_slots(reader: &mut SlotReader) -> Result<Self>;
}

// ============================================================================
// CATEGORIES AND KINDS
// ============================================================================

/// Coarse grouping of kinds, used by passes that treat families alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Task,
    Declaration,
    Control,
    Method,
    Expression,
    Action,
    Sensor,
}

/// A block type contributed by a plugin rather than the core catalogue.
///
/// Extension nodes store their slots generically, in `fields` order.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ExtensionSpec {
    pub block_type: &'static str,
    pub category: Category,
    pub fields: &'static [FieldSpec],
}

/// The discriminant of a node. Closed over the core catalogue; plugin block
/// types all share the `Extension` discriminant and carry their own table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    MainTask,
    VarDeclaration,
    StmtList,
    If,
    RepeatTimes,
    WhileUntil,
    ForLoop,
    FlowControl,
    Assign,
    WaitTime,
    MethodDef,
    MethodCall,
    NumConst,
    BoolConst,
    StringConst,
    VarRef,
    Arithmetic,
    Compare,
    Logic,
    Negate,
    EmptyExpr,
    MotorSetPower,
    MotorStop,
    SensorSample,
    ShowText,
    PlayTone,
    Extension(&'static ExtensionSpec),
}

/// Every core kind that has an external block type.
pub const CORE_BLOCK_KINDS: &[Kind] = &[
    Kind::MainTask,
    Kind::VarDeclaration,
    Kind::If,
    Kind::RepeatTimes,
    Kind::WhileUntil,
    Kind::ForLoop,
    Kind::FlowControl,
    Kind::Assign,
    Kind::WaitTime,
    Kind::MethodDef,
    Kind::MethodCall,
    Kind::NumConst,
    Kind::BoolConst,
    Kind::StringConst,
    Kind::VarRef,
    Kind::Arithmetic,
    Kind::Compare,
    Kind::Logic,
    Kind::Negate,
    Kind::MotorSetPower,
    Kind::MotorStop,
    Kind::SensorSample,
    Kind::ShowText,
    Kind::PlayTone,
];

impl Kind {
    /// The external block type, or `None` for structural kinds that never
    /// appear as a block of their own.
    pub fn block_type(self) -> Option<&'static str> {
        use crate::ast::phrase::*;
        let name = match self {
            Kind::StmtList | Kind::EmptyExpr => return None,
            Kind::MainTask => "robControls_start",
            Kind::VarDeclaration => "robGlobalVariables_declare",
            Kind::If => "controls_if",
            Kind::RepeatTimes => "controls_repeat_ext",
            Kind::WhileUntil => "controls_whileUntil",
            Kind::ForLoop => "controls_for",
            Kind::FlowControl => "controls_flow_statements",
            Kind::Assign => "variables_set",
            Kind::WaitTime => "robControls_wait_time",
            Kind::MethodDef => "robProcedures_defnoreturn",
            Kind::MethodCall => "robProcedures_callnoreturn",
            Kind::NumConst => "math_number",
            Kind::BoolConst => "logic_boolean",
            Kind::StringConst => "text",
            Kind::VarRef => "variables_get",
            Kind::Arithmetic => ArithOp::BLOCK_TYPE,
            Kind::Compare => CompareOp::BLOCK_TYPE,
            Kind::Logic => LogicOp::BLOCK_TYPE,
            Kind::Negate => "logic_negate",
            Kind::MotorSetPower => "robActions_motor_setPower",
            Kind::MotorStop => "robActions_motor_stop",
            Kind::SensorSample => "robSensors_getSample",
            Kind::ShowText => "robActions_display_text",
            Kind::PlayTone => "robActions_play_tone",
            Kind::Extension(spec) => spec.block_type,
        };
        Some(name)
    }

    /// The mapping table of this kind.
    pub fn fields(self) -> &'static [FieldSpec] {
        use crate::ast::phrase::*;
        match self {
            Kind::StmtList | Kind::EmptyExpr => &[],
            Kind::MainTask => MainTask::FIELDS,
            Kind::VarDeclaration => VarDeclaration::FIELDS,
            Kind::If => IfStmt::FIELDS,
            Kind::RepeatTimes => RepeatTimes::FIELDS,
            Kind::WhileUntil => WhileUntil::FIELDS,
            Kind::ForLoop => ForLoop::FIELDS,
            Kind::FlowControl => FlowControl::FIELDS,
            Kind::Assign => Assign::FIELDS,
            Kind::WaitTime => WaitTime::FIELDS,
            Kind::MethodDef => MethodDef::FIELDS,
            Kind::MethodCall => MethodCall::FIELDS,
            Kind::NumConst => NumConst::FIELDS,
            Kind::BoolConst => BoolConst::FIELDS,
            Kind::StringConst => StringConst::FIELDS,
            Kind::VarRef => VarRef::FIELDS,
            Kind::Arithmetic => Binary::<ArithOp>::FIELDS,
            Kind::Compare => Binary::<CompareOp>::FIELDS,
            Kind::Logic => Binary::<LogicOp>::FIELDS,
            Kind::Negate => Negate::FIELDS,
            Kind::MotorSetPower => MotorSetPower::FIELDS,
            Kind::MotorStop => MotorStop::FIELDS,
            Kind::SensorSample => SensorSample::FIELDS,
            Kind::ShowText => ShowText::FIELDS,
            Kind::PlayTone => PlayTone::FIELDS,
            Kind::Extension(spec) => spec.fields,
        }
    }

    pub fn category(self) -> Category {
        match self {
            Kind::MainTask => Category::Task,
            Kind::VarDeclaration => Category::Declaration,
            Kind::StmtList
            | Kind::If
            | Kind::RepeatTimes
            | Kind::WhileUntil
            | Kind::ForLoop
            | Kind::FlowControl
            | Kind::Assign
            | Kind::WaitTime => Category::Control,
            Kind::MethodDef | Kind::MethodCall => Category::Method,
            Kind::NumConst
            | Kind::BoolConst
            | Kind::StringConst
            | Kind::VarRef
            | Kind::Arithmetic
            | Kind::Compare
            | Kind::Logic
            | Kind::Negate
            | Kind::EmptyExpr => Category::Expression,
            Kind::MotorSetPower | Kind::MotorStop | Kind::ShowText | Kind::PlayTone => {
                Category::Action
            }
            Kind::SensorSample => Category::Sensor,
            Kind::Extension(spec) => spec.category,
        }
    }

    /// Kinds that fill value slots. Everything else sits in statement chains.
    pub fn is_expression(self) -> bool {
        matches!(self.category(), Category::Expression | Category::Sensor)
    }

    /// Loops are the only constructs `BREAK` and `CONTINUE` may leave.
    pub fn is_loop(self) -> bool {
        matches!(self, Kind::RepeatTimes | Kind::WhileUntil | Kind::ForLoop)
    }

    /// Number of numbered slot groups this block carries, when its mutation
    /// declares it. `controls_if` records `elseif` branches beyond the first.
    pub(crate) fn repeat_hint(
        self,
        block_id: &str,
        mutation: &std::collections::BTreeMap<String, String>,
    ) -> Result<Option<usize>> {
        if self != Kind::If {
            return Ok(None);
        }
        match mutation.get("elseif") {
            None => Ok(Some(1)),
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_add(1))
                .map(Some)
                .ok_or_else(|| {
                    crate::errors::BlockforgeError::malformed(
                        block_id,
                        format!("mutation elseif='{raw}' is not a branch count"),
                    )
                }),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.block_type() {
            Some(name) => write!(f, "{name}"),
            None => write!(f, "{self:?}"),
        }
    }
}
