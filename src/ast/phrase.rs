//! Typed payloads of every node variant.
//!
//! Each struct owns its children exclusively and implements [`Mapped`], which
//! ties it to its row set in the mapping table. [`Phrase`] is the closed sum
//! over all of them; dispatch in [`crate::visit`] matches it exhaustively.

use std::borrow::Cow;

use crate::ast::kind::{ExtensionSpec, FieldMode, FieldSpec, Kind, Mapped};
use crate::ast::slots::{flag_str, SlotReader, SlotRef, SlotValue};
use crate::ast::NodeRef;
use crate::errors::{BlockforgeError, Result};

// ============================================================================
// LITERAL ENUMS
// ============================================================================

/// Declares an enum whose variants are spelled as fixed block field values.
macro_rules! literal_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("unknown {} '{}'", stringify!($name), other)),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

literal_enum!(
    /// Declared type of a variable.
    DataType {
        Number => "Number",
        Boolean => "Boolean",
        String => "String",
    }
);

literal_enum!(
    /// Loop flavour of `controls_whileUntil`.
    LoopMode {
        While => "WHILE",
        Until => "UNTIL",
    }
);

literal_enum!(
    Flow {
        Break => "BREAK",
        Continue => "CONTINUE",
    }
);

literal_enum!(
    ArithOp {
        Add => "ADD",
        Minus => "MINUS",
        Multiply => "MULTIPLY",
        Divide => "DIVIDE",
        Power => "POWER",
    }
);

literal_enum!(
    CompareOp {
        Eq => "EQ",
        Neq => "NEQ",
        Lt => "LT",
        Lte => "LTE",
        Gt => "GT",
        Gte => "GTE",
    }
);

literal_enum!(
    LogicOp {
        And => "AND",
        Or => "OR",
    }
);

impl CompareOp {
    /// Ordering comparisons only make sense on numbers.
    pub fn is_ordering(self) -> bool {
        !matches!(self, CompareOp::Eq | CompareOp::Neq)
    }
}

// ============================================================================
// STRUCTURE
// ============================================================================

/// Entry block of a program; its `ST` slot holds the global declarations.
#[derive(Debug, Clone, PartialEq)]
pub struct MainTask {
    pub debug: bool,
    pub declarations: NodeRef,
}

impl Mapped for MainTask {
    const KIND: Kind = Kind::MainTask;
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::literal("DEBUG", "debug"),
        FieldSpec::statement("ST", "declarations"),
    ];

    fn slots(&self) -> Vec<SlotRef<'_>> {
        vec![
            SlotRef::Literal(Cow::Borrowed(flag_str(self.debug))),
            SlotRef::Statement(&self.declarations),
        ]
    }

    fn from_slots(r: &mut SlotReader) -> Result<Self> {
        Ok(Self {
            debug: r.flag()?,
            declarations: r.statement()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDeclaration {
    pub name: String,
    pub data_type: DataType,
    pub value: NodeRef,
}

impl Mapped for VarDeclaration {
    const KIND: Kind = Kind::VarDeclaration;
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::literal("VAR", "name"),
        FieldSpec::literal("TYPE", "data_type"),
        FieldSpec::value("VALUE", "value"),
    ];

    fn slots(&self) -> Vec<SlotRef<'_>> {
        vec![
            SlotRef::Literal(Cow::Borrowed(&self.name)),
            SlotRef::Literal(Cow::Borrowed(self.data_type.as_str())),
            SlotRef::Value(&self.value),
        ]
    }

    fn from_slots(r: &mut SlotReader) -> Result<Self> {
        Ok(Self {
            name: r.literal()?,
            data_type: r.parsed()?,
            value: r.value()?,
        })
    }
}

/// Ordered statements of one statement slot or one top-level chain.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StmtList {
    pub statements: Vec<NodeRef>,
}

// ============================================================================
// CONTROL
// ============================================================================

/// `if / else if* / else?`. `conditions[i]` guards `branches[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub conditions: Vec<NodeRef>,
    pub branches: Vec<NodeRef>,
    pub otherwise: Option<NodeRef>,
}

impl Mapped for IfStmt {
    const KIND: Kind = Kind::If;
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::new("IF", "conditions", FieldMode::RepeatedValue),
        FieldSpec::new("DO", "branches", FieldMode::RepeatedStatement),
        FieldSpec::new("ELSE", "otherwise", FieldMode::OptionalStatement),
    ];

    fn slots(&self) -> Vec<SlotRef<'_>> {
        vec![
            SlotRef::Repeated(self.conditions.iter().collect()),
            SlotRef::Repeated(self.branches.iter().collect()),
            SlotRef::OptionalStatement(self.otherwise.as_ref()),
        ]
    }

    fn from_slots(r: &mut SlotReader) -> Result<Self> {
        let conditions = r.repeated()?;
        let branches = r.repeated()?;
        let otherwise = r.optional_statement()?;
        if conditions.is_empty() || conditions.len() != branches.len() {
            return Err(BlockforgeError::malformed(
                r.block_id(),
                format!(
                    "if block needs matching conditions and branches, found {} and {}",
                    conditions.len(),
                    branches.len()
                ),
            ));
        }
        Ok(Self {
            conditions,
            branches,
            otherwise,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RepeatTimes {
    pub times: NodeRef,
    pub body: NodeRef,
}

impl Mapped for RepeatTimes {
    const KIND: Kind = Kind::RepeatTimes;
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::value("TIMES", "times"),
        FieldSpec::statement("DO", "body"),
    ];

    fn slots(&self) -> Vec<SlotRef<'_>> {
        vec![SlotRef::Value(&self.times), SlotRef::Statement(&self.body)]
    }

    fn from_slots(r: &mut SlotReader) -> Result<Self> {
        Ok(Self {
            times: r.value()?,
            body: r.statement()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileUntil {
    pub mode: LoopMode,
    pub condition: NodeRef,
    pub body: NodeRef,
}

impl Mapped for WhileUntil {
    const KIND: Kind = Kind::WhileUntil;
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::literal("MODE", "mode"),
        FieldSpec::value("BOOL", "condition"),
        FieldSpec::statement("DO", "body"),
    ];

    fn slots(&self) -> Vec<SlotRef<'_>> {
        vec![
            SlotRef::Literal(Cow::Borrowed(self.mode.as_str())),
            SlotRef::Value(&self.condition),
            SlotRef::Statement(&self.body),
        ]
    }

    fn from_slots(r: &mut SlotReader) -> Result<Self> {
        Ok(Self {
            mode: r.parsed()?,
            condition: r.value()?,
            body: r.statement()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForLoop {
    pub var: String,
    pub from: NodeRef,
    pub to: NodeRef,
    pub by: NodeRef,
    pub body: NodeRef,
}

impl Mapped for ForLoop {
    const KIND: Kind = Kind::ForLoop;
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::literal("VAR", "var"),
        FieldSpec::value("FROM", "from"),
        FieldSpec::value("TO", "to"),
        FieldSpec::value("BY", "by"),
        FieldSpec::statement("DO", "body"),
    ];

    fn slots(&self) -> Vec<SlotRef<'_>> {
        vec![
            SlotRef::Literal(Cow::Borrowed(&self.var)),
            SlotRef::Value(&self.from),
            SlotRef::Value(&self.to),
            SlotRef::Value(&self.by),
            SlotRef::Statement(&self.body),
        ]
    }

    fn from_slots(r: &mut SlotReader) -> Result<Self> {
        Ok(Self {
            var: r.literal()?,
            from: r.value()?,
            to: r.value()?,
            by: r.value()?,
            body: r.statement()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlowControl {
    pub flow: Flow,
}

impl Mapped for FlowControl {
    const KIND: Kind = Kind::FlowControl;
    const FIELDS: &'static [FieldSpec] = &[FieldSpec::literal("FLOW", "flow")];

    fn slots(&self) -> Vec<SlotRef<'_>> {
        vec![SlotRef::Literal(Cow::Borrowed(self.flow.as_str()))]
    }

    fn from_slots(r: &mut SlotReader) -> Result<Self> {
        Ok(Self { flow: r.parsed()? })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assign {
    pub name: String,
    pub value: NodeRef,
}

impl Mapped for Assign {
    const KIND: Kind = Kind::Assign;
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::literal("VAR", "name"),
        FieldSpec::value("VALUE", "value"),
    ];

    fn slots(&self) -> Vec<SlotRef<'_>> {
        vec![
            SlotRef::Literal(Cow::Borrowed(&self.name)),
            SlotRef::Value(&self.value),
        ]
    }

    fn from_slots(r: &mut SlotReader) -> Result<Self> {
        Ok(Self {
            name: r.literal()?,
            value: r.value()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WaitTime {
    pub duration: NodeRef,
}

impl Mapped for WaitTime {
    const KIND: Kind = Kind::WaitTime;
    const FIELDS: &'static [FieldSpec] = &[FieldSpec::value("WAIT", "duration")];

    fn slots(&self) -> Vec<SlotRef<'_>> {
        vec![SlotRef::Value(&self.duration)]
    }

    fn from_slots(r: &mut SlotReader) -> Result<Self> {
        Ok(Self {
            duration: r.value()?,
        })
    }
}

// ============================================================================
// METHODS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct MethodDef {
    pub name: String,
    pub body: NodeRef,
}

impl Mapped for MethodDef {
    const KIND: Kind = Kind::MethodDef;
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::literal("NAME", "name"),
        FieldSpec::statement("STACK", "body"),
    ];

    fn slots(&self) -> Vec<SlotRef<'_>> {
        vec![
            SlotRef::Literal(Cow::Borrowed(&self.name)),
            SlotRef::Statement(&self.body),
        ]
    }

    fn from_slots(r: &mut SlotReader) -> Result<Self> {
        Ok(Self {
            name: r.literal()?,
            body: r.statement()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub name: String,
}

impl Mapped for MethodCall {
    const KIND: Kind = Kind::MethodCall;
    const FIELDS: &'static [FieldSpec] = &[FieldSpec::literal("NAME", "name")];

    fn slots(&self) -> Vec<SlotRef<'_>> {
        vec![SlotRef::Literal(Cow::Borrowed(&self.name))]
    }

    fn from_slots(r: &mut SlotReader) -> Result<Self> {
        Ok(Self { name: r.literal()? })
    }
}

// ============================================================================
// EXPRESSIONS
// ============================================================================

/// Number literal. The text is kept as typed so `50` and `50.0` survive a
/// round trip unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct NumConst {
    pub value: String,
}

impl NumConst {
    pub fn as_f64(&self) -> Option<f64> {
        self.value.trim().parse::<f64>().ok()
    }
}

impl Mapped for NumConst {
    const KIND: Kind = Kind::NumConst;
    const FIELDS: &'static [FieldSpec] = &[FieldSpec::literal("NUM", "value")];

    fn slots(&self) -> Vec<SlotRef<'_>> {
        vec![SlotRef::Literal(Cow::Borrowed(&self.value))]
    }

    fn from_slots(r: &mut SlotReader) -> Result<Self> {
        Ok(Self { value: r.literal()? })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoolConst {
    pub value: bool,
}

impl Mapped for BoolConst {
    const KIND: Kind = Kind::BoolConst;
    const FIELDS: &'static [FieldSpec] = &[FieldSpec::literal("BOOL", "value")];

    fn slots(&self) -> Vec<SlotRef<'_>> {
        vec![SlotRef::Literal(Cow::Borrowed(flag_str(self.value)))]
    }

    fn from_slots(r: &mut SlotReader) -> Result<Self> {
        Ok(Self { value: r.flag()? })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StringConst {
    pub value: String,
}

impl Mapped for StringConst {
    const KIND: Kind = Kind::StringConst;
    const FIELDS: &'static [FieldSpec] = &[FieldSpec::literal("TEXT", "value")];

    fn slots(&self) -> Vec<SlotRef<'_>> {
        vec![SlotRef::Literal(Cow::Borrowed(&self.value))]
    }

    fn from_slots(r: &mut SlotReader) -> Result<Self> {
        Ok(Self { value: r.literal()? })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarRef {
    pub name: String,
}

impl Mapped for VarRef {
    const KIND: Kind = Kind::VarRef;
    const FIELDS: &'static [FieldSpec] = &[FieldSpec::literal("VAR", "name")];

    fn slots(&self) -> Vec<SlotRef<'_>> {
        vec![SlotRef::Literal(Cow::Borrowed(&self.name))]
    }

    fn from_slots(r: &mut SlotReader) -> Result<Self> {
        Ok(Self { name: r.literal()? })
    }
}

/// Operator families sharing the `OP`/`A`/`B` block layout.
pub trait BinaryOp:
    Copy + PartialEq + std::fmt::Debug + std::str::FromStr + std::fmt::Display
{
    const KIND: Kind;
    const BLOCK_TYPE: &'static str;

    fn as_str(self) -> &'static str;
}

impl BinaryOp for ArithOp {
    const KIND: Kind = Kind::Arithmetic;
    const BLOCK_TYPE: &'static str = "math_arithmetic";

    fn as_str(self) -> &'static str {
        ArithOp::as_str(self)
    }
}

impl BinaryOp for CompareOp {
    const KIND: Kind = Kind::Compare;
    const BLOCK_TYPE: &'static str = "logic_compare";

    fn as_str(self) -> &'static str {
        CompareOp::as_str(self)
    }
}

impl BinaryOp for LogicOp {
    const KIND: Kind = Kind::Logic;
    const BLOCK_TYPE: &'static str = "logic_operation";

    fn as_str(self) -> &'static str {
        LogicOp::as_str(self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Binary<Op> {
    pub op: Op,
    pub left: NodeRef,
    pub right: NodeRef,
}

const BINARY_FIELDS: &[FieldSpec] = &[
    FieldSpec::literal("OP", "op"),
    FieldSpec::value("A", "left"),
    FieldSpec::value("B", "right"),
];

impl<Op: BinaryOp> Mapped for Binary<Op> {
    const KIND: Kind = Op::KIND;
    const FIELDS: &'static [FieldSpec] = BINARY_FIELDS;

    fn slots(&self) -> Vec<SlotRef<'_>> {
        vec![
            SlotRef::Literal(Cow::Borrowed(BinaryOp::as_str(self.op))),
            SlotRef::Value(&self.left),
            SlotRef::Value(&self.right),
        ]
    }

    fn from_slots(r: &mut SlotReader) -> Result<Self> {
        Ok(Self {
            op: r.parsed()?,
            left: r.value()?,
            right: r.value()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Negate {
    pub operand: NodeRef,
}

impl Mapped for Negate {
    const KIND: Kind = Kind::Negate;
    const FIELDS: &'static [FieldSpec] = &[FieldSpec::value("BOOL", "operand")];

    fn slots(&self) -> Vec<SlotRef<'_>> {
        vec![SlotRef::Value(&self.operand)]
    }

    fn from_slots(r: &mut SlotReader) -> Result<Self> {
        Ok(Self {
            operand: r.value()?,
        })
    }
}

// ============================================================================
// ROBOT ACTIONS AND SENSORS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct MotorSetPower {
    pub port: String,
    pub power: NodeRef,
}

impl Mapped for MotorSetPower {
    const KIND: Kind = Kind::MotorSetPower;
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::literal("MOTORPORT", "port"),
        FieldSpec::value("POWER", "power"),
    ];

    fn slots(&self) -> Vec<SlotRef<'_>> {
        vec![
            SlotRef::Literal(Cow::Borrowed(&self.port)),
            SlotRef::Value(&self.power),
        ]
    }

    fn from_slots(r: &mut SlotReader) -> Result<Self> {
        Ok(Self {
            port: r.literal()?,
            power: r.value()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MotorStop {
    pub port: String,
}

impl Mapped for MotorStop {
    const KIND: Kind = Kind::MotorStop;
    const FIELDS: &'static [FieldSpec] = &[FieldSpec::literal("MOTORPORT", "port")];

    fn slots(&self) -> Vec<SlotRef<'_>> {
        vec![SlotRef::Literal(Cow::Borrowed(&self.port))]
    }

    fn from_slots(r: &mut SlotReader) -> Result<Self> {
        Ok(Self { port: r.literal()? })
    }
}

/// Reads one sample from the sensor of type `sensor` plugged into `port`.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSample {
    pub sensor: String,
    pub port: String,
}

impl SensorSample {
    /// Touch sensors and keys report pressed/not pressed; everything else
    /// reports a number.
    pub fn is_boolean(&self) -> bool {
        matches!(self.sensor.as_str(), "touch" | "key")
    }
}

impl Mapped for SensorSample {
    const KIND: Kind = Kind::SensorSample;
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::literal("SENSORTYPE", "sensor"),
        FieldSpec::literal("SENSORPORT", "port"),
    ];

    fn slots(&self) -> Vec<SlotRef<'_>> {
        vec![
            SlotRef::Literal(Cow::Borrowed(&self.sensor)),
            SlotRef::Literal(Cow::Borrowed(&self.port)),
        ]
    }

    fn from_slots(r: &mut SlotReader) -> Result<Self> {
        Ok(Self {
            sensor: r.literal()?,
            port: r.literal()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShowText {
    pub text: NodeRef,
}

impl Mapped for ShowText {
    const KIND: Kind = Kind::ShowText;
    const FIELDS: &'static [FieldSpec] = &[FieldSpec::value("OUT", "text")];

    fn slots(&self) -> Vec<SlotRef<'_>> {
        vec![SlotRef::Value(&self.text)]
    }

    fn from_slots(r: &mut SlotReader) -> Result<Self> {
        Ok(Self { text: r.value()? })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayTone {
    pub frequency: NodeRef,
    pub duration: NodeRef,
}

impl Mapped for PlayTone {
    const KIND: Kind = Kind::PlayTone;
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::value("FREQUENCE", "frequency"),
        FieldSpec::value("DURATION", "duration"),
    ];

    fn slots(&self) -> Vec<SlotRef<'_>> {
        vec![SlotRef::Value(&self.frequency), SlotRef::Value(&self.duration)]
    }

    fn from_slots(r: &mut SlotReader) -> Result<Self> {
        Ok(Self {
            frequency: r.value()?,
            duration: r.value()?,
        })
    }
}

// ============================================================================
// EXTENSIONS
// ============================================================================

/// Payload of a plugin-registered block: slots stored in `spec.fields` order.
#[derive(Debug, Clone, PartialEq)]
pub struct Extension {
    pub spec: &'static ExtensionSpec,
    pub slots: Vec<SlotValue>,
}

impl Extension {
    pub fn block_type(&self) -> &'static str {
        self.spec.block_type
    }

    fn position(&self, internal: &str) -> Option<usize> {
        self.spec.fields.iter().position(|f| f.internal == internal)
    }

    /// The literal stored under the internal field name, if any.
    pub fn literal(&self, internal: &str) -> Option<&str> {
        match self.slots.get(self.position(internal)?)? {
            SlotValue::Literal(text) => Some(text),
            _ => None,
        }
    }

    /// The child value stored under the internal field name, if any.
    pub fn value(&self, internal: &str) -> Option<&NodeRef> {
        match self.slots.get(self.position(internal)?)? {
            SlotValue::Value(node) => Some(node),
            _ => None,
        }
    }
}

// ============================================================================
// THE SUM TYPE
// ============================================================================

/// Variant-specific content of a node.
#[derive(Debug, Clone, PartialEq)]
pub enum Phrase {
    MainTask(MainTask),
    VarDeclaration(VarDeclaration),
    StmtList(StmtList),
    If(IfStmt),
    RepeatTimes(RepeatTimes),
    WhileUntil(WhileUntil),
    ForLoop(ForLoop),
    FlowControl(FlowControl),
    Assign(Assign),
    WaitTime(WaitTime),
    MethodDef(MethodDef),
    MethodCall(MethodCall),
    NumConst(NumConst),
    BoolConst(BoolConst),
    StringConst(StringConst),
    VarRef(VarRef),
    Arithmetic(Binary<ArithOp>),
    Compare(Binary<CompareOp>),
    Logic(Binary<LogicOp>),
    Negate(Negate),
    EmptyExpr,
    MotorSetPower(MotorSetPower),
    MotorStop(MotorStop),
    SensorSample(SensorSample),
    ShowText(ShowText),
    PlayTone(PlayTone),
    Extension(Extension),
}

impl Phrase {
    pub fn kind(&self) -> Kind {
        match self {
            Phrase::MainTask(_) => Kind::MainTask,
            Phrase::VarDeclaration(_) => Kind::VarDeclaration,
            Phrase::StmtList(_) => Kind::StmtList,
            Phrase::If(_) => Kind::If,
            Phrase::RepeatTimes(_) => Kind::RepeatTimes,
            Phrase::WhileUntil(_) => Kind::WhileUntil,
            Phrase::ForLoop(_) => Kind::ForLoop,
            Phrase::FlowControl(_) => Kind::FlowControl,
            Phrase::Assign(_) => Kind::Assign,
            Phrase::WaitTime(_) => Kind::WaitTime,
            Phrase::MethodDef(_) => Kind::MethodDef,
            Phrase::MethodCall(_) => Kind::MethodCall,
            Phrase::NumConst(_) => Kind::NumConst,
            Phrase::BoolConst(_) => Kind::BoolConst,
            Phrase::StringConst(_) => Kind::StringConst,
            Phrase::VarRef(_) => Kind::VarRef,
            Phrase::Arithmetic(_) => Kind::Arithmetic,
            Phrase::Compare(_) => Kind::Compare,
            Phrase::Logic(_) => Kind::Logic,
            Phrase::Negate(_) => Kind::Negate,
            Phrase::EmptyExpr => Kind::EmptyExpr,
            Phrase::MotorSetPower(_) => Kind::MotorSetPower,
            Phrase::MotorStop(_) => Kind::MotorStop,
            Phrase::SensorSample(_) => Kind::SensorSample,
            Phrase::ShowText(_) => Kind::ShowText,
            Phrase::PlayTone(_) => Kind::PlayTone,
            Phrase::Extension(ext) => Kind::Extension(ext.spec),
        }
    }

    /// Slot contents in mapping-table order. Structural kinds have none.
    pub fn slots(&self) -> Vec<SlotRef<'_>> {
        match self {
            Phrase::StmtList(_) | Phrase::EmptyExpr => Vec::new(),
            Phrase::MainTask(p) => p.slots(),
            Phrase::VarDeclaration(p) => p.slots(),
            Phrase::If(p) => p.slots(),
            Phrase::RepeatTimes(p) => p.slots(),
            Phrase::WhileUntil(p) => p.slots(),
            Phrase::ForLoop(p) => p.slots(),
            Phrase::FlowControl(p) => p.slots(),
            Phrase::Assign(p) => p.slots(),
            Phrase::WaitTime(p) => p.slots(),
            Phrase::MethodDef(p) => p.slots(),
            Phrase::MethodCall(p) => p.slots(),
            Phrase::NumConst(p) => p.slots(),
            Phrase::BoolConst(p) => p.slots(),
            Phrase::StringConst(p) => p.slots(),
            Phrase::VarRef(p) => p.slots(),
            Phrase::Arithmetic(p) => p.slots(),
            Phrase::Compare(p) => p.slots(),
            Phrase::Logic(p) => p.slots(),
            Phrase::Negate(p) => p.slots(),
            Phrase::MotorSetPower(p) => p.slots(),
            Phrase::MotorStop(p) => p.slots(),
            Phrase::SensorSample(p) => p.slots(),
            Phrase::ShowText(p) => p.slots(),
            Phrase::PlayTone(p) => p.slots(),
            Phrase::Extension(ext) => ext.slots.iter().map(SlotValue::as_slot_ref).collect(),
        }
    }

    /// Direct children in table order.
    pub fn children(&self) -> Vec<&NodeRef> {
        match self {
            Phrase::StmtList(list) => list.statements.iter().collect(),
            other => other.slots().iter().flat_map(|slot| slot.nodes()).collect(),
        }
    }

    /// Builds the payload of `kind` from slot values in table order.
    pub fn build(kind: Kind, mut reader: SlotReader) -> Result<Phrase> {
        let phrase = match kind {
            Kind::StmtList | Kind::EmptyExpr => {
                return Err(BlockforgeError::malformed(
                    reader.block_id(),
                    format!("{kind:?} has no slot table"),
                ))
            }
            Kind::MainTask => Phrase::MainTask(MainTask::from_slots(&mut reader)?),
            Kind::VarDeclaration => Phrase::VarDeclaration(VarDeclaration::from_slots(&mut reader)?),
            Kind::If => Phrase::If(IfStmt::from_slots(&mut reader)?),
            Kind::RepeatTimes => Phrase::RepeatTimes(RepeatTimes::from_slots(&mut reader)?),
            Kind::WhileUntil => Phrase::WhileUntil(WhileUntil::from_slots(&mut reader)?),
            Kind::ForLoop => Phrase::ForLoop(ForLoop::from_slots(&mut reader)?),
            Kind::FlowControl => Phrase::FlowControl(FlowControl::from_slots(&mut reader)?),
            Kind::Assign => Phrase::Assign(Assign::from_slots(&mut reader)?),
            Kind::WaitTime => Phrase::WaitTime(WaitTime::from_slots(&mut reader)?),
            Kind::MethodDef => Phrase::MethodDef(MethodDef::from_slots(&mut reader)?),
            Kind::MethodCall => Phrase::MethodCall(MethodCall::from_slots(&mut reader)?),
            Kind::NumConst => Phrase::NumConst(NumConst::from_slots(&mut reader)?),
            Kind::BoolConst => Phrase::BoolConst(BoolConst::from_slots(&mut reader)?),
            Kind::StringConst => Phrase::StringConst(StringConst::from_slots(&mut reader)?),
            Kind::VarRef => Phrase::VarRef(VarRef::from_slots(&mut reader)?),
            Kind::Arithmetic => Phrase::Arithmetic(Binary::from_slots(&mut reader)?),
            Kind::Compare => Phrase::Compare(Binary::from_slots(&mut reader)?),
            Kind::Logic => Phrase::Logic(Binary::from_slots(&mut reader)?),
            Kind::Negate => Phrase::Negate(Negate::from_slots(&mut reader)?),
            Kind::MotorSetPower => Phrase::MotorSetPower(MotorSetPower::from_slots(&mut reader)?),
            Kind::MotorStop => Phrase::MotorStop(MotorStop::from_slots(&mut reader)?),
            Kind::SensorSample => Phrase::SensorSample(SensorSample::from_slots(&mut reader)?),
            Kind::ShowText => Phrase::ShowText(ShowText::from_slots(&mut reader)?),
            Kind::PlayTone => Phrase::PlayTone(PlayTone::from_slots(&mut reader)?),
            Kind::Extension(spec) => Phrase::Extension(Extension {
                spec,
                slots: reader.rest()?,
            }),
        };
        reader.finish()?;
        Ok(phrase)
    }

    /// Copy of this payload with every child passed through `f`.
    pub fn map_children<F>(&self, block_id: &str, mut f: F) -> Result<Phrase>
    where
        F: FnMut(&NodeRef) -> Result<NodeRef>,
    {
        match self {
            Phrase::StmtList(list) => Ok(Phrase::StmtList(StmtList {
                statements: list.statements.iter().map(&mut f).collect::<Result<_>>()?,
            })),
            Phrase::EmptyExpr => Ok(Phrase::EmptyExpr),
            other => {
                let kind = other.kind();
                let values = other
                    .slots()
                    .iter()
                    .map(|slot| slot.map_nodes(&mut f))
                    .collect::<Result<Vec<_>>>()?;
                Phrase::build(kind, SlotReader::new(block_id, kind.fields(), values))
            }
        }
    }
}
