// Property-based tests over generated block graphs.
//
// Programs are generated as small shape trees, then laid out as documents
// with unique block ids. Every generated document must survive a round
// trip, and constant folding must reach a fixed point in one pass.

use std::sync::Arc;

use blockforge::document::{self, BlockDoc, Document, FieldDoc, InstanceDoc, StatementDoc, ValueDoc};
use blockforge::visit::ConstantFolder;
use blockforge::{run_validation, HardwareConfig, Mapper};
use proptest::prelude::*;

// ============================================================================
// SHAPES
// ============================================================================

#[derive(Debug, Clone)]
enum Expr {
    Num(i32),
    Bool(bool),
    Var(&'static str),
    /// An empty value slot.
    Hole,
    Arith(&'static str, Box<Expr>, Box<Expr>),
    Compare(&'static str, Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

#[derive(Debug, Clone)]
struct Flags {
    disabled: bool,
    collapsed: bool,
    in_task: Option<bool>,
}

#[derive(Debug, Clone)]
enum Stmt {
    Wait(Expr),
    Stop(&'static str),
    Assign(&'static str, Expr),
    Repeat(Expr, Vec<Block>),
    If(Vec<(Expr, Vec<Block>)>, Option<Vec<Block>>),
}

#[derive(Debug, Clone)]
struct Block {
    flags: Flags,
    stmt: Stmt,
}

fn arb_expr() -> impl Strategy<Value = Expr> {
    let leaf = prop_oneof![
        4 => (-500i32..500).prop_map(Expr::Num),
        2 => any::<bool>().prop_map(Expr::Bool),
        2 => prop_oneof![Just("x"), Just("y")].prop_map(Expr::Var),
        1 => Just(Expr::Hole),
    ];
    leaf.prop_recursive(4, 24, 2, |inner| {
        prop_oneof![
            (
                prop_oneof![Just("ADD"), Just("MINUS"), Just("MULTIPLY"), Just("DIVIDE")],
                inner.clone(),
                inner.clone()
            )
                .prop_map(|(op, a, b)| Expr::Arith(op, Box::new(a), Box::new(b))),
            (
                prop_oneof![Just("EQ"), Just("NEQ"), Just("LT"), Just("GTE")],
                inner.clone(),
                inner.clone()
            )
                .prop_map(|(op, a, b)| Expr::Compare(op, Box::new(a), Box::new(b))),
            inner.prop_map(|e| Expr::Not(Box::new(e))),
        ]
    })
}

fn arb_flags() -> impl Strategy<Value = Flags> {
    (
        prop::bool::weighted(0.15),
        prop::bool::weighted(0.15),
        prop::option::weighted(0.2, any::<bool>()),
    )
        .prop_map(|(disabled, collapsed, in_task)| Flags {
            disabled,
            collapsed,
            in_task,
        })
}

fn arb_block() -> impl Strategy<Value = Block> {
    let leaf = (
        arb_flags(),
        prop_oneof![
            arb_expr().prop_map(Stmt::Wait),
            prop_oneof![Just("A"), Just("B"), Just("C")].prop_map(Stmt::Stop),
            (prop_oneof![Just("x"), Just("y")], arb_expr()).prop_map(|(v, e)| Stmt::Assign(v, e)),
        ],
    )
        .prop_map(|(flags, stmt)| Block { flags, stmt });

    leaf.prop_recursive(3, 32, 3, |inner| {
        let chain = prop::collection::vec(inner, 0..3);
        (
            arb_flags(),
            prop_oneof![
                (arb_expr(), chain.clone()).prop_map(|(times, body)| Stmt::Repeat(times, body)),
                (
                    prop::collection::vec((arb_expr(), chain.clone()), 1..3),
                    // An emitted ELSE always has content.
                    prop::option::of(chain.prop_filter("non-empty else", |c| !c.is_empty())),
                )
                    .prop_map(|(arms, otherwise)| Stmt::If(arms, otherwise)),
            ],
        )
            .prop_map(|(flags, stmt)| Block { flags, stmt })
    })
}

fn arb_document() -> impl Strategy<Value = Document> {
    prop::collection::vec(
        (-400i64..400, -400i64..400, prop::collection::vec(arb_block(), 1..5)),
        1..3,
    )
    .prop_map(|instances| {
        let mut layout = Layout { next: 0 };
        Document {
            format_version: "3.1".to_string(),
            description: String::new(),
            tags: Vec::new(),
            instances: instances
                .iter()
                .map(|(x, y, blocks)| InstanceDoc {
                    x: *x,
                    y: *y,
                    blocks: blocks.iter().map(|b| layout.block(b)).collect(),
                })
                .collect(),
        }
    })
}

// ============================================================================
// LAYOUT
// ============================================================================

/// Turns shapes into documents, numbering blocks in pre-order.
struct Layout {
    next: usize,
}

impl Layout {
    fn new_block(&mut self, block_type: &str) -> BlockDoc {
        self.next += 1;
        BlockDoc::new(format!("b{}", self.next), block_type)
    }

    fn field(doc: &mut BlockDoc, name: &str, value: impl Into<String>) {
        doc.fields.push(FieldDoc {
            name: name.to_string(),
            value: value.into(),
        });
    }

    fn value(&mut self, doc: &mut BlockDoc, name: &str, expr: &Expr) {
        if let Some(block) = self.expr(expr) {
            doc.values.push(ValueDoc {
                name: name.to_string(),
                block,
            });
        }
    }

    fn chain(&mut self, doc: &mut BlockDoc, name: &str, blocks: &[Block]) {
        if blocks.is_empty() {
            return;
        }
        let blocks = blocks.iter().map(|b| self.block(b)).collect();
        doc.statements.push(StatementDoc {
            name: name.to_string(),
            blocks,
        });
    }

    fn expr(&mut self, expr: &Expr) -> Option<BlockDoc> {
        let doc = match expr {
            Expr::Hole => return None,
            Expr::Num(n) => {
                let mut doc = self.new_block("math_number");
                Self::field(&mut doc, "NUM", n.to_string());
                doc
            }
            Expr::Bool(b) => {
                let mut doc = self.new_block("logic_boolean");
                Self::field(&mut doc, "BOOL", if *b { "TRUE" } else { "FALSE" });
                doc
            }
            Expr::Var(name) => {
                let mut doc = self.new_block("variables_get");
                Self::field(&mut doc, "VAR", *name);
                doc
            }
            Expr::Arith(op, a, b) | Expr::Compare(op, a, b) => {
                let block_type = if matches!(expr, Expr::Arith(..)) {
                    "math_arithmetic"
                } else {
                    "logic_compare"
                };
                let mut doc = self.new_block(block_type);
                Self::field(&mut doc, "OP", *op);
                self.value(&mut doc, "A", a);
                self.value(&mut doc, "B", b);
                doc
            }
            Expr::Not(operand) => {
                let mut doc = self.new_block("logic_negate");
                self.value(&mut doc, "BOOL", operand);
                doc
            }
        };
        Some(doc)
    }

    fn block(&mut self, block: &Block) -> BlockDoc {
        let mut doc = match &block.stmt {
            Stmt::Wait(duration) => {
                let mut doc = self.new_block("robControls_wait_time");
                self.value(&mut doc, "WAIT", duration);
                doc
            }
            Stmt::Stop(port) => {
                let mut doc = self.new_block("robActions_motor_stop");
                Self::field(&mut doc, "MOTORPORT", *port);
                doc
            }
            Stmt::Assign(name, value) => {
                let mut doc = self.new_block("variables_set");
                Self::field(&mut doc, "VAR", *name);
                self.value(&mut doc, "VALUE", value);
                doc
            }
            Stmt::Repeat(times, body) => {
                let mut doc = self.new_block("controls_repeat_ext");
                self.value(&mut doc, "TIMES", times);
                self.chain(&mut doc, "DO", body);
                doc
            }
            Stmt::If(arms, otherwise) => {
                let mut doc = self.new_block("controls_if");
                if arms.len() > 1 {
                    doc.mutation
                        .insert("elseif".to_string(), (arms.len() - 1).to_string());
                }
                for (i, (condition, branch)) in arms.iter().enumerate() {
                    self.value(&mut doc, &format!("IF{i}"), condition);
                    self.chain(&mut doc, &format!("DO{i}"), branch);
                }
                if let Some(otherwise) = otherwise {
                    doc.mutation.insert("else".to_string(), "1".to_string());
                    self.chain(&mut doc, "ELSE", otherwise);
                }
                doc
            }
        };
        doc.disabled = block.flags.disabled;
        doc.collapsed = block.flags.collapsed;
        doc.in_task = block.flags.in_task;
        doc
    }
}

// ============================================================================
// PROPERTIES
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        max_shrink_iters: 200,
        .. ProptestConfig::default()
    })]

    #[test]
    fn generated_documents_round_trip(doc in arb_document()) {
        let mapper = Mapper::default();
        let program = mapper.parse(&doc).unwrap();
        let rendered = mapper.render(&program).unwrap();

        prop_assert!(
            document::equivalent(&doc, &rendered),
            "render changed the document:\n{}",
            document::diff(&doc, &rendered)
                .map(|c| c.to_string())
                .unwrap_or_default()
        );
        prop_assert_eq!(
            document::fingerprint(&doc).unwrap(),
            document::fingerprint(&rendered).unwrap()
        );
        prop_assert_eq!(mapper.parse(&rendered).unwrap(), program);
    }

    #[test]
    fn folding_reaches_a_fixed_point(doc in arb_document()) {
        let mut program = Mapper::default().parse(&doc).unwrap();
        let mut first = ConstantFolder::new();
        for instance in &mut program.instances {
            instance.body = instance.body.modify(&mut first).unwrap();
        }

        let mut second = ConstantFolder::new();
        for instance in &program.instances {
            let again = instance.body.modify(&mut second).unwrap();
            prop_assert!(Arc::ptr_eq(&again, &instance.body));
        }
        prop_assert_eq!(second.folded(), 0);

        // Folded programs still render.
        prop_assert!(blockforge::render(&program).is_ok());
    }

    #[test]
    fn validation_is_deterministic(doc in arb_document()) {
        let program = Mapper::default().parse(&doc).unwrap();
        let config = HardwareConfig::new("ev3").with_motor("A", "large");
        let first = run_validation(&program, &config).unwrap();
        let second = run_validation(&program, &config).unwrap();
        prop_assert_eq!(first.diagnostics.to_vec(), second.diagnostics.to_vec());
        prop_assert_eq!(first.bean, second.bean);
        prop_assert_eq!(program.max_severity(), None);
    }
}
