//! Traversal behaviour on real programs: what `accept` skips, what
//! `modify` reaches, and how rewrites share unchanged subtrees.

mod common;

use std::sync::Arc;

use blockforge::ast::phrase::{MotorStop, NumConst};
use blockforge::ast::{BlockProperties, Node};
use blockforge::visit::{accept_children, rebuild_children, ConstantFolder};
use blockforge::{Kind, Mapper, NodeRef, Phrase, Program, Result, Visitor};

/// Block ids in visiting order.
struct Trail(Vec<String>);

impl Visitor for Trail {
    type Output = ();

    fn visit_default(&mut self, node: &NodeRef) {
        if let Some(id) = node.block_id() {
            self.0.push(id.to_string());
        }
        accept_children(node, self);
    }
}

fn trail(program: &Program) -> Vec<String> {
    let mut trail = Trail(Vec::new());
    for instance in &program.instances {
        instance.body.accept(&mut trail);
    }
    trail.0
}

/// Identity rewrite.
struct Unchanged;

impl Visitor for Unchanged {
    type Output = Result<NodeRef>;

    fn visit_default(&mut self, node: &NodeRef) -> Result<NodeRef> {
        rebuild_children(node, self)
    }
}

/// Moves every motor stop to port A.
struct StopOnA {
    rewritten: Vec<String>,
}

impl Visitor for StopOnA {
    type Output = Result<NodeRef>;

    fn visit_default(&mut self, node: &NodeRef) -> Result<NodeRef> {
        rebuild_children(node, self)
    }

    fn visit_motor_stop(&mut self, node: &NodeRef, stop: &MotorStop) -> Result<NodeRef> {
        if stop.port == "A" {
            return Ok(node.clone());
        }
        self.rewritten.push(node.label());
        Ok(node.with_phrase(Phrase::MotorStop(MotorStop {
            port: "A".to_string(),
        })))
    }
}

#[test]
fn accept_skips_disabled_and_detached_subtrees() {
    let visited = trail(&common::program("catalogue.json"));

    for id in ["start", "decl_speed", "obstacle", "bumped", "leave", "drive", "blink", "hi"] {
        assert!(visited.iter().any(|v| v == id), "{id} was not visited");
    }
    for id in ["unplugged", "stray", "stray_power"] {
        assert!(!visited.iter().any(|v| v == id), "{id} should be skipped");
    }
}

#[test]
fn in_task_flag_decides_reachability() {
    let program = Mapper::default()
        .parse_json(
            r#"{
        "formatVersion": "3.1",
        "instances": [{"blocks": [
            {"id": "marked", "type": "robActions_motor_stop", "inTask": true,
             "fields": [{"name": "MOTORPORT", "value": "A"}]},
            {"id": "unmarked", "type": "robActions_motor_stop",
             "fields": [{"name": "MOTORPORT", "value": "B"}]},
            {"id": "outside", "type": "robActions_motor_stop", "inTask": false, "disabled": false,
             "fields": [{"name": "MOTORPORT", "value": "C"}]},
            {"id": "switched_off", "type": "robActions_motor_stop", "inTask": true, "disabled": true,
             "fields": [{"name": "MOTORPORT", "value": "D"}]}
        ]}]
    }"#,
        )
        .unwrap();

    assert_eq!(program.find_block("marked").unwrap().in_task(), Some(true));
    assert_eq!(trail(&program), vec!["marked", "unmarked"]);

    // Rewrites see all four.
    let mut pass = StopOnA { rewritten: vec![] };
    program.instances[0].body.modify(&mut pass).unwrap();
    assert_eq!(pass.rewritten, vec!["unmarked", "outside", "switched_off"]);
}

#[test]
fn accept_visits_in_document_order() {
    let visited = trail(&common::program("motor_scenario.json"));
    assert_eq!(
        visited,
        vec!["start", "decl_x", "zero", "if_positive", "x_gt_0", "get_x", "zero_rhs", "set_motor", "fifty"]
    );
}

#[test]
fn identity_rewrite_shares_the_whole_tree() {
    let program = common::program("catalogue.json");
    for instance in &program.instances {
        let rewritten = instance.body.modify(&mut Unchanged).unwrap();
        assert!(Arc::ptr_eq(&rewritten, &instance.body));
    }
}

#[test]
fn modify_reaches_disabled_nodes() {
    let program = common::program("catalogue.json");
    let mut pass = StopOnA { rewritten: vec![] };
    let body = program.instances[0].body.modify(&mut pass).unwrap();

    assert_eq!(pass.rewritten, vec!["halt", "unplugged"]);
    assert!(!Arc::ptr_eq(&body, &program.instances[0].body));

    let mut after = program.clone();
    after.instances[0].body = body;
    let unplugged = after.find_block("unplugged").unwrap();
    assert!(unplugged.is_disabled());
    assert!(matches!(unplugged.phrase(), Phrase::MotorStop(stop) if stop.port == "A"));

    // Untouched siblings are the very same nodes.
    let before_beeps = program.find_block("beeps").unwrap();
    let after_beeps = after.find_block("beeps").unwrap();
    assert!(Arc::ptr_eq(&before_beeps, &after_beeps));
}

#[test]
fn rewritten_nodes_get_fresh_ids() {
    let program = common::program("catalogue.json");
    let halt_before = program.find_block("halt").unwrap();
    let mut pass = StopOnA { rewritten: vec![] };
    let body = program.instances[0].body.modify(&mut pass).unwrap();

    let mut after = program.clone();
    after.instances[0].body = body;
    let halt_after = after.find_block("halt").unwrap();
    assert_ne!(halt_before.id(), halt_after.id());
    assert_eq!(halt_before.properties(), halt_after.properties());
}

#[test]
fn constant_folder_folds_nested_operators() {
    let mut program = common::program("foldable.json");
    let original = program.clone();
    let mut folder = ConstantFolder::new();
    for instance in &mut program.instances {
        instance.body = instance.body.modify(&mut folder).unwrap();
    }

    // 2 + 3, then (5) * 4, then 5 > 3.
    assert_eq!(folder.folded(), 3);
    let product = program.find_block("product").unwrap();
    assert_eq!(
        product.phrase(),
        &Phrase::NumConst(NumConst {
            value: "20".to_string()
        })
    );
    let test = program.find_block("five_gt_three").unwrap();
    assert_eq!(test.kind(), Kind::BoolConst);

    // Division by zero stays as written and keeps its subtree.
    let halve_before = original.find_block("halve").unwrap();
    let halve_after = program.find_block("halve").unwrap();
    assert!(Arc::ptr_eq(&halve_before, &halve_after));
    assert_eq!(halve_after.children()[0].kind(), Kind::Arithmetic);

    // The input program is untouched.
    assert_eq!(original.find_block("product").unwrap().kind(), Kind::Arithmetic);
}

#[test]
fn folded_program_renders_and_validates() {
    let mut program = common::program("foldable.json");
    let mut folder = ConstantFolder::new();
    for instance in &mut program.instances {
        instance.body = instance.body.modify(&mut folder).unwrap();
    }
    let doc = blockforge::render(&program).unwrap();
    let product = doc.blocks().into_iter().find(|b| b.id == "product").unwrap();
    assert_eq!(product.block_type, "math_number");
    assert_eq!(product.fields[0].value, "20");

    let config = blockforge::HardwareConfig::new("ev3");
    let outcome = blockforge::run_validation(&program, &config).unwrap();
    assert!(!outcome.has_errors(), "{:?}", outcome.diagnostics.to_vec());
}

#[test]
fn rewrite_returning_a_non_node_is_a_contract_violation() {
    let program = common::program("motor_scenario.json");
    let err = program.instances[0]
        .body
        .modify(&mut Trail(Vec::new()))
        .unwrap_err();
    assert!(err.is_contract_violation(), "{err}");
}

#[test]
fn sealed_nodes_refuse_mutation() {
    let mut node = Node::new(
        BlockProperties::with_block_id("n"),
        None,
        Phrase::NumConst(NumConst {
            value: "1".to_string(),
        }),
    );
    node.set_phrase(Phrase::NumConst(NumConst {
        value: "2".to_string(),
    }))
    .unwrap();
    node.seal();

    let err = node
        .set_properties(BlockProperties::with_block_id("m"))
        .unwrap_err();
    assert!(err.is_contract_violation());
    assert_eq!(node.block_id(), Some("n"));
}
