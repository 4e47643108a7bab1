//! Validator/collector runs against hardware configurations.

mod common;

use blockforge::ast::phrase::CompareOp;
use blockforge::diagnostics::{codes, DiagCode};
use blockforge::validation::{bean, PlatformRegistry};
use blockforge::{
    run_validation, validate_parallel, BlockforgeError, HardwareConfig, Kind, Mapper, Phrase,
    Program, Severity, ValidationOutcome,
};
use serde_json::json;

fn codes_at(outcome: &ValidationOutcome, block: &str) -> Vec<DiagCode> {
    outcome
        .diagnostics
        .iter()
        .filter(|d| {
            d.location
                .as_ref()
                .and_then(|l| l.block_id.as_deref())
                == Some(block)
        })
        .map(|d| d.code)
        .collect()
}

fn parse(value: serde_json::Value) -> Program {
    Mapper::default()
        .parse_json(&value.to_string())
        .expect("inline program parses")
}

fn num(id: &str, value: &str) -> serde_json::Value {
    json!({"id": id, "type": "math_number", "fields": [{"name": "NUM", "value": value}]})
}

#[test]
fn motor_on_a_missing_port_is_one_error() {
    let program = common::program("motor_scenario.json");

    let decl = program.find_block("decl_x").unwrap();
    assert!(matches!(decl.phrase(), Phrase::VarDeclaration(d) if d.name == "x"));
    let test = program.find_block("if_positive").unwrap();
    let Phrase::If(stmt) = test.phrase() else {
        panic!("expected a conditional, found {}", test.kind());
    };
    assert_eq!(stmt.conditions.len(), 1);
    assert!(matches!(stmt.conditions[0].phrase(), Phrase::Compare(c) if c.op == CompareOp::Gt));
    assert_eq!(stmt.branches.len(), 1);
    assert_eq!(stmt.branches[0].kind(), Kind::StmtList);
    assert_eq!(stmt.branches[0].children()[0].block_id(), Some("set_motor"));
    assert!(stmt.otherwise.is_none());

    let outcome = run_validation(&program, &common::config("ev3_motor_b.yaml")).unwrap();

    assert_eq!(outcome.platform, "ev3");
    assert_eq!(outcome.diagnostics.len(), 1);
    assert_eq!(outcome.error_count(), 1);
    assert_eq!(codes_at(&outcome, "set_motor"), vec![codes::PORT_MISSING]);
    assert!(outcome.bean.facts(bean::MOTOR).is_empty());
    assert_eq!(outcome.bean.facts(bean::VARIABLE), vec!["x"]);
    assert!(outcome.has_errors());
}

#[test]
fn motor_on_a_configured_port_is_clean() {
    let program = common::program("motor_scenario.json");
    let outcome = run_validation(&program, &common::config("ev3_motor_a.yaml")).unwrap();

    assert!(outcome.diagnostics.is_empty(), "{:?}", outcome.diagnostics.to_vec());
    assert_eq!(outcome.bean.facts(bean::MOTOR), vec!["A"]);
}

#[test]
fn catalogue_is_clean_on_a_fully_equipped_ev3() {
    let program = common::program("catalogue.json");
    let outcome = run_validation(&program, &common::config("ev3_full.yaml")).unwrap();

    assert!(outcome.diagnostics.is_empty(), "{:?}", outcome.diagnostics.to_vec());
    let facts = &outcome.bean;
    assert_eq!(facts.facts(bean::MOTOR), vec!["B"]);
    assert_eq!(facts.facts(bean::SENSOR), vec!["1:touch", "4:ultrasonic"]);
    assert_eq!(facts.facts(bean::DISPLAY), vec!["text"]);
    assert_eq!(facts.facts(bean::SOUND), vec!["tone"]);
    assert_eq!(facts.facts(bean::VARIABLE), vec!["name", "running", "speed"]);
    assert_eq!(facts.facts(bean::METHOD), vec!["blink"]);
}

#[test]
fn disabled_and_detached_blocks_are_not_checked() {
    // `unplugged` stops motor C and `stray` drives motor D; neither is
    // configured, yet neither is reported.
    let program = common::program("catalogue.json");
    let outcome = run_validation(&program, &common::config("ev3_full.yaml")).unwrap();
    assert!(codes_at(&outcome, "unplugged").is_empty());
    assert!(codes_at(&outcome, "stray").is_empty());
    assert!(!outcome.bean.facts(bean::MOTOR).contains(&"C"));
}

#[test]
fn common_checks_report_every_problem_in_one_run() {
    let program = parse(json!({
        "formatVersion": "3.1",
        "instances": [{"blocks": [
            {"id": "start", "type": "robControls_start",
             "fields": [{"name": "DEBUG", "value": "FALSE"}],
             "statements": [{"name": "ST", "blocks": [
                {"id": "decl_count", "type": "robGlobalVariables_declare",
                 "fields": [{"name": "VAR", "value": "count"}, {"name": "TYPE", "value": "Number"}],
                 "values": [{"name": "VALUE", "block": {"id": "ten_text", "type": "text", "fields": [{"name": "TEXT", "value": "ten"}]}}]},
                {"id": "dup_decl", "type": "robGlobalVariables_declare",
                 "fields": [{"name": "VAR", "value": "count"}, {"name": "TYPE", "value": "Number"}],
                 "values": [{"name": "VALUE", "block": num("one", "1")}]},
                {"id": "unused_decl", "type": "robGlobalVariables_declare",
                 "fields": [{"name": "VAR", "value": "unused"}, {"name": "TYPE", "value": "Boolean"}],
                 "values": [{"name": "VALUE", "block": {"id": "yes", "type": "logic_boolean", "fields": [{"name": "BOOL", "value": "TRUE"}]}}]}
             ]}]},
            {"id": "set_count", "type": "variables_set", "fields": [{"name": "VAR", "value": "count"}]},
            {"id": "brk", "type": "controls_flow_statements", "fields": [{"name": "FLOW", "value": "BREAK"}]},
            {"id": "call", "type": "robProcedures_callnoreturn", "fields": [{"name": "NAME", "value": "dance"}]},
            {"id": "wait_ghost", "type": "robControls_wait_time",
             "values": [{"name": "WAIT", "block": {"id": "ghost", "type": "variables_get", "fields": [{"name": "VAR", "value": "ghost"}]}}]},
            {"id": "wait_bad", "type": "robControls_wait_time",
             "values": [{"name": "WAIT", "block": num("bad_num", "1.2.3")}]}
        ]}]
    }));
    let outcome = run_validation(&program, &HardwareConfig::new("ev3")).unwrap();

    assert_eq!(codes_at(&outcome, "ten_text"), vec![codes::TYPE_MISMATCH]);
    assert_eq!(codes_at(&outcome, "dup_decl"), vec![codes::DUPLICATE_VARIABLE]);
    assert_eq!(codes_at(&outcome, "unused_decl"), vec![codes::UNUSED_VARIABLE]);
    assert_eq!(codes_at(&outcome, "set_count"), vec![codes::MISSING_EXPRESSION]);
    assert_eq!(codes_at(&outcome, "brk"), vec![codes::FLOW_OUTSIDE_LOOP]);
    assert_eq!(codes_at(&outcome, "call"), vec![codes::UNDEFINED_METHOD]);
    assert_eq!(codes_at(&outcome, "ghost"), vec![codes::UNDECLARED_VARIABLE]);
    assert_eq!(codes_at(&outcome, "bad_num"), vec![codes::INVALID_NUMBER]);
    assert_eq!(outcome.diagnostics.len(), 8);
    assert_eq!(outcome.error_count(), 7);
    assert_eq!(outcome.diagnostics.max_severity(), Some(Severity::Error));
}

#[test]
fn method_locals_stay_inside_the_method() {
    let program = parse(json!({
        "formatVersion": "3.1",
        "instances": [
            {"blocks": [
                {"id": "helper", "type": "robProcedures_defnoreturn",
                 "fields": [{"name": "NAME", "value": "helper"}],
                 "statements": [{"name": "STACK", "blocks": [
                    {"id": "decl_tmp", "type": "robGlobalVariables_declare",
                     "fields": [{"name": "VAR", "value": "tmp"}, {"name": "TYPE", "value": "Number"}],
                     "values": [{"name": "VALUE", "block": num("two", "2")}]},
                    {"id": "wait_inside", "type": "robControls_wait_time",
                     "values": [{"name": "WAIT", "block": {"id": "tmp_inside", "type": "variables_get",
                        "fields": [{"name": "VAR", "value": "tmp"}]}}]}
                 ]}]}
            ]},
            {"blocks": [
                {"id": "wait_outside", "type": "robControls_wait_time",
                 "values": [{"name": "WAIT", "block": {"id": "tmp_outside", "type": "variables_get",
                    "fields": [{"name": "VAR", "value": "tmp"}]}}]}
            ]}
        ]
    }));
    let outcome = run_validation(&program, &HardwareConfig::new("ev3")).unwrap();

    assert!(codes_at(&outcome, "tmp_inside").is_empty());
    assert_eq!(codes_at(&outcome, "tmp_outside"), vec![codes::UNDECLARED_VARIABLE]);
    assert_eq!(outcome.error_count(), 1);
}

#[test]
fn ev3_reports_unsupported_and_mismatched_hardware() {
    let program = parse(json!({
        "formatVersion": "3.1",
        "instances": [{"blocks": [
            {"id": "wait_color", "type": "robControls_wait_time",
             "values": [{"name": "WAIT", "block": {"id": "color", "type": "robSensors_getSample",
                "fields": [{"name": "SENSORTYPE", "value": "color"}, {"name": "SENSORPORT", "value": "1"}]}}]},
            {"id": "wait_light", "type": "robControls_wait_time",
             "values": [{"name": "WAIT", "block": {"id": "light", "type": "robSensors_getSample",
                "fields": [{"name": "SENSORTYPE", "value": "light"}, {"name": "SENSORPORT", "value": "2"}]}}]},
            {"id": "drive_e", "type": "robActions_motor_setPower",
             "fields": [{"name": "MOTORPORT", "value": "E"}],
             "values": [{"name": "POWER", "block": num("p", "10")}]}
        ]}]
    }));
    let outcome = run_validation(&program, &common::config("ev3_full.yaml")).unwrap();

    assert_eq!(codes_at(&outcome, "color"), vec![codes::PORT_WRONG_KIND]);
    assert_eq!(codes_at(&outcome, "light"), vec![codes::SENSOR_UNSUPPORTED]);
    assert_eq!(codes_at(&outcome, "drive_e"), vec![codes::PORT_MISSING]);
    assert!(outcome.bean.facts(bean::SENSOR).is_empty());
}

#[test]
fn calliope_checks_power_text_and_led_colour() {
    let program = common::program("calliope_leds.json");
    let outcome = run_validation(&program, &common::config("calliope.json")).unwrap();

    assert_eq!(outcome.platform, "calliope");
    assert_eq!(codes_at(&outcome, "too_much"), vec![codes::VALUE_OUT_OF_RANGE]);
    assert_eq!(codes_at(&outcome, "banner"), vec![codes::TEXT_TOO_LONG]);
    assert_eq!(outcome.error_count(), 1);
    assert_eq!(outcome.diagnostics.count(Severity::Warning), 1);
    assert_eq!(outcome.bean.facts("rgb_led"), vec!["#ff0000"]);
    assert_eq!(outcome.bean.facts(bean::DISPLAY), vec!["matrix"]);
    assert_eq!(outcome.bean.facts(bean::MOTOR), vec!["A"]);
}

#[test]
fn extension_blocks_are_unknown_on_other_platforms() {
    let program = common::program("calliope_leds.json");
    let outcome = run_validation(&program, &HardwareConfig::new("ev3")).unwrap();
    assert_eq!(codes_at(&outcome, "red"), vec![codes::UNKNOWN_BLOCK]);
}

#[test]
fn nxt_rejects_inaudible_tones() {
    let program = parse(json!({
        "formatVersion": "3.1",
        "instances": [{"blocks": [
            {"id": "hum", "type": "robActions_play_tone",
             "values": [{"name": "FREQUENCE", "block": num("low", "100")},
                        {"name": "DURATION", "block": num("len", "500")}]}
        ]}]
    }));
    let config = HardwareConfig::new("nxt").with_capability("sound");
    let outcome = run_validation(&program, &config).unwrap();
    assert_eq!(codes_at(&outcome, "low"), vec![codes::VALUE_OUT_OF_RANGE]);
    assert!(!outcome.bean.uses(bean::SOUND));

    let ev3 = HardwareConfig::new("ev3").with_capability("sound");
    let outcome = run_validation(&program, &ev3).unwrap();
    assert!(outcome.diagnostics.is_empty());
    assert_eq!(outcome.bean.facts(bean::SOUND), vec!["tone"]);
}

#[test]
fn parallel_runs_match_sequential_runs() {
    let program = common::program("catalogue.json");
    let configs = vec![
        common::config("ev3_full.yaml"),
        common::config("nxt_full.yaml"),
        common::config("ev3_motor_b.yaml"),
        common::config("calliope.json"),
    ];

    let parallel = validate_parallel(&program, &configs);
    assert_eq!(parallel.len(), configs.len());
    for (config, result) in configs.iter().zip(parallel) {
        let together = result.unwrap();
        let alone = run_validation(&program, config).unwrap();
        assert_eq!(together.platform, alone.platform);
        assert_eq!(together.diagnostics.to_vec(), alone.diagnostics.to_vec());
        assert_eq!(together.bean, alone.bean);
    }
}

#[test]
fn validation_leaves_the_tree_untouched() {
    let program = common::program("motor_scenario.json");
    let first = run_validation(&program, &common::config("ev3_motor_b.yaml")).unwrap();
    let second = run_validation(&program, &common::config("ev3_motor_b.yaml")).unwrap();
    assert_eq!(first.diagnostics.to_vec(), second.diagnostics.to_vec());
    assert_eq!(program.max_severity(), None);
}

#[test]
fn annotate_writes_diagnostics_into_a_copy() {
    let program = common::program("motor_scenario.json");
    let outcome = run_validation(&program, &common::config("ev3_motor_b.yaml")).unwrap();
    let annotated = outcome.annotate(&program).unwrap();

    let marked = annotated.find_block("set_motor").unwrap();
    assert_eq!(marked.diagnostics().len(), 1);
    assert_eq!(annotated.max_severity(), Some(Severity::Error));
    assert!(program.find_block("set_motor").unwrap().diagnostics().is_empty());

    let doc = blockforge::render(&annotated).unwrap();
    let block = doc.blocks().into_iter().find(|b| b.id == "set_motor").unwrap();
    assert_eq!(block.annotations.len(), 1);
    assert_eq!(block.annotations[0].severity, "error");
    assert_eq!(block.annotations[0].code, "config.port_missing");

    // Annotations are output only.
    let reparsed = blockforge::parse(&doc).unwrap();
    assert_eq!(reparsed, program);
    assert_eq!(reparsed.max_severity(), None);
}

#[test]
fn unknown_robot_is_an_error() {
    let program = common::program("motor_scenario.json");
    let err = run_validation(&program, &common::config("unknown_robot.yaml")).unwrap_err();
    match err {
        BlockforgeError::UnknownPlatform { name, known } => {
            assert_eq!(name, "spike");
            assert_eq!(known, PlatformRegistry::builtin().names().join(", "));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn bad_configurations_are_rejected() {
    let err = HardwareConfig::from_yaml("robot: ev3\ncomponents:\n  A: { category: wheel }\n")
        .unwrap_err();
    assert!(matches!(err, BlockforgeError::Config { .. }), "{err}");

    let missing = common::config_path("no_such_config.yaml");
    let err = HardwareConfig::load(&missing).unwrap_err();
    assert!(matches!(err, BlockforgeError::Io { .. }), "{err}");
}
