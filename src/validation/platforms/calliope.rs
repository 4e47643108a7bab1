use once_cell::sync::Lazy;
use regex::Regex;

use crate::ast::phrase::{Extension, MotorSetPower, ShowText};
use crate::ast::{Category, ExtensionSpec, FieldSpec, NodeRef, Phrase};
use crate::diagnostics::codes;
use crate::validation::bean;
use crate::validation::common::Collector;
use crate::validation::platform::Platform;
use crate::validation::platforms::literal_number;

/// `mbedActions_leds_on`: switches the RGB LED to a `#rrggbb` colour.
pub static LEDS_ON: ExtensionSpec = ExtensionSpec {
    block_type: "mbedActions_leds_on",
    category: Category::Action,
    fields: &[FieldSpec::literal("COLOR", "color")],
};

static EXTENSIONS: [&ExtensionSpec; 1] = [&LEDS_ON];

static HEX_COLOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").expect("colour pattern is valid"));

/// Texts longer than this scroll across the 5x5 matrix for a long time.
const MATRIX_TEXT_LIMIT: usize = 20;

/// Calliope mini: two motor outputs, pin sensors, an LED matrix and an RGB LED.
#[derive(Debug, Clone, Copy, Default)]
pub struct Calliope;

impl Platform for Calliope {
    fn name(&self) -> &'static str {
        "calliope"
    }

    fn description(&self) -> &'static str {
        "Calliope mini"
    }

    fn motor_ports(&self) -> &'static [&'static str] {
        &["A", "B"]
    }

    fn sensor_ports(&self) -> &'static [&'static str] {
        &["1", "2", "3"]
    }

    fn sensor_kinds(&self) -> &'static [&'static str] {
        &["key", "light", "temperature", "sound"]
    }

    fn extension_kinds(&self) -> &'static [&'static ExtensionSpec] {
        &EXTENSIONS
    }

    fn check_motor(&self, cx: &mut Collector, node: &NodeRef, action: &MotorSetPower) {
        if let Some(power) = literal_number(&action.power) {
            if !(-100.0..=100.0).contains(&power) {
                cx.error(
                    &action.power,
                    codes::VALUE_OUT_OF_RANGE,
                    format!("motor power {power} is outside -100..100"),
                );
            }
        }
        if self.check_motor_port(cx, node, &action.port) {
            cx.require_motor(node, &action.port);
        }
    }

    fn check_show_text(&self, cx: &mut Collector, node: &NodeRef, action: &ShowText) {
        if let Phrase::StringConst(text) = action.text.phrase() {
            let length = text.value.chars().count();
            if length > MATRIX_TEXT_LIMIT {
                cx.warning(
                    node,
                    codes::TEXT_TOO_LONG,
                    format!("{length} characters scroll slowly on the LED matrix"),
                );
            }
        }
        cx.require_capability(node, bean::DISPLAY, "matrix");
    }

    fn check_extension(&self, cx: &mut Collector, node: &NodeRef, ext: &Extension) {
        if ext.spec != &LEDS_ON {
            return;
        }
        let color = ext.literal("color").unwrap_or_default();
        if !HEX_COLOR.is_match(color) {
            cx.error(
                node,
                codes::VALUE_OUT_OF_RANGE,
                format!("'{color}' is not a #rrggbb colour"),
            );
            return;
        }
        cx.require_capability(node, "rgb_led", color);
    }
}
