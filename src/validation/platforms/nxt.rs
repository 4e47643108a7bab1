use crate::ast::phrase::PlayTone;
use crate::ast::NodeRef;
use crate::diagnostics::codes;
use crate::validation::bean;
use crate::validation::common::Collector;
use crate::validation::platform::Platform;
use crate::validation::platforms::literal_number;

/// Frequencies the NXT speaker can play, in Hz.
const TONE_RANGE: std::ops::RangeInclusive<f64> = 220.0..=14_000.0;

/// LEGO Mindstorms NXT: three motor ports and a limited speaker.
#[derive(Debug, Clone, Copy, Default)]
pub struct Nxt;

impl Platform for Nxt {
    fn name(&self) -> &'static str {
        "nxt"
    }

    fn description(&self) -> &'static str {
        "LEGO Mindstorms NXT"
    }

    fn motor_ports(&self) -> &'static [&'static str] {
        &["A", "B", "C"]
    }

    fn sensor_ports(&self) -> &'static [&'static str] {
        &["1", "2", "3", "4"]
    }

    fn sensor_kinds(&self) -> &'static [&'static str] {
        &["touch", "ultrasonic", "light", "sound"]
    }

    fn check_tone(&self, cx: &mut Collector, node: &NodeRef, action: &PlayTone) {
        if let Some(frequency) = literal_number(&action.frequency) {
            if !TONE_RANGE.contains(&frequency) {
                cx.error(
                    &action.frequency,
                    codes::VALUE_OUT_OF_RANGE,
                    format!(
                        "the NXT speaker plays {}..{} Hz, not {frequency}",
                        TONE_RANGE.start(),
                        TONE_RANGE.end()
                    ),
                );
                return;
            }
        }
        cx.require_capability(node, bean::SOUND, "tone");
    }
}
