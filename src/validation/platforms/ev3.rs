use crate::validation::platform::Platform;

/// LEGO Mindstorms EV3: four motor ports, four sensor ports, display and
/// speaker. Uses every default check.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ev3;

impl Platform for Ev3 {
    fn name(&self) -> &'static str {
        "ev3"
    }

    fn description(&self) -> &'static str {
        "LEGO Mindstorms EV3"
    }

    fn motor_ports(&self) -> &'static [&'static str] {
        &["A", "B", "C", "D"]
    }

    fn sensor_ports(&self) -> &'static [&'static str] {
        &["1", "2", "3", "4"]
    }

    fn sensor_kinds(&self) -> &'static [&'static str] {
        &["touch", "ultrasonic", "color", "gyro", "infrared"]
    }
}
