//! Platform specializations and the factory that selects them.
//!
//! The common pass calls a [`Platform`] hook whenever it meets a
//! hardware-facing block. Every hook has a default body built on the shared
//! [`Collector`] helpers, so a platform overrides only what differs on its
//! board.

use std::collections::BTreeMap;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::ast::phrase::{Extension, MotorSetPower, MotorStop, PlayTone, SensorSample, ShowText};
use crate::ast::{ExtensionSpec, NodeRef};
use crate::diagnostics::codes;
use crate::errors::{BlockforgeError, Result};
use crate::mapper::KindRegistry;
use crate::validation::bean;
use crate::validation::common::Collector;
use crate::validation::platforms::{Calliope, Ev3, Nxt};

pub trait Platform: Send + Sync {
    /// Registry key, matched against `HardwareConfig::robot`.
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn motor_ports(&self) -> &'static [&'static str];

    fn sensor_ports(&self) -> &'static [&'static str];

    /// Sensor types the board can read.
    fn sensor_kinds(&self) -> &'static [&'static str];

    /// Plugin block types this platform contributes.
    fn extension_kinds(&self) -> &'static [&'static ExtensionSpec] {
        &[]
    }

    fn check_motor(&self, cx: &mut Collector, node: &NodeRef, action: &MotorSetPower) {
        if self.check_motor_port(cx, node, &action.port) {
            cx.require_motor(node, &action.port);
        }
    }

    fn check_motor_stop(&self, cx: &mut Collector, node: &NodeRef, action: &MotorStop) {
        if self.check_motor_port(cx, node, &action.port) {
            cx.require_motor(node, &action.port);
        }
    }

    fn check_sensor(&self, cx: &mut Collector, node: &NodeRef, sensor: &SensorSample) {
        if !self.sensor_ports().contains(&sensor.port.as_str()) {
            cx.error(
                node,
                codes::PORT_MISSING,
                format!("{} has no sensor port {}", self.name(), sensor.port),
            );
            return;
        }
        if !self.sensor_kinds().contains(&sensor.sensor.as_str()) {
            cx.error(
                node,
                codes::SENSOR_UNSUPPORTED,
                format!("{} cannot read a {} sensor", self.name(), sensor.sensor),
            );
            return;
        }
        cx.require_sensor(node, &sensor.sensor, &sensor.port);
    }

    fn check_show_text(&self, cx: &mut Collector, node: &NodeRef, _action: &ShowText) {
        cx.require_capability(node, bean::DISPLAY, "text");
    }

    fn check_tone(&self, cx: &mut Collector, node: &NodeRef, _action: &PlayTone) {
        cx.require_capability(node, bean::SOUND, "tone");
    }

    /// Called only for extension kinds listed by [`Platform::extension_kinds`].
    fn check_extension(&self, cx: &mut Collector, node: &NodeRef, ext: &Extension) {
        cx.info(
            node,
            codes::NOTE,
            format!("{} has no checks for {}", self.name(), ext.block_type()),
        );
    }

    /// Core catalogue plus this platform's extension kinds.
    fn kind_registry(&self) -> Result<KindRegistry> {
        let mut registry = KindRegistry::with_core();
        for spec in self.extension_kinds() {
            registry.register_extension(spec)?;
        }
        Ok(registry)
    }

    /// Reports ports the board does not have. True when the port exists.
    fn check_motor_port(&self, cx: &mut Collector, node: &NodeRef, port: &str) -> bool {
        if self.motor_ports().contains(&port) {
            return true;
        }
        cx.error(
            node,
            codes::PORT_MISSING,
            format!("{} has no motor port {port}", self.name()),
        );
        false
    }
}

// ============================================================================
// FACTORY
// ============================================================================

/// Platform id → specialization.
#[derive(Clone, Default)]
pub struct PlatformRegistry {
    platforms: BTreeMap<&'static str, Arc<dyn Platform>>,
}

static BUILTIN: Lazy<PlatformRegistry> = Lazy::new(PlatformRegistry::with_builtin);

impl PlatformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The shipped platforms: `ev3`, `calliope` and `nxt`.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        let builtin: [Arc<dyn Platform>; 3] = [Arc::new(Ev3), Arc::new(Calliope), Arc::new(Nxt)];
        for platform in builtin {
            registry.platforms.insert(platform.name(), platform);
        }
        registry
    }

    pub fn builtin() -> &'static PlatformRegistry {
        &BUILTIN
    }

    pub fn register(&mut self, platform: Arc<dyn Platform>) -> Result<()> {
        let name = platform.name();
        if self.platforms.contains_key(name) {
            return Err(BlockforgeError::Config {
                message: format!("platform '{name}' is registered twice"),
            });
        }
        self.platforms.insert(name, platform);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Platform>> {
        self.platforms
            .get(name)
            .cloned()
            .ok_or_else(|| BlockforgeError::UnknownPlatform {
                name: name.to_string(),
                known: self.names().join(", "),
            })
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.platforms.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Platform>> {
        self.platforms.values()
    }
}

impl std::fmt::Debug for PlatformRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformRegistry")
            .field("platforms", &self.names())
            .finish()
    }
}
