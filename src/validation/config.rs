//! Hardware configuration descriptors.
//!
//! A configuration names the target robot and lists what is plugged into
//! which port. It is read from YAML or JSON:
//!
//! ```yaml
//! robot: ev3
//! components:
//!   A: { category: motor, kind: large }
//!   "1": { category: sensor, kind: touch }
//! capabilities: [display, sound]
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{BlockforgeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentCategory {
    Motor,
    Sensor,
}

impl std::fmt::Display for ComponentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComponentCategory::Motor => f.write_str("motor"),
            ComponentCategory::Sensor => f.write_str("sensor"),
        }
    }
}

/// Something plugged into a port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Component {
    pub category: ComponentCategory,
    /// Motor size or sensor type, e.g. `large` or `ultrasonic`.
    #[serde(default)]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HardwareConfig {
    /// Platform id, the key into the platform registry.
    pub robot: String,
    #[serde(default)]
    pub components: BTreeMap<String, Component>,
    /// On-board features such as `display`, `sound` or `rgb_led`.
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
}

impl HardwareConfig {
    pub fn new(robot: impl Into<String>) -> Self {
        Self {
            robot: robot.into(),
            components: BTreeMap::new(),
            capabilities: BTreeSet::new(),
        }
    }

    pub fn with_motor(mut self, port: &str, kind: &str) -> Self {
        self.components.insert(
            port.to_string(),
            Component {
                category: ComponentCategory::Motor,
                kind: kind.to_string(),
            },
        );
        self
    }

    pub fn with_sensor(mut self, port: &str, kind: &str) -> Self {
        self.components.insert(
            port.to_string(),
            Component {
                category: ComponentCategory::Sensor,
                kind: kind.to_string(),
            },
        );
        self
    }

    pub fn with_capability(mut self, capability: &str) -> Self {
        self.capabilities.insert(capability.to_string());
        self
    }

    pub fn component(&self, port: &str) -> Option<&Component> {
        self.components.get(port)
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| BlockforgeError::Config {
            message: e.to_string(),
        })
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| BlockforgeError::Config {
            message: e.to_string(),
        })
    }

    /// Reads a configuration file; `.json` files are JSON, anything else YAML.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| BlockforgeError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json(&text)
        } else {
            Self::from_yaml(&text)
        }
    }
}
