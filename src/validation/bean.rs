//! The feature bean: hardware facts gathered by one validation run.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

pub const MOTOR: &str = "motor";
pub const SENSOR: &str = "sensor";
pub const DISPLAY: &str = "display";
pub const SOUND: &str = "sound";
pub const VARIABLE: &str = "variable";
pub const METHOD: &str = "method";

/// Feature id → ordered set of facts, e.g. `motor → {A, B}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FeatureBean {
    facts: BTreeMap<String, BTreeSet<String>>,
}

impl FeatureBean {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, feature: &str, fact: impl Into<String>) {
        self.facts
            .entry(feature.to_string())
            .or_default()
            .insert(fact.into());
    }

    /// Facts recorded for `feature`, sorted. Empty when none were.
    pub fn facts(&self, feature: &str) -> Vec<&str> {
        self.facts
            .get(feature)
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn uses(&self, feature: &str) -> bool {
        self.facts.get(feature).is_some_and(|set| !set.is_empty())
    }

    pub fn features(&self) -> impl Iterator<Item = &str> {
        self.facts.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}
