//! Validator/collector passes.
//!
//! A validation run checks one program against one [`HardwareConfig`] and
//! produces a [`ValidationOutcome`]: the run's diagnostics plus the feature
//! bean a code generator needs. Runs never abort on a bad node; a program
//! yields its complete list of problems in one pass.
//!
//! The platform is picked from `config.robot` through the
//! [`PlatformRegistry`]. The core knows nothing about how many platforms
//! exist.

pub mod bean;
pub mod common;
pub mod config;
pub mod platform;
pub mod platforms;

pub use bean::FeatureBean;
pub use common::{Collector, CommonValidator, Ty};
pub use config::{Component, ComponentCategory, HardwareConfig};
pub use platform::{Platform, PlatformRegistry};

use rayon::prelude::*;
use tracing::info;

use crate::ast::Program;
use crate::diagnostics::{DiagnosticStore, Severity};
use crate::errors::Result;

/// Result of one validation run.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub platform: &'static str,
    pub diagnostics: DiagnosticStore,
    pub bean: FeatureBean,
}

impl ValidationOutcome {
    /// Code generation is refused when this is true.
    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.count(Severity::Error)
    }

    /// A dedicated copy of `program` carrying this run's diagnostics.
    pub fn annotate(&self, program: &Program) -> Result<Program> {
        self.diagnostics.annotate(program)
    }
}

impl PlatformRegistry {
    /// Runs the common pass with the platform named by `config.robot`.
    pub fn validate(&self, program: &Program, config: &HardwareConfig) -> Result<ValidationOutcome> {
        let platform = self.get(&config.robot)?;
        let outcome = CommonValidator::new(platform.as_ref(), config).run(program);
        info!(
            platform = outcome.platform,
            errors = outcome.error_count(),
            total = outcome.diagnostics.len(),
            "validated program"
        );
        Ok(outcome)
    }
}

/// Validates `program` against `config` with the built-in platforms.
pub fn run_validation(program: &Program, config: &HardwareConfig) -> Result<ValidationOutcome> {
    PlatformRegistry::builtin().validate(program, config)
}

/// Validates one shared program against several configurations at once.
///
/// Each run owns its collector, so the worker threads only read the tree.
/// Results come back in `configs` order.
pub fn validate_parallel(
    program: &Program,
    configs: &[HardwareConfig],
) -> Vec<Result<ValidationOutcome>> {
    configs
        .par_iter()
        .map(|config| run_validation(program, config))
        .collect()
}
