//! Fixture loading shared by the integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use blockforge::validation::PlatformRegistry;
use blockforge::{Document, HardwareConfig, KindRegistry, Mapper, Program};
use walkdir::WalkDir;

pub fn fixtures() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

pub fn program_path(name: &str) -> PathBuf {
    fixtures().join("programs").join(name)
}

pub fn config_path(name: &str) -> PathBuf {
    fixtures().join("configs").join(name)
}

pub fn invalid_path(name: &str) -> PathBuf {
    fixtures().join("invalid").join(name)
}

pub fn document(name: &str) -> Document {
    blockforge::document::load(&program_path(name)).expect("fixture document loads")
}

pub fn config(name: &str) -> HardwareConfig {
    HardwareConfig::load(&config_path(name)).expect("fixture config loads")
}

/// Core catalogue plus every built-in extension kind.
pub fn full_registry() -> KindRegistry {
    let mut registry = KindRegistry::with_core();
    for platform in PlatformRegistry::builtin().iter() {
        for spec in platform.extension_kinds() {
            if !registry.contains(spec.block_type) {
                registry.register_extension(spec).expect("extension registers once");
            }
        }
    }
    registry
}

pub fn program(name: &str) -> Program {
    let registry = full_registry();
    Mapper::new(&registry)
        .parse(&document(name))
        .expect("fixture program parses")
}

/// Every valid program fixture, sorted by path.
pub fn corpus() -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(fixtures().join("programs"))
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    files
}
