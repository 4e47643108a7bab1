//! The Blockforge command-line interface.
//!
//! Exit status: 0 on success, 1 when a program has errors or a round trip
//! fails, 2 on usage, I/O and configuration problems.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use miette::Report;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use crate::ast::Program;
use crate::cli::args::{BlockforgeArgs, Command};
use crate::document::{self, Document};
use crate::errors::{BlockforgeError, Result};
use crate::mapper::{KindRegistry, Mapper};
use crate::validation::{HardwareConfig, PlatformRegistry};
use crate::visit::ConstantFolder;

pub mod args;
pub mod output;

/// What a command reports back besides hard errors.
enum Outcome {
    Clean,
    Failed,
}

/// The main entry point for the CLI.
pub fn run() -> ExitCode {
    init_logging();
    let args = BlockforgeArgs::parse();

    let result = match args.command {
        Command::Parse { file, platform } => handle_parse(&file, platform.as_deref()),
        Command::Roundtrip { path, platform } => handle_roundtrip(&path, platform.as_deref()),
        Command::Validate {
            file,
            config,
            annotate,
        } => handle_validate(&file, &config, annotate),
        Command::Fold { file, platform } => handle_fold(&file, platform.as_deref()),
        Command::Platforms => handle_platforms(),
    };

    match result {
        Ok(Outcome::Clean) => ExitCode::SUCCESS,
        Ok(Outcome::Failed) => ExitCode::from(1),
        Err(err) => {
            let code = exit_code_for(&err);
            eprintln!("{:?}", Report::new(err));
            ExitCode::from(code)
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn exit_code_for(err: &BlockforgeError) -> u8 {
    match err {
        BlockforgeError::Io { .. }
        | BlockforgeError::Config { .. }
        | BlockforgeError::UnknownPlatform { .. } => 2,
        _ => 1,
    }
}

/// Kinds accepted when parsing: one platform's, or every built-in one's.
fn registry_for(platform: Option<&str>) -> Result<KindRegistry> {
    let platforms = PlatformRegistry::builtin();
    if let Some(name) = platform {
        return platforms.get(name)?.kind_registry();
    }
    let mut registry = KindRegistry::with_core();
    for platform in platforms.iter() {
        for spec in platform.extension_kinds() {
            if !registry.contains(spec.block_type) {
                registry.register_extension(spec)?;
            }
        }
    }
    Ok(registry)
}

fn print_program(program: &Program) {
    for (i, instance) in program.instances.iter().enumerate() {
        println!("instance {i} at ({}, {})", instance.x, instance.y);
        print!("{}", instance.body.pretty());
    }
}

fn handle_parse(file: &Path, platform: Option<&str>) -> Result<Outcome> {
    let registry = registry_for(platform)?;
    let document = document::load(file)?;
    let program = Mapper::new(&registry).parse(&document)?;
    println!(
        "format {} | {} nodes | sha256 {}",
        program.format_version,
        program.node_count(),
        document::fingerprint(&document)?
    );
    print_program(&program);
    Ok(Outcome::Clean)
}

/// Documents under `path`: the file itself, or every `*.json` below it.
fn collect_documents(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.exists() {
        return Err(BlockforgeError::Io {
            path: path.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file or directory"),
        });
    }
    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    Ok(files)
}

/// Parses, renders and re-parses one document.
fn check_roundtrip(mapper: &Mapper<'_>, original: &Document) -> Result<Option<Document>> {
    let program = mapper.parse(original)?;
    let rendered = mapper.render(&program)?;
    let reparsed = mapper.parse(&rendered)?;
    if document::equivalent(original, &rendered) && reparsed == program {
        Ok(None)
    } else {
        Ok(Some(rendered))
    }
}

fn handle_roundtrip(path: &Path, platform: Option<&str>) -> Result<Outcome> {
    let registry = registry_for(platform)?;
    let mapper = Mapper::new(&registry);
    let files = collect_documents(path)?;
    let (mut passed, mut failed) = (0, 0);

    for file in &files {
        let label = file.display().to_string();
        let verdict = document::load(file).and_then(|doc| {
            check_roundtrip(&mapper, &doc).map(|rendered| (doc, rendered))
        });
        match verdict {
            Ok((_, None)) => {
                passed += 1;
                output::print_status(true, &label);
            }
            Ok((original, Some(rendered))) => {
                failed += 1;
                output::print_status(false, &label);
                output::print_diff(&document::diff(&original, &rendered)?);
            }
            Err(err @ BlockforgeError::Io { .. }) => return Err(err),
            Err(err) => {
                failed += 1;
                output::print_status(false, &format!("{label}: {err}"));
            }
        }
    }

    output::print_summary(passed, failed);
    Ok(if failed == 0 {
        Outcome::Clean
    } else {
        Outcome::Failed
    })
}

fn handle_validate(file: &Path, config_path: &Path, annotate: bool) -> Result<Outcome> {
    let config = HardwareConfig::load(config_path)?;
    let platforms = PlatformRegistry::builtin();
    let registry = platforms.get(&config.robot)?.kind_registry()?;
    let mapper = Mapper::new(&registry);
    let program = mapper.parse(&document::load(file)?)?;

    let outcome = platforms.validate(&program, &config)?;
    output::print_diagnostics(outcome.diagnostics.iter());
    output::print_bean(&outcome.bean);
    if annotate {
        let annotated = outcome.annotate(&program)?;
        println!("{}", mapper.render_json(&annotated)?);
    }
    Ok(if outcome.has_errors() {
        Outcome::Failed
    } else {
        Outcome::Clean
    })
}

fn handle_fold(file: &Path, platform: Option<&str>) -> Result<Outcome> {
    let registry = registry_for(platform)?;
    let mapper = Mapper::new(&registry);
    let mut program = mapper.parse(&document::load(file)?)?;

    let mut folder = ConstantFolder::new();
    for instance in &mut program.instances {
        instance.body = instance.body.modify(&mut folder)?;
    }
    eprintln!("folded {} expression(s)", folder.folded());
    println!("{}", mapper.render_json(&program)?);
    Ok(Outcome::Clean)
}

fn handle_platforms() -> Result<Outcome> {
    for platform in PlatformRegistry::builtin().iter() {
        println!(
            "{:<10} {} (motors {}, sensors {})",
            platform.name(),
            platform.description(),
            platform.motor_ports().join(" "),
            platform.sensor_ports().join(" ")
        );
    }
    Ok(Outcome::Clean)
}
