//! User-facing CLI output.
//!
//! Everything the commands print goes through here so colours and layout
//! stay consistent. Colour is switched off automatically when stdout is not
//! a terminal.

use std::io::{IsTerminal, Write};

use difference::{Changeset, Difference};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::diagnostics::{Diagnostic, Severity};
use crate::validation::FeatureBean;

fn stdout() -> StandardStream {
    let choice = if std::io::stdout().is_terminal() {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    StandardStream::stdout(choice)
}

fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Error => Color::Red,
        Severity::Warning => Color::Yellow,
        Severity::Info => Color::Cyan,
    }
}

/// Prints one line per diagnostic, coloured by severity.
pub fn print_diagnostics<'a>(diagnostics: impl IntoIterator<Item = &'a Diagnostic>) {
    let mut out = stdout();
    for diagnostic in diagnostics {
        let _ = out.set_color(
            ColorSpec::new()
                .set_fg(Some(severity_color(diagnostic.severity)))
                .set_bold(true),
        );
        let _ = write!(out, "{}", diagnostic.severity);
        let _ = out.reset();
        let rendered = diagnostic.to_string();
        let rest = rendered
            .strip_prefix(diagnostic.severity.as_str())
            .unwrap_or(&rendered);
        let _ = writeln!(out, "{rest}");
    }
}

pub fn print_bean(bean: &FeatureBean) {
    let json = serde_json::to_string(bean).unwrap_or_default();
    println!("features: {json}");
}

/// `ok` or `FAIL` in front of a label.
pub fn print_status(passed: bool, label: &str) {
    let mut out = stdout();
    let (text, color) = if passed {
        ("ok  ", Color::Green)
    } else {
        ("FAIL", Color::Red)
    };
    let _ = out.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true));
    let _ = write!(out, "{text}");
    let _ = out.reset();
    let _ = writeln!(out, " {label}");
}

pub fn print_summary(passed: usize, failed: usize) {
    let mut out = stdout();
    let color = if failed == 0 { Color::Green } else { Color::Red };
    let _ = out.set_color(ColorSpec::new().set_fg(Some(color)));
    let _ = writeln!(out, "{passed} passed, {failed} failed");
    let _ = out.reset();
}

/// Coloured line diff of the canonical forms.
pub fn print_diff(changeset: &Changeset) {
    let mut out = stdout();
    for diff in &changeset.diffs {
        match diff {
            Difference::Same(x) => {
                let _ = out.reset();
                let _ = writeln!(out, " {x}");
            }
            Difference::Add(x) => {
                let _ = out.set_color(ColorSpec::new().set_fg(Some(Color::Green)));
                let _ = writeln!(out, "+{x}");
            }
            Difference::Rem(x) => {
                let _ = out.set_color(ColorSpec::new().set_fg(Some(Color::Red)));
                let _ = writeln!(out, "-{x}");
            }
        }
    }
    let _ = out.reset();
}
