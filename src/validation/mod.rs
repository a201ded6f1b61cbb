//! Accumulated diagnostics for a pipeline run.
//!
//! Resolution and image failures of individual entities are collected
//! here instead of aborting, so one run reports all of them. The driver
//! prints them at the end and decides the exit status.

mod warning;

pub use warning::{Diagnostic, Diagnostics, Severity};

use crate::output::Printer;

/// Print every diagnostic through `printer`, then a one-line summary.
pub fn print_diagnostics(printer: &Printer, diags: &Diagnostics) {
    for d in diags.iter() {
        let line = match &d.help {
            Some(help) => format!("{}\n{:>14}help: {}", d, "", help),
            None => d.to_string(),
        };
        match d.severity {
            Severity::Error => printer.error(&line),
            Severity::Warning => printer.warning(&line),
        }
    }

    let errors = diags.error_count();
    let warnings = diags.warning_count();
    if errors > 0 {
        printer.error(&format!(
            "build failed: {}, {}",
            crate::output::plural(errors, "error", "errors"),
            crate::output::plural(warnings, "warning", "warnings")
        ));
    } else if warnings > 0 {
        printer.warning(&format!(
            "build produced {}",
            crate::output::plural(warnings, "warning", "warnings")
        ));
    }
}
