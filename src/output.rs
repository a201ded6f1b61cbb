//! Terminal output for the pipeline driver.
//!
//! Status lines follow Cargo's layout: a right-aligned coloured verb followed
//! by a message, written to stderr. Colour is used only when stderr is a
//! terminal. Detailed tracing goes through the `log` facade instead.

use std::io::{self, IsTerminal, Write};
use std::path::Path;
use std::time::{Duration, Instant};

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";

/// Width for right-aligned verb column.
const VERB_WIDTH: usize = 12;

/// Status printer for pipeline phases.
pub struct Printer {
    color: bool,
    quiet: bool,
}

impl Default for Printer {
    fn default() -> Self {
        Self::new()
    }
}

impl Printer {
    pub fn new() -> Self {
        Self {
            color: io::stderr().is_terminal(),
            quiet: false,
        }
    }

    /// A printer that swallows status lines. Warnings and errors still print.
    pub fn quiet() -> Self {
        Self {
            color: false,
            quiet: true,
        }
    }

    pub fn status(&self, verb: &str, message: &str) {
        if !self.quiet {
            self.print_line(GREEN, verb, message);
        }
    }

    pub fn info(&self, verb: &str, message: &str) {
        if !self.quiet {
            self.print_line(CYAN, verb, message);
        }
    }

    pub fn warning(&self, message: &str) {
        self.print_line(YELLOW, "warning", message);
    }

    pub fn error(&self, message: &str) {
        self.print_line(RED, "error", message);
    }

    /// Run `f`, then print how long it took under `verb`.
    ///
    /// Mirrors the per-phase timing lines of the build log:
    /// `  Generated structures (0.42s)`.
    pub fn timed<T>(&self, verb: &str, label: &str, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let result = f();
        self.status(verb, &format!("{} ({})", label, format_elapsed(start.elapsed())));
        result
    }

    fn print_line(&self, color: &str, verb: &str, message: &str) {
        let mut stderr = io::stderr().lock();
        if self.color {
            let _ = writeln!(stderr, "{BOLD}{color}{verb:>VERB_WIDTH$}{RESET} {message}");
        } else {
            let _ = writeln!(stderr, "{verb:>VERB_WIDTH$} {message}");
        }
    }
}

/// Format a duration as seconds with two decimals.
pub fn format_elapsed(d: Duration) -> String {
    format!("{:.2}s", d.as_secs_f64())
}

/// Pluralize a count: `plural(1, "item", "items")` → "1 item".
pub fn plural(n: usize, singular: &str, pluralized: &str) -> String {
    if n == 1 {
        format!("{} {}", n, singular)
    } else {
        format!("{} {}", n, pluralized)
    }
}

/// Return a relative display path when possible, absolute otherwise.
pub fn display_path(path: &Path) -> String {
    if let Ok(cwd) = std::env::current_dir() {
        if let Ok(relative) = path.strip_prefix(&cwd) {
            let s = relative.display().to_string();
            if s.is_empty() {
                return ".".to_string();
            }
            return s;
        }
    }
    path.display().to_string()
}
