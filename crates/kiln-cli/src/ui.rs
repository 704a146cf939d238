//! Console output for the kiln binary.
//!
//! Progress goes to stderr so stdout stays clean for command output.

use crossterm::style::Stylize;
use kiln_core::Reporter;
use kiln_schema::PackageRef;

#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleReporter {
    quiet: bool,
}

impl ConsoleReporter {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

impl Reporter for ConsoleReporter {
    fn section(&self, title: &str) {
        if !self.quiet {
            eprintln!("{}", title.bold());
        }
    }

    fn resolving(&self, package: &PackageRef) {
        if !self.quiet {
            eprintln!("  {} {package}", "resolving ".dark_grey());
        }
    }

    fn downloading(&self, url: &str, current: u64, total: Option<u64>) {
        if self.quiet || current == 0 || total.is_some_and(|t| current < t) {
            return;
        }
        if total.is_some() {
            eprintln!("  {} {url} ({})", "fetched   ".dark_grey(), format_size(current));
        }
    }

    fn extracting(&self, package: &PackageRef) {
        if !self.quiet {
            eprintln!("  {} {package}", "extracting".dark_grey());
        }
    }

    fn done(&self, package: &PackageRef, detail: &str) {
        if !self.quiet {
            eprintln!("  {} {package} ({detail})", "done      ".green());
        }
    }

    fn failed(&self, package: &PackageRef, reason: &str) {
        eprintln!("  {} {package}: {reason}", "failed    ".red());
    }

    fn info(&self, msg: &str) {
        if !self.quiet {
            eprintln!("{msg}");
        }
    }

    fn warning(&self, msg: &str) {
        eprintln!("{} {msg}", "warning:".yellow());
    }
}

/// Human-readable byte count.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
