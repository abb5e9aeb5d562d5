//! Styled progress and status messages.

use arm_core::Reporter;
use crossterm::style::Stylize;

/// Prints progress to stderr. `quiet` keeps only warnings and errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct Output {
    quiet: bool,
}

impl Output {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    fn line(&self, msg: impl std::fmt::Display) {
        if !self.quiet {
            eprintln!("{msg}");
        }
    }

    /// Print a plan line for `--dry-run`.
    pub fn dry_run(&self, msg: &str) {
        eprintln!("{} {msg}", "[dry-run]".dark_grey());
    }
}

impl Reporter for Output {
    fn section(&self, title: &str) {
        self.line(format!("\n{}", title.bold()));
    }

    fn resolving(&self, coordinate: &str, constraint: &str) {
        self.line(format!("  {} {} {}", "resolve".cyan(), coordinate, constraint.dark_grey()));
    }

    fn fetched(&self, coordinate: &str, cached: bool) {
        let source = if cached { "cached" } else { "fetched" };
        self.line(format!("  {} {}", source.cyan(), coordinate));
    }

    fn installed(&self, coordinate: &str, sink: &str, files: usize) {
        let plural = if files == 1 { "" } else { "s" };
        self.line(format!(
            "  {} {} → {} {}",
            "✓".green(),
            coordinate,
            sink.bold(),
            format!("({files} file{plural})").dark_grey()
        ));
    }

    fn removed(&self, coordinate: &str, sink: &str) {
        self.line(format!("  {} {} ← {}", "✗".red(), coordinate, sink.bold()));
    }

    fn info(&self, msg: &str) {
        self.line(format!("  {msg}"));
    }

    fn success(&self, msg: &str) {
        self.line(format!("{} {msg}", "✓".green().bold()));
    }

    fn warning(&self, msg: &str) {
        eprintln!("{} {msg}", "warning:".yellow().bold());
    }

    fn error(&self, msg: &str) {
        eprintln!("{} {msg}", "error:".red().bold());
    }
}
