//! Terminal and JSON output for the CLI.
//!
//! Human-readable lines are suppressed in `--json` mode; only [`Output::json`]
//! and errors reach the terminal then.

use std::time::Duration;

use console::{pad_str, style, Alignment, StyledObject};
use indicatif::{ProgressBar, ProgressStyle};
use offline_cache::CacheStatus;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Info,
    Success,
    Warn,
    Error,
    Debug,
}

impl Mark {
    fn symbol(self) -> StyledObject<&'static str> {
        match self {
            Mark::Info => style("ℹ").blue(),
            Mark::Success => style("✓").green(),
            Mark::Warn => style("⚠").yellow(),
            Mark::Error => style("✗").red(),
            Mark::Debug => style("→").dim(),
        }
    }

    fn to_stderr(self) -> bool {
        matches!(self, Mark::Warn | Mark::Error | Mark::Debug)
    }
}

/// Output handler shared by every command.
#[derive(Debug, Clone)]
pub struct Output {
    verbose: bool,
    json: bool,
}

impl Output {
    pub fn new(verbose: bool, json: bool) -> Self {
        Self { verbose, json }
    }

    pub fn is_json(&self) -> bool {
        self.json
    }

    fn emit(&self, mark: Mark, msg: &str) {
        if self.json {
            return;
        }
        let body = match mark {
            Mark::Error => style(msg).red().to_string(),
            Mark::Debug => style(msg).dim().to_string(),
            _ => msg.to_string(),
        };
        if mark.to_stderr() {
            eprintln!("{} {}", mark.symbol(), body);
        } else {
            println!("{} {}", mark.symbol(), body);
        }
    }

    fn plain(&self, line: String) {
        if !self.json {
            println!("{}", line);
        }
    }

    pub fn info(&self, msg: &str) {
        self.emit(Mark::Info, msg);
    }

    pub fn success(&self, msg: &str) {
        self.emit(Mark::Success, msg);
    }

    pub fn warn(&self, msg: &str) {
        self.emit(Mark::Warn, msg);
    }

    /// Errors are printed in both modes; JSON mode wraps them in an object.
    pub fn error(&self, msg: &str) {
        if self.json {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        } else {
            self.emit(Mark::Error, msg);
        }
    }

    /// Only shown with `-v`.
    pub fn debug(&self, msg: &str) {
        if self.verbose {
            self.emit(Mark::Debug, msg);
        }
    }

    pub fn header(&self, title: &str) {
        self.plain(format!("\n{}", style(title).bold().underlined()));
    }

    pub fn step(&self, current: usize, total: usize, msg: &str) {
        let counter = format!("[{}/{}]", current, total);
        self.plain(format!("{} {}", style(counter).dim(), msg));
    }

    pub fn kv(&self, key: &str, value: &str) {
        self.plain(format!("  {}: {}", style(key).dim(), value));
    }

    pub fn list_item(&self, item: &str) {
        self.plain(format!("  {} {}", style("•").dim(), item));
    }

    /// Pretty-print a value as JSON. Printed regardless of mode.
    pub fn json<T: Serialize>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{}", text),
            Err(e) => self.error(&format!("Could not serialize output: {}", e)),
        }
    }

    /// Start a table and print its header row.
    pub fn table<'a>(&'a self, columns: &[(&str, usize)]) -> Table<'a> {
        let table = Table {
            output: self,
            widths: columns.iter().map(|(_, width)| *width).collect(),
        };
        let headings: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();
        table.row(&headings);
        table
    }

    pub fn progress(&self, len: u64, msg: &str) -> ProgressBar {
        if self.json {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(len);
        if let Ok(template) = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        ) {
            bar.set_style(template.progress_chars("#>-"));
        }
        bar.set_message(msg.to_string());
        bar
    }

    pub fn spinner(&self, msg: &str) -> ProgressBar {
        if self.json {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new_spinner();
        if let Ok(template) = ProgressStyle::with_template("{spinner:.green} {msg}") {
            bar.set_style(template);
        }
        bar.set_message(msg.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    }
}

/// Fixed-width table. Cells are padded by visible width, so styled
/// badges line up with plain text.
pub struct Table<'a> {
    output: &'a Output,
    widths: Vec<usize>,
}

impl Table<'_> {
    pub fn row(&self, cells: &[&str]) {
        let line: Vec<String> = cells
            .iter()
            .zip(&self.widths)
            .map(|(cell, width)| pad_str(cell, *width, Alignment::Left, Some("…")).into_owned())
            .collect();
        self.output.plain(format!("  {}", line.join("  ")));
    }
}

/// Colored label for how a request was served.
pub fn cache_badge(status: CacheStatus) -> String {
    let label = style(status.to_string());
    let styled = match status {
        CacheStatus::Hit => label.green(),
        CacheStatus::Miss => label.yellow(),
        CacheStatus::Fallback => label.cyan(),
        CacheStatus::Bypass => label.dim(),
    };
    styled.to_string()
}

/// Colored label for a cache relative to the configured version.
pub fn version_badge(current: bool) -> String {
    match current {
        true => style("current").green().to_string(),
        false => style("stale").dim().to_string(),
    }
}

/// Human-readable byte count using binary units.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}

pub fn format_elapsed(elapsed: Duration) -> String {
    match elapsed.as_millis() {
        ms if ms < 1000 => format!("{}ms", ms),
        _ => format!("{:.1}s", elapsed.as_secs_f64()),
    }
}
