//! Terminal output for keel commands.

use owo_colors::OwoColorize;

/// What happened to a migration, shown in front of its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    /// Artifact written this run.
    Wrote,
    /// Model snapshotted without writing an artifact.
    Baselined,
    /// Ledger entry whose directory exists.
    Recorded,
    /// Ledger entry whose directory is gone.
    Missing,
    /// Artifact directory the ledger does not know.
    Untracked,
}

impl Mark {
    /// Plain label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Wrote => "wrote",
            Self::Baselined => "baselined",
            Self::Recorded => "recorded",
            Self::Missing => "missing",
            Self::Untracked => "untracked",
        }
    }

    fn paint(self) -> String {
        match self {
            Self::Wrote | Self::Recorded => self.label().green().to_string(),
            Self::Baselined | Self::Untracked => self.label().yellow().to_string(),
            Self::Missing => self.label().red().to_string(),
        }
    }
}

/// Command title, underlined.
pub fn header(text: &str) {
    println!();
    println!("{}", text.bold().cyan());
    println!("{}", "─".repeat(text.chars().count()).dimmed());
    println!();
}

/// Sub-heading inside a command's output.
pub fn section(text: &str) {
    println!("{}", text.bold());
}

/// An aligned `name: value` line.
pub fn field(name: &str, value: &str) {
    println!("  {:<12} {}", format!("{}:", name).dimmed(), value);
}

/// A bullet line.
pub fn bullet(text: &str) {
    println!("  {} {}", "•".dimmed(), text);
}

/// A bullet line led by a migration mark.
pub fn marked(mark: Mark, text: &str) {
    bullet(&format!("{} {}", mark.paint(), text));
}

/// A dimmed line.
pub fn quiet(text: &str) {
    println!("  {}", text.dimmed());
}

/// An SQL script, indented.
pub fn sql(script: &str) {
    println!();
    for line in script.lines() {
        println!("    {}", line);
    }
    println!();
}

pub fn blank() {
    println!();
}

pub fn success(text: &str) {
    println!("{} {}", "✔".green().bold(), text);
}

pub fn note(text: &str) {
    println!("{} {}", "ℹ".blue().bold(), text);
}

pub fn warn(text: &str) {
    println!("{} {}", "⚠".yellow().bold(), text.yellow());
}

/// Errors go to stderr.
pub fn error(text: &str) {
    eprintln!("{} {}", "✖".red().bold(), text.red());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_labels() {
        assert_eq!(Mark::Wrote.label(), "wrote");
        assert_eq!(Mark::Untracked.label(), "untracked");
        assert!(Mark::Missing.paint().contains("missing"));
    }
}
