//! CLI theme and styling.

use colored::Colorize;
use conduit_core::OperatingMode;

/// CLI theme configuration.
pub(crate) struct Theme;

impl Theme {
    /// Format a header.
    pub(crate) fn header(text: &str) -> String {
        format!("{}", text.bold().cyan())
    }

    /// Format a success message.
    pub(crate) fn success(text: &str) -> String {
        format!("{} {}", "✓".green(), text)
    }

    /// Format an error message.
    pub(crate) fn error(text: &str) -> String {
        format!("{} {}", "✗".red(), text.red())
    }

    /// Format a warning message.
    pub(crate) fn warning(text: &str) -> String {
        format!("{} {}", "!".yellow(), text.yellow())
    }

    /// Format an info message.
    pub(crate) fn info(text: &str) -> String {
        format!("{} {}", "i".blue(), text)
    }

    /// Format a dimmed message.
    pub(crate) fn dimmed(text: &str) -> String {
        format!("{}", text.dimmed())
    }

    /// Format a separator line.
    pub(crate) fn separator() -> String {
        "━".repeat(50).dimmed().to_string()
    }

    /// Format a key-value pair.
    pub(crate) fn kv(key: &str, value: &str) -> String {
        format!("{}: {}", key.bold(), value)
    }

    /// Format a mode badge.
    pub(crate) fn mode(mode: OperatingMode) -> String {
        let label = format!("[{mode}]");
        match mode {
            OperatingMode::Chat => label.blue().to_string(),
            OperatingMode::Rag => label.magenta().to_string(),
            OperatingMode::Auto => label.cyan().to_string(),
            OperatingMode::Agent => label.yellow().to_string(),
        }
    }
}

/// Print a banner for the CLI.
pub(crate) fn print_banner(model: &str, mode: OperatingMode) {
    let version = env!("CARGO_PKG_VERSION");
    println!("{} {}", "conduit".cyan().bold(), format!("v{version}").dimmed());
    println!(
        "{}",
        Theme::dimmed(&format!("model {model} | mode {mode} | /help for commands"))
    );
    println!();
}
