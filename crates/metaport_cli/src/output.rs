use metaport_core::CompletionStatus;
use owo_colors::OwoColorize;

/// Standard output formatting for the CLI
pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    /// Print a system/status message (indented)
    pub fn status(&self, message: &str) {
        println!("  {}", message.dimmed());
    }

    /// Print an info message (indented)
    pub fn info(&self, label: &str, value: &str) {
        println!("  {} {}", label.bright_blue(), value);
    }

    /// Print a success message (indented)
    pub fn success(&self, message: &str) {
        println!("  {} {}", "✓".bright_green(), message);
    }

    /// Print an error message (indented)
    pub fn error(&self, message: &str) {
        println!("  {} {}", "✗".bright_red(), message);
    }

    /// Print a warning message (indented)
    pub fn warning(&self, message: &str) {
        println!("  {} {}", "⚠".yellow(), message);
    }

    /// Print a section header
    pub fn section(&self, title: &str) {
        println!();
        println!("{}", title.bright_cyan().bold());
        println!("{}", "─".repeat(40).dimmed());
    }

    /// Print a key-value pair (indented)
    pub fn kv(&self, key: &str, value: &str) {
        println!("  {} {}", format!("{}:", key).dimmed(), value);
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

/// Format an entry's completion status for display
pub fn format_status(status: CompletionStatus) -> String {
    match status {
        CompletionStatus::Pending => "pending".dimmed().to_string(),
        CompletionStatus::MetaobjectCreated => "created".bright_green().to_string(),
        CompletionStatus::BackreferencesPending => "linking".bright_yellow().to_string(),
        CompletionStatus::BackreferencesCompleted => "linked".bright_green().to_string(),
        CompletionStatus::Failed => "failed".bright_red().bold().to_string(),
    }
}
