use std::fmt;
use std::sync::Mutex;

/// Pipeline event kinds reported per source path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEvent {
    Added,
    Modified,
    Deleted,
    Unmodified,
    Failed,
}

impl fmt::Display for FileEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FileEvent::Added => "Added",
            FileEvent::Modified => "Modified",
            FileEvent::Deleted => "Deleted",
            FileEvent::Unmodified => "Unchanged",
            FileEvent::Failed => "Failed",
        };
        write!(f, "{}", label)
    }
}

/// Sink for user-facing progress. The library never prints directly; the
/// binary injects a terminal handler, tests inject a collecting one.
pub trait OutputHandler: Send + Sync {
    fn success(&self, message: &str);

    fn error(&self, message: &str);

    fn info(&self, message: &str);

    fn warning(&self, message: &str);

    fn heading(&self, message: &str);

    /// Display a status message (e.g. "Writing migration...")
    fn status(&self, action: &str, message: &str);

    /// Display debug information (may be ignored in production)
    fn debug(&self, message: &str);

    /// One classified source path
    fn file_event(&self, event: FileEvent, path: &str) {
        match event {
            FileEvent::Unmodified => self.debug(&format!("{} {}", event, path)),
            FileEvent::Failed => self.error(path),
            _ => self.status(&event.to_string(), path),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLevel {
    Success,
    Error,
    Info,
    Warning,
    Heading,
    Status,
    Debug,
}

/// Output handler that collects messages for library callers
#[derive(Default)]
pub struct LibraryOutputHandler {
    messages: Mutex<Vec<(OutputLevel, String)>>,
}

impl LibraryOutputHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_messages(&self) -> Vec<(OutputLevel, String)> {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Messages recorded at one level
    pub fn messages_at(&self, level: OutputLevel) -> Vec<String> {
        self.get_messages()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m)
            .collect()
    }

    fn add_message(&self, level: OutputLevel, message: &str) {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((level, message.to_string()));
    }
}

impl OutputHandler for LibraryOutputHandler {
    fn success(&self, message: &str) {
        self.add_message(OutputLevel::Success, message);
    }

    fn error(&self, message: &str) {
        self.add_message(OutputLevel::Error, message);
    }

    fn info(&self, message: &str) {
        self.add_message(OutputLevel::Info, message);
    }

    fn warning(&self, message: &str) {
        self.add_message(OutputLevel::Warning, message);
    }

    fn heading(&self, message: &str) {
        self.add_message(OutputLevel::Heading, message);
    }

    fn status(&self, action: &str, message: &str) {
        self.add_message(OutputLevel::Status, &format!("{} {}", action, message));
    }

    fn debug(&self, message: &str) {
        self.add_message(OutputLevel::Debug, message);
    }
}

/// Terminal output with colors
#[cfg(feature = "cli")]
pub struct CliOutputHandler;

#[cfg(feature = "cli")]
impl OutputHandler for CliOutputHandler {
    fn success(&self, message: &str) {
        use owo_colors::OwoColorize;
        println!("{} {}", "✓".green(), message);
    }

    fn error(&self, message: &str) {
        use owo_colors::OwoColorize;
        eprintln!("{} {}", "✗".red(), message);
    }

    fn info(&self, message: &str) {
        println!("{}", message);
    }

    fn warning(&self, message: &str) {
        use owo_colors::OwoColorize;
        println!("{} {}", "⚠".yellow(), message);
    }

    fn heading(&self, message: &str) {
        use owo_colors::OwoColorize;
        println!("\n{}", message.bold());
    }

    fn status(&self, action: &str, message: &str) {
        use owo_colors::OwoColorize;
        println!("{:>12} {}", action.green().bold(), message);
    }

    fn debug(&self, message: &str) {
        tracing::debug!("{}", message);
    }

    fn file_event(&self, event: FileEvent, path: &str) {
        use owo_colors::OwoColorize;
        let label = format!("{:>12}", event.to_string());
        match event {
            FileEvent::Added => println!("{} {}", label.green().bold(), path),
            FileEvent::Modified => println!("{} {}", label.yellow().bold(), path),
            FileEvent::Deleted => println!("{} {}", label.red().bold(), path),
            FileEvent::Failed => eprintln!("{} {}", label.red().bold(), path),
            FileEvent::Unmodified => tracing::debug!("{} {}", event, path),
        }
    }
}

/// Discards all output
pub struct SilentOutputHandler;

impl OutputHandler for SilentOutputHandler {
    fn success(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
    fn info(&self, _message: &str) {}
    fn warning(&self, _message: &str) {}
    fn heading(&self, _message: &str) {}
    fn status(&self, _action: &str, _message: &str) {}
    fn debug(&self, _message: &str) {}
}
