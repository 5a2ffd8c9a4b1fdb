use std::sync::{Arc, Mutex};

pub fn info(message: &str) {
    println!("{message}");
}

pub fn warn(message: &str) {
    eprintln!("warning: {message}");
}

pub fn error(message: &str) {
    eprintln!("error: {message}");
}

/// Sink for user-facing notes produced while an upload runs.
///
/// Passed explicitly to each component so that one invocation's output
/// never leaks into another's.
pub trait Reporter: Send + Sync {
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);

    /// Inline progress line. Reporters that cannot redraw may ignore it.
    fn progress(&self, _line: &str) {}
}

pub struct ConsoleReporter {
    quiet: bool,
}

impl ConsoleReporter {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

impl Reporter for ConsoleReporter {
    fn info(&self, message: &str) {
        if !self.quiet {
            eprintln!("{message}");
        }
    }

    fn warn(&self, message: &str) {
        warn(message);
    }

    fn error(&self, message: &str) {
        error(message);
    }

    fn progress(&self, line: &str) {
        if !self.quiet {
            eprint!("\r{line}");
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Note {
    Info(String),
    Warn(String),
    Error(String),
}

/// Keeps every note in memory; used by tests and by callers that want to
/// decide later what to show.
#[derive(Clone, Default)]
pub struct RecordingReporter {
    notes: Arc<Mutex<Vec<Note>>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notes(&self) -> Vec<Note> {
        self.notes
            .lock()
            .map(|notes| notes.clone())
            .unwrap_or_default()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.notes().iter().any(|note| match note {
            Note::Info(msg) | Note::Warn(msg) | Note::Error(msg) => msg.contains(needle),
        })
    }

    fn push(&self, note: Note) {
        if let Ok(mut notes) = self.notes.lock() {
            notes.push(note);
        }
    }
}

impl Reporter for RecordingReporter {
    fn info(&self, message: &str) {
        self.push(Note::Info(message.to_string()));
    }

    fn warn(&self, message: &str) {
        self.push(Note::Warn(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.push(Note::Error(message.to_string()));
    }
}
