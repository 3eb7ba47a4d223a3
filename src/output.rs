//! Gate events and the output/input ports

use crate::error::{Error, Result};
use serde::Serialize;
use std::io::{self, BufRead, Write};

/// Source tag attached to every event the gate emits
pub const CORE_SOURCE: &str = "core";

/// Named events emitted while deciding whether a scan may proceed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// Run banner; always first
    Banner {
        /// Crate version
        version: String,
    },
    /// Vulnerability database refresh started
    DbUpdateStarted,
    /// Vulnerability database refresh finished
    DbUpdateFinished,
    /// The site still serves the WordPress install page
    NotFullyConfigured {
        /// Effective URL of the install page
        url: String,
    },
    /// Interactive note introducing the update confirmation prompt
    #[serde(rename = "@notice")]
    Notice {
        /// Notice text
        msg: String,
    },
}

/// Sink receiving named events with a structured payload and source tag
pub trait EventSink {
    /// Emit one event
    fn output(&mut self, event: Event, source: &'static str) -> Result<()>;
}

/// Blocking one-line operator input
pub trait Prompt {
    /// Show the question and block for a single line of input
    fn ask(&mut self, question: &str) -> io::Result<String>;
}

/// Production prompt reading from stdin
pub struct StdinPrompt;

impl Prompt for StdinPrompt {
    fn ask(&mut self, question: &str) -> io::Result<String> {
        print!("{question} ");
        io::stdout().flush()?;

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line)
    }
}

/// Human-readable event rendering
pub struct CliSink<W: Write> {
    writer: W,
}

impl<W: Write> CliSink<W> {
    /// Create a sink writing to the given writer
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write> EventSink for CliSink<W> {
    fn output(&mut self, event: Event, _source: &'static str) -> Result<()> {
        let result = match event {
            Event::Banner { version } => {
                writeln!(self.writer, "WordPress Preflight v{version}")
                    .and_then(|_| {
                        writeln!(
                            self.writer,
                            "Pre-scan gating for WordPress security scanning"
                        )
                    })
                    .and_then(|_| writeln!(self.writer))
            }
            Event::DbUpdateStarted => {
                writeln!(self.writer, "[+] Updating the vulnerability database ...")
            }
            Event::DbUpdateFinished => {
                writeln!(self.writer, "[+] Database update finished")
            }
            Event::NotFullyConfigured { url } => writeln!(
                self.writer,
                "[i] The remote website is up, but currently in install mode: {url}"
            ),
            Event::Notice { msg } => writeln!(self.writer, "[i] {msg}"),
        };

        result.map_err(Error::OutputFailed)
    }
}

/// One JSON object per event line
pub struct JsonSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonSink<W> {
    /// Create a sink writing JSON lines to the given writer
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

/// Wire form carrying the source tag next to the event payload
#[derive(Serialize)]
struct TaggedEvent<'a> {
    source: &'a str,
    #[serde(flatten)]
    event: &'a Event,
}

impl<W: Write> EventSink for JsonSink<W> {
    fn output(&mut self, event: Event, source: &'static str) -> Result<()> {
        serde_json::to_writer(
            &mut self.writer,
            &TaggedEvent {
                source,
                event: &event,
            },
        )?;
        writeln!(self.writer).map_err(Error::OutputFailed)
    }
}

#[cfg(test)]
pub(crate) mod doubles {
    use super::*;

    /// Sink recording emitted events for assertions
    #[derive(Default)]
    pub struct RecordingSink {
        pub events: Vec<(Event, &'static str)>,
    }

    impl EventSink for RecordingSink {
        fn output(&mut self, event: Event, source: &'static str) -> Result<()> {
            self.events.push((event, source));
            Ok(())
        }
    }

    impl RecordingSink {
        pub fn names(&self) -> Vec<&'static str> {
            self.events
                .iter()
                .map(|(event, _)| match event {
                    Event::Banner { .. } => "banner",
                    Event::DbUpdateStarted => "db_update_started",
                    Event::DbUpdateFinished => "db_update_finished",
                    Event::NotFullyConfigured { .. } => "not_fully_configured",
                    Event::Notice { .. } => "@notice",
                })
                .collect()
        }
    }

    /// Prompt answering every question from a script
    pub struct ScriptedPrompt {
        answer: String,
        pub questions: Vec<String>,
    }

    impl ScriptedPrompt {
        pub fn answering(answer: &str) -> Self {
            Self {
                answer: answer.to_string(),
                questions: Vec::new(),
            }
        }
    }

    impl Prompt for ScriptedPrompt {
        fn ask(&mut self, question: &str) -> io::Result<String> {
            self.questions.push(question.to_string());
            Ok(self.answer.clone())
        }
    }

    /// Prompt that must never be consulted
    pub struct NoPrompt;

    impl Prompt for NoPrompt {
        fn ask(&mut self, question: &str) -> io::Result<String> {
            panic!("prompt must not be used, got question: {question}");
        }
    }
}
