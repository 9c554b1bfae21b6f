//! Recorded sessions: filename validation, CSV/JSON readers, discovery and
//! operator selection.

mod collector;
mod file_source;
mod filename;
mod metadata;
mod prompt;

pub use collector::{SessionFiles, SessionGroup, StreamCollector, SESSION_STREAM_COUNT};
pub use file_source::{FileReplaySource, ReplayState, Rows};
pub use filename::{FileKind, SessionFileName, SessionKey};
pub use metadata::MetadataSource;
pub use prompt::{choose_session, parse_choice, ConsolePrompt, SessionPrompt};
