//! Core library for the Stimulation Player.
//!
//! A script describes a session as sequences of timed steps. The crate
//! validates scripts, lays their steps out on an absolute timeline, and runs
//! the polling sync engine that turns a playback position into step changes,
//! overlay updates and metronome cues. Video playback, the audio device and
//! the UI stay outside; they are reached through the traits in [`clock`] and
//! [`cue`].

pub mod clock;
pub mod config;
pub mod cue;
pub mod error;
pub mod record;
pub mod script;
pub mod selection;
pub mod session;
pub mod sync;
pub mod timeline;
pub mod validator;

pub use clock::{ManualClock, PlaybackClock, PositionSource};
pub use config::{AppConfig, CueConfig, LogConfig, SyncConfig};
pub use cue::{CueKind, CueSink, OverlaySink};
pub use error::{BpmProblem, PlayerError, Result, ValidationError};
pub use record::{EventRecorder, RecordedOutput};
pub use script::{Metronome, Script, Sequence, SequenceId, Settings, Step, StepId, Touch, TouchMode};
pub use selection::{LoadedScript, Selection, SelectionState};
pub use session::PlaybackSession;
pub use sync::{SyncEngine, SyncEvent, SyncState};
pub use timeline::{StepKey, TimedStep, Timeline};
pub use validator::{load_script, validate, validate_reader, validate_str};
