//! Validated script model.
//!
//! Values of these types are only produced by [`crate::validator`], so holding
//! a [`Script`] means every ordering, duration, tempo and touch-mode rule has
//! already been checked.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// The only script format version understood by the validator.
pub const SUPPORTED_VERSION: &str = "1.0";

/// Identifier of a sequence, unique and strictly increasing across a script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceId(pub i64);

/// Identifier of a step, strictly increasing inside its sequence only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(pub i64);

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Script {
    pub version: String,
    pub trial_id: String,
    pub description: String,
    pub settings: Settings,
    pub sequences: Vec<Sequence>,
}

/// Global bounds every step is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub min_bpm: i64,
    pub max_bpm: i64,
    pub min_step_duration_sec: i64,
    pub max_step_duration_sec: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sequence {
    pub id: SequenceId,
    pub label: String,
    pub purpose: String,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Step {
    pub id: StepId,
    pub duration_sec: f64,
    pub metronome: Metronome,
    pub touch: Touch,
}

/// Metronome settings of a step. `bpm` is guaranteed to be present when
/// `enabled` is set. A bpm given for a disabled metronome is kept when it is
/// not negative but is never used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Metronome {
    pub enabled: bool,
    pub bpm: Option<u32>,
}

impl Metronome {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            bpm: None,
        }
    }

    pub fn at(bpm: u32) -> Self {
        Self {
            enabled: true,
            bpm: Some(bpm),
        }
    }

    /// Tempo to click at, if the metronome is on.
    pub fn active_bpm(&self) -> Option<u32> {
        if self.enabled {
            self.bpm.filter(|bpm| *bpm > 0)
        } else {
            None
        }
    }

    /// Milliseconds between two clicks, truncated and never below 1.
    pub fn beat_interval_ms(&self) -> Option<u64> {
        self.active_bpm()
            .map(|bpm| (60_000 / u64::from(bpm)).max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Touch {
    pub mode: TouchMode,
    /// Shown verbatim as overlay text while the step is active.
    pub notes: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TouchMode {
    None,
    Stroke,
    Tease,
    Squeeze,
    TipStroke,
    TipTease,
    TipSqueeze,
    Edge,
}

impl TouchMode {
    pub const ALL: [TouchMode; 8] = [
        TouchMode::None,
        TouchMode::Stroke,
        TouchMode::Tease,
        TouchMode::Squeeze,
        TouchMode::TipStroke,
        TouchMode::TipTease,
        TouchMode::TipSqueeze,
        TouchMode::Edge,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TouchMode::None => "none",
            TouchMode::Stroke => "stroke",
            TouchMode::Tease => "tease",
            TouchMode::Squeeze => "squeeze",
            TouchMode::TipStroke => "tip_stroke",
            TouchMode::TipTease => "tip_tease",
            TouchMode::TipSqueeze => "tip_squeeze",
            TouchMode::Edge => "edge",
        }
    }
}

impl fmt::Display for TouchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Error returned when a string is not one of the touch mode literals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTouchMode(pub String);

impl FromStr for TouchMode {
    type Err = UnknownTouchMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TouchMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| UnknownTouchMode(s.to_string()))
    }
}

impl Script {
    pub fn step_count(&self) -> usize {
        self.sequences.iter().map(|seq| seq.steps.len()).sum()
    }

    /// Builds a short human readable description of the script.
    pub fn summary(&self) -> ScriptSummary {
        let total_duration_sec = self
            .sequences
            .iter()
            .flat_map(|seq| seq.steps.iter())
            .map(|step| step.duration_sec)
            .sum();

        ScriptSummary {
            trial_id: self.trial_id.clone(),
            description: self.description.clone(),
            sequences: self
                .sequences
                .iter()
                .map(|seq| SequenceSummary {
                    id: seq.id,
                    label: seq.label.clone(),
                    steps: seq.steps.len(),
                    duration_sec: seq.steps.iter().map(|step| step.duration_sec).sum(),
                })
                .collect(),
            step_count: self.step_count(),
            total_duration_sec,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScriptSummary {
    pub trial_id: String,
    pub description: String,
    pub sequences: Vec<SequenceSummary>,
    pub step_count: usize,
    pub total_duration_sec: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SequenceSummary {
    pub id: SequenceId,
    pub label: String,
    pub steps: usize,
    pub duration_sec: f64,
}

impl fmt::Display for ScriptSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "trial {}: {}", self.trial_id, self.description)?;
        for seq in &self.sequences {
            writeln!(
                f,
                "  sequence {} ({}): {} step(s), {:.1}s",
                seq.id, seq.label, seq.steps, seq.duration_sec
            )?;
        }
        write!(
            f,
            "{} sequence(s), {} step(s), {:.1}s total",
            self.sequences.len(),
            self.step_count,
            self.total_duration_sec
        )
    }
}
