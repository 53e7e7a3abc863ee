//! Turns raw script content into a validated [`Script`].
//!
//! Rules are checked in a fixed order and the first violation wins:
//! structure, version, at least one sequence, then per sequence its id
//! ordering and non-emptiness, then per step its id ordering, duration, tempo
//! and touch mode.

use std::{fs, io::Read, path::Path};

use serde::Deserialize;

use crate::{
    error::{BpmProblem, ValidationError},
    script::{
        Metronome, Script, Sequence, SequenceId, Settings, Step, StepId, Touch, TouchMode,
        SUPPORTED_VERSION,
    },
    timeline::{duration_to_ms, MAX_TIMELINE_MS},
    Result,
};

/// Validates raw script bytes.
pub fn validate(bytes: &[u8]) -> std::result::Result<Script, ValidationError> {
    let document: ScriptDocument = serde_json::from_slice(bytes)
        .map_err(|err| ValidationError::MalformedInput(err.to_string()))?;
    document.into_script()
}

/// Validates a script held in a string.
pub fn validate_str(text: &str) -> std::result::Result<Script, ValidationError> {
    validate(text.as_bytes())
}

/// Reads the whole reader and validates its content. Read failures are
/// reported as IO errors, not as validation errors.
pub fn validate_reader<R: Read>(mut reader: R) -> Result<Script> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    Ok(validate(&bytes)?)
}

/// Loads and validates the script stored at `path`.
pub fn load_script(path: impl AsRef<Path>) -> Result<Script> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    let script = validate(&bytes)?;
    tracing::debug!(
        path = %path.display(),
        trial = %script.trial_id,
        sequences = script.sequences.len(),
        steps = script.step_count(),
        "script validated"
    );
    Ok(script)
}

/// Structural shape of a script document, before any semantic check.
#[derive(Debug, Deserialize)]
struct ScriptDocument {
    version: String,
    trial_id: String,
    description: String,
    settings: Settings,
    sequences: Vec<SequenceDocument>,
}

#[derive(Debug, Deserialize)]
struct SequenceDocument {
    id: i64,
    label: String,
    purpose: String,
    steps: Vec<StepDocument>,
}

#[derive(Debug, Deserialize)]
struct StepDocument {
    id: i64,
    duration_sec: f64,
    metronome: MetronomeDocument,
    touch: TouchDocument,
}

#[derive(Debug, Deserialize)]
struct MetronomeDocument {
    enabled: bool,
    #[serde(default)]
    bpm: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TouchDocument {
    mode: String,
    notes: String,
}

impl ScriptDocument {
    fn into_script(self) -> std::result::Result<Script, ValidationError> {
        if self.version != SUPPORTED_VERSION {
            return Err(ValidationError::UnsupportedVersion {
                found: self.version,
            });
        }

        if self.sequences.is_empty() {
            return Err(ValidationError::EmptyScript);
        }

        let settings = self.settings;
        let mut last_sequence_id = 0;
        let mut total_ms = 0;
        let mut sequences = Vec::with_capacity(self.sequences.len());

        for sequence in self.sequences {
            if sequence.id <= last_sequence_id {
                return Err(ValidationError::OutOfOrderSequence {
                    previous: last_sequence_id,
                    found: sequence.id,
                });
            }
            last_sequence_id = sequence.id;
            sequences.push(sequence.into_sequence(&settings, &mut total_ms)?);
        }

        Ok(Script {
            version: self.version,
            trial_id: self.trial_id,
            description: self.description,
            settings,
            sequences,
        })
    }
}

impl SequenceDocument {
    fn into_sequence(
        self,
        settings: &Settings,
        total_ms: &mut u64,
    ) -> std::result::Result<Sequence, ValidationError> {
        let sequence_id = SequenceId(self.id);
        if self.steps.is_empty() {
            return Err(ValidationError::EmptySequence {
                sequence: sequence_id,
            });
        }

        let mut last_step_id = 0;
        let mut steps = Vec::with_capacity(self.steps.len());

        for step in self.steps {
            if step.id <= last_step_id {
                return Err(ValidationError::OutOfOrderStep {
                    sequence: sequence_id,
                    previous: last_step_id,
                    found: step.id,
                });
            }
            last_step_id = step.id;
            steps.push(step.into_step(sequence_id, settings, total_ms)?);
        }

        Ok(Sequence {
            id: sequence_id,
            label: self.label,
            purpose: self.purpose,
            steps,
        })
    }
}

impl StepDocument {
    fn into_step(
        self,
        sequence: SequenceId,
        settings: &Settings,
        total_ms: &mut u64,
    ) -> std::result::Result<Step, ValidationError> {
        let step = StepId(self.id);

        let min_sec = settings.min_step_duration_sec;
        let max_sec = settings.max_step_duration_sec;
        let out_of_range = || ValidationError::DurationOutOfRange {
            sequence,
            step,
            duration_sec: self.duration_sec,
            min_sec,
            max_sec,
        };
        if !(self.duration_sec > 0.0
            && self.duration_sec >= min_sec as f64
            && self.duration_sec <= max_sec as f64)
        {
            return Err(out_of_range());
        }

        // Settings may allow durations whose timeline no longer fits in
        // milliseconds; the step that crosses the limit is rejected.
        let end_ms = if self.duration_sec * 1000.0 < MAX_TIMELINE_MS as f64 {
            total_ms.checked_add(duration_to_ms(self.duration_sec))
        } else {
            None
        };
        let end_ms = end_ms
            .filter(|end| *end <= MAX_TIMELINE_MS)
            .ok_or_else(out_of_range)?;
        *total_ms = end_ms;

        let metronome = self.metronome.check(sequence, step, settings)?;

        let mode = self
            .touch
            .mode
            .parse::<TouchMode>()
            .map_err(|unknown| ValidationError::InvalidTouchMode {
                sequence,
                step,
                mode: unknown.0,
            })?;

        Ok(Step {
            id: step,
            duration_sec: self.duration_sec,
            metronome,
            touch: Touch {
                mode,
                notes: self.touch.notes,
            },
        })
    }
}

impl MetronomeDocument {
    fn check(
        self,
        sequence: SequenceId,
        step: StepId,
        settings: &Settings,
    ) -> std::result::Result<Metronome, ValidationError> {
        if !self.enabled {
            return Ok(Metronome {
                enabled: false,
                bpm: self.bpm.and_then(|bpm| u32::try_from(bpm).ok()),
            });
        }

        let invalid = |reason| ValidationError::InvalidBpm {
            sequence,
            step,
            reason,
        };

        let bpm = self.bpm.ok_or_else(|| invalid(BpmProblem::Missing))?;
        if bpm < settings.min_bpm || bpm > settings.max_bpm {
            return Err(invalid(BpmProblem::OutOfRange {
                bpm,
                min: settings.min_bpm,
                max: settings.max_bpm,
            }));
        }

        // A zero or negative tempo only passes the range check when the
        // settings themselves allow it; it has no beat interval either way.
        let bpm = u32::try_from(bpm)
            .ok()
            .filter(|bpm| *bpm > 0)
            .ok_or_else(|| invalid(BpmProblem::NotPositive { bpm }))?;

        Ok(Metronome::at(bpm))
    }
}
