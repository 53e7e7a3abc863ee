use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::cue::{CueKind, CueSink, OverlaySink};

/// One call received by an [`EventRecorder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordedOutput {
    Overlay(String),
    Cue(CueKind),
}

/// Overlay and cue sink that keeps every call in memory. Clones share one
/// log, so a clone can be handed to a session while the original inspects
/// what was played.
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    entries: Arc<Mutex<Vec<RecordedOutput>>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<RecordedOutput> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Most recent overlay text, if the overlay was ever touched.
    pub fn overlay_text(&self) -> Option<String> {
        self.lock().iter().rev().find_map(|entry| match entry {
            RecordedOutput::Overlay(text) => Some(text.clone()),
            RecordedOutput::Cue(_) => None,
        })
    }

    pub fn cue_count(&self, kind: CueKind) -> usize {
        self.lock()
            .iter()
            .filter(|entry| **entry == RecordedOutput::Cue(kind))
            .count()
    }

    fn push(&self, entry: RecordedOutput) {
        self.lock().push(entry);
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RecordedOutput>> {
        // A panic while pushing cannot leave the log half-written.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CueSink for EventRecorder {
    fn play_step_cue(&mut self) {
        self.push(RecordedOutput::Cue(CueKind::Step));
    }

    fn play_sequence_start_cue(&mut self) {
        self.push(RecordedOutput::Cue(CueKind::SequenceStart));
    }

    fn play_metronome_cue(&mut self) {
        self.push(RecordedOutput::Cue(CueKind::Metronome));
    }
}

impl OverlaySink for EventRecorder {
    fn set_overlay_text(&mut self, text: &str) {
        self.push(RecordedOutput::Overlay(text.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_log() {
        let recorder = EventRecorder::new();
        let mut handle = recorder.clone();

        handle.set_overlay_text("breathe");
        handle.play_metronome_cue();
        handle.play_metronome_cue();

        assert_eq!(recorder.len(), 3);
        assert_eq!(recorder.overlay_text().as_deref(), Some("breathe"));
        assert_eq!(recorder.cue_count(CueKind::Metronome), 2);
        assert_eq!(recorder.cue_count(CueKind::Step), 0);

        recorder.clear();
        assert!(handle.is_empty());
        assert_eq!(recorder.overlay_text(), None);
    }
}
