//! Output side of the sync engine: the cue device and the overlay surface.
//!
//! Both are fire-and-forget. The engine never waits for an acknowledgement
//! and never learns whether a cue was actually heard.

use serde::{Deserialize, Serialize};

use crate::sync::SyncEvent;

/// The three sounds the player can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CueKind {
    /// Played on every step change.
    Step,
    /// Played in addition to [`CueKind::Step`] when a sequence begins.
    SequenceStart,
    /// One metronome beat.
    Metronome,
}

pub trait CueSink {
    fn play_step_cue(&mut self);
    fn play_sequence_start_cue(&mut self);
    fn play_metronome_cue(&mut self);

    fn play(&mut self, kind: CueKind) {
        match kind {
            CueKind::Step => self.play_step_cue(),
            CueKind::SequenceStart => self.play_sequence_start_cue(),
            CueKind::Metronome => self.play_metronome_cue(),
        }
    }
}

pub trait OverlaySink {
    /// Shows `text`; an empty string hides the overlay.
    fn set_overlay_text(&mut self, text: &str);
}

impl<T: CueSink + ?Sized> CueSink for Box<T> {
    fn play_step_cue(&mut self) {
        (**self).play_step_cue()
    }

    fn play_sequence_start_cue(&mut self) {
        (**self).play_sequence_start_cue()
    }

    fn play_metronome_cue(&mut self) {
        (**self).play_metronome_cue()
    }
}

impl<T: OverlaySink + ?Sized> OverlaySink for Box<T> {
    fn set_overlay_text(&mut self, text: &str) {
        (**self).set_overlay_text(text)
    }
}

/// Sink that drops everything, for sessions without an audio device.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl CueSink for Silent {
    fn play_step_cue(&mut self) {}
    fn play_sequence_start_cue(&mut self) {}
    fn play_metronome_cue(&mut self) {}
}

impl OverlaySink for Silent {
    fn set_overlay_text(&mut self, _text: &str) {}
}

/// Forwards engine events, in order, to the overlay and cue sinks.
pub fn dispatch<O, C>(events: &[SyncEvent], overlay: &mut O, cues: &mut C)
where
    O: OverlaySink + ?Sized,
    C: CueSink + ?Sized,
{
    for event in events {
        match event {
            SyncEvent::StepChanged { notes, .. } => overlay.set_overlay_text(notes),
            SyncEvent::OverlayCleared => overlay.set_overlay_text(""),
            SyncEvent::CueFired(kind) => cues.play(*kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{EventRecorder, RecordedOutput};
    use crate::script::{SequenceId, StepId};
    use crate::timeline::StepKey;

    #[test]
    fn dispatches_events_in_order() {
        let recorder = EventRecorder::new();
        let mut overlay = recorder.clone();
        let mut cues = recorder.clone();

        let events = vec![
            SyncEvent::StepChanged {
                key: StepKey {
                    sequence_id: SequenceId(1),
                    step_id: StepId(1),
                },
                notes: "slow".to_string(),
                is_first_in_sequence: true,
                start_ms: 0,
            },
            SyncEvent::CueFired(CueKind::Step),
            SyncEvent::CueFired(CueKind::SequenceStart),
            SyncEvent::OverlayCleared,
        ];
        dispatch(&events, &mut overlay, &mut cues);

        assert_eq!(
            recorder.entries(),
            vec![
                RecordedOutput::Overlay("slow".to_string()),
                RecordedOutput::Cue(CueKind::Step),
                RecordedOutput::Cue(CueKind::SequenceStart),
                RecordedOutput::Overlay(String::new()),
            ]
        );
    }

    #[test]
    fn silent_sink_accepts_everything() {
        let events = [SyncEvent::CueFired(CueKind::Metronome), SyncEvent::OverlayCleared];
        dispatch(&events, &mut Silent, &mut Silent);
    }
}
