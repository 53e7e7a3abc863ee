//! Polling state machine that maps playback positions to step and beat
//! events.
//!
//! The engine is driven from outside: every poll hands it the current
//! position and receives the events that position produced. It never looks at
//! wall time, so pauses, seeks and rate changes of the position source are
//! handled the same way as normal playback.

use serde::Serialize;

use crate::{
    clock::PositionSource,
    cue::CueKind,
    timeline::{StepKey, TimedStep, Timeline},
};

/// Something the presentation layer should react to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncEvent {
    /// A new step became active; `notes` replace the overlay text.
    StepChanged {
        key: StepKey,
        notes: String,
        is_first_in_sequence: bool,
        start_ms: u64,
    },
    /// The overlay should be hidden.
    OverlayCleared,
    CueFired(CueKind),
}

/// Live state of the engine between polls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncState {
    pub running: bool,
    pub last_step: Option<StepKey>,
    pub next_click_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct SyncEngine {
    timeline: Timeline,
    state: SyncState,
}

impl SyncEngine {
    pub fn new(timeline: Timeline) -> Self {
        Self {
            timeline,
            state: SyncState::default(),
        }
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.running
    }

    /// Enters the running state with no active step and no pending click.
    /// Returns `false` if the engine was already running.
    pub fn start(&mut self) -> bool {
        if self.state.running {
            return false;
        }
        self.state = SyncState {
            running: true,
            last_step: None,
            next_click_ms: None,
        };
        true
    }

    /// Leaves the running state. Always asks for the overlay to be cleared,
    /// whether or not a step was active or the engine was running at all.
    pub fn stop(&mut self) -> Vec<SyncEvent> {
        self.state.running = false;
        vec![SyncEvent::OverlayCleared]
    }

    /// Reads the source and polls with its answer. A failed read counts as
    /// "no active step" for this poll only.
    pub fn poll_source<S>(&mut self, source: &mut S) -> Vec<SyncEvent>
    where
        S: PositionSource + ?Sized,
    {
        let position = match source.current_position_ms() {
            Ok(position) => Some(position),
            Err(err) => {
                tracing::warn!(error = %err, "could not read playback position");
                None
            }
        };
        self.poll(position)
    }

    /// Runs one poll cycle for `position_ms`. `None` means the position is
    /// unknown. Does nothing unless the engine is running.
    pub fn poll(&mut self, position_ms: Option<u64>) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        if !self.state.running {
            return events;
        }

        let active = position_ms.and_then(|position| {
            self.timeline
                .active_at(position)
                .map(|step| (step, position))
        });

        match active {
            Some((step, position)) => {
                if self.state.last_step != Some(step.key()) {
                    enter_step(&mut self.state, step, &mut events);
                }
                if let Some(click) = tick_metronome(&mut self.state, step, position) {
                    events.push(click);
                }
            }
            None => {
                if self.state.last_step.take().is_some() {
                    tracing::debug!(position = ?position_ms, "left the timeline");
                    events.push(SyncEvent::OverlayCleared);
                }
            }
        }

        events
    }
}

fn enter_step(state: &mut SyncState, step: &TimedStep, events: &mut Vec<SyncEvent>) {
    let key = step.key();
    tracing::debug!(
        sequence = %key.sequence_id,
        step = %key.step_id,
        start_ms = step.start_ms,
        first_in_sequence = step.is_first_in_sequence,
        "step changed"
    );

    state.last_step = Some(key);
    events.push(SyncEvent::StepChanged {
        key,
        notes: step.step.touch.notes.clone(),
        is_first_in_sequence: step.is_first_in_sequence,
        start_ms: step.start_ms,
    });
    events.push(SyncEvent::CueFired(CueKind::Step));
    if step.is_first_in_sequence {
        events.push(SyncEvent::CueFired(CueKind::SequenceStart));
    }

    // The first beat lands on the step start.
    state.next_click_ms = step
        .step
        .metronome
        .active_bpm()
        .map(|_| step.start_ms);
}

/// Fires at most one click per poll. After a gap, the pending click time is
/// moved to the first beat after `position` instead of replaying the missed
/// beats.
fn tick_metronome(state: &mut SyncState, step: &TimedStep, position: u64) -> Option<SyncEvent> {
    let interval = step.step.metronome.beat_interval_ms()?;
    let next = state.next_click_ms?;
    if position < next {
        return None;
    }

    let skipped = (position - next) / interval + 1;
    let next = next.saturating_add(skipped.saturating_mul(interval));
    state.next_click_ms = Some(next);
    tracing::trace!(position, next_click_ms = next, "metronome click");

    Some(SyncEvent::CueFired(CueKind::Metronome))
}
