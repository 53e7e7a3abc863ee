use serde::Serialize;

use crate::script::{Script, SequenceId, Step, StepId};

/// Identifies a step across the whole script. Step ids alone repeat between
/// sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct StepKey {
    pub sequence_id: SequenceId,
    pub step_id: StepId,
}

/// A step placed on the session timeline over `[start_ms, end_ms)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimedStep {
    pub step: Step,
    pub sequence_id: SequenceId,
    pub is_first_in_sequence: bool,
    pub start_ms: u64,
    pub end_ms: u64,
}

impl TimedStep {
    pub fn key(&self) -> StepKey {
        StepKey {
            sequence_id: self.sequence_id,
            step_id: self.step.id,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.end_ms - self.start_ms
    }

    pub fn contains(&self, position_ms: u64) -> bool {
        self.start_ms <= position_ms && position_ms < self.end_ms
    }
}

/// Longest timeline, in milliseconds, a validated script may produce.
pub const MAX_TIMELINE_MS: u64 = i64::MAX as u64;

/// Converts a step duration to whole milliseconds, truncating toward zero.
pub fn duration_to_ms(duration_sec: f64) -> u64 {
    (duration_sec * 1000.0) as u64
}

/// Ordered, gap-free list of timed steps built from a validated script.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Timeline {
    steps: Vec<TimedStep>,
}

impl Timeline {
    /// Lays every step of the script out back to back, starting at zero.
    ///
    /// Validated scripts always fit within [`MAX_TIMELINE_MS`]. Positions of a
    /// hand-built script that run past `u64::MAX` are pinned there.
    pub fn build(script: &Script) -> Self {
        let mut steps = Vec::with_capacity(script.step_count());
        let mut cursor_ms = 0u64;

        for sequence in &script.sequences {
            for (index, step) in sequence.steps.iter().enumerate() {
                let duration_ms = duration_to_ms(step.duration_sec);
                steps.push(TimedStep {
                    step: step.clone(),
                    sequence_id: sequence.id,
                    is_first_in_sequence: index == 0,
                    start_ms: cursor_ms,
                    end_ms: cursor_ms.saturating_add(duration_ms),
                });
                cursor_ms = cursor_ms.saturating_add(duration_ms);
            }
        }

        Self { steps }
    }

    pub fn steps(&self) -> &[TimedStep] {
        &self.steps
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TimedStep> {
        self.steps.iter()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.steps.last().map(|step| step.end_ms).unwrap_or(0)
    }

    /// Returns the unique step whose interval contains `position_ms`.
    pub fn active_at(&self, position_ms: u64) -> Option<&TimedStep> {
        // Only the last step starting at or before the position can contain
        // it: zero-length steps sort before the step sharing their start.
        let after = self
            .steps
            .partition_point(|step| step.start_ms <= position_ms);
        after
            .checked_sub(1)
            .map(|index| &self.steps[index])
            .filter(|step| step.contains(position_ms))
    }

    /// Start of the first and end of the last step of a sequence.
    pub fn sequence_span(&self, sequence_id: SequenceId) -> Option<(u64, u64)> {
        let mut matching = self
            .steps
            .iter()
            .filter(|step| step.sequence_id == sequence_id);
        let first = matching.next()?;
        let last = matching.last().unwrap_or(first);
        Some((first.start_ms, last.end_ms))
    }
}

impl<'a> IntoIterator for &'a Timeline {
    type Item = &'a TimedStep;
    type IntoIter = std::slice::Iter<'a, TimedStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{Metronome, Sequence, Settings, Touch, TouchMode};

    fn step(id: i64, duration_sec: f64) -> Step {
        Step {
            id: StepId(id),
            duration_sec,
            metronome: Metronome::disabled(),
            touch: Touch {
                mode: TouchMode::None,
                notes: format!("note {id}"),
            },
        }
    }

    fn script(sequences: Vec<(i64, Vec<Step>)>) -> Script {
        Script {
            version: "1.0".to_string(),
            trial_id: "t".to_string(),
            description: String::new(),
            settings: Settings {
                min_bpm: 40,
                max_bpm: 200,
                min_step_duration_sec: 0,
                max_step_duration_sec: 600,
            },
            sequences: sequences
                .into_iter()
                .map(|(id, steps)| Sequence {
                    id: SequenceId(id),
                    label: String::new(),
                    purpose: String::new(),
                    steps,
                })
                .collect(),
        }
    }

    fn sample() -> Script {
        script(vec![
            (1, vec![step(1, 1.5), step(2, 0.3), step(3, 2.0)]),
            (2, vec![step(1, 4.0)]),
            (5, vec![step(7, 1.005), step(9, 10.0)]),
        ])
    }

    #[test]
    fn steps_tile_the_timeline() {
        let timeline = Timeline::build(&sample());

        assert_eq!(timeline.len(), 6);
        assert_eq!(timeline.steps()[0].start_ms, 0);
        for pair in timeline.steps().windows(2) {
            assert_eq!(pair[0].end_ms, pair[1].start_ms);
        }
        assert_eq!(timeline.total_duration_ms(), timeline.steps()[5].end_ms);
    }

    #[test]
    fn durations_truncate_to_whole_milliseconds() {
        assert_eq!(duration_to_ms(1.5), 1500);
        assert_eq!(duration_to_ms(0.3), 300);
        assert_eq!(duration_to_ms(0.0009), 0);
        assert_eq!(duration_to_ms(1.0019), 1001);

        let timeline = Timeline::build(&sample());
        let durations: Vec<u64> = timeline.iter().map(TimedStep::duration_ms).collect();
        assert_eq!(
            durations,
            vec![1500, 300, 2000, 4000, duration_to_ms(1.005), 10_000]
        );
    }

    #[test]
    fn marks_exactly_one_first_step_per_sequence() {
        let timeline = Timeline::build(&sample());

        for id in [1, 2, 5] {
            let firsts: Vec<&TimedStep> = timeline
                .iter()
                .filter(|step| step.sequence_id == SequenceId(id) && step.is_first_in_sequence)
                .collect();
            assert_eq!(firsts.len(), 1);

            let earliest = timeline
                .iter()
                .filter(|step| step.sequence_id == SequenceId(id))
                .map(|step| step.start_ms)
                .min()
                .unwrap();
            assert_eq!(firsts[0].start_ms, earliest);
        }
    }

    #[test]
    fn sequence_spans_match_summed_durations() {
        let script = sample();
        let timeline = Timeline::build(&script);

        for sequence in &script.sequences {
            let summed: u64 = sequence
                .steps
                .iter()
                .map(|step| duration_to_ms(step.duration_sec))
                .sum();
            let (start, end) = timeline.sequence_span(sequence.id).unwrap();
            assert_eq!(end - start, summed);
        }
        assert_eq!(timeline.sequence_span(SequenceId(3)), None);
    }

    #[test]
    fn finds_active_step_with_half_open_bounds() {
        let timeline = Timeline::build(&sample());

        assert_eq!(timeline.active_at(0).unwrap().step.id, StepId(1));
        assert_eq!(timeline.active_at(1499).unwrap().step.id, StepId(1));
        assert_eq!(timeline.active_at(1500).unwrap().step.id, StepId(2));

        let seq_two = timeline.active_at(3800).unwrap();
        assert_eq!(seq_two.sequence_id, SequenceId(2));
        assert!(seq_two.is_first_in_sequence);

        assert!(timeline.active_at(timeline.total_duration_ms()).is_none());
        assert!(timeline.active_at(u64::MAX).is_none());
    }

    #[test]
    fn zero_length_steps_are_never_active() {
        let timeline = Timeline::build(&script(vec![(
            1,
            vec![step(1, 1.0), step(2, 0.0004), step(3, 1.0)],
        )]));

        assert_eq!(timeline.steps()[1].duration_ms(), 0);
        assert_eq!(timeline.active_at(999).unwrap().step.id, StepId(1));
        assert_eq!(timeline.active_at(1000).unwrap().step.id, StepId(3));
    }

    #[test]
    fn oversized_hand_built_steps_pin_at_the_end_of_time() {
        let timeline = Timeline::build(&script(vec![(
            1,
            vec![step(1, 1e16), step(2, 1e16), step(3, 1.0)],
        )]));

        assert_eq!(timeline.steps()[0].end_ms, 10_000_000_000_000_000_000);
        assert_eq!(timeline.steps()[1].end_ms, u64::MAX);
        assert_eq!(timeline.steps()[2].start_ms, u64::MAX);
        assert_eq!(timeline.total_duration_ms(), u64::MAX);
        assert_eq!(timeline.active_at(u64::MAX - 1).unwrap().step.id, StepId(2));
    }

    #[test]
    fn empty_timeline_has_no_active_step() {
        let timeline = Timeline::default();
        assert!(timeline.is_empty());
        assert_eq!(timeline.total_duration_ms(), 0);
        assert!(timeline.active_at(0).is_none());
    }
}
