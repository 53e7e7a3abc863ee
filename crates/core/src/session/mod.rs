//! Drives a [`SyncEngine`] from a background thread.
//!
//! The engine, the position source and both sinks sit behind one mutex and a
//! poll runs entirely while holding it, so polls never overlap. Between polls
//! the worker waits on a condition variable, which lets [`PlaybackSession::stop`]
//! wake it up early. `stop` joins the worker before returning: once it
//! returns, no further poll can run.

use std::{
    sync::{Arc, Condvar, Mutex, MutexGuard},
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::{
    clock::PositionSource,
    config::SyncConfig,
    cue::{self, CueSink, OverlaySink},
    sync::{SyncEngine, SyncState},
    timeline::Timeline,
    PlayerError, Result,
};

struct Inner {
    engine: SyncEngine,
    source: Box<dyn PositionSource + Send>,
    overlay: Box<dyn OverlaySink + Send>,
    cues: Box<dyn CueSink + Send>,
}

impl Inner {
    fn poll_once(&mut self) {
        let events = self.engine.poll_source(&mut self.source);
        cue::dispatch(&events, &mut self.overlay, &mut self.cues);
    }

    /// Stops the engine and hands its overlay clear to the sinks. Returns
    /// whether the engine was running.
    fn stop_engine(&mut self) -> bool {
        let was_running = self.engine.is_running();
        let events = self.engine.stop();
        cue::dispatch(&events, &mut self.overlay, &mut self.cues);
        was_running
    }
}

struct Shared {
    inner: Mutex<Inner>,
    wake: Condvar,
}

/// A running (or stopped) playback session for one timeline.
pub struct PlaybackSession {
    shared: Arc<Shared>,
    interval: Duration,
    worker: Option<JoinHandle<()>>,
}

impl PlaybackSession {
    pub fn new<S, O, C>(
        timeline: Timeline,
        source: S,
        overlay: O,
        cues: C,
        config: &SyncConfig,
    ) -> Self
    where
        S: PositionSource + Send + 'static,
        O: OverlaySink + Send + 'static,
        C: CueSink + Send + 'static,
    {
        let inner = Inner {
            engine: SyncEngine::new(timeline),
            source: Box::new(source),
            overlay: Box::new(overlay),
            cues: Box::new(cues),
        };

        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(inner),
                wake: Condvar::new(),
            }),
            interval: config.poll_interval(),
            worker: None,
        }
    }

    /// Starts polling. The first poll happens right away. Does nothing if the
    /// session is already running.
    pub fn start(&mut self) -> Result<()> {
        {
            let mut inner = lock(&self.shared)?;
            if !inner.engine.start() {
                return Ok(());
            }
            tracing::info!(
                steps = inner.engine.timeline().len(),
                total_ms = inner.engine.timeline().total_duration_ms(),
                interval_ms = self.interval.as_millis() as u64,
                "playback session started"
            );
        }

        // A worker left over from an earlier run has already seen the stop.
        if let Some(previous) = self.worker.take() {
            join_worker(previous);
        }

        let shared = Arc::clone(&self.shared);
        let interval = self.interval;
        let spawned = thread::Builder::new()
            .name("sync-poll".to_string())
            .spawn(move || run_worker(&shared, interval));

        match spawned {
            Ok(worker) => {
                self.worker = Some(worker);
                Ok(())
            }
            Err(err) => {
                if let Ok(mut inner) = lock(&self.shared) {
                    inner.stop_engine();
                }
                Err(err.into())
            }
        }
    }

    /// Stops polling and clears the overlay. Safe to call repeatedly.
    pub fn stop(&mut self) {
        match lock(&self.shared) {
            Ok(mut inner) => {
                if inner.stop_engine() {
                    tracing::info!("playback session stopped");
                }
            }
            Err(err) => tracing::error!(error = %err, "could not stop sync engine cleanly"),
        }

        self.shared.wake.notify_all();
        if let Some(worker) = self.worker.take() {
            join_worker(worker);
        }
    }

    pub fn is_running(&self) -> Result<bool> {
        Ok(lock(&self.shared)?.engine.is_running())
    }

    /// Snapshot of the engine state.
    pub fn state(&self) -> Result<SyncState> {
        Ok(lock(&self.shared)?.engine.state())
    }

    pub fn total_duration_ms(&self) -> Result<u64> {
        Ok(lock(&self.shared)?.engine.timeline().total_duration_ms())
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.stop();
        }
    }
}

impl std::fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("interval", &self.interval)
            .field("worker", &self.worker.is_some())
            .finish()
    }
}

fn run_worker(shared: &Shared, interval: Duration) {
    let mut inner = match lock(shared) {
        Ok(inner) => inner,
        Err(err) => {
            tracing::error!(error = %err, "sync worker could not start");
            return;
        }
    };

    while inner.engine.is_running() {
        inner.poll_once();

        inner = match shared
            .wake
            .wait_timeout_while(inner, interval, |inner| inner.engine.is_running())
        {
            Ok((guard, _)) => guard,
            Err(_) => {
                tracing::error!("sync state poisoned, stopping worker");
                return;
            }
        };
    }
}

fn join_worker(worker: JoinHandle<()>) {
    if worker.join().is_err() {
        tracing::error!("sync worker panicked");
    }
}

fn lock(shared: &Shared) -> Result<MutexGuard<'_, Inner>> {
    shared
        .inner
        .lock()
        .map_err(|_| PlayerError::msg("sync session has been poisoned"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::cue::CueKind;
    use crate::record::{EventRecorder, RecordedOutput};
    use crate::script::{
        Metronome, Script, Sequence, SequenceId, Settings, Step, StepId, Touch, TouchMode,
    };

    fn timeline() -> Timeline {
        let step = |id: i64, notes: &str| Step {
            id: StepId(id),
            duration_sec: 1.0,
            metronome: Metronome::at(60),
            touch: Touch {
                mode: TouchMode::Tease,
                notes: notes.to_string(),
            },
        };
        Timeline::build(&Script {
            version: "1.0".to_string(),
            trial_id: "session".to_string(),
            description: String::new(),
            settings: Settings {
                min_bpm: 40,
                max_bpm: 200,
                min_step_duration_sec: 1,
                max_step_duration_sec: 10,
            },
            sequences: vec![Sequence {
                id: SequenceId(1),
                label: String::new(),
                purpose: String::new(),
                steps: vec![step(1, "first"), step(2, "second")],
            }],
        })
    }

    fn session(clock: &ManualClock, recorder: &EventRecorder) -> PlaybackSession {
        let config = SyncConfig {
            poll_interval_ms: 2,
        };
        PlaybackSession::new(
            timeline(),
            clock.clone(),
            recorder.clone(),
            recorder.clone(),
            &config,
        )
    }

    fn wait_for(mut condition: impl FnMut() -> bool) {
        for _ in 0..500 {
            if condition() {
                return;
            }
            thread::sleep(Duration::from_millis(2));
        }
        panic!("condition not reached in time");
    }

    #[test]
    fn follows_the_clock_and_clears_on_stop() {
        let clock = ManualClock::at(10);
        let recorder = EventRecorder::new();
        let mut session = session(&clock, &recorder);

        session.start().unwrap();
        assert!(session.is_running().unwrap());
        wait_for(|| recorder.overlay_text().as_deref() == Some("first"));

        clock.set(1_200);
        wait_for(|| recorder.overlay_text().as_deref() == Some("second"));
        assert!(recorder.cue_count(CueKind::Metronome) >= 2);
        assert_eq!(recorder.cue_count(CueKind::SequenceStart), 1);

        session.stop();
        assert!(!session.is_running().unwrap());
        assert_eq!(recorder.entries().last(), Some(&RecordedOutput::Overlay(String::new())));

        // Nothing is polled after stop returned.
        let after_stop = recorder.len();
        clock.set(10);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(recorder.len(), after_stop);
    }

    #[test]
    fn stop_without_active_step_still_clears() {
        let clock = ManualClock::at(50_000);
        let recorder = EventRecorder::new();
        let mut session = session(&clock, &recorder);

        session.start().unwrap();
        thread::sleep(Duration::from_millis(10));
        session.stop();

        assert_eq!(recorder.entries(), vec![RecordedOutput::Overlay(String::new())]);
    }

    #[test]
    fn start_twice_is_a_no_op_and_restart_works() {
        let clock = ManualClock::at(10);
        let recorder = EventRecorder::new();
        let mut session = session(&clock, &recorder);

        session.start().unwrap();
        session.start().unwrap();
        wait_for(|| recorder.cue_count(CueKind::Step) == 1);
        thread::sleep(Duration::from_millis(10));
        assert_eq!(recorder.cue_count(CueKind::Step), 1);

        session.stop();
        session.start().unwrap();
        wait_for(|| recorder.cue_count(CueKind::Step) == 2);
        session.stop();
        session.stop();
        assert_eq!(recorder.overlay_text().as_deref(), Some(""));
    }

    #[test]
    fn dropping_a_running_session_stops_it() {
        let clock = ManualClock::at(10);
        let recorder = EventRecorder::new();
        {
            let mut session = session(&clock, &recorder);
            session.start().unwrap();
            wait_for(|| recorder.overlay_text().as_deref() == Some("first"));
        }
        assert_eq!(recorder.overlay_text().as_deref(), Some(""));
    }

    struct Broken;

    impl PositionSource for Broken {
        fn current_position_ms(&mut self) -> Result<u64> {
            panic!("position source exploded");
        }
    }

    #[test]
    fn panicking_worker_is_reaped_by_stop() {
        let recorder = EventRecorder::new();
        let mut session = PlaybackSession::new(
            timeline(),
            Broken,
            recorder.clone(),
            recorder.clone(),
            &SyncConfig {
                poll_interval_ms: 2,
            },
        );

        session.start().unwrap();
        wait_for(|| session.is_running().is_err());

        session.stop();
        assert!(session.worker.is_none());
        assert!(session.start().is_err());
        assert!(recorder.is_empty());
    }
}
