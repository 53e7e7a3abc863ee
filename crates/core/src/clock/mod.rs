//! Playback position sources.
//!
//! The sync engine only ever asks "where is playback now?". The video engine
//! that answers this in a real player lives outside this crate; the clocks
//! here stand in for it.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, MutexGuard,
    },
    time::Instant,
};

use crate::{PlayerError, Result};

/// Anything that can report the current playback position in milliseconds.
pub trait PositionSource {
    fn current_position_ms(&mut self) -> Result<u64>;
}

impl<S: PositionSource + ?Sized> PositionSource for Box<S> {
    fn current_position_ms(&mut self) -> Result<u64> {
        (**self).current_position_ms()
    }
}

#[derive(Debug)]
struct ClockState {
    /// Position at the moment `anchor` was taken.
    base_ms: f64,
    /// Set while playing.
    anchor: Option<Instant>,
    rate: f64,
}

impl ClockState {
    fn position_ms(&self) -> f64 {
        match self.anchor {
            Some(anchor) => self.base_ms + anchor.elapsed().as_secs_f64() * 1000.0 * self.rate,
            None => self.base_ms,
        }
    }

    fn rebase(&mut self) {
        self.base_ms = self.position_ms();
        if self.anchor.is_some() {
            self.anchor = Some(Instant::now());
        }
    }
}

/// Wall-clock driven playback position with play, pause, seek and rate
/// controls. Clones share the same underlying clock, so one handle can be
/// polled by a session while another is driven by the user.
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    state: Arc<Mutex<ClockState>>,
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackClock {
    /// Creates a paused clock positioned at zero.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ClockState {
                base_ms: 0.0,
                anchor: None,
                rate: 1.0,
            })),
        }
    }

    /// Creates a clock that is already playing from zero.
    pub fn start() -> Self {
        let clock = Self::new();
        if let Ok(mut state) = clock.state.lock() {
            state.anchor = Some(Instant::now());
        }
        clock
    }

    pub fn play(&self) -> Result<()> {
        let mut state = self.lock()?;
        if state.anchor.is_none() {
            state.anchor = Some(Instant::now());
        }
        Ok(())
    }

    pub fn pause(&self) -> Result<()> {
        let mut state = self.lock()?;
        state.base_ms = state.position_ms();
        state.anchor = None;
        Ok(())
    }

    /// Pauses and rewinds to zero.
    pub fn stop(&self) -> Result<()> {
        let mut state = self.lock()?;
        state.base_ms = 0.0;
        state.anchor = None;
        Ok(())
    }

    pub fn seek(&self, position_ms: u64) -> Result<()> {
        let mut state = self.lock()?;
        state.base_ms = position_ms as f64;
        if state.anchor.is_some() {
            state.anchor = Some(Instant::now());
        }
        Ok(())
    }

    /// Changes the playback speed; 1.0 is real time.
    pub fn set_rate(&self, rate: f64) -> Result<()> {
        if !(rate.is_finite() && rate > 0.0) {
            return Err(PlayerError::msg(format!("invalid playback rate {rate}")));
        }
        let mut state = self.lock()?;
        state.rebase();
        state.rate = rate;
        Ok(())
    }

    pub fn is_playing(&self) -> Result<bool> {
        Ok(self.lock()?.anchor.is_some())
    }

    pub fn position_ms(&self) -> Result<u64> {
        Ok(self.lock()?.position_ms().max(0.0) as u64)
    }

    fn lock(&self) -> Result<MutexGuard<'_, ClockState>> {
        self.state
            .lock()
            .map_err(|_| PlayerError::msg("playback clock has been poisoned"))
    }
}

impl PositionSource for PlaybackClock {
    fn current_position_ms(&mut self) -> Result<u64> {
        self.position_ms()
    }
}

/// Position source that only moves when told to. Clones share the position.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    position_ms: Arc<AtomicU64>,
    failing: Arc<AtomicBool>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(position_ms: u64) -> Self {
        let clock = Self::new();
        clock.set(position_ms);
        clock
    }

    pub fn set(&self, position_ms: u64) {
        self.position_ms.store(position_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: u64) {
        self.position_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }

    pub fn get(&self) -> u64 {
        self.position_ms.load(Ordering::SeqCst)
    }

    /// Makes subsequent reads fail until cleared, mimicking a player that is
    /// not prepared yet.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl PositionSource for ManualClock {
    fn current_position_ms(&mut self) -> Result<u64> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PlayerError::msg("position unavailable"));
        }
        Ok(self.get())
    }
}
