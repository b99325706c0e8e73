use std::cell::Cell;
use std::rc::Rc;

use serde::Serialize;

use crate::error::{Result, TutorError};
use crate::scoring::types::{Duration, TimingDirection, TimingResult};

/// A play is on time when it lands within this many seconds of the grid.
pub const ON_TIME_TOLERANCE_SECONDS: f64 = 0.2;

/// Tempo a tracker starts with before anyone sets one.
pub const DEFAULT_TEMPO_BPM: f64 = 80.0;

/// Source of "now", in milliseconds.
pub trait Clock {
    fn now_ms(&self) -> f64;
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new(start_ms: f64) -> Self {
        ManualClock {
            now: Rc::new(Cell::new(start_ms)),
        }
    }

    pub fn set(&self, ms: f64) {
        self.now.set(ms);
    }

    pub fn advance(&self, ms: f64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        self.now.get()
    }
}

/// Browser wall clock (`Date.now()`). Only meaningful under wasm32.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsClock;

impl Clock for JsClock {
    fn now_ms(&self) -> f64 {
        js_sys::Date::now()
    }
}

/// Milliseconds since the last [`SessionClock::restart`], read from `base`.
///
/// Callers that report onsets relative to session start drive the tracker
/// with this clock so the grid is anchored at 0 rather than at the base
/// clock's epoch. Clones share the same origin.
#[derive(Clone, Debug)]
pub struct SessionClock<C: Clock> {
    base: C,
    origin_ms: Rc<Cell<f64>>,
}

impl<C: Clock> SessionClock<C> {
    pub fn new(base: C) -> Self {
        let origin_ms = Rc::new(Cell::new(base.now_ms()));
        SessionClock { base, origin_ms }
    }

    /// Make "now" the new zero.
    pub fn restart(&self) {
        self.origin_ms.set(self.base.now_ms());
    }
}

impl<C: Clock> Clock for SessionClock<C> {
    fn now_ms(&self) -> f64 {
        self.base.now_ms() - self.origin_ms.get()
    }
}

/// Snapshot of the tracker for display.
#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
pub struct TimingState {
    pub tempo_bpm: f64,
    pub expected_time_ms: Option<f64>,
    pub last_actual_time_ms: Option<f64>,
}

/// Scores note onsets against a fixed beat grid.
///
/// The grid is anchored when the tracker is armed and each recorded play
/// moves the expected onset forward by the played note's length, so a late
/// note does not drag the following ones late with it.
#[derive(Debug)]
pub struct TimingTracker<C: Clock> {
    clock: C,
    tempo_bpm: f64,
    expected_time_ms: Option<f64>,
    last_actual_time_ms: Option<f64>,
}

impl<C: Clock> TimingTracker<C> {
    pub fn new(clock: C, tempo_bpm: f64) -> Result<Self> {
        validate_tempo(tempo_bpm)?;
        Ok(TimingTracker {
            clock,
            tempo_bpm,
            expected_time_ms: None,
            last_actual_time_ms: None,
        })
    }

    pub fn with_clock(clock: C) -> Self {
        TimingTracker {
            clock,
            tempo_bpm: DEFAULT_TEMPO_BPM,
            expected_time_ms: None,
            last_actual_time_ms: None,
        }
    }

    /// Set the tempo and, unless already armed, anchor the grid at now.
    pub fn initialize(&mut self, tempo_bpm: f64) -> Result<()> {
        validate_tempo(tempo_bpm)?;
        self.tempo_bpm = tempo_bpm;
        if self.expected_time_ms.is_none() {
            self.expected_time_ms = Some(self.clock.now_ms());
        }
        Ok(())
    }

    /// Change tempo for notes not yet played.
    pub fn set_tempo(&mut self, tempo_bpm: f64) -> Result<()> {
        validate_tempo(tempo_bpm)?;
        self.tempo_bpm = tempo_bpm;
        Ok(())
    }

    pub fn tempo_bpm(&self) -> f64 {
        self.tempo_bpm
    }

    pub fn beat_duration_ms(&self) -> f64 {
        60_000.0 / self.tempo_bpm
    }

    pub fn is_armed(&self) -> bool {
        self.expected_time_ms.is_some()
    }

    pub fn expected_time_ms(&self) -> Option<f64> {
        self.expected_time_ms
    }

    pub fn state(&self) -> TimingState {
        TimingState {
            tempo_bpm: self.tempo_bpm,
            expected_time_ms: self.expected_time_ms,
            last_actual_time_ms: self.last_actual_time_ms,
        }
    }

    /// Score a play of a note lasting `duration`, then move the grid on.
    ///
    /// A play while idle anchors the grid at `actual_ms`.
    pub fn record_play(&mut self, actual_ms: f64, duration: Duration) -> TimingResult {
        self.record_onset(actual_ms, 0.0, duration.beats())
    }

    /// Score a note written `rest_beats` after the end of the previous one and
    /// sounding for `beats`, then move the grid past it.
    pub fn record_onset(&mut self, actual_ms: f64, rest_beats: f64, beats: f64) -> TimingResult {
        let beat_ms = self.beat_duration_ms();
        let expected = match self.expected_time_ms {
            Some(grid) => grid + beat_ms * rest_beats,
            None => actual_ms,
        };
        let deviation_ms = actual_ms - expected;
        let deviation_seconds = (deviation_ms / 1000.0 * 100.0).round() / 100.0;
        let on_time = deviation_seconds.abs() <= ON_TIME_TOLERANCE_SECONDS;
        let direction = if on_time {
            TimingDirection::OnBeat
        } else if deviation_ms < 0.0 {
            TimingDirection::Early
        } else {
            TimingDirection::Late
        };

        self.last_actual_time_ms = Some(actual_ms);
        self.expected_time_ms = Some(expected + beat_ms * beats);

        TimingResult {
            deviation_ms,
            deviation_seconds,
            on_time,
            direction,
        }
    }

    /// Disarm; the next `initialize` anchors a fresh grid.
    pub fn stop(&mut self) {
        self.expected_time_ms = None;
    }

    /// Disarm and forget the last play.
    pub fn reset(&mut self) {
        self.expected_time_ms = None;
        self.last_actual_time_ms = None;
    }
}

/// Tempo must be a finite, positive number of beats per minute.
pub fn validate_tempo(tempo_bpm: f64) -> Result<()> {
    if tempo_bpm.is_finite() && tempo_bpm > 0.0 {
        Ok(())
    } else {
        Err(TutorError::InvalidTempo(tempo_bpm))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::types::NoteValue;

    fn tracker_at(start_ms: f64, tempo: f64) -> (ManualClock, TimingTracker<ManualClock>) {
        let clock = ManualClock::new(start_ms);
        let tracker = TimingTracker::new(clock.clone(), tempo).unwrap();
        (clock, tracker)
    }

    #[test]
    fn test_early_play_on_fixed_grid() {
        let (_clock, mut tracker) = tracker_at(0.0, 60.0);
        tracker.initialize(60.0).unwrap();
        assert_eq!(tracker.beat_duration_ms(), 1000.0);

        let result = tracker.record_play(950.0, Duration::QUARTER);
        assert_eq!(result.deviation_ms, -50.0);
        assert_eq!(result.deviation_seconds, -0.05);
        assert!(result.on_time);
        assert_eq!(result.direction, TimingDirection::OnBeat);
        assert_eq!(tracker.expected_time_ms(), Some(1000.0));
    }

    #[test]
    fn test_grid_ignores_actual_time() {
        let (_clock, mut tracker) = tracker_at(0.0, 120.0);
        tracker.initialize(120.0).unwrap();

        let late = tracker.record_play(400.0, Duration::QUARTER);
        assert_eq!(late.deviation_ms, 400.0);
        assert!(!late.on_time);
        assert_eq!(late.direction, TimingDirection::Late);
        assert_eq!(tracker.expected_time_ms(), Some(500.0));

        let early = tracker.record_play(200.0, Duration::QUARTER);
        assert_eq!(early.deviation_ms, -300.0);
        assert_eq!(early.direction, TimingDirection::Early);
    }

    #[test]
    fn test_tolerance_boundary() {
        let (_clock, mut tracker) = tracker_at(0.0, 60.0);
        tracker.initialize(60.0).unwrap();
        assert!(tracker.record_play(204.0, Duration::QUARTER).on_time);
        assert!(!tracker.record_play(1206.0, Duration::QUARTER).on_time);
    }

    #[test]
    fn test_dotted_and_long_notes_advance_by_beats() {
        let (_clock, mut tracker) = tracker_at(0.0, 60.0);
        tracker.initialize(60.0).unwrap();
        tracker.record_play(0.0, Duration::new(NoteValue::Quarter, true));
        assert_eq!(tracker.expected_time_ms(), Some(1500.0));
        tracker.record_play(1500.0, Duration::new(NoteValue::Half, false));
        assert_eq!(tracker.expected_time_ms(), Some(3500.0));
    }

    #[test]
    fn test_initialize_is_idempotent_while_armed() {
        let (clock, mut tracker) = tracker_at(100.0, 60.0);
        tracker.initialize(60.0).unwrap();
        clock.advance(5000.0);
        tracker.initialize(120.0).unwrap();
        assert_eq!(tracker.expected_time_ms(), Some(100.0));
        assert_eq!(tracker.tempo_bpm(), 120.0);

        tracker.stop();
        tracker.initialize(120.0).unwrap();
        assert_eq!(tracker.expected_time_ms(), Some(5100.0));
    }

    #[test]
    fn test_tempo_change_applies_forward_only() {
        let (_clock, mut tracker) = tracker_at(0.0, 60.0);
        tracker.initialize(60.0).unwrap();
        tracker.record_play(0.0, Duration::QUARTER);
        assert_eq!(tracker.expected_time_ms(), Some(1000.0));

        tracker.set_tempo(120.0).unwrap();
        tracker.record_play(1000.0, Duration::QUARTER);
        assert_eq!(tracker.expected_time_ms(), Some(1500.0));
    }

    #[test]
    fn test_record_while_idle_anchors_grid() {
        let (_clock, mut tracker) = tracker_at(0.0, 60.0);
        let result = tracker.record_play(3000.0, Duration::QUARTER);
        assert_eq!(result.deviation_ms, 0.0);
        assert_eq!(tracker.expected_time_ms(), Some(4000.0));
        assert_eq!(tracker.state().last_actual_time_ms, Some(3000.0));
    }

    #[test]
    fn test_rest_moves_expected_onset() {
        let (_clock, mut tracker) = tracker_at(0.0, 60.0);
        tracker.initialize(60.0).unwrap();
        tracker.record_play(0.0, Duration::QUARTER);

        // Quarter rest, then a half note written at beat 2.
        let result = tracker.record_onset(2000.0, 1.0, 2.0);
        assert_eq!(result.deviation_ms, 0.0);
        assert!(result.on_time);
        assert_eq!(tracker.expected_time_ms(), Some(4000.0));
    }

    #[test]
    fn test_session_clock_counts_from_restart() {
        let epoch = ManualClock::new(1_700_000_000_000.0);
        let clock = SessionClock::new(epoch.clone());
        epoch.advance(250.0);
        assert_eq!(clock.now_ms(), 250.0);

        clock.restart();
        assert_eq!(clock.now_ms(), 0.0);

        let mut tracker = TimingTracker::new(clock.clone(), 60.0).unwrap();
        tracker.initialize(60.0).unwrap();
        assert_eq!(tracker.expected_time_ms(), Some(0.0));
        epoch.advance(1000.0);
        let result = tracker.record_play(clock.now_ms(), Duration::QUARTER);
        assert_eq!(result.deviation_ms, 1000.0);
    }

    #[test]
    fn test_invalid_tempo() {
        let clock = ManualClock::new(0.0);
        assert_eq!(
            TimingTracker::new(clock.clone(), 0.0).unwrap_err(),
            TutorError::InvalidTempo(0.0)
        );
        let mut tracker = TimingTracker::new(clock, 90.0).unwrap();
        assert!(tracker.initialize(-10.0).is_err());
        assert!(tracker.set_tempo(f64::NAN).is_err());
        assert_eq!(tracker.tempo_bpm(), 90.0);
        assert!(!tracker.is_armed());
    }
}
