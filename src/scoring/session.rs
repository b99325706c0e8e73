use tracing::{debug, info};

use crate::error::Result;
use crate::pitch::Pitch;
use crate::scoring::report::SessionReport;
use crate::scoring::timing::{Clock, TimingTracker};
use crate::scoring::types::{NoteAttempt, NoteEvent, PlayOutcome, SessionCounters, SessionState};

/// Guided practice over an expected sequence of notes.
///
/// Plays must be fed in the order they happened. The cursor only moves on a
/// correct note; a wrong note leaves it in place and suggests the same target
/// again.
#[derive(Debug)]
pub struct PracticeSession<C: Clock> {
    sequence: Vec<NoteEvent>,
    cursor: usize,
    counters: SessionCounters,
    timing: TimingTracker<C>,
    suggested: Option<NoteEvent>,
    attempts: Vec<NoteAttempt>,
    started: bool,
}

impl<C: Clock> PracticeSession<C> {
    pub fn new(sequence: Vec<NoteEvent>, clock: C) -> Self {
        PracticeSession {
            sequence,
            cursor: 0,
            counters: SessionCounters::default(),
            timing: TimingTracker::with_clock(clock),
            suggested: None,
            attempts: Vec::new(),
            started: false,
        }
    }

    /// Reset counters and cursor and arm timing at `tempo_bpm`.
    pub fn start(&mut self, tempo_bpm: f64) -> Result<()> {
        self.timing.set_tempo(tempo_bpm)?;
        self.timing.reset();
        self.timing.initialize(tempo_bpm)?;
        self.cursor = 0;
        self.counters = SessionCounters::default();
        self.suggested = None;
        self.attempts.clear();
        self.started = true;
        info!(
            notes = self.sequence.len(),
            tempo_bpm, "practice session started"
        );
        if self.sequence.is_empty() {
            self.timing.stop();
        }
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        if self.cursor >= self.sequence.len() {
            SessionState::Complete
        } else if self.started || !self.attempts.is_empty() {
            SessionState::AwaitingNote
        } else {
            SessionState::Idle
        }
    }

    pub fn is_complete(&self) -> bool {
        self.state() == SessionState::Complete
    }

    pub fn sequence(&self) -> &[NoteEvent] {
        &self.sequence
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current_note(&self) -> Option<&NoteEvent> {
        self.sequence.get(self.cursor)
    }

    pub fn suggested_note(&self) -> Option<&NoteEvent> {
        self.suggested.as_ref()
    }

    pub fn counters(&self) -> SessionCounters {
        self.counters
    }

    pub fn attempts(&self) -> &[NoteAttempt] {
        &self.attempts
    }

    pub fn timing(&self) -> &TimingTracker<C> {
        &self.timing
    }

    pub fn report(&self) -> SessionReport {
        SessionReport::from_attempts(&self.attempts, self.counters)
    }

    /// Evaluate one played note against the note under the cursor.
    pub fn on_note_played(&mut self, played: Pitch, timestamp_ms: f64) -> PlayOutcome {
        let Some(&expected) = self.sequence.get(self.cursor) else {
            return PlayOutcome::AlreadyComplete {
                counters: self.counters,
            };
        };

        if played.semitone_index() != expected.pitch.semitone_index() {
            self.counters.record_incorrect();
            self.suggested = Some(expected);
            self.attempts.push(NoteAttempt {
                expected,
                played,
                timestamp_ms,
                correct: false,
                timing: None,
            });
            debug!(
                expected = %expected.pitch,
                played = %played,
                position = expected.position,
                "wrong note"
            );
            return PlayOutcome::Retry {
                counters: self.counters,
                suggested: expected,
            };
        }

        self.counters.record_correct();
        self.suggested = None;
        let timing = self
            .timing
            .record_onset(timestamp_ms, expected.rest_before_beats, expected.sounding_beats());
        self.attempts.push(NoteAttempt {
            expected,
            played,
            timestamp_ms,
            correct: true,
            timing: Some(timing),
        });
        self.cursor += 1;

        match self.sequence.get(self.cursor) {
            Some(&next) => PlayOutcome::Advanced {
                counters: self.counters,
                timing,
                next,
            },
            None => {
                self.timing.stop();
                info!(
                    correct = self.counters.correct_notes,
                    incorrect = self.counters.incorrect_notes,
                    accuracy = self.counters.accuracy,
                    "practice session complete"
                );
                PlayOutcome::Complete {
                    counters: self.counters,
                    timing,
                }
            }
        }
    }

    /// Parse a note name such as `"F#4"` and evaluate it. An unparseable name
    /// is rejected before anything is counted.
    pub fn on_note_name_played(&mut self, name: &str, timestamp_ms: f64) -> Result<PlayOutcome> {
        let played: Pitch = name.parse()?;
        Ok(self.on_note_played(played, timestamp_ms))
    }

    pub fn on_midi_note(&mut self, midi: u8, timestamp_ms: f64) -> PlayOutcome {
        self.on_note_played(Pitch::from_midi(midi), timestamp_ms)
    }
}
