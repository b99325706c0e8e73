use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TutorError};
use crate::key_signature::{detect_key_signature, KeySignature};
use crate::pitch::Pitch;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NoteValue {
    Whole,
    Half,
    Quarter,
    Eighth,
    Sixteenth,
}

impl NoteValue {
    /// Length in quarter-note beats.
    pub fn beats(self) -> f64 {
        match self {
            NoteValue::Whole => 4.0,
            NoteValue::Half => 2.0,
            NoteValue::Quarter => 1.0,
            NoteValue::Eighth => 0.5,
            NoteValue::Sixteenth => 0.25,
        }
    }

    /// Closest note value for a length in beats, used when a score gives a
    /// duration but no note type.
    pub fn from_beats(beats: f64) -> NoteValue {
        [
            NoteValue::Whole,
            NoteValue::Half,
            NoteValue::Quarter,
            NoteValue::Eighth,
            NoteValue::Sixteenth,
        ]
        .into_iter()
        .find(|v| beats >= v.beats())
        .unwrap_or(NoteValue::Sixteenth)
    }

    fn from_token(token: &str) -> Option<NoteValue> {
        match token {
            "whole" | "w" => Some(NoteValue::Whole),
            "half" | "h" => Some(NoteValue::Half),
            "quarter" | "q" => Some(NoteValue::Quarter),
            "eighth" | "8" => Some(NoteValue::Eighth),
            "sixteenth" | "16th" | "16" => Some(NoteValue::Sixteenth),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Duration {
    pub value: NoteValue,
    #[serde(default)]
    pub dotted: bool,
}

impl Duration {
    pub const QUARTER: Duration = Duration {
        value: NoteValue::Quarter,
        dotted: false,
    };

    pub fn new(value: NoteValue, dotted: bool) -> Self {
        Duration { value, dotted }
    }

    pub fn beats(&self) -> f64 {
        if self.dotted {
            self.value.beats() * 1.5
        } else {
            self.value.beats()
        }
    }
}

impl Default for Duration {
    fn default() -> Self {
        Duration::QUARTER
    }
}

impl FromStr for Duration {
    type Err = TutorError;

    /// Accepts `quarter`, `q`, `8`, `16th`, ... with an optional trailing `d`
    /// for dotted (`qd`, `8d`).
    fn from_str(s: &str) -> Result<Self> {
        let token = s.trim().to_ascii_lowercase();
        if let Some(value) = NoteValue::from_token(&token) {
            return Ok(Duration::new(value, false));
        }
        token
            .strip_suffix('d')
            .and_then(NoteValue::from_token)
            .map(|value| Duration::new(value, true))
            .ok_or_else(|| TutorError::InvalidDuration(s.to_string()))
    }
}

/// One note to be played: pitch, duration and position in its sequence.
///
/// `rest_before_beats` is silence written between the previous note's end and
/// this onset. `tied_beats` is time the note is held past `duration` through
/// ties. Both keep the beat grid aligned with the written rhythm.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct NoteEvent {
    pub pitch: Pitch,
    #[serde(default)]
    pub duration: Duration,
    #[serde(default)]
    pub position: usize,
    #[serde(default)]
    pub rest_before_beats: f64,
    #[serde(default)]
    pub tied_beats: f64,
}

impl NoteEvent {
    pub fn new(pitch: Pitch, duration: Duration, position: usize) -> Self {
        NoteEvent {
            pitch,
            duration,
            position,
            rest_before_beats: 0.0,
            tied_beats: 0.0,
        }
    }

    pub fn quarter(pitch: Pitch, position: usize) -> Self {
        NoteEvent::new(pitch, Duration::QUARTER, position)
    }

    pub fn midi(&self) -> i32 {
        self.pitch.semitone_index()
    }

    /// Beats from this onset to the end of the note, ties included.
    pub fn sounding_beats(&self) -> f64 {
        self.duration.beats() + self.tied_beats
    }
}

#[derive(Serialize)]
struct NoteEventRepr<'a> {
    pitch: &'a Pitch,
    name: String,
    midi: i32,
    duration: &'a Duration,
    position: usize,
    rest_before_beats: f64,
    tied_beats: f64,
}

// The UI wants the display name and MIDI number alongside the spelled pitch.
impl Serialize for NoteEvent {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        NoteEventRepr {
            pitch: &self.pitch,
            name: self.pitch.name(),
            midi: self.midi(),
            duration: &self.duration,
            position: self.position,
            rest_before_beats: self.rest_before_beats,
            tied_beats: self.tied_beats,
        }
        .serialize(serializer)
    }
}

/// Renumber positions after reordering or filtering a sequence.
pub fn renumber(notes: &mut [NoteEvent]) {
    for (i, note) in notes.iter_mut().enumerate() {
        note.position = i;
    }
}

/// A piece loaded for guided practice. `notes` holds only what the learner
/// plays: no rests, one note per chord.
#[derive(Serialize, Clone, Debug)]
pub struct Song {
    pub title: Option<String>,
    pub tempo_bpm: f64,
    pub key_fifths: i32,
    pub beats_per_measure: u8,
    pub beat_type: u8,
    pub notes: Vec<NoteEvent>,
}

impl Song {
    /// The written key when it is one we model, otherwise the key implied by
    /// the accidentals actually played.
    pub fn key_signature(&self) -> KeySignature {
        KeySignature::from_sharps(self.key_fifths).unwrap_or_else(|| {
            let pitches: Vec<Pitch> = self.notes.iter().map(|n| n.pitch).collect();
            detect_key_signature(&pitches)
        })
    }

    /// Written length from the first onset to the end of the last note.
    pub fn total_beats(&self) -> f64 {
        let mut notes = self.notes.iter();
        let first = notes.next().map_or(0.0, |n| n.sounding_beats());
        first + notes.map(|n| n.rest_before_beats + n.sounding_beats()).sum::<f64>()
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct SessionCounters {
    pub correct_notes: u32,
    pub incorrect_notes: u32,
    pub notes_played: u32,
    pub accuracy: f64,
}

impl SessionCounters {
    pub fn record_correct(&mut self) {
        self.correct_notes += 1;
        self.update();
    }

    pub fn record_incorrect(&mut self) {
        self.incorrect_notes += 1;
        self.update();
    }

    fn update(&mut self) {
        self.notes_played = self.correct_notes + self.incorrect_notes;
        self.accuracy = if self.notes_played == 0 {
            0.0
        } else {
            self.correct_notes as f64 / self.notes_played as f64
        };
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimingDirection {
    Early,
    OnBeat,
    Late,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct TimingResult {
    /// Actual minus expected onset; positive is late.
    pub deviation_ms: f64,
    /// `deviation_ms` in seconds, rounded to two decimals.
    pub deviation_seconds: f64,
    pub on_time: bool,
    pub direction: TimingDirection,
}

/// A single evaluated play.
#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
pub struct NoteAttempt {
    pub expected: NoteEvent,
    pub played: Pitch,
    pub timestamp_ms: f64,
    pub correct: bool,
    /// Only correct plays are scored for timing.
    pub timing: Option<TimingResult>,
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    AwaitingNote,
    Complete,
}

/// What a play did to the session.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlayOutcome {
    /// Correct note; the cursor moved on to `next`.
    Advanced {
        counters: SessionCounters,
        timing: TimingResult,
        next: NoteEvent,
    },
    /// Wrong note; `suggested` is the unchanged target.
    Retry {
        counters: SessionCounters,
        suggested: NoteEvent,
    },
    /// Correct final note; `counters` are the final counts.
    Complete {
        counters: SessionCounters,
        timing: TimingResult,
    },
    /// The session had already finished; nothing changed.
    AlreadyComplete { counters: SessionCounters },
}

impl PlayOutcome {
    pub fn is_correct(&self) -> bool {
        matches!(self, PlayOutcome::Advanced { .. } | PlayOutcome::Complete { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_beats() {
        assert_eq!(Duration::new(NoteValue::Whole, false).beats(), 4.0);
        assert_eq!(Duration::new(NoteValue::Half, true).beats(), 3.0);
        assert_eq!(Duration::new(NoteValue::Quarter, true).beats(), 1.5);
        assert_eq!(Duration::new(NoteValue::Sixteenth, false).beats(), 0.25);
    }

    #[test]
    fn test_parse_duration_tokens() {
        assert_eq!("quarter".parse::<Duration>().unwrap(), Duration::QUARTER);
        assert_eq!(
            "qd".parse::<Duration>().unwrap(),
            Duration::new(NoteValue::Quarter, true)
        );
        assert_eq!(
            "16th".parse::<Duration>().unwrap(),
            Duration::new(NoteValue::Sixteenth, false)
        );
        assert_eq!(
            "8d".parse::<Duration>().unwrap(),
            Duration::new(NoteValue::Eighth, true)
        );
        assert_eq!(
            "Half".parse::<Duration>().unwrap(),
            Duration::new(NoteValue::Half, false)
        );
        assert!("triplet".parse::<Duration>().is_err());
        assert!("d".parse::<Duration>().is_err());
    }

    #[test]
    fn test_note_value_from_beats() {
        assert_eq!(NoteValue::from_beats(4.0), NoteValue::Whole);
        assert_eq!(NoteValue::from_beats(3.0), NoteValue::Half);
        assert_eq!(NoteValue::from_beats(1.0), NoteValue::Quarter);
        assert_eq!(NoteValue::from_beats(0.5), NoteValue::Eighth);
        assert_eq!(NoteValue::from_beats(0.1), NoteValue::Sixteenth);
    }

    #[test]
    fn test_counters_accuracy() {
        let mut counters = SessionCounters::default();
        assert_eq!(counters.accuracy, 0.0);

        counters.record_correct();
        counters.record_incorrect();
        counters.record_correct();
        counters.record_correct();
        assert_eq!(counters.correct_notes, 3);
        assert_eq!(counters.incorrect_notes, 1);
        assert_eq!(counters.notes_played, 4);
        assert_eq!(counters.accuracy, 0.75);
    }
}
