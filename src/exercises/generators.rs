use std::str::FromStr;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, TutorError};
use crate::exercises::levels::level_pool;
use crate::pitch::{is_valid_octave, PitchClass};
use crate::scoring::types::{renumber, NoteEvent};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScaleType {
    Major,
    NaturalMinor,
    PentatonicMajor,
    PentatonicMinor,
    Chromatic,
    Blues,
}

impl ScaleType {
    pub fn intervals(self) -> &'static [i32] {
        match self {
            ScaleType::Major => &[0, 2, 4, 5, 7, 9, 11, 12],
            ScaleType::NaturalMinor => &[0, 2, 3, 5, 7, 8, 10, 12],
            ScaleType::PentatonicMajor => &[0, 2, 4, 7, 9, 12],
            ScaleType::PentatonicMinor => &[0, 3, 5, 7, 10, 12],
            ScaleType::Chromatic => &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12],
            ScaleType::Blues => &[0, 3, 5, 6, 7, 10, 12],
        }
    }
}

impl FromStr for ScaleType {
    type Err = TutorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "major" => Ok(ScaleType::Major),
            "minor" | "natural_minor" => Ok(ScaleType::NaturalMinor),
            "pentatonic" | "pentatonic_major" | "major_pentatonic" => Ok(ScaleType::PentatonicMajor),
            "pentatonic_minor" | "minor_pentatonic" => Ok(ScaleType::PentatonicMinor),
            "chromatic" => Ok(ScaleType::Chromatic),
            "blues" => Ok(ScaleType::Blues),
            _ => Err(TutorError::UnknownExerciseType {
                kind: "scale",
                name: s.to_string(),
            }),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChordType {
    Major,
    Minor,
    Diminished,
    Augmented,
    Major7,
    Minor7,
    Dominant7,
}

impl ChordType {
    pub fn intervals(self) -> &'static [i32] {
        match self {
            ChordType::Major => &[0, 4, 7],
            ChordType::Minor => &[0, 3, 7],
            ChordType::Diminished => &[0, 3, 6],
            ChordType::Augmented => &[0, 4, 8],
            ChordType::Major7 => &[0, 4, 7, 11],
            ChordType::Minor7 => &[0, 3, 7, 10],
            ChordType::Dominant7 => &[0, 4, 7, 10],
        }
    }
}

impl FromStr for ChordType {
    type Err = TutorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "major" | "maj" => Ok(ChordType::Major),
            "minor" | "min" => Ok(ChordType::Minor),
            "diminished" | "dim" => Ok(ChordType::Diminished),
            "augmented" | "aug" => Ok(ChordType::Augmented),
            "major7" | "major_7" | "maj7" => Ok(ChordType::Major7),
            "minor7" | "minor_7" | "min7" => Ok(ChordType::Minor7),
            "dominant7" | "dominant_7" | "dom7" | "7" => Ok(ChordType::Dominant7),
            _ => Err(TutorError::UnknownExerciseType {
                kind: "chord",
                name: s.to_string(),
            }),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IntervalType {
    Unison,
    MinorSecond,
    MajorSecond,
    MinorThird,
    MajorThird,
    PerfectFourth,
    Tritone,
    PerfectFifth,
    MinorSixth,
    MajorSixth,
    MinorSeventh,
    MajorSeventh,
    Octave,
}

impl IntervalType {
    pub const ALL: [IntervalType; 13] = [
        IntervalType::Unison,
        IntervalType::MinorSecond,
        IntervalType::MajorSecond,
        IntervalType::MinorThird,
        IntervalType::MajorThird,
        IntervalType::PerfectFourth,
        IntervalType::Tritone,
        IntervalType::PerfectFifth,
        IntervalType::MinorSixth,
        IntervalType::MajorSixth,
        IntervalType::MinorSeventh,
        IntervalType::MajorSeventh,
        IntervalType::Octave,
    ];

    pub fn semitones(self) -> i32 {
        self as i32
    }
}

impl FromStr for IntervalType {
    type Err = TutorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "unison" | "perfect_unison" => Ok(IntervalType::Unison),
            "minor_second" => Ok(IntervalType::MinorSecond),
            "major_second" => Ok(IntervalType::MajorSecond),
            "minor_third" => Ok(IntervalType::MinorThird),
            "major_third" => Ok(IntervalType::MajorThird),
            "perfect_fourth" | "fourth" | "p4" => Ok(IntervalType::PerfectFourth),
            "tritone" | "augmented_fourth" | "diminished_fifth" => Ok(IntervalType::Tritone),
            "perfect_fifth" | "fifth" | "p5" => Ok(IntervalType::PerfectFifth),
            "minor_sixth" => Ok(IntervalType::MinorSixth),
            "major_sixth" => Ok(IntervalType::MajorSixth),
            "minor_seventh" => Ok(IntervalType::MinorSeventh),
            "major_seventh" => Ok(IntervalType::MajorSeventh),
            "octave" | "perfect_octave" | "p8" => Ok(IntervalType::Octave),
            _ => Err(TutorError::UnknownExerciseType {
                kind: "interval",
                name: s.to_string(),
            }),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct ScaleOptions {
    pub ascending: bool,
    /// Keep only the first `note_count` steps of the pattern.
    pub note_count: Option<usize>,
}

impl Default for ScaleOptions {
    fn default() -> Self {
        ScaleOptions {
            ascending: true,
            note_count: None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct ChordOptions {
    pub ascending: bool,
}

impl Default for ChordOptions {
    fn default() -> Self {
        ChordOptions { ascending: true }
    }
}

fn parse_root(root: &str) -> Result<PitchClass> {
    root.parse()
        .map_err(|_| TutorError::InvalidRootNote(root.to_string()))
}

/// Highest semitone index a generated note may reach (G9).
const MAX_SEMITONE_INDEX: i32 = 127;

/// Walk `offsets` upward from the root. Offsets on the root's pitch class keep
/// the caller's spelling; everything else is spelled with sharps.
///
/// Every note must land on a MIDI number, so a root whose exercise would run
/// below C-1 or above G9 is rejected.
fn build_notes(root: PitchClass, octave: i32, offsets: &[i32], ascending: bool) -> Result<Vec<NoteEvent>> {
    let out_of_range = || TutorError::InvalidRootNote(format!("{root}{octave}"));
    if !is_valid_octave(octave) {
        return Err(out_of_range());
    }
    let root_pitch = root.at_octave(octave);
    let lowest = root_pitch.semitone_index();
    let highest = lowest + offsets.iter().copied().max().unwrap_or(0);
    if lowest < 0 || highest > MAX_SEMITONE_INDEX {
        return Err(out_of_range());
    }

    let mut notes: Vec<NoteEvent> = offsets
        .iter()
        .enumerate()
        .map(|(i, &offset)| {
            let pitch = if offset % 12 == 0 {
                root.at_octave(octave + offset / 12)
            } else {
                root_pitch.transposed(offset)
            };
            NoteEvent::quarter(pitch, i)
        })
        .collect();

    if !ascending {
        notes.reverse();
        renumber(&mut notes);
    }
    Ok(notes)
}

pub fn generate_scale(
    root: &str,
    octave: i32,
    scale_type: ScaleType,
    options: ScaleOptions,
) -> Result<Vec<NoteEvent>> {
    let root = parse_root(root)?;
    let intervals = scale_type.intervals();
    let intervals = match options.note_count {
        Some(n) => &intervals[..n.min(intervals.len())],
        None => intervals,
    };
    debug!(%root, octave, ?scale_type, notes = intervals.len(), "generating scale");
    build_notes(root, octave, intervals, options.ascending)
}

pub fn generate_chord(
    root: &str,
    octave: i32,
    chord_type: ChordType,
    options: ChordOptions,
) -> Result<Vec<NoteEvent>> {
    let root = parse_root(root)?;
    debug!(%root, octave, ?chord_type, "generating chord");
    build_notes(root, octave, chord_type.intervals(), options.ascending)
}

pub fn generate_interval(root: &str, octave: i32, interval_type: IntervalType) -> Result<[NoteEvent; 2]> {
    let root = parse_root(root)?;
    let notes = build_notes(root, octave, &[0, interval_type.semitones()], true)?;
    Ok([notes[0], notes[1]])
}

/// Draw `count` notes with replacement from the pool for `level`.
pub fn generate_random_notes_for_level<R: Rng + ?Sized>(
    level: u8,
    count: usize,
    octave: i32,
    rng: &mut R,
) -> Result<Vec<NoteEvent>> {
    let pool = level_pool(level)?;
    if let Some(pc) = pool.iter().find(|pc| {
        !is_valid_octave(octave) || !(0..=MAX_SEMITONE_INDEX).contains(&pc.at_octave(octave).semitone_index())
    }) {
        return Err(TutorError::InvalidPitchName(format!("{pc}{octave}")));
    }
    let notes = (0..count)
        .filter_map(|i| {
            pool.choose(rng)
                .map(|pc| NoteEvent::quarter(pc.at_octave(octave), i))
        })
        .collect();
    Ok(notes)
}

/// [`generate_random_notes_for_level`] with the thread-local RNG.
pub fn generate_random_notes(level: u8, count: usize, octave: i32) -> Result<Vec<NoteEvent>> {
    generate_random_notes_for_level(level, count, octave, &mut rand::thread_rng())
}
