//! Key-signature detection over the sharp keys C through F#.
//!
//! Flats are folded onto their sharp equivalents before scoring, so flat
//! keys (F, Bb, Eb, ...) are never reported.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::pitch::{Accidental, Letter, Pitch, PitchClass};

/// Sharps in the order a key signature adds them.
const SHARP_ORDER: [PitchClass; 6] = [
    PitchClass::new(Letter::F, Accidental::Sharp),
    PitchClass::new(Letter::C, Accidental::Sharp),
    PitchClass::new(Letter::G, Accidental::Sharp),
    PitchClass::new(Letter::D, Accidental::Sharp),
    PitchClass::new(Letter::A, Accidental::Sharp),
    PitchClass::new(Letter::E, Accidental::Sharp),
];

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeySignature {
    C,
    G,
    D,
    A,
    E,
    B,
    #[serde(rename = "F#")]
    FSharp,
}

impl KeySignature {
    /// Candidates in increasing sharp count.
    pub const ALL: [KeySignature; 7] = [
        KeySignature::C,
        KeySignature::G,
        KeySignature::D,
        KeySignature::A,
        KeySignature::E,
        KeySignature::B,
        KeySignature::FSharp,
    ];

    pub fn from_sharps(sharps: i32) -> Option<KeySignature> {
        usize::try_from(sharps)
            .ok()
            .and_then(|n| KeySignature::ALL.get(n).copied())
    }

    pub fn sharps(self) -> usize {
        self as usize
    }

    pub fn sharp_notes(self) -> &'static [PitchClass] {
        &SHARP_ORDER[..self.sharps()]
    }

    pub fn name(self) -> &'static str {
        match self {
            KeySignature::C => "C",
            KeySignature::G => "G",
            KeySignature::D => "D",
            KeySignature::A => "A",
            KeySignature::E => "E",
            KeySignature::B => "B",
            KeySignature::FSharp => "F#",
        }
    }

    /// Tonic of the major key.
    pub fn tonic(self) -> PitchClass {
        match self {
            KeySignature::C => PitchClass::new(Letter::C, Accidental::Natural),
            KeySignature::G => PitchClass::new(Letter::G, Accidental::Natural),
            KeySignature::D => PitchClass::new(Letter::D, Accidental::Natural),
            KeySignature::A => PitchClass::new(Letter::A, Accidental::Natural),
            KeySignature::E => PitchClass::new(Letter::E, Accidental::Natural),
            KeySignature::B => PitchClass::new(Letter::B, Accidental::Natural),
            KeySignature::FSharp => PitchClass::new(Letter::F, Accidental::Sharp),
        }
    }

    fn score(self, observed: &HashSet<PitchClass>) -> f64 {
        let expected = self.sharp_notes();
        let mut score = 0.0;
        for sharp in expected {
            if observed.contains(sharp) {
                score += 1.0;
            } else {
                score -= 0.5;
            }
        }
        score -= 0.5 * observed.iter().filter(|pc| !expected.contains(pc)).count() as f64;
        score
    }
}

/// Pick the sharp key whose signature best explains the accidentals in
/// `notes`. Ties go to the key with fewer sharps; no accidentals gives C.
pub fn detect_key_signature(notes: &[Pitch]) -> KeySignature {
    let observed: HashSet<PitchClass> = notes
        .iter()
        .filter(|p| p.is_altered())
        .map(|p| p.pitch_class().to_sharp())
        .collect();

    let mut best = KeySignature::C;
    let mut best_score = f64::NEG_INFINITY;
    for key in KeySignature::ALL {
        let score = key.score(&observed);
        if score > best_score {
            best = key;
            best_score = score;
        }
    }
    best
}
