use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TutorError};

/// Sharp spelling for each pitch class, indexed by semitone within the octave.
const SHARP_SPELLING: [(Letter, Accidental); 12] = [
    (Letter::C, Accidental::Natural),
    (Letter::C, Accidental::Sharp),
    (Letter::D, Accidental::Natural),
    (Letter::D, Accidental::Sharp),
    (Letter::E, Accidental::Natural),
    (Letter::F, Accidental::Natural),
    (Letter::F, Accidental::Sharp),
    (Letter::G, Accidental::Natural),
    (Letter::G, Accidental::Sharp),
    (Letter::A, Accidental::Natural),
    (Letter::A, Accidental::Sharp),
    (Letter::B, Accidental::Natural),
];

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Letter {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl Letter {
    pub fn base_semitone(self) -> i32 {
        match self {
            Letter::C => 0,
            Letter::D => 2,
            Letter::E => 4,
            Letter::F => 5,
            Letter::G => 7,
            Letter::A => 9,
            Letter::B => 11,
        }
    }

    pub fn from_char(c: char) -> Option<Letter> {
        match c.to_ascii_uppercase() {
            'C' => Some(Letter::C),
            'D' => Some(Letter::D),
            'E' => Some(Letter::E),
            'F' => Some(Letter::F),
            'G' => Some(Letter::G),
            'A' => Some(Letter::A),
            'B' => Some(Letter::B),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Letter::C => "C",
            Letter::D => "D",
            Letter::E => "E",
            Letter::F => "F",
            Letter::G => "G",
            Letter::A => "A",
            Letter::B => "B",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Accidental {
    #[default]
    Natural,
    Sharp,
    Flat,
}

impl Accidental {
    pub fn alter(self) -> i32 {
        match self {
            Accidental::Natural => 0,
            Accidental::Sharp => 1,
            Accidental::Flat => -1,
        }
    }

    /// Accidental for a MusicXML-style `<alter>` value.
    pub fn from_alter(alter: i32) -> Option<Accidental> {
        match alter {
            0 => Some(Accidental::Natural),
            1 => Some(Accidental::Sharp),
            -1 => Some(Accidental::Flat),
            _ => None,
        }
    }

    fn from_char(c: char) -> Option<Accidental> {
        match c {
            '#' | '♯' => Some(Accidental::Sharp),
            'b' | '♭' => Some(Accidental::Flat),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Accidental::Natural => "",
            Accidental::Sharp => "#",
            Accidental::Flat => "b",
        }
    }
}

/// Lowest octave a pitch may be written in; C-1 is MIDI 0.
pub const MIN_OCTAVE: i32 = -1;
/// Highest octave a pitch may be written in; G9 is MIDI 127.
pub const MAX_OCTAVE: i32 = 9;

pub fn is_valid_octave(octave: i32) -> bool {
    (MIN_OCTAVE..=MAX_OCTAVE).contains(&octave)
}

/// Semitone index of a spelled note: `(octave + 1) * 12 + letter + accidental`.
/// C4 is 60, matching MIDI note numbers.
pub fn to_semitone_index(letter: Letter, accidental: Accidental, octave: i32) -> i32 {
    (octave + 1) * 12 + letter.base_semitone() + accidental.alter()
}

/// Inverse of [`to_semitone_index`]. Always spells with sharps.
pub fn from_semitone_index(index: i32) -> Pitch {
    let (letter, accidental) = SHARP_SPELLING[index.rem_euclid(12) as usize];
    Pitch {
        letter,
        accidental,
        octave: index.div_euclid(12) - 1,
    }
}

/// A spelled note without octave, e.g. `F#` or `Bb`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PitchClass {
    pub letter: Letter,
    pub accidental: Accidental,
}

impl PitchClass {
    pub const fn new(letter: Letter, accidental: Accidental) -> Self {
        PitchClass { letter, accidental }
    }

    /// Semitone within the octave, 0..12.
    pub fn semitone(self) -> i32 {
        (self.letter.base_semitone() + self.accidental.alter()).rem_euclid(12)
    }

    pub fn at_octave(self, octave: i32) -> Pitch {
        Pitch {
            letter: self.letter,
            accidental: self.accidental,
            octave,
        }
    }

    /// Rewrite common flats as their sharp equivalent (Bb -> A#, Cb -> B).
    /// Anything else is returned unchanged.
    pub fn to_sharp(self) -> PitchClass {
        use Accidental::*;
        use Letter::*;
        match (self.letter, self.accidental) {
            (B, Flat) => PitchClass::new(A, Sharp),
            (E, Flat) => PitchClass::new(D, Sharp),
            (A, Flat) => PitchClass::new(G, Sharp),
            (D, Flat) => PitchClass::new(C, Sharp),
            (G, Flat) => PitchClass::new(F, Sharp),
            (C, Flat) => PitchClass::new(B, Natural),
            _ => self,
        }
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.letter.as_str(), self.accidental.as_str())
    }
}

impl FromStr for PitchClass {
    type Err = TutorError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        let letter = chars
            .next()
            .and_then(Letter::from_char)
            .ok_or_else(|| TutorError::InvalidPitchName(s.to_string()))?;
        let accidental = match (chars.next(), chars.next()) {
            (None, _) => Accidental::Natural,
            (Some(c), None) => {
                Accidental::from_char(c).ok_or_else(|| TutorError::InvalidPitchName(s.to_string()))?
            }
            _ => return Err(TutorError::InvalidPitchName(s.to_string())),
        };
        Ok(PitchClass { letter, accidental })
    }
}

/// A note letter, accidental and octave.
///
/// Equality and hashing go through the semitone index, so `C#4 == Db4`.
/// The spelling is kept for display only.
#[derive(Serialize, Deserialize, Clone, Copy, Debug)]
#[serde(try_from = "SpelledPitch")]
pub struct Pitch {
    pub letter: Letter,
    #[serde(default)]
    pub accidental: Accidental,
    pub octave: i32,
}

impl Pitch {
    pub fn new(letter: Letter, accidental: Accidental, octave: i32) -> Self {
        Pitch {
            letter,
            accidental,
            octave,
        }
    }

    pub fn semitone_index(&self) -> i32 {
        to_semitone_index(self.letter, self.accidental, self.octave)
    }

    pub fn from_midi(midi: u8) -> Self {
        from_semitone_index(midi as i32)
    }

    pub fn pitch_class(&self) -> PitchClass {
        PitchClass::new(self.letter, self.accidental)
    }

    pub fn is_altered(&self) -> bool {
        self.accidental != Accidental::Natural
    }

    /// The same pitch shifted by `semitones`, spelled with sharps.
    pub fn transposed(&self, semitones: i32) -> Pitch {
        from_semitone_index(self.semitone_index() + semitones)
    }

    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl PartialEq for Pitch {
    fn eq(&self, other: &Self) -> bool {
        self.semitone_index() == other.semitone_index()
    }
}

impl Eq for Pitch {}

impl Hash for Pitch {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.semitone_index().hash(state);
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch_class(), self.octave)
    }
}

#[derive(Deserialize)]
struct SpelledPitch {
    letter: Letter,
    #[serde(default)]
    accidental: Accidental,
    octave: i32,
}

impl TryFrom<SpelledPitch> for Pitch {
    type Error = TutorError;

    fn try_from(raw: SpelledPitch) -> Result<Self> {
        let pitch = Pitch::new(raw.letter, raw.accidental, raw.octave);
        if is_valid_octave(raw.octave) {
            Ok(pitch)
        } else {
            Err(TutorError::InvalidPitchName(pitch.name()))
        }
    }
}

impl FromStr for Pitch {
    type Err = TutorError;

    /// Parse names like `C4`, `F#3`, `Bb5`, `c-1`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || TutorError::InvalidPitchName(s.to_string());
        let trimmed = s.trim();
        let mut chars = trimmed.char_indices().peekable();

        let letter = chars
            .next()
            .and_then(|(_, c)| Letter::from_char(c))
            .ok_or_else(invalid)?;

        let accidental = match chars.peek().and_then(|&(_, c)| Accidental::from_char(c)) {
            Some(acc) => {
                chars.next();
                acc
            }
            None => Accidental::Natural,
        };

        let octave_start = chars.peek().map(|&(i, _)| i).ok_or_else(invalid)?;
        let octave: i32 = trimmed[octave_start..].parse().map_err(|_| invalid())?;
        if !is_valid_octave(octave) {
            return Err(invalid());
        }

        Ok(Pitch {
            letter,
            accidental,
            octave,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_semitone_index() {
        assert_eq!(to_semitone_index(Letter::C, Accidental::Natural, 4), 60);
        assert_eq!(to_semitone_index(Letter::A, Accidental::Natural, 4), 69);
        assert_eq!(to_semitone_index(Letter::C, Accidental::Sharp, 4), 61);
        assert_eq!(to_semitone_index(Letter::B, Accidental::Flat, 4), 70);
        assert_eq!(to_semitone_index(Letter::G, Accidental::Natural, 3), 55);
        assert_eq!(to_semitone_index(Letter::C, Accidental::Natural, -1), 0);
    }

    #[test]
    fn test_from_semitone_index_prefers_sharps() {
        let p = from_semitone_index(61);
        assert_eq!(p.letter, Letter::C);
        assert_eq!(p.accidental, Accidental::Sharp);
        assert_eq!(p.octave, 4);

        let p = from_semitone_index(70);
        assert_eq!(p.name(), "A#4");

        let p = from_semitone_index(59);
        assert_eq!(p.name(), "B3");
    }

    #[test]
    fn test_roundtrip_all_spellings() {
        let accidentals = [Accidental::Natural, Accidental::Sharp, Accidental::Flat];
        let letters = [
            Letter::C,
            Letter::D,
            Letter::E,
            Letter::F,
            Letter::G,
            Letter::A,
            Letter::B,
        ];
        for octave in 0..=8 {
            for &letter in &letters {
                for &accidental in &accidentals {
                    let index = to_semitone_index(letter, accidental, octave);
                    assert_eq!(from_semitone_index(index).semitone_index(), index);
                }
            }
        }
    }

    #[test]
    fn test_enharmonic_equality() {
        let c_sharp: Pitch = "C#4".parse().unwrap();
        let d_flat: Pitch = "Db4".parse().unwrap();
        assert_eq!(c_sharp, d_flat);
        assert_ne!(c_sharp.name(), d_flat.name());

        let c5: Pitch = "C5".parse().unwrap();
        let c4: Pitch = "C4".parse().unwrap();
        assert_ne!(c4, c5);
    }

    #[test]
    fn test_parse_pitch_names() {
        assert_eq!("C4".parse::<Pitch>().unwrap().semitone_index(), 60);
        assert_eq!("f#3".parse::<Pitch>().unwrap().semitone_index(), 54);
        assert_eq!("Bb3".parse::<Pitch>().unwrap().semitone_index(), 58);
        assert_eq!("E♭4".parse::<Pitch>().unwrap().semitone_index(), 63);
        assert_eq!("C-1".parse::<Pitch>().unwrap().semitone_index(), 0);
        assert_eq!(" A4 ".parse::<Pitch>().unwrap().semitone_index(), 69);
    }

    #[test]
    fn test_parse_pitch_rejects_garbage() {
        for bad in ["", "H4", "C", "C#", "Cx4", "C4.5", "4C", "C10", "C-2", "C999999999"] {
            assert_eq!(
                bad.parse::<Pitch>(),
                Err(TutorError::InvalidPitchName(bad.to_string())),
                "{bad:?} should not parse"
            );
        }
    }

    #[test]
    fn test_octave_range_edges() {
        assert_eq!("G9".parse::<Pitch>().unwrap().semitone_index(), 127);
        assert_eq!("C-1".parse::<Pitch>().unwrap().semitone_index(), 0);
        assert!(is_valid_octave(MIN_OCTAVE));
        assert!(!is_valid_octave(MAX_OCTAVE + 1));
    }

    #[test]
    fn test_deserialize_rejects_out_of_range_octave() {
        let ok: Pitch = toml::from_str("letter = \"C\"\naccidental = \"sharp\"\noctave = 4").unwrap();
        assert_eq!(ok.name(), "C#4");

        let err = toml::from_str::<Pitch>("letter = \"C\"\noctave = 999999999").unwrap_err();
        assert!(err.to_string().contains("invalid pitch name"), "{err}");
    }

    #[test]
    fn test_parse_pitch_class() {
        let pc: PitchClass = "Bb".parse().unwrap();
        assert_eq!(pc, PitchClass::new(Letter::B, Accidental::Flat));
        assert_eq!(pc.semitone(), 10);
        assert_eq!("Cb".parse::<PitchClass>().unwrap().semitone(), 11);
        assert!("Q".parse::<PitchClass>().is_err());
        assert!("C##".parse::<PitchClass>().is_err());
    }

    #[test]
    fn test_to_sharp() {
        let cases = [
            ("Bb", "A#"),
            ("Eb", "D#"),
            ("Ab", "G#"),
            ("Db", "C#"),
            ("Gb", "F#"),
            ("Cb", "B"),
            ("F#", "F#"),
            ("E#", "E#"),
            ("Fb", "Fb"),
        ];
        for (input, expected) in cases {
            let pc: PitchClass = input.parse().unwrap();
            assert_eq!(pc.to_sharp().to_string(), expected);
        }
    }

    #[test]
    fn test_from_midi_and_transpose() {
        assert_eq!(Pitch::from_midi(69).name(), "A4");
        let c4: Pitch = "C4".parse().unwrap();
        assert_eq!(c4.transposed(7).name(), "G4");
        assert_eq!(c4.transposed(-1).name(), "B3");
    }
}
