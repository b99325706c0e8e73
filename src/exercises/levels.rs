use serde::Serialize;

use crate::error::{Result, TutorError};
use crate::key_signature::KeySignature;
use crate::pitch::{Accidental, Letter, PitchClass};

pub const MIN_LEVEL: u8 = 1;
pub const MAX_LEVEL: u8 = 7;

const fn natural(letter: Letter) -> PitchClass {
    PitchClass::new(letter, Accidental::Natural)
}

const fn sharp(letter: Letter) -> PitchClass {
    PitchClass::new(letter, Accidental::Sharp)
}

// One major key per level, walking the circle of fifths from C to F#.
const POOLS: [[PitchClass; 7]; 7] = [
    [
        natural(Letter::C),
        natural(Letter::D),
        natural(Letter::E),
        natural(Letter::F),
        natural(Letter::G),
        natural(Letter::A),
        natural(Letter::B),
    ],
    [
        natural(Letter::G),
        natural(Letter::A),
        natural(Letter::B),
        natural(Letter::C),
        natural(Letter::D),
        natural(Letter::E),
        sharp(Letter::F),
    ],
    [
        natural(Letter::D),
        natural(Letter::E),
        sharp(Letter::F),
        natural(Letter::G),
        natural(Letter::A),
        natural(Letter::B),
        sharp(Letter::C),
    ],
    [
        natural(Letter::A),
        natural(Letter::B),
        sharp(Letter::C),
        natural(Letter::D),
        natural(Letter::E),
        sharp(Letter::F),
        sharp(Letter::G),
    ],
    [
        natural(Letter::E),
        sharp(Letter::F),
        sharp(Letter::G),
        natural(Letter::A),
        natural(Letter::B),
        sharp(Letter::C),
        sharp(Letter::D),
    ],
    [
        natural(Letter::B),
        sharp(Letter::C),
        sharp(Letter::D),
        natural(Letter::E),
        sharp(Letter::F),
        sharp(Letter::G),
        sharp(Letter::A),
    ],
    [
        sharp(Letter::F),
        sharp(Letter::G),
        sharp(Letter::A),
        natural(Letter::B),
        sharp(Letter::C),
        sharp(Letter::D),
        sharp(Letter::E),
    ],
];

#[derive(Serialize, Clone, Debug)]
pub struct Level {
    pub level: u8,
    pub key: KeySignature,
    pub sharps: usize,
    pub description: String,
    pub pool: Vec<String>,
}

/// Note pool for a practice level, spelled in that level's key.
pub fn level_pool(level: u8) -> Result<&'static [PitchClass; 7]> {
    if !(MIN_LEVEL..=MAX_LEVEL).contains(&level) {
        return Err(TutorError::InvalidLevel(level));
    }
    Ok(&POOLS[(level - 1) as usize])
}

pub fn level_key(level: u8) -> Result<KeySignature> {
    level_pool(level)?;
    KeySignature::from_sharps((level - 1) as i32).ok_or(TutorError::InvalidLevel(level))
}

pub fn levels() -> Vec<Level> {
    (MIN_LEVEL..=MAX_LEVEL)
        .filter_map(|level| {
            let key = level_key(level).ok()?;
            let pool = level_pool(level).ok()?;
            let description = match key.sharps() {
                0 => "Natural notes only (C major)".to_string(),
                1 => format!("{} major: adds F#", key.name()),
                n => format!(
                    "{} major: {} sharps, adds {}",
                    key.name(),
                    n,
                    key.sharp_notes()[n - 1]
                ),
            };
            Some(Level {
                level,
                key,
                sharps: key.sharps(),
                description,
                pool: pool.iter().map(|pc| pc.to_string()).collect(),
            })
        })
        .collect()
}
