mod model;

pub use model::{
    from_semitone_index, is_valid_octave, to_semitone_index, Accidental, Letter, Pitch, PitchClass,
    MAX_OCTAVE, MIN_OCTAVE,
};
