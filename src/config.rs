//! Tutor defaults.
//!
//! Every field has a default, so a config only names what it changes:
//!
//! ```toml
//! default_tempo_bpm = 72
//! default_octave = 3
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Result, TutorError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TutorConfig {
    /// Tempo used when a session or song does not supply one.
    pub default_tempo_bpm: f64,
    /// Octave for generated exercises and random level notes.
    pub default_octave: i32,
    /// Notes drawn per round of level practice.
    pub random_note_count: usize,
}

impl Default for TutorConfig {
    fn default() -> Self {
        TutorConfig {
            default_tempo_bpm: 80.0,
            default_octave: 4,
            random_note_count: 10,
        }
    }
}

impl TutorConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: TutorConfig =
            toml::from_str(contents).map_err(|e| TutorError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.default_tempo_bpm.is_finite() && self.default_tempo_bpm > 0.0) {
            return Err(TutorError::Config(format!(
                "default_tempo_bpm must be positive, got {}",
                self.default_tempo_bpm
            )));
        }
        if !(0..=8).contains(&self.default_octave) {
            return Err(TutorError::Config(format!(
                "default_octave must be between 0 and 8, got {}",
                self.default_octave
            )));
        }
        Ok(())
    }
}
