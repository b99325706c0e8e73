use wasm_bindgen::prelude::*;

pub mod config;
pub mod error;
pub mod exercises;
pub mod key_signature;
pub mod parser;
pub mod pitch;
pub mod scoring;

pub use config::TutorConfig;
pub use error::TutorError;
pub use exercises::generators::{ChordOptions, ChordType, IntervalType, ScaleOptions, ScaleType};
pub use key_signature::KeySignature;
pub use parser::musicxml::SongOptions;
pub use pitch::{Accidental, Letter, Pitch, PitchClass};
pub use scoring::report::SessionReport;
pub use scoring::session::PracticeSession;
pub use scoring::timing::{Clock, JsClock, ManualClock, SessionClock, TimingTracker};
pub use scoring::types::{Duration, NoteEvent, NoteValue, PlayOutcome, SessionCounters, Song};

use std::cell::RefCell;

use serde::Serialize;

thread_local! {
    static CONFIG: RefCell<TutorConfig> = RefCell::new(TutorConfig::default());
}

fn current_config() -> TutorConfig {
    CONFIG.with(|cell| cell.borrow().clone())
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(|e| JsValue::from_str(&e.to_string()))
}

fn js_err(e: TutorError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Replace the tutor defaults from a TOML document.
#[wasm_bindgen]
pub fn configure_toml(toml: &str) -> Result<(), JsValue> {
    let config = TutorConfig::from_toml_str(toml).map_err(js_err)?;
    CONFIG.with(|cell| *cell.borrow_mut() = config);
    Ok(())
}

/// Replace the tutor defaults from a JS object; missing fields keep their defaults.
#[wasm_bindgen]
pub fn configure(config_js: JsValue) -> Result<(), JsValue> {
    let config: TutorConfig =
        serde_wasm_bindgen::from_value(config_js).map_err(|e| JsValue::from_str(&e.to_string()))?;
    config.validate().map_err(js_err)?;
    CONFIG.with(|cell| *cell.borrow_mut() = config);
    Ok(())
}

/// Parse MusicXML into a practice song. `options_js` may pick the staff and
/// voice to follow (`{ staff: 2 }`); omit it for the upper staff.
#[wasm_bindgen]
pub fn parse_song(xml: &str, options_js: JsValue) -> Result<JsValue, JsValue> {
    let options: SongOptions = if options_js.is_null() || options_js.is_undefined() {
        SongOptions::default()
    } else {
        serde_wasm_bindgen::from_value(options_js).map_err(|e| JsValue::from_str(&e.to_string()))?
    };
    let song = parser::musicxml::parse_song_with(xml, &options).map_err(js_err)?;
    to_js(&song)
}

/// Generate a scale, returning note events. `octave` falls back to the
/// configured default.
#[wasm_bindgen]
pub fn generate_scale(
    root: &str,
    octave: Option<i32>,
    scale_type: &str,
    ascending: Option<bool>,
    note_count: Option<u32>,
) -> Result<JsValue, JsValue> {
    let scale_type: ScaleType = scale_type.parse().map_err(js_err)?;
    let options = ScaleOptions {
        ascending: ascending.unwrap_or(true),
        note_count: note_count.map(|n| n as usize),
    };
    let octave = octave.unwrap_or_else(|| current_config().default_octave);
    let notes = exercises::generators::generate_scale(root, octave, scale_type, options).map_err(js_err)?;
    to_js(&notes)
}

#[wasm_bindgen]
pub fn generate_chord(
    root: &str,
    octave: Option<i32>,
    chord_type: &str,
    ascending: Option<bool>,
) -> Result<JsValue, JsValue> {
    let chord_type: ChordType = chord_type.parse().map_err(js_err)?;
    let options = ChordOptions {
        ascending: ascending.unwrap_or(true),
    };
    let octave = octave.unwrap_or_else(|| current_config().default_octave);
    let notes = exercises::generators::generate_chord(root, octave, chord_type, options).map_err(js_err)?;
    to_js(&notes)
}

#[wasm_bindgen]
pub fn generate_interval(
    root: &str,
    octave: Option<i32>,
    interval_type: &str,
) -> Result<JsValue, JsValue> {
    let interval_type: IntervalType = interval_type.parse().map_err(js_err)?;
    let octave = octave.unwrap_or_else(|| current_config().default_octave);
    let notes = exercises::generators::generate_interval(root, octave, interval_type).map_err(js_err)?;
    to_js(&notes[..])
}

/// Random notes from a level's pool.
#[wasm_bindgen]
pub fn generate_random_notes(level: u8, count: Option<u32>) -> Result<JsValue, JsValue> {
    let config = current_config();
    let count = count.map(|n| n as usize).unwrap_or(config.random_note_count);
    let notes =
        exercises::generators::generate_random_notes(level, count, config.default_octave).map_err(js_err)?;
    to_js(&notes)
}

/// Detect the key of a list of note names such as `["D4", "F#4", "C#5"]`.
#[wasm_bindgen]
pub fn detect_key_signature(notes_js: JsValue) -> Result<String, JsValue> {
    let names: Vec<String> =
        serde_wasm_bindgen::from_value(notes_js).map_err(|e| JsValue::from_str(&e.to_string()))?;
    let pitches = names
        .iter()
        .map(|name| name.parse::<Pitch>())
        .collect::<error::Result<Vec<_>>>()
        .map_err(js_err)?;
    Ok(key_signature::detect_key_signature(&pitches).name().to_string())
}

/// The practice levels, easiest first.
#[wasm_bindgen]
pub fn get_levels() -> Result<JsValue, JsValue> {
    to_js(&exercises::levels::levels())
}

#[wasm_bindgen]
pub fn note_to_midi(name: &str) -> Result<i32, JsValue> {
    let pitch: Pitch = name.parse().map_err(js_err)?;
    Ok(pitch.semitone_index())
}

#[wasm_bindgen]
pub fn midi_to_note(midi: i32) -> String {
    pitch::from_semitone_index(midi).name()
}

/// A guided practice session owned by JS.
///
/// Onset timestamps passed to `on_note_played` and `on_midi_note` are
/// milliseconds since the last `start()`, e.g. `performance.now() - t0`
/// where `t0` was taken when `start()` was called.
#[wasm_bindgen]
pub struct PracticeSessionHandle {
    clock: SessionClock<JsClock>,
    inner: PracticeSession<SessionClock<JsClock>>,
}

#[wasm_bindgen]
impl PracticeSessionHandle {
    /// `notes_js` is an array of note events as returned by the generators
    /// or `parse_song(...).notes`.
    #[wasm_bindgen(constructor)]
    pub fn new(notes_js: JsValue) -> Result<PracticeSessionHandle, JsValue> {
        let mut notes: Vec<NoteEvent> =
            serde_wasm_bindgen::from_value(notes_js).map_err(|e| JsValue::from_str(&e.to_string()))?;
        scoring::types::renumber(&mut notes);
        let clock = SessionClock::new(JsClock);
        Ok(PracticeSessionHandle {
            inner: PracticeSession::new(notes, clock.clone()),
            clock,
        })
    }

    /// Start (or restart) the session and reset the onset clock to 0.
    /// `tempo` falls back to the configured default.
    pub fn start(&mut self, tempo: Option<f64>) -> Result<(), JsValue> {
        let tempo = tempo.unwrap_or_else(|| current_config().default_tempo_bpm);
        scoring::timing::validate_tempo(tempo).map_err(js_err)?;
        self.clock.restart();
        self.inner.start(tempo).map_err(js_err)
    }

    /// `timestamp_ms` is milliseconds since `start()`.
    pub fn on_note_played(&mut self, name: &str, timestamp_ms: f64) -> Result<JsValue, JsValue> {
        let outcome = self.inner.on_note_name_played(name, timestamp_ms).map_err(js_err)?;
        to_js(&outcome)
    }

    /// `timestamp_ms` is milliseconds since `start()`.
    pub fn on_midi_note(&mut self, midi: u8, timestamp_ms: f64) -> Result<JsValue, JsValue> {
        to_js(&self.inner.on_midi_note(midi, timestamp_ms))
    }

    pub fn counters(&self) -> Result<JsValue, JsValue> {
        to_js(&self.inner.counters())
    }

    pub fn suggested_note(&self) -> Result<JsValue, JsValue> {
        to_js(&self.inner.suggested_note())
    }

    pub fn current_note(&self) -> Result<JsValue, JsValue> {
        to_js(&self.inner.current_note())
    }

    pub fn is_complete(&self) -> bool {
        self.inner.is_complete()
    }

    pub fn timing_state(&self) -> Result<JsValue, JsValue> {
        to_js(&self.inner.timing().state())
    }

    pub fn report(&self) -> Result<JsValue, JsValue> {
        to_js(&self.inner.report())
    }
}
