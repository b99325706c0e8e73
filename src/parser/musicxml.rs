use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{Result, TutorError};
use crate::pitch::{is_valid_octave, Accidental, Letter, Pitch};
use crate::scoring::types::{Duration, NoteEvent, NoteValue, Song};

const DEFAULT_TEMPO_BPM: f64 = 120.0;

/// Which line of the first part to practise.
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SongOptions {
    /// Staff number; 1 is the upper (right-hand) staff of a piano part.
    pub staff: u32,
    /// Voice within the staff. `None` follows the first voice seen on it.
    pub voice: Option<String>,
}

impl Default for SongOptions {
    fn default() -> Self {
        SongOptions {
            staff: 1,
            voice: None,
        }
    }
}

fn attribute(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .and_then(|attr| std::str::from_utf8(&attr.value).ok().map(str::to_string))
}

fn tempo_attribute(e: &BytesStart) -> Option<f64> {
    attribute(e, b"tempo")
        .and_then(|t| t.parse::<f64>().ok())
        .filter(|t| *t > 0.0)
}

/// `<beats>` may be compound, e.g. `3+2`.
fn parse_beats(text: &str) -> Option<u8> {
    text.split('+')
        .map(|part| part.trim().parse::<u8>().ok())
        .try_fold(0u8, |sum, part| sum.checked_add(part?))
        .filter(|sum| *sum > 0)
}

/// `<alter>` is a decimal; only whole semitones in -1..=1 are playable here.
fn parse_alter(text: &str) -> Result<Accidental> {
    let bad = || TutorError::SongParse(format!("unsupported <alter> value {text:?}"));
    let value = text.parse::<f64>().map_err(|_| bad())?;
    if value.fract() != 0.0 {
        return Err(bad());
    }
    Accidental::from_alter(value as i32).ok_or_else(bad)
}

/// Tracks the staff and voice being followed. The voice locks onto the first
/// one seen on the chosen staff unless the caller named one.
struct LineFilter {
    staff: u32,
    voice: Option<String>,
}

impl LineFilter {
    fn accepts(&mut self, staff: Option<u32>, voice: Option<&str>) -> bool {
        if staff.unwrap_or(1) != self.staff {
            return false;
        }
        match (&self.voice, voice) {
            (Some(wanted), Some(voice)) => wanted == voice,
            (None, Some(voice)) => {
                self.voice = Some(voice.to_string());
                true
            }
            (_, None) => true,
        }
    }
}

/// Load the first part of a MusicXML score as a practice sequence, following
/// the upper staff. See [`parse_song_with`].
pub fn parse_song(xml: &str) -> Result<Song> {
    parse_song_with(xml, &SongOptions::default())
}

/// Load one line of the first part of a MusicXML score as a practice sequence.
///
/// Only the chosen staff and voice are kept, and only the first note of each
/// chord, so the result is a melody the learner plays one note at a time.
/// Rests and `<forward>` gaps become `rest_before_beats` on the following
/// note; tied continuations are folded into the note they continue.
pub fn parse_song_with(xml: &str, options: &SongOptions) -> Result<Song> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();

    let mut divisions: f64 = 1.0;
    let mut tempo: Option<f64> = None;
    let mut notes: Vec<NoteEvent> = Vec::new();
    let mut filter = LineFilter {
        staff: options.staff,
        voice: options.voice.clone(),
    };

    let mut current_tag: Option<&'static str> = None;
    let mut parts_seen = 0usize;

    // Note state
    let mut in_note = false;
    let mut note_is_rest = false;
    let mut note_is_chord = false;
    let mut note_is_dotted = false;
    let mut note_tie_stop = false;
    let mut note_duration_divs: Option<f64> = None;
    let mut note_type_str = String::new();
    let mut note_staff: Option<u32> = None;
    let mut note_voice: Option<String> = None;
    let mut step: Option<char> = None;
    let mut accidental = Accidental::Natural;
    let mut octave: Option<i32> = None;

    // <forward> state
    let mut in_forward = false;
    let mut forward_divs: f64 = 0.0;
    let mut forward_staff: Option<u32> = None;
    let mut forward_voice: Option<String> = None;

    // Score-level metadata
    let mut key_fifths: i32 = 0;
    let mut beats_per_measure: u8 = 4;
    let mut beat_type: u8 = 4;
    let mut title: Option<String> = None;

    let mut pending_rest_beats = 0.0;
    let mut skipped_rests = 0usize;
    let mut skipped_chord_notes = 0usize;
    let mut skipped_other_lines = 0usize;
    let mut tied_notes = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"part" => parts_seen += 1,
                b"note" => {
                    in_note = true;
                    note_is_rest = false;
                    note_is_chord = false;
                    note_is_dotted = false;
                    note_tie_stop = false;
                    note_duration_divs = None;
                    note_type_str.clear();
                    note_staff = None;
                    note_voice = None;
                    step = None;
                    accidental = Accidental::Natural;
                    octave = None;
                }
                b"forward" => {
                    in_forward = true;
                    forward_divs = 0.0;
                    forward_staff = None;
                    forward_voice = None;
                }
                b"rest" if in_note => note_is_rest = true,
                b"divisions" => current_tag = Some("divisions"),
                b"duration" => current_tag = Some("duration"),
                b"voice" => current_tag = Some("voice"),
                b"staff" => current_tag = Some("staff"),
                b"step" => current_tag = Some("step"),
                b"alter" => current_tag = Some("alter"),
                b"octave" => current_tag = Some("octave"),
                b"per-minute" => current_tag = Some("per-minute"),
                b"fifths" => current_tag = Some("fifths"),
                b"beats" => current_tag = Some("beats"),
                b"beat-type" => current_tag = Some("beat-type"),
                b"movement-title" => current_tag = Some("movement-title"),
                b"work-title" => current_tag = Some("work-title"),
                b"type" if in_note => current_tag = Some("type"),
                b"sound" => {
                    if let Some(t) = tempo_attribute(e) {
                        tempo = Some(t);
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"sound" => {
                    if let Some(t) = tempo_attribute(e) {
                        tempo = Some(t);
                    }
                }
                b"rest" if in_note => note_is_rest = true,
                b"chord" if in_note => note_is_chord = true,
                b"dot" if in_note => note_is_dotted = true,
                b"tie" if in_note => {
                    if attribute(e, b"type").as_deref() == Some("stop") {
                        note_tie_stop = true;
                    }
                }
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if let Some(tag) = current_tag.take() {
                    let text = e.unescape().map_err(|e| TutorError::SongParse(e.to_string()))?;
                    let text = text.trim();
                    match tag {
                        "divisions" => {
                            if let Ok(v) = text.parse::<f64>() {
                                if v > 0.0 {
                                    divisions = v;
                                }
                            }
                        }
                        "per-minute" => {
                            if let Ok(v) = text.parse::<f64>() {
                                if v > 0.0 && tempo.is_none() {
                                    tempo = Some(v);
                                }
                            }
                        }
                        "duration" if in_note => note_duration_divs = text.parse::<f64>().ok(),
                        "duration" if in_forward => forward_divs = text.parse::<f64>().unwrap_or(0.0),
                        "voice" if in_note => note_voice = Some(text.to_string()),
                        "voice" if in_forward => forward_voice = Some(text.to_string()),
                        "staff" if in_note => note_staff = text.parse::<u32>().ok(),
                        "staff" if in_forward => forward_staff = text.parse::<u32>().ok(),
                        "step" => step = text.chars().next(),
                        "alter" => accidental = parse_alter(text)?,
                        "octave" => octave = text.parse::<i32>().ok(),
                        "fifths" => {
                            if let Ok(v) = text.parse::<i32>() {
                                key_fifths = v;
                            }
                        }
                        "beats" => match parse_beats(text) {
                            Some(v) => {
                                if text.contains('+') {
                                    warn!(beats = text, total = v, "compound time signature, using the sum");
                                }
                                beats_per_measure = v;
                            }
                            None => warn!(beats = text, "unsupported <beats>, keeping {}", beats_per_measure),
                        },
                        "beat-type" => match text.parse::<u8>() {
                            Ok(v) if v > 0 => beat_type = v,
                            _ => warn!(beat_type = text, "unsupported <beat-type>, keeping {}", beat_type),
                        },
                        "type" => note_type_str = text.to_string(),
                        "movement-title" | "work-title" => {
                            if title.is_none() {
                                title = Some(text.to_string());
                            }
                        }
                        _ => {}
                    }
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"forward" && in_forward => {
                in_forward = false;
                if parts_seen <= 1 && filter.accepts(forward_staff, forward_voice.as_deref()) {
                    pending_rest_beats += forward_divs / divisions;
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"note" && in_note => {
                in_note = false;

                if parts_seen > 1 || !filter.accepts(note_staff, note_voice.as_deref()) {
                    skipped_other_lines += 1;
                } else if note_is_chord {
                    skipped_chord_notes += 1;
                } else {
                    let written = note_type_str
                        .parse::<Duration>()
                        .ok()
                        .map(|d| Duration::new(d.value, note_is_dotted));
                    // <duration> is exact (ties across tuplets, odd lengths); <type> is the fallback.
                    let beats = match (note_duration_divs, written) {
                        (Some(divs), _) => divs / divisions,
                        (None, Some(d)) => d.beats(),
                        (None, None) => 1.0,
                    };

                    if note_is_rest {
                        skipped_rests += 1;
                        pending_rest_beats += beats;
                    } else {
                        let pitch = note_pitch(step, accidental, octave, notes.len())?;
                        let continues_tie =
                            note_tie_stop && notes.last().is_some_and(|last| last.pitch == pitch);
                        if continues_tie {
                            if let Some(last) = notes.last_mut() {
                                last.tied_beats += beats;
                            }
                            tied_notes += 1;
                        } else {
                            let duration = written.unwrap_or_else(|| {
                                if !note_type_str.is_empty() {
                                    warn!(note_type = %note_type_str, beats, "unsupported note type, using duration");
                                }
                                Duration::new(NoteValue::from_beats(beats), note_is_dotted)
                            });
                            let mut note = NoteEvent::new(pitch, duration, notes.len());
                            note.rest_before_beats = std::mem::take(&mut pending_rest_beats);
                            notes.push(note);
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(TutorError::SongParse(format!("XML parse error: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    if skipped_chord_notes > 0 {
        warn!(skipped_chord_notes, "kept only the first note of each chord");
    }
    if skipped_other_lines > 0 {
        debug!(
            skipped_other_lines,
            staff = filter.staff,
            voice = filter.voice.as_deref().unwrap_or("any"),
            "dropped notes outside the practised line"
        );
    }
    if parts_seen > 1 {
        warn!(parts = parts_seen, "only the first part is practised");
    }

    let song = Song {
        title,
        tempo_bpm: tempo.unwrap_or(DEFAULT_TEMPO_BPM),
        key_fifths,
        beats_per_measure,
        beat_type,
        notes,
    };
    info!(
        title = song.title.as_deref().unwrap_or("untitled"),
        notes = song.notes.len(),
        skipped_rests,
        tied_notes,
        tempo_bpm = song.tempo_bpm,
        "loaded song"
    );
    Ok(song)
}

fn note_pitch(step: Option<char>, accidental: Accidental, octave: Option<i32>, index: usize) -> Result<Pitch> {
    let step = step.ok_or_else(|| TutorError::SongParse(format!("note {index} is missing <step>")))?;
    let octave = octave.ok_or_else(|| TutorError::SongParse(format!("note {index} is missing <octave>")))?;
    if !is_valid_octave(octave) {
        return Err(TutorError::SongParse(format!("note {index} has out-of-range <octave>{octave}</octave>")));
    }
    let letter = Letter::from_char(step)
        .ok_or_else(|| TutorError::InvalidPitchName(format!("{step}{octave}")))?;
    Ok(Pitch::new(letter, accidental, octave))
}
