use std::collections::HashMap;

use serde::Serialize;

use crate::scoring::types::{NoteAttempt, SessionCounters};

/// Average deviation (ms) beyond which a learner is called early or late.
const TENDENCY_THRESHOLD_MS: f64 = 100.0;

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimingTendency {
    Early,
    OnTime,
    Late,
}

/// A target note the learner kept missing.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct TroubleNote {
    pub note: String,
    pub position: usize,
    pub wrong_attempts: u32,
    /// Most frequent wrong note played instead.
    pub most_played_instead: String,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct SessionReport {
    pub counters: SessionCounters,
    pub timed_notes: u32,
    pub on_time_notes: u32,
    pub avg_deviation_ms: f64,
    pub avg_abs_deviation_ms: f64,
    pub timing_tendency: TimingTendency,
    pub trouble_notes: Vec<TroubleNote>,
    pub feedback: Vec<String>,
}

impl SessionReport {
    pub fn from_attempts(attempts: &[NoteAttempt], counters: SessionCounters) -> SessionReport {
        let deviations: Vec<f64> = attempts
            .iter()
            .filter_map(|a| a.timing.map(|t| t.deviation_ms))
            .collect();
        let on_time_notes = attempts
            .iter()
            .filter(|a| a.timing.is_some_and(|t| t.on_time))
            .count() as u32;

        let avg_deviation_ms = mean(deviations.iter().copied());
        let avg_abs_deviation_ms = mean(deviations.iter().map(|d| d.abs()));

        let timing_tendency = if avg_deviation_ms > TENDENCY_THRESHOLD_MS {
            TimingTendency::Late
        } else if avg_deviation_ms < -TENDENCY_THRESHOLD_MS {
            TimingTendency::Early
        } else {
            TimingTendency::OnTime
        };

        let trouble_notes = find_trouble_notes(attempts);

        let mut feedback = Vec::new();
        if counters.notes_played == 0 {
            feedback.push("No notes played yet. Play the highlighted note to begin.".to_string());
        } else {
            let pct = counters.accuracy * 100.0;
            if pct >= 90.0 {
                feedback.push(format!("Excellent! {:.0}% of your notes were correct.", pct));
            } else if pct >= 70.0 {
                feedback.push(format!("Good job! You got {:.0}% of the notes right.", pct));
            } else if pct >= 50.0 {
                feedback.push(format!(
                    "Keep practicing! You hit {:.0}% of the notes correctly.",
                    pct
                ));
            } else {
                feedback.push(format!(
                    "This one's tough! You got {:.0}% correct. Try slowing down the tempo.",
                    pct
                ));
            }
        }

        if !deviations.is_empty() {
            match timing_tendency {
                TimingTendency::Late => feedback.push(
                    "You tend to come in late. Count the beat ahead and get your finger ready early."
                        .to_string(),
                ),
                TimingTendency::Early => feedback.push(
                    "You tend to rush ahead. Listen to the beat and wait for it.".to_string(),
                ),
                TimingTendency::OnTime => {}
            }
        }

        for trouble in &trouble_notes {
            feedback.push(format!(
                "{} took {} tries; you often played {} instead.",
                trouble.note, trouble.wrong_attempts, trouble.most_played_instead
            ));
        }

        SessionReport {
            counters,
            timed_notes: deviations.len() as u32,
            on_time_notes,
            avg_deviation_ms,
            avg_abs_deviation_ms,
            timing_tendency,
            trouble_notes,
            feedback,
        }
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn find_trouble_notes(attempts: &[NoteAttempt]) -> Vec<TroubleNote> {
    // position -> (wrong count, played name -> count)
    let mut misses: HashMap<usize, (u32, HashMap<String, u32>)> = HashMap::new();
    for attempt in attempts.iter().filter(|a| !a.correct) {
        let entry = misses.entry(attempt.expected.position).or_default();
        entry.0 += 1;
        *entry.1.entry(attempt.played.name()).or_default() += 1;
    }

    let mut trouble: Vec<TroubleNote> = misses
        .into_iter()
        .filter(|(_, (count, _))| *count >= 2) // Need at least 2 misses to call it a pattern
        .filter_map(|(position, (count, played))| {
            let expected = attempts.iter().find(|a| a.expected.position == position)?;
            let (instead, _) = played
                .into_iter()
                .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))?;
            Some(TroubleNote {
                note: expected.expected.pitch.name(),
                position,
                wrong_attempts: count,
                most_played_instead: instead,
            })
        })
        .collect();

    trouble.sort_by(|a, b| {
        b.wrong_attempts
            .cmp(&a.wrong_attempts)
            .then(a.position.cmp(&b.position))
    });
    trouble.truncate(3);
    trouble
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pitch::Pitch;
    use crate::scoring::types::{NoteEvent, TimingDirection, TimingResult};
    use pretty_assertions::assert_eq;

    fn note(name: &str, position: usize) -> NoteEvent {
        NoteEvent::quarter(name.parse().unwrap(), position)
    }

    fn hit(expected: NoteEvent, deviation_ms: f64) -> NoteAttempt {
        let deviation_seconds = (deviation_ms / 10.0).round() / 100.0;
        NoteAttempt {
            expected,
            played: expected.pitch,
            timestamp_ms: 0.0,
            correct: true,
            timing: Some(TimingResult {
                deviation_ms,
                deviation_seconds,
                on_time: deviation_seconds.abs() <= 0.2,
                direction: TimingDirection::OnBeat,
            }),
        }
    }

    fn miss(expected: NoteEvent, played: &str) -> NoteAttempt {
        NoteAttempt {
            expected,
            played: played.parse::<Pitch>().unwrap(),
            timestamp_ms: 0.0,
            correct: false,
            timing: None,
        }
    }

    fn counters(correct: u32, incorrect: u32) -> SessionCounters {
        let mut c = SessionCounters::default();
        (0..correct).for_each(|_| c.record_correct());
        (0..incorrect).for_each(|_| c.record_incorrect());
        c
    }

    #[test]
    fn test_empty_report() {
        let report = SessionReport::from_attempts(&[], SessionCounters::default());
        assert_eq!(report.timed_notes, 0);
        assert_eq!(report.avg_deviation_ms, 0.0);
        assert_eq!(report.timing_tendency, TimingTendency::OnTime);
        assert!(report.trouble_notes.is_empty());
        assert_eq!(report.feedback.len(), 1);
        assert!(report.feedback[0].starts_with("No notes played"));
    }

    #[test]
    fn test_perfect_run() {
        let attempts = vec![
            hit(note("C4", 0), 20.0),
            hit(note("D4", 1), -40.0),
            hit(note("E4", 2), 20.0),
        ];
        let report = SessionReport::from_attempts(&attempts, counters(3, 0));
        assert_eq!(report.timed_notes, 3);
        assert_eq!(report.on_time_notes, 3);
        assert_eq!(report.avg_deviation_ms, 0.0);
        assert!((report.avg_abs_deviation_ms - 80.0 / 3.0).abs() < 1e-9);
        assert_eq!(report.timing_tendency, TimingTendency::OnTime);
        assert_eq!(
            report.feedback,
            vec!["Excellent! 100% of your notes were correct.".to_string()]
        );
    }

    #[test]
    fn test_late_tendency() {
        let attempts = vec![hit(note("C4", 0), 300.0), hit(note("D4", 1), 250.0)];
        let report = SessionReport::from_attempts(&attempts, counters(2, 0));
        assert_eq!(report.timing_tendency, TimingTendency::Late);
        assert_eq!(report.on_time_notes, 0);
        assert!(report.feedback.iter().any(|f| f.contains("late")));
    }

    #[test]
    fn test_trouble_notes() {
        let e4 = note("E4", 2);
        let g4 = note("G4", 4);
        let attempts = vec![
            hit(note("C4", 0), 0.0),
            miss(e4, "F4"),
            miss(e4, "F4"),
            miss(e4, "D#4"),
            hit(e4, 0.0),
            miss(g4, "A4"),
            hit(g4, 0.0),
        ];
        let report = SessionReport::from_attempts(&attempts, counters(3, 4));
        assert_eq!(
            report.trouble_notes,
            vec![TroubleNote {
                note: "E4".to_string(),
                position: 2,
                wrong_attempts: 3,
                most_played_instead: "F4".to_string(),
            }]
        );
        assert!(report
            .feedback
            .iter()
            .any(|f| f == "E4 took 3 tries; you often played F4 instead."));
        assert!(report.feedback[0].starts_with("This one's tough!"));
    }
}
