// Bassline generation.
//
// Six styles, all root-driven:
// - Standard: one held root per chord.
// - Walking (Jazz): stepwise quarter notes connecting chord roots.
// - Pop: quarter-note roots with occasional octave pops.
// - RnB: root/fifth over short rhythm cells, slightly detached.
// - Hip Hop: sparse syncopated roots in a narrow low range.
// - 808: long sub-bass roots with slide metadata into the next chord and
//   wider velocity variation. Distinct from Hip Hop: continuous slides vs
//   discrete notes.
//
// Every style folds the chord root into its own register by octaves before
// emitting anything.

use crate::error::{ChorgiError, Result};
use crate::key::{Key, stepwise_notes};
use crate::progression::ChordSpan;
use crate::timeline::{NoteEvent, Part};
use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const BASS_VELOCITY: i32 = 90;
const SLIDE_PROBABILITY: f64 = 0.35;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BassStyle {
    Standard,
    Walking,
    Pop,
    Rnb,
    HipHop,
    EightOhEight,
}

impl BassStyle {
    /// General MIDI program for the bass track.
    pub fn program(self) -> u8 {
        match self {
            BassStyle::EightOhEight => 38, // synth bass 1
            _ => 33,                       // fingered bass
        }
    }
}

impl FromStr for BassStyle {
    type Err = ChorgiError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Standard" => Ok(BassStyle::Standard),
            "Walking (Jazz)" => Ok(BassStyle::Walking),
            "Pop" => Ok(BassStyle::Pop),
            "RnB" => Ok(BassStyle::Rnb),
            "Hip Hop" => Ok(BassStyle::HipHop),
            "808" => Ok(BassStyle::EightOhEight),
            _ => Err(ChorgiError::Configuration(format!(
                "unknown bass style: {s:?}"
            ))),
        }
    }
}

impl fmt::Display for BassStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BassStyle::Standard => "Standard",
            BassStyle::Walking => "Walking (Jazz)",
            BassStyle::Pop => "Pop",
            BassStyle::Rnb => "RnB",
            BassStyle::HipHop => "Hip Hop",
            BassStyle::EightOhEight => "808",
        };
        write!(f, "{s}")
    }
}

/// Fold a pitch into `[lo, hi]` by octaves.
fn fold(mut pitch: i16, lo: u8, hi: u8) -> u8 {
    while pitch < lo as i16 {
        pitch += 12;
    }
    while pitch > hi as i16 && pitch >= 12 {
        pitch -= 12;
    }
    pitch.clamp(lo as i16, hi as i16) as u8
}

fn velocity(rng: &mut impl Rng, spread: i32) -> u8 {
    (BASS_VELOCITY + rng.random_range(-spread..=spread)).clamp(1, 127) as u8
}

fn note(pitch: u8, start: f64, duration: f64, velocity: u8) -> NoteEvent {
    NoteEvent::new(pitch, start, duration, velocity, Part::Bass)
}

/// Generate the bass lane over a voiced progression.
pub fn generate_bass(
    spans: &[ChordSpan],
    key: Key,
    style: BassStyle,
    rng: &mut impl Rng,
) -> Vec<NoteEvent> {
    match style {
        BassStyle::Standard => standard(spans, rng),
        BassStyle::Walking => walking(spans, key, rng),
        BassStyle::Pop => pop(spans, rng),
        BassStyle::Rnb => rnb(spans, rng),
        BassStyle::HipHop => hip_hop(spans, rng),
        BassStyle::EightOhEight => eight_oh_eight(spans, rng),
    }
}

fn standard(spans: &[ChordSpan], rng: &mut impl Rng) -> Vec<NoteEvent> {
    let mut events = Vec::new();
    for span in spans {
        let duration = span.symbol.duration_beats;
        if duration < 0.1 {
            continue;
        }
        let pitch = fold(span.symbol.root as i16 - 24, 28, 60);
        events.push(note(
            pitch,
            span.start,
            (duration * 0.9).max(0.1),
            velocity(rng, 5),
        ));
    }
    events
}

fn walking(spans: &[ChordSpan], key: Key, rng: &mut impl Rng) -> Vec<NoteEvent> {
    let (lo, hi) = (28u8, 60u8);
    // A little headroom above the range so steps can approach from above.
    let scale = key.extended_scale(lo, hi + 7);
    let mut events = Vec::new();

    for span in spans {
        let duration = span.symbol.duration_beats;
        let steps = (duration + 0.5) as usize;
        if steps == 0 {
            continue;
        }
        let target = fold(span.symbol.root as i16 - 24, lo, hi);
        let root = scale
            .iter()
            .copied()
            .min_by_key(|&n| (n as i16 - target as i16).unsigned_abs())
            .unwrap_or(target);

        let mut walk = Vec::with_capacity(steps);
        walk.push(root);
        let mut current = root;
        for _ in 1..steps {
            let mut options = stepwise_notes(current, &scale, 2);
            if options.len() > 1 {
                options.retain(|&n| n != current);
            }
            let next = options.choose(rng).copied().unwrap_or(current);
            let next = next.clamp(lo, hi);
            walk.push(next);
            current = next;
        }

        for (i, pitch) in walk.into_iter().enumerate() {
            let start = span.start + i as f64;
            if start >= span.end() {
                break;
            }
            let note_duration = 0.95f64.min(span.end() - start);
            if note_duration > 0.01 {
                events.push(note(pitch, start, note_duration, velocity(rng, 5)));
            }
        }
    }
    events
}

fn pop(spans: &[ChordSpan], rng: &mut impl Rng) -> Vec<NoteEvent> {
    let (lo, hi) = (28u8, 60u8);
    let mut events = Vec::new();
    for span in spans {
        let duration = span.symbol.duration_beats;
        let root = fold(span.symbol.root as i16 - 24, lo, hi);
        let beats = (duration + 0.5) as usize;
        for beat in 0..beats {
            let start = span.start + beat as f64;
            if start >= span.end() {
                break;
            }
            // Octave pop on offbeats, now and then.
            let mut pitch = root;
            if beat % 2 == 1 && duration >= 2.0 && rng.random_bool(0.3) {
                pitch = (pitch + 12).min(hi);
            }
            let note_duration = 0.9f64.min(span.end() - start);
            if note_duration > 0.05 {
                events.push(note(pitch, start, note_duration, velocity(rng, 5)));
            }
        }
    }
    events
}

type Cell = &'static [(f64, f64)];

const RNB_CELLS: &[Cell] = &[
    &[(0.0, 0.75)],
    &[(0.0, 0.5), (0.5, 0.5)],
    &[(0.0, 0.75), (0.75, 0.25)],
    &[(0.0, 1.5)],
];

fn rnb(spans: &[ChordSpan], rng: &mut impl Rng) -> Vec<NoteEvent> {
    let (lo, hi) = (28u8, 65u8);
    let mut events = Vec::new();
    for span in spans {
        let duration = span.symbol.duration_beats;
        let root = fold(span.symbol.root as i16 - 24, lo, hi);
        let fifth = if root + 7 > hi { root - 5 } else { root + 7 };
        let Some(cell) = RNB_CELLS.choose(rng) else {
            continue;
        };
        for &(offset, nominal) in cell.iter() {
            if offset >= duration {
                continue;
            }
            let pitch = if rng.random_bool(0.7) { root } else { fifth };
            let note_duration = nominal.min(duration - offset) * 0.9;
            if note_duration > 0.05 {
                events.push(note(pitch, span.start + offset, note_duration, velocity(rng, 5)));
            }
        }
    }
    events
}

const HIP_HOP_CELLS: &[Cell] = &[
    &[(0.0, 0.75)],
    &[(0.5, 0.75)],
    &[(0.0, 0.4), (0.5, 0.4)],
    &[(0.75, 0.75)],
];

fn hip_hop(spans: &[ChordSpan], rng: &mut impl Rng) -> Vec<NoteEvent> {
    let (lo, hi) = (28u8, 55u8);
    let mut events = Vec::new();
    for span in spans {
        let duration = span.symbol.duration_beats;
        let root = fold(span.symbol.root as i16 - 24, lo, hi);
        let Some(cell) = HIP_HOP_CELLS.choose(rng) else {
            continue;
        };
        for &(offset, nominal) in cell.iter() {
            if offset >= duration {
                continue;
            }
            let note_duration = (nominal * 0.9).min(duration - offset);
            if note_duration > 0.05 {
                events.push(note(root, span.start + offset, note_duration, velocity(rng, 5)));
            }
        }
    }
    events
}

fn eight_oh_eight(spans: &[ChordSpan], rng: &mut impl Rng) -> Vec<NoteEvent> {
    let (lo, hi) = (20u8, 48u8);
    let mut events = Vec::new();
    for (i, span) in spans.iter().enumerate() {
        let duration = span.symbol.duration_beats;
        if duration <= 0.0 {
            continue;
        }
        let root = fold(span.symbol.root as i16 - 36, lo, hi);
        let mut event = note(
            root,
            span.start,
            (duration * 0.98).max(0.5),
            velocity(rng, 10),
        );
        // Glide into the next chord's root when it moves.
        if let Some(next) = spans.get(i + 1) {
            let next_root = fold(next.symbol.root as i16 - 36, lo, hi);
            if next_root != root && rng.random_bool(SLIDE_PROBABILITY) {
                event.slide_to = Some(next_root);
            }
        }
        events.push(event);
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chord::{Complexity, PoolStyle};
    use crate::key::KeyMode;
    use crate::progression::{
        Cadence, ChordRate, HarmonicBias, ProgressionStyle, generate_progression,
        voice_progression,
    };
    use crate::voicing::VoicingStyle;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn spans(key: Key) -> Vec<ChordSpan> {
        let mut rng = StdRng::seed_from_u64(6);
        let symbols = generate_progression(
            key,
            PoolStyle::Chorgi,
            Complexity::Standard,
            ProgressionStyle::Pop,
            4,
            ChordRate::OnePerBar,
            Cadence::Any,
            HarmonicBias::Standard,
            &mut rng,
        )
        .unwrap();
        voice_progression(symbols, VoicingStyle::RootPosition)
    }

    #[test]
    fn standard_holds_one_root_per_chord() {
        let key = Key::new(0, KeyMode::Major);
        let spans = spans(key);
        let mut rng = StdRng::seed_from_u64(1);
        let events = generate_bass(&spans, key, BassStyle::Standard, &mut rng);
        assert_eq!(events.len(), spans.len());
        for (event, span) in events.iter().zip(&spans) {
            assert_eq!(event.pitch % 12, span.symbol.root % 12);
            assert!((28..=60).contains(&event.pitch));
            assert!(event.start == span.start);
        }
    }

    #[test]
    fn walking_plays_one_note_per_beat() {
        let key = Key::new(0, KeyMode::Major);
        let spans = spans(key);
        let mut rng = StdRng::seed_from_u64(1);
        let events = generate_bass(&spans, key, BassStyle::Walking, &mut rng);
        // Four 4-beat chords, quarter-note walk
        assert_eq!(events.len(), 16);
        for span in &spans {
            let first = events
                .iter()
                .find(|e| (e.start - span.start).abs() < 1e-9)
                .unwrap();
            // Each chord slot opens on (a scale neighbor of) the root
            assert!((first.pitch as i16 - fold(span.symbol.root as i16 - 24, 28, 60) as i16).abs() <= 1);
        }
        // Stepwise within a chord: at most two scale degrees per move
        for pair in events.windows(2) {
            let same_span = spans
                .iter()
                .any(|s| pair[0].start >= s.start - 1e-9 && pair[1].start < s.end());
            if same_span {
                assert!((pair[0].pitch as i16 - pair[1].pitch as i16).abs() <= 5);
            }
        }
    }

    #[test]
    fn walking_steps_stay_in_scale() {
        let key = Key::new(9, KeyMode::Minor);
        let spans = spans(key);
        let mut rng = StdRng::seed_from_u64(12);
        let events = generate_bass(&spans, key, BassStyle::Walking, &mut rng);
        assert!(events.iter().all(|e| key.is_in_scale(e.pitch)));
    }

    #[test]
    fn hip_hop_emits_no_slides() {
        let key = Key::new(0, KeyMode::Major);
        let spans = spans(key);
        let mut rng = StdRng::seed_from_u64(3);
        let events = generate_bass(&spans, key, BassStyle::HipHop, &mut rng);
        assert!(!events.is_empty());
        assert!(events.iter().all(|e| e.slide_to.is_none()));
        assert!(events.iter().all(|e| (28..=55).contains(&e.pitch)));
    }

    #[test]
    fn eight_oh_eight_slides_target_next_root() {
        let key = Key::new(0, KeyMode::Major);
        let spans = spans(key);
        // Collect slides over several seeds; the glide is probabilistic
        let mut saw_slide = false;
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let events = generate_bass(&spans, key, BassStyle::EightOhEight, &mut rng);
            assert_eq!(events.len(), spans.len());
            for (i, event) in events.iter().enumerate() {
                assert!((20..=48).contains(&event.pitch));
                if let Some(target) = event.slide_to {
                    saw_slide = true;
                    let next_root = fold(spans[i + 1].symbol.root as i16 - 36, 20, 48);
                    assert_eq!(target, next_root);
                    assert_ne!(target, event.pitch);
                }
            }
        }
        assert!(saw_slide);
    }

    #[test]
    fn eight_oh_eight_varies_velocity() {
        let key = Key::new(0, KeyMode::Major);
        let spans = spans(key);
        let mut rng = StdRng::seed_from_u64(0);
        let mut velocities = std::collections::HashSet::new();
        for _ in 0..10 {
            for event in generate_bass(&spans, key, BassStyle::EightOhEight, &mut rng) {
                velocities.insert(event.velocity);
            }
        }
        assert!(velocities.len() > 1);
    }

    #[test]
    fn rnb_uses_roots_and_fifths() {
        let key = Key::new(0, KeyMode::Major);
        let spans = spans(key);
        let mut rng = StdRng::seed_from_u64(7);
        let events = generate_bass(&spans, key, BassStyle::Rnb, &mut rng);
        for event in &events {
            let span = spans
                .iter()
                .find(|s| event.start >= s.start - 1e-9 && event.start < s.end())
                .unwrap();
            let root_pc = span.symbol.root % 12;
            let fifth_pc = (root_pc + 7) % 12;
            assert!(event.pitch % 12 == root_pc || event.pitch % 12 == fifth_pc);
        }
    }

    #[test]
    fn style_strings_parse() {
        assert_eq!("Walking (Jazz)".parse::<BassStyle>().unwrap(), BassStyle::Walking);
        assert_eq!("808".parse::<BassStyle>().unwrap(), BassStyle::EightOhEight);
        assert!("Slap".parse::<BassStyle>().is_err());
        for style in [
            BassStyle::Standard,
            BassStyle::Walking,
            BassStyle::Pop,
            BassStyle::Rnb,
            BassStyle::HipHop,
            BassStyle::EightOhEight,
        ] {
            assert_eq!(style.to_string().parse::<BassStyle>().unwrap(), style);
        }
    }
}
