// Arpeggiator: sequencing a chord's pitches individually over time.
//
// A pattern is a deterministic index traversal over the chord's diatonic
// pitch set, extended across the requested octave range by doubling at
// +/-12n. The two random modes differ in scope: Random (Consistent) fixes
// one pattern shape for the whole piece, Random (Per Bar) redraws for each
// chord span. Both are reproducible from the part seed.
//
// Note length is the configured base value, or its triplet subdivision
// (2/3 of the base) when the triplet modifier is on. The last note of a
// span is clipped so arp events never cross a chord boundary.

use crate::error::{ChorgiError, Result};
use crate::key::Key;
use crate::progression::ChordSpan;
use crate::timeline::{NoteEvent, Part};
use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const ARP_VELOCITY: i32 = 95;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArpPattern {
    RandomConsistent,
    RandomPerBar,
    Ascending,
    Descending,
    UpDown,
    RandomNotes,
    ConvergeDiverge,
}

impl FromStr for ArpPattern {
    type Err = ChorgiError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Random (Consistent)" => Ok(ArpPattern::RandomConsistent),
            "Random (Per Bar)" => Ok(ArpPattern::RandomPerBar),
            "Ascending" => Ok(ArpPattern::Ascending),
            "Descending" => Ok(ArpPattern::Descending),
            "Up-Down" => Ok(ArpPattern::UpDown),
            "Random Notes" => Ok(ArpPattern::RandomNotes),
            "Converge/Diverge" => Ok(ArpPattern::ConvergeDiverge),
            _ => Err(ChorgiError::Configuration(format!(
                "unknown arp pattern: {s:?}"
            ))),
        }
    }
}

impl fmt::Display for ArpPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArpPattern::RandomConsistent => "Random (Consistent)",
            ArpPattern::RandomPerBar => "Random (Per Bar)",
            ArpPattern::Ascending => "Ascending",
            ArpPattern::Descending => "Descending",
            ArpPattern::UpDown => "Up-Down",
            ArpPattern::RandomNotes => "Random Notes",
            ArpPattern::ConvergeDiverge => "Converge/Diverge",
        };
        write!(f, "{s}")
    }
}

/// Octave doublings applied to the chord's pitch set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArpOctaves {
    Original,
    Up1,
    Down1,
    Up2,
    Down2,
    Up3,
    Down3,
}

impl ArpOctaves {
    pub fn shifts(self) -> &'static [i16] {
        match self {
            ArpOctaves::Original => &[0],
            ArpOctaves::Up1 => &[0, 12],
            ArpOctaves::Down1 => &[0, -12],
            ArpOctaves::Up2 => &[0, 12, 24],
            ArpOctaves::Down2 => &[0, -12, -24],
            ArpOctaves::Up3 => &[0, 12, 24, 36],
            ArpOctaves::Down3 => &[0, -12, -24, -36],
        }
    }
}

impl FromStr for ArpOctaves {
    type Err = ChorgiError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Original" => Ok(ArpOctaves::Original),
            "+1 Octave" => Ok(ArpOctaves::Up1),
            "-1 Octave" => Ok(ArpOctaves::Down1),
            "+2 Octaves" => Ok(ArpOctaves::Up2),
            "-2 Octaves" => Ok(ArpOctaves::Down2),
            "+3 Octaves" => Ok(ArpOctaves::Up3),
            "-3 Octaves" => Ok(ArpOctaves::Down3),
            _ => Err(ChorgiError::Configuration(format!(
                "unknown arp octave range: {s:?}"
            ))),
        }
    }
}

impl fmt::Display for ArpOctaves {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArpOctaves::Original => "Original",
            ArpOctaves::Up1 => "+1 Octave",
            ArpOctaves::Down1 => "-1 Octave",
            ArpOctaves::Up2 => "+2 Octaves",
            ArpOctaves::Down2 => "-2 Octaves",
            ArpOctaves::Up3 => "+3 Octaves",
            ArpOctaves::Down3 => "-3 Octaves",
        };
        write!(f, "{s}")
    }
}

/// Base note value for arp steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteValue {
    Quarter,
    Eighth,
    Sixteenth,
}

impl NoteValue {
    pub fn beats(self) -> f64 {
        match self {
            NoteValue::Quarter => 1.0,
            NoteValue::Eighth => 0.5,
            NoteValue::Sixteenth => 0.25,
        }
    }
}

impl FromStr for NoteValue {
    type Err = ChorgiError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "1/4" => Ok(NoteValue::Quarter),
            "1/8" => Ok(NoteValue::Eighth),
            "1/16" => Ok(NoteValue::Sixteenth),
            _ => Err(ChorgiError::Configuration(format!(
                "unknown note value: {s:?}"
            ))),
        }
    }
}

impl fmt::Display for NoteValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NoteValue::Quarter => "1/4",
            NoteValue::Eighth => "1/8",
            NoteValue::Sixteenth => "1/16",
        };
        write!(f, "{s}")
    }
}

/// The concrete traversal shapes the two Random modes draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Ascending,
    Descending,
    UpDown,
    RandomNotes,
    ConvergeDiverge,
}

const SHAPES: [Shape; 5] = [
    Shape::Ascending,
    Shape::Descending,
    Shape::UpDown,
    Shape::RandomNotes,
    Shape::ConvergeDiverge,
];

impl Shape {
    /// Index order over a pitch set of size `n`.
    fn indices(self, n: usize, rng: &mut impl Rng) -> Vec<usize> {
        if n == 0 {
            return Vec::new();
        }
        match self {
            Shape::Ascending => (0..n).collect(),
            Shape::Descending => (0..n).rev().collect(),
            Shape::UpDown => {
                let mut out: Vec<usize> = (0..n).collect();
                out.extend((1..n.saturating_sub(1)).rev());
                out
            }
            Shape::RandomNotes => {
                let len = *[8usize, 12, 16].choose(rng).unwrap_or(&8);
                (0..len).map(|_| rng.random_range(0..n)).collect()
            }
            Shape::ConvergeDiverge => {
                let mut core = Vec::with_capacity(n);
                if rng.random_bool(0.5) {
                    // Converge: outside in
                    let (mut low, mut high) = (0usize, n - 1);
                    while low <= high {
                        core.push(low);
                        if low != high {
                            core.push(high);
                        }
                        low += 1;
                        if high == 0 {
                            break;
                        }
                        high -= 1;
                    }
                } else {
                    // Diverge: inside out
                    let mid = n / 2;
                    let (mut left, mut right) = if n % 2 == 1 {
                        core.push(mid);
                        (mid.checked_sub(1), mid + 1)
                    } else {
                        (mid.checked_sub(1), mid)
                    };
                    while let Some(l) = left {
                        if right >= n {
                            break;
                        }
                        core.push(l);
                        core.push(right);
                        left = l.checked_sub(1);
                        right += 1;
                    }
                }
                if core.is_empty() {
                    core.push(0);
                }
                // Repeat to a typical rhythmic length
                let mut out = Vec::with_capacity(8);
                while out.len() < 8 {
                    out.extend_from_slice(&core);
                }
                out.truncate(8);
                out
            }
        }
    }
}

fn fixed_shape(pattern: ArpPattern, rng: &mut impl Rng) -> Option<Shape> {
    match pattern {
        ArpPattern::Ascending => Some(Shape::Ascending),
        ArpPattern::Descending => Some(Shape::Descending),
        ArpPattern::UpDown => Some(Shape::UpDown),
        ArpPattern::RandomNotes => Some(Shape::RandomNotes),
        ArpPattern::ConvergeDiverge => Some(Shape::ConvergeDiverge),
        ArpPattern::RandomConsistent => SHAPES.choose(rng).copied(),
        ArpPattern::RandomPerBar => None,
    }
}

/// Generate the arp lane over a voiced progression.
pub fn generate_arp(
    spans: &[ChordSpan],
    key: Key,
    pattern: ArpPattern,
    octaves: ArpOctaves,
    value: NoteValue,
    triplets: bool,
    rng: &mut impl Rng,
) -> Vec<NoteEvent> {
    let step = if triplets {
        value.beats() * 2.0 / 3.0
    } else {
        value.beats()
    };
    let piece_shape = fixed_shape(pattern, rng);

    let mut events = Vec::new();
    for span in spans {
        // Diatonic chord tones only; fall back to the root, skip the span
        // if even the root is chromatic.
        let mut tones: Vec<u8> = span
            .symbol
            .notes
            .iter()
            .copied()
            .filter(|&n| key.is_in_scale(n))
            .collect();
        if tones.is_empty() {
            if key.is_in_scale(span.symbol.root) {
                tones.push(span.symbol.root);
            } else {
                continue;
            }
        }

        let mut pool: Vec<u8> = tones
            .iter()
            .flat_map(|&n| {
                octaves
                    .shifts()
                    .iter()
                    .map(move |&s| n as i16 + s)
                    .filter(|&p| (0..=127).contains(&p))
                    .map(|p| p as u8)
            })
            .collect();
        pool.sort_unstable();
        pool.dedup();
        if pool.is_empty() {
            continue;
        }

        let shape = piece_shape
            .or_else(|| SHAPES.choose(rng).copied())
            .unwrap_or(Shape::Ascending);
        let indices = shape.indices(pool.len(), rng);
        if indices.is_empty() {
            continue;
        }

        let duration = span.symbol.duration_beats;
        let mut t = 0.0;
        let mut counter = 0usize;
        while t < duration - 0.01 {
            let note_duration = step.min(duration - t);
            if note_duration <= 0.01 {
                break;
            }
            let pitch = pool[indices[counter % indices.len()]];
            let velocity = (ARP_VELOCITY + rng.random_range(-5..=5)).clamp(1, 127) as u8;
            events.push(NoteEvent::new(
                pitch,
                span.start + t,
                note_duration,
                velocity,
                Part::Arp,
            ));
            counter += 1;
            t += step;
        }
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

    fn pop_spans() -> Vec<ChordSpan> {
        let key = Key::new(0, KeyMode::Major);
        let mut rng = StdRng::seed_from_u64(0);
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
    fn ascending_eighths_walk_the_triad_in_order() {
        let key = Key::new(0, KeyMode::Major);
        let spans = pop_spans();
        let mut rng = StdRng::seed_from_u64(9);
        let events = generate_arp(
            &spans,
            key,
            ArpPattern::Ascending,
            ArpOctaves::Original,
            NoteValue::Eighth,
            false,
            &mut rng,
        );
        // First chord is C major: C E G cycling, each an eighth note
        assert_eq!(events[0].pitch, 60);
        assert_eq!(events[1].pitch, 64);
        assert_eq!(events[2].pitch, 67);
        assert_eq!(events[3].pitch, 60);
        assert!(events.iter().all(|e| e.duration == 0.5));
        // Eight eighth notes per 4-beat chord, four chords
        assert_eq!(events.len(), 32);
    }

    #[test]
    fn triplet_modifier_shortens_steps() {
        let key = Key::new(0, KeyMode::Major);
        let spans = pop_spans();
        let mut rng = StdRng::seed_from_u64(9);
        let events = generate_arp(
            &spans,
            key,
            ArpPattern::Ascending,
            ArpOctaves::Original,
            NoteValue::Eighth,
            true,
            &mut rng,
        );
        assert!((events[0].duration - 1.0 / 3.0).abs() < 1e-9);
        // Triplets fit 12 steps into 4 beats
        assert_eq!(events.len(), 4 * 12);
    }

    #[test]
    fn octave_range_extends_the_pool() {
        let key = Key::new(0, KeyMode::Major);
        let spans = pop_spans();
        let mut rng = StdRng::seed_from_u64(9);
        let events = generate_arp(
            &spans,
            key,
            ArpPattern::Ascending,
            ArpOctaves::Up1,
            NoteValue::Sixteenth,
            false,
            &mut rng,
        );
        let max = events.iter().map(|e| e.pitch).max().unwrap();
        assert!(max >= 72); // doubled octave reached
    }

    #[test]
    fn random_patterns_are_seed_reproducible() {
        let key = Key::new(0, KeyMode::Major);
        let spans = pop_spans();
        for pattern in [ArpPattern::RandomConsistent, ArpPattern::RandomPerBar] {
            let mut rng_a = StdRng::seed_from_u64(77);
            let mut rng_b = StdRng::seed_from_u64(77);
            let a = generate_arp(
                &spans,
                key,
                pattern,
                ArpOctaves::Original,
                NoteValue::Eighth,
                false,
                &mut rng_a,
            );
            let b = generate_arp(
                &spans,
                key,
                pattern,
                ArpOctaves::Original,
                NoteValue::Eighth,
                false,
                &mut rng_b,
            );
            assert_eq!(a, b, "{pattern:?}");
        }
    }

    #[test]
    fn events_stay_inside_their_spans() {
        let key = Key::new(0, KeyMode::Major);
        let spans = pop_spans();
        let mut rng = StdRng::seed_from_u64(5);
        let events = generate_arp(
            &spans,
            key,
            ArpPattern::ConvergeDiverge,
            ArpOctaves::Up2,
            NoteValue::Sixteenth,
            false,
            &mut rng,
        );
        for event in &events {
            let span = spans
                .iter()
                .find(|s| event.start >= s.start - 1e-9 && event.start < s.end())
                .unwrap();
            assert!(event.end() <= span.end() + 1e-9);
        }
    }

    #[test]
    fn up_down_shape() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(Shape::UpDown.indices(4, &mut rng), vec![0, 1, 2, 3, 2, 1]);
        assert_eq!(Shape::Ascending.indices(3, &mut rng), vec![0, 1, 2]);
        assert_eq!(Shape::Descending.indices(3, &mut rng), vec![2, 1, 0]);
    }

    #[test]
    fn converge_covers_all_indices() {
        for n in 1..=6 {
            let mut rng = StdRng::seed_from_u64(3);
            let idx = Shape::ConvergeDiverge.indices(n, &mut rng);
            assert_eq!(idx.len(), 8);
            assert!(idx.iter().all(|&i| i < n));
        }
    }
}
