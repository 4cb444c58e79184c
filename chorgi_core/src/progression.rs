// Progression generation: the harmonic skeleton every other part reads.
//
// Two modes of operation:
// - Templates (Pop, Pachelbel, ii-V-I, 12-bar blues): fixed scale-degree
//   sequences mapped onto the requested chord-slot count by repetition.
// - Smooth Random: each next chord is picked from a small sampled candidate
//   set, scored by average-pitch proximity to the previous chord, with the
//   harmonic bias discounting the distance of favored qualities (Darker
//   favors minor/diminished colors, Lighter favors major/sus).
//
// A cadence preference, when set, forces the final chord pair to V->I
// (authentic) or IV->I (plagal). Requesting a cadence on a progression too
// short to hold one is a generation error, not a silent downgrade.
//
// The output tiles the requested bar count exactly: chord durations sum to
// bars * 4 beats, no gaps, no overlaps.

use crate::chord::{ChordPool, ChordSymbol, Complexity, PoolChord, PoolStyle, degree_label};
use crate::error::{ChorgiError, Result};
use crate::key::{Key, KeyMode};
use crate::voicing::{Voicing, VoicingStyle, voice_chord};
use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How many candidate chords Smooth Random samples per slot.
const SMOOTH_CANDIDATES: usize = 5;

/// Distance multiplier applied to bias-favored candidates.
const BIAS_DISCOUNT: f64 = 0.7;

/// Chords are shifted down an octave for playback register.
const CHORD_OCTAVE_SHIFT: u8 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressionStyle {
    SmoothRandom,
    Pop,
    Pachelbel,
    TwoFiveOne,
    Blues12Bar,
}

impl ProgressionStyle {
    /// Template as scale-degree indices (0 = tonic), or None for Smooth Random.
    fn template(self) -> Option<&'static [usize]> {
        match self {
            ProgressionStyle::SmoothRandom => None,
            ProgressionStyle::Pop => Some(&[0, 4, 5, 3]),
            ProgressionStyle::Pachelbel => Some(&[0, 4, 5, 2, 3, 0, 3, 4]),
            ProgressionStyle::TwoFiveOne => Some(&[1, 4, 0]),
            ProgressionStyle::Blues12Bar => Some(&[0, 0, 0, 0, 3, 3, 0, 0, 4, 3, 0, 4]),
        }
    }
}

impl FromStr for ProgressionStyle {
    type Err = ChorgiError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Smooth Random" => Ok(ProgressionStyle::SmoothRandom),
            "Pop (I-V-vi-IV)" => Ok(ProgressionStyle::Pop),
            "Pachelbel-ish" => Ok(ProgressionStyle::Pachelbel),
            "ii-V-I Focused" => Ok(ProgressionStyle::TwoFiveOne),
            "Blues (12 Bar)" => Ok(ProgressionStyle::Blues12Bar),
            _ => Err(ChorgiError::Configuration(format!(
                "unknown progression style: {s:?}"
            ))),
        }
    }
}

impl fmt::Display for ProgressionStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProgressionStyle::SmoothRandom => "Smooth Random",
            ProgressionStyle::Pop => "Pop (I-V-vi-IV)",
            ProgressionStyle::Pachelbel => "Pachelbel-ish",
            ProgressionStyle::TwoFiveOne => "ii-V-I Focused",
            ProgressionStyle::Blues12Bar => "Blues (12 Bar)",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChordRate {
    OnePerBar,
    TwoPerBar,
}

impl ChordRate {
    pub fn chords_per_bar(self) -> u32 {
        match self {
            ChordRate::OnePerBar => 1,
            ChordRate::TwoPerBar => 2,
        }
    }
}

impl FromStr for ChordRate {
    type Err = ChorgiError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "1 / Bar" => Ok(ChordRate::OnePerBar),
            "2 / Bar" => Ok(ChordRate::TwoPerBar),
            _ => Err(ChorgiError::Configuration(format!(
                "unknown chord rate: {s:?}"
            ))),
        }
    }
}

impl fmt::Display for ChordRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChordRate::OnePerBar => "1 / Bar",
            ChordRate::TwoPerBar => "2 / Bar",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cadence {
    Any,
    Authentic,
    Plagal,
}

impl FromStr for Cadence {
    type Err = ChorgiError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Any" => Ok(Cadence::Any),
            "Authentic (V-I)" => Ok(Cadence::Authentic),
            "Plagal (IV-I)" => Ok(Cadence::Plagal),
            _ => Err(ChorgiError::Configuration(format!("unknown cadence: {s:?}"))),
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Cadence::Any => "Any",
            Cadence::Authentic => "Authentic (V-I)",
            Cadence::Plagal => "Plagal (IV-I)",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HarmonicBias {
    Standard,
    Darker,
    Lighter,
}

impl FromStr for HarmonicBias {
    type Err = ChorgiError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Standard" => Ok(HarmonicBias::Standard),
            "Darker" => Ok(HarmonicBias::Darker),
            "Lighter" => Ok(HarmonicBias::Lighter),
            _ => Err(ChorgiError::Configuration(format!(
                "unknown harmonic bias: {s:?}"
            ))),
        }
    }
}

impl fmt::Display for HarmonicBias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HarmonicBias::Standard => "Standard",
            HarmonicBias::Darker => "Darker",
            HarmonicBias::Lighter => "Lighter",
        };
        write!(f, "{s}")
    }
}

/// One chord instance placed on the timeline: abstract symbol, concrete
/// voicing, and absolute start position. The fixed skeleton that
/// "regenerate part" runs against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChordSpan {
    pub symbol: ChordSymbol,
    pub voicing: Voicing,
    /// Absolute start in beats.
    pub start: f64,
}

impl ChordSpan {
    pub fn end(&self) -> f64 {
        self.start + self.symbol.duration_beats
    }

    /// Voiced pitches shifted into the playback register.
    pub fn playback_notes(&self) -> Vec<u8> {
        self.voicing
            .notes
            .iter()
            .map(|&n| n.saturating_sub(CHORD_OCTAVE_SHIFT))
            .collect()
    }
}

/// Total length in beats of a voiced progression.
pub fn progression_beats(spans: &[ChordSpan]) -> f64 {
    spans.last().map_or(0.0, ChordSpan::end)
}

/// Generate the chord symbol sequence for a key and style.
#[allow(clippy::too_many_arguments)]
pub fn generate_progression(
    key: Key,
    pool_style: PoolStyle,
    complexity: Complexity,
    style: ProgressionStyle,
    bars: u32,
    rate: ChordRate,
    cadence: Cadence,
    bias: HarmonicBias,
    rng: &mut impl Rng,
) -> Result<Vec<ChordSymbol>> {
    if style == ProgressionStyle::Blues12Bar {
        return generate_blues(key, bars);
    }

    let pool = ChordPool::diatonic(key, pool_style, complexity);
    let slots = bars * rate.chords_per_bar();
    let beats_per_chord = 4.0 / rate.chords_per_bar() as f64;

    let mut symbols: Vec<ChordSymbol> = Vec::with_capacity(slots as usize);
    match style.template() {
        Some(template) => {
            let prefer_seventh = style == ProgressionStyle::TwoFiveOne;
            for slot in 0..slots as usize {
                let degree = template[slot % template.len()];
                let function = degree_label(key.mode, degree);
                let chord = pool.find_by_function(function, prefer_seventh).ok_or_else(|| {
                    ChorgiError::Generation(format!(
                        "no chord for degree {function} in the {pool_style} pool"
                    ))
                })?;
                symbols.push(ChordSymbol::from_pool(chord, beats_per_chord));
            }
        }
        None => {
            for _ in 0..slots {
                let next = next_smooth_chord(&pool, symbols.last(), bias, rng)?;
                symbols.push(ChordSymbol::from_pool(next, beats_per_chord));
            }
        }
    }

    apply_cadence(&mut symbols, &pool, key.mode, cadence)?;
    Ok(symbols)
}

/// Pick the next chord in Smooth Random mode: sample a few candidates and
/// keep the one with the smallest bias-weighted register distance,
/// preferring candidates whose top note stays near the previous chord's.
fn next_smooth_chord<'a>(
    pool: &'a ChordPool,
    prev: Option<&ChordSymbol>,
    bias: HarmonicBias,
    rng: &mut impl Rng,
) -> Result<&'a PoolChord> {
    let Some(prev) = prev else {
        return pool
            .chords
            .choose(rng)
            .ok_or_else(|| ChorgiError::Generation("empty chord pool".into()));
    };

    let candidates: Vec<&PoolChord> = {
        let others: Vec<&PoolChord> = pool
            .chords
            .iter()
            .filter(|c| c.name != prev.name)
            .collect();
        let source = if others.is_empty() {
            pool.chords.iter().collect()
        } else {
            others
        };
        let count = SMOOTH_CANDIDATES.min(source.len());
        source.choose_multiple(rng, count).copied().collect()
    };

    let prev_avg = average_pitch(&prev.notes);
    let prev_high = *prev.notes.last().unwrap_or(&60);

    let mut best_constrained: Option<(f64, &PoolChord)> = None;
    let mut best_any: Option<(f64, &PoolChord)> = None;
    for cand in candidates {
        let mut dist = (average_pitch(&cand.notes) - prev_avg).abs();
        let favored = match bias {
            HarmonicBias::Standard => false,
            HarmonicBias::Darker => cand.quality.is_dark(),
            HarmonicBias::Lighter => cand.quality.is_light(),
        };
        if favored {
            dist *= BIAS_DISCOUNT;
        }

        let high = *cand.notes.last().unwrap_or(&60);
        if high <= prev_high + 3 && best_constrained.is_none_or(|(d, _)| dist < d) {
            best_constrained = Some((dist, cand));
        }
        if best_any.is_none_or(|(d, _)| dist < d) {
            best_any = Some((dist, cand));
        }
    }

    best_constrained
        .or(best_any)
        .map(|(_, c)| c)
        .ok_or_else(|| ChorgiError::Generation("no smooth-random candidate found".into()))
}

fn average_pitch(notes: &[u8]) -> f64 {
    if notes.is_empty() {
        return 0.0;
    }
    notes.iter().map(|&n| n as f64).sum::<f64>() / notes.len() as f64
}

/// Force the final chord pair to the selected cadence.
fn apply_cadence(
    symbols: &mut [ChordSymbol],
    pool: &ChordPool,
    mode: KeyMode,
    cadence: Cadence,
) -> Result<()> {
    if cadence == Cadence::Any {
        return Ok(());
    }
    if symbols.len() < 2 {
        return Err(ChorgiError::Generation(format!(
            "cadence {cadence} needs at least two chords, progression has {}",
            symbols.len()
        )));
    }

    let tonic = find_degree(pool, mode, 0, false)?;
    let approach = match cadence {
        Cadence::Authentic => find_dominant(pool, mode)?,
        Cadence::Plagal => find_degree(pool, mode, 3, false)?,
        Cadence::Any => unreachable!(),
    };

    let last = symbols.len() - 1;
    let duration = symbols[last].duration_beats;
    symbols[last] = ChordSymbol::from_pool(tonic, duration);
    let duration = symbols[last - 1].duration_beats;
    symbols[last - 1] = ChordSymbol::from_pool(approach, duration);
    Ok(())
}

fn find_degree(
    pool: &ChordPool,
    mode: KeyMode,
    degree: usize,
    prefer_seventh: bool,
) -> Result<&PoolChord> {
    let function = degree_label(mode, degree);
    pool.find_by_function(function, prefer_seventh)
        .ok_or_else(|| ChorgiError::Generation(format!("pool has no {function} chord")))
}

/// The dominant for cadences: the borrowed major "V" when present (minor
/// keys), otherwise the diatonic fifth degree, seventh preferred.
fn find_dominant<'a>(pool: &'a ChordPool, mode: KeyMode) -> Result<&'a PoolChord> {
    if let Some(borrowed) = pool.find_by_function("V", true) {
        return Ok(borrowed);
    }
    find_degree(pool, mode, 4, true)
}

/// The fixed 12-bar blues: I I I I / IV IV I I / V IV I V, one chord per
/// bar. Bar counts other than 12 are rejected.
fn generate_blues(key: Key, bars: u32) -> Result<Vec<ChordSymbol>> {
    if bars != 12 {
        return Err(ChorgiError::Configuration(format!(
            "Blues (12 Bar) requires 12 bars, got {bars}"
        )));
    }
    let pool = ChordPool::blues(key);
    let template: &[usize] = &[0, 0, 0, 0, 3, 3, 0, 0, 4, 3, 0, 4];
    template
        .iter()
        .map(|&degree| {
            let function = if degree == 4 {
                // Minor blues still uses a major dominant
                "V"
            } else {
                degree_label(key.mode, degree)
            };
            let chord = pool
                .find_by_function(function, true)
                .ok_or_else(|| ChorgiError::Generation(format!("blues pool has no {function}")))?;
            Ok(ChordSymbol::from_pool(chord, 4.0))
        })
        .collect()
}

/// Voice a symbol sequence and place it on the timeline. Each voicing is
/// chosen relative to the previous one (the inversion style minimizes
/// voice movement chord to chord).
pub fn voice_progression(symbols: Vec<ChordSymbol>, style: VoicingStyle) -> Vec<ChordSpan> {
    let mut spans: Vec<ChordSpan> = Vec::with_capacity(symbols.len());
    let mut start = 0.0;
    let mut prev: Option<Voicing> = None;
    for symbol in symbols {
        let voicing = voice_chord(&symbol, style, prev.as_ref());
        prev = Some(voicing.clone());
        let duration = symbol.duration_beats;
        spans.push(ChordSpan {
            symbol,
            voicing,
            start,
        });
        start += duration;
    }
    spans
}
