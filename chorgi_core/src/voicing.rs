// Chord voicing: turning an abstract chord symbol into concrete pitches.
//
// Styles:
// - Root Position: the close root-position stack, unchanged.
// - Allow Inversions: the inversion with the smallest total voice movement
//   from the previous chord's voicing (first chord stays in root position).
// - Prefer Drop 2: lowers the second-highest note of the close voicing by
//   an octave. Only defined for chords of four or more notes; triads fall
//   back to close position.
// - Quartal: rebuilds the chord as stacked perfect fourths from the root.
// - So What: three fourths plus a major third on top (five notes).
//
// The voicer is deterministic: given the same symbol sequence and style it
// always produces the same voicings.

use crate::chord::ChordSymbol;
use crate::error::{ChorgiError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoicingStyle {
    RootPosition,
    Inversions,
    Drop2,
    Quartal,
    SoWhat,
}

impl FromStr for VoicingStyle {
    type Err = ChorgiError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Root Position" => Ok(VoicingStyle::RootPosition),
            "Allow Inversions" => Ok(VoicingStyle::Inversions),
            "Prefer Drop 2" => Ok(VoicingStyle::Drop2),
            "Quartal" => Ok(VoicingStyle::Quartal),
            "So What" => Ok(VoicingStyle::SoWhat),
            _ => Err(ChorgiError::Configuration(format!(
                "unknown voicing style: {s:?}"
            ))),
        }
    }
}

impl fmt::Display for VoicingStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VoicingStyle::RootPosition => "Root Position",
            VoicingStyle::Inversions => "Allow Inversions",
            VoicingStyle::Drop2 => "Prefer Drop 2",
            VoicingStyle::Quartal => "Quartal",
            VoicingStyle::SoWhat => "So What",
        };
        write!(f, "{s}")
    }
}

/// Concrete pitch realization of one chord symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Voicing {
    /// Pitches, ascending.
    pub notes: Vec<u8>,
    /// Inversion number (0 = root position).
    pub inversion: u8,
    /// True when drop-2 was applied.
    pub dropped: bool,
    /// Display label, e.g. "Am7/Inv1" or "G7/D2".
    pub label: String,
}

/// Voice a chord symbol, optionally relative to the previous voicing
/// (used by the inversion style to minimize voice movement).
pub fn voice_chord(symbol: &ChordSymbol, style: VoicingStyle, prev: Option<&Voicing>) -> Voicing {
    let close = &symbol.notes;
    match style {
        VoicingStyle::RootPosition => plain(symbol, close.clone()),
        VoicingStyle::Inversions => {
            let Some(prev) = prev else {
                return plain(symbol, close.clone());
            };
            let mut best_inv = 0usize;
            let mut best_notes = close.clone();
            let mut best_dist = voice_leading_distance(&best_notes, &prev.notes);
            for inv in 1..close.len() {
                let candidate = invert(close, inv);
                let dist = voice_leading_distance(&candidate, &prev.notes);
                if dist < best_dist {
                    best_dist = dist;
                    best_inv = inv;
                    best_notes = candidate;
                }
            }
            let label = if best_inv > 0 {
                format!("{}/Inv{}", symbol.name, best_inv)
            } else {
                symbol.name.clone()
            };
            Voicing {
                notes: best_notes,
                inversion: best_inv as u8,
                dropped: false,
                label,
            }
        }
        VoicingStyle::Drop2 => match drop2(close) {
            Some(notes) => Voicing {
                notes,
                inversion: 0,
                dropped: true,
                label: format!("{}/D2", symbol.name),
            },
            None => plain(symbol, close.clone()),
        },
        VoicingStyle::Quartal => {
            let count = close.len().clamp(3, 4);
            let notes = (0..count).map(|i| symbol.root + 5 * i as u8).collect();
            plain(symbol, notes)
        }
        VoicingStyle::SoWhat => {
            let notes = [0u8, 5, 10, 15, 19].iter().map(|&iv| symbol.root + iv).collect();
            plain(symbol, notes)
        }
    }
}

fn plain(symbol: &ChordSymbol, notes: Vec<u8>) -> Voicing {
    Voicing {
        notes,
        inversion: 0,
        dropped: false,
        label: symbol.name.clone(),
    }
}

/// Move the lowest `inv` notes up an octave and re-sort.
fn invert(notes: &[u8], inv: usize) -> Vec<u8> {
    let mut out: Vec<u8> = notes
        .iter()
        .enumerate()
        .map(|(i, &n)| if i < inv { n + 12 } else { n })
        .collect();
    out.sort_unstable();
    out
}

/// Drop-2: lower the second-highest note of a close voicing by an octave.
/// Returns None for chords with fewer than four notes.
fn drop2(notes: &[u8]) -> Option<Vec<u8>> {
    if notes.len() < 4 {
        return None;
    }
    let mut out = notes.to_vec();
    let idx = out.len() - 2;
    out[idx] -= 12;
    out.sort_unstable();
    Some(out)
}

/// Total semitone movement across matched voices (both sets sorted).
/// Unmatched voices count a full octave each.
fn voice_leading_distance(a: &[u8], b: &[u8]) -> u32 {
    let matched: u32 = a
        .iter()
        .zip(b.iter())
        .map(|(&x, &y)| (x as i32 - y as i32).unsigned_abs())
        .sum();
    matched + 12 * (a.len().abs_diff(b.len()) as u32)
}
