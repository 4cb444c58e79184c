// Key and scale model.
//
// A Key is a root pitch class plus a mode (major or natural minor). It is
// fixed before generation starts and never mutated by the generators.
//
// This module provides:
// - Diatonic interval tables and pitch-class membership
// - Scale notes around the reference octave (root anchored at MIDI 60)
// - Snapping arbitrary pitches to the nearest in-scale pitch
// - Extended scales spanning several octaves for melodic/bass walking
// - Note-name parsing and display ("C", "F#", minor keys spelled "Am")
//
// Used by every generator; the chord module builds its diatonic pools on
// top of these tables.

use crate::error::{ChorgiError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Pitch-class names, sharps only (the original option set).
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Name of a pitch class 0-11.
pub fn pitch_name(pc: u8) -> &'static str {
    NOTE_NAMES[(pc % 12) as usize]
}

/// Major or natural minor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyMode {
    Major,
    Minor,
}

impl KeyMode {
    /// Semitone intervals from the root to each scale degree.
    pub fn intervals(self) -> [u8; 7] {
        match self {
            KeyMode::Major => [0, 2, 4, 5, 7, 9, 11],
            KeyMode::Minor => [0, 2, 3, 5, 7, 8, 10],
        }
    }
}

/// A key: root pitch class plus mode. Immutable once generation starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    /// Pitch class of the root (0 = C, 1 = C#, ...).
    pub root_pc: u8,
    pub mode: KeyMode,
}

impl Key {
    pub fn new(root_pc: u8, mode: KeyMode) -> Self {
        Key {
            root_pc: root_pc % 12,
            mode,
        }
    }

    /// Root note in the reference octave (middle C = 60).
    pub fn root_midi(&self) -> u8 {
        60 + self.root_pc
    }

    /// The seven diatonic notes starting from the reference-octave root.
    pub fn scale_notes(&self) -> [u8; 7] {
        let root = self.root_midi();
        self.mode.intervals().map(|iv| root + iv)
    }

    /// In-scale pitch classes as a boolean array indexed by pitch class.
    pub fn pitch_classes(&self) -> [bool; 12] {
        let mut pcs = [false; 12];
        for iv in self.mode.intervals() {
            pcs[((self.root_pc + iv) % 12) as usize] = true;
        }
        pcs
    }

    /// Check if a MIDI pitch is diatonic to this key.
    pub fn is_in_scale(&self, pitch: u8) -> bool {
        self.pitch_classes()[(pitch % 12) as usize]
    }

    /// Snap a pitch to the nearest in-scale pitch (preferring downward on ties).
    pub fn snap_to_scale(&self, pitch: u8) -> u8 {
        if self.is_in_scale(pitch) {
            return pitch;
        }
        for offset in 1u8..=6 {
            if pitch >= offset && self.is_in_scale(pitch - offset) {
                return pitch - offset;
            }
            if pitch as u16 + offset as u16 <= 127 && self.is_in_scale(pitch + offset) {
                return pitch + offset;
            }
        }
        pitch
    }

    /// All in-scale pitches within `[low, high]`, ascending.
    pub fn extended_scale(&self, low: u8, high: u8) -> Vec<u8> {
        (low..=high).filter(|&p| self.is_in_scale(p)).collect()
    }

    /// Display name: "C", "F#", "Am", "C#m".
    pub fn name(&self) -> String {
        match self.mode {
            KeyMode::Major => pitch_name(self.root_pc).to_string(),
            KeyMode::Minor => format!("{}m", pitch_name(self.root_pc)),
        }
    }
}

/// In-scale pitches within `max_step` scale degrees of `current`.
/// `scale` must be sorted ascending (as produced by [`Key::extended_scale`]).
pub fn stepwise_notes(current: u8, scale: &[u8], max_step: usize) -> Vec<u8> {
    if scale.is_empty() {
        return Vec::new();
    }
    let closest = scale
        .iter()
        .enumerate()
        .min_by_key(|&(_, &n)| (n as i16 - current as i16).unsigned_abs())
        .map(|(i, _)| i)
        .unwrap_or(0);
    let mut out = Vec::new();
    for step in 1..=max_step {
        if closest >= step {
            out.push(scale[closest - step]);
        }
        if closest + step < scale.len() {
            out.push(scale[closest + step]);
        }
    }
    out
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Key {
    type Err = ChorgiError;

    fn from_str(s: &str) -> Result<Self> {
        let (root_name, mode) = match s.strip_suffix('m') {
            // "Bm" is minor, but a bare "m" is not a key
            Some(root) if !root.is_empty() => (root, KeyMode::Minor),
            _ => (s, KeyMode::Major),
        };
        let root_pc = NOTE_NAMES
            .iter()
            .position(|&n| n == root_name)
            .ok_or_else(|| ChorgiError::Configuration(format!("unknown key: {s:?}")))?;
        Ok(Key::new(root_pc as u8, mode))
    }
}
