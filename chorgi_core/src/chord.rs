// Chord qualities and diatonic chord pools.
//
// A chord pool is the harmonic vocabulary available to the progression
// generator for one key: every diatonic degree realized as triads,
// sevenths, and (at the Extra complexity level) ninths, each labeled with
// its harmonic function ("I", "ii", ... in major; "i", "III", ... in
// minor). Two pool flavors exist: Chorgi (triad-forward, with sus colors
// on I/IV/V) and Jazzy (seventh-forward). The 12-bar blues progression
// uses its own small dominant-seventh pool.
//
// Minor pools additionally carry the borrowed dominant ("V" as a major
// dominant seventh) so authentic cadences resolve properly.

use crate::error::{ChorgiError, Result};
use crate::key::{Key, KeyMode, pitch_name};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Chord quality: the interval recipe above the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChordQuality {
    Major,
    Minor,
    Diminished,
    Sus2,
    Sus4,
    Major6,
    Major7,
    Minor7,
    Dominant7,
    HalfDiminished7,
    Major9,
    Minor9,
    Dominant9,
}

impl ChordQuality {
    /// Semitone intervals from the root, low to high.
    pub fn intervals(self) -> &'static [u8] {
        match self {
            ChordQuality::Major => &[0, 4, 7],
            ChordQuality::Minor => &[0, 3, 7],
            ChordQuality::Diminished => &[0, 3, 6],
            ChordQuality::Sus2 => &[0, 2, 7],
            ChordQuality::Sus4 => &[0, 5, 7],
            ChordQuality::Major6 => &[0, 4, 7, 9],
            ChordQuality::Major7 => &[0, 4, 7, 11],
            ChordQuality::Minor7 => &[0, 3, 7, 10],
            ChordQuality::Dominant7 => &[0, 4, 7, 10],
            ChordQuality::HalfDiminished7 => &[0, 3, 6, 10],
            ChordQuality::Major9 => &[0, 4, 7, 11, 14],
            ChordQuality::Minor9 => &[0, 3, 7, 10, 14],
            ChordQuality::Dominant9 => &[0, 4, 7, 10, 14],
        }
    }

    /// Suffix used in chord names ("Cm7", "G7", "Fsus4"...).
    pub fn symbol(self) -> &'static str {
        match self {
            ChordQuality::Major => "",
            ChordQuality::Minor => "m",
            ChordQuality::Diminished => "dim",
            ChordQuality::Sus2 => "sus2",
            ChordQuality::Sus4 => "sus4",
            ChordQuality::Major6 => "6",
            ChordQuality::Major7 => "maj7",
            ChordQuality::Minor7 => "m7",
            ChordQuality::Dominant7 => "7",
            ChordQuality::HalfDiminished7 => "m7b5",
            ChordQuality::Major9 => "maj9",
            ChordQuality::Minor9 => "m9",
            ChordQuality::Dominant9 => "9",
        }
    }

    /// Minor-flavored qualities, favored by the Darker harmonic bias.
    pub fn is_dark(self) -> bool {
        matches!(
            self,
            ChordQuality::Minor
                | ChordQuality::Diminished
                | ChordQuality::Minor7
                | ChordQuality::HalfDiminished7
                | ChordQuality::Minor9
        )
    }

    /// Major/sus-flavored qualities, favored by the Lighter harmonic bias.
    pub fn is_light(self) -> bool {
        matches!(
            self,
            ChordQuality::Major
                | ChordQuality::Sus2
                | ChordQuality::Sus4
                | ChordQuality::Major6
                | ChordQuality::Major7
                | ChordQuality::Major9
        )
    }

    /// Rank for function lookups: lower is better. Sevenths win when
    /// `prefer_seventh`, plain triads otherwise; sus colors come last so
    /// templates and cadences land on the plain chord.
    fn lookup_rank(self, prefer_seventh: bool) -> u8 {
        let class = match self.intervals().len() {
            3 if matches!(self, ChordQuality::Sus2 | ChordQuality::Sus4) => 3,
            3 => 0,
            4 => 1,
            _ => 2,
        };
        match (prefer_seventh, class) {
            (true, 1) => 0,
            (true, 0) => 1,
            (false, 0) => 0,
            (false, 1) => 1,
            (_, other) => other,
        }
    }
}

/// How rich the generated pools are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Complexity {
    /// Triads and sevenths only.
    Standard,
    /// Adds ninth extensions.
    Extra,
}

impl FromStr for Complexity {
    type Err = ChorgiError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Standard (Triads/7ths)" => Ok(Complexity::Standard),
            "Extra (Extensions)" => Ok(Complexity::Extra),
            _ => Err(ChorgiError::Configuration(format!(
                "unknown chord complexity: {s:?}"
            ))),
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Complexity::Standard => "Standard (Triads/7ths)",
            Complexity::Extra => "Extra (Extensions)",
        };
        write!(f, "{s}")
    }
}

/// Which harmonic vocabulary the pool draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolStyle {
    Chorgi,
    Jazzy,
}

impl FromStr for PoolStyle {
    type Err = ChorgiError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Chorgi" => Ok(PoolStyle::Chorgi),
            "Jazzy" => Ok(PoolStyle::Jazzy),
            _ => Err(ChorgiError::Configuration(format!(
                "unknown pool style: {s:?}"
            ))),
        }
    }
}

impl fmt::Display for PoolStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PoolStyle::Chorgi => "Chorgi",
            PoolStyle::Jazzy => "Jazzy",
        };
        write!(f, "{s}")
    }
}

/// One chord available in a pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolChord {
    /// Display name, e.g. "Am7".
    pub name: String,
    /// Harmonic function label, e.g. "vi" (major key) or "i" (minor key).
    pub function: String,
    /// Root note in the reference octave.
    pub root: u8,
    pub quality: ChordQuality,
    /// Root-position pitches, ascending.
    pub notes: Vec<u8>,
}

impl PoolChord {
    fn new(function: &str, root: u8, quality: ChordQuality) -> Self {
        let notes = quality.intervals().iter().map(|&iv| root + iv).collect();
        PoolChord {
            name: format!("{}{}", pitch_name(root % 12), quality.symbol()),
            function: function.to_string(),
            root,
            quality,
            notes,
        }
    }
}

/// Degree labels in major and natural minor.
const MAJOR_DEGREES: [&str; 7] = ["I", "ii", "iii", "IV", "V", "vi", "vii"];
const MINOR_DEGREES: [&str; 7] = ["i", "ii", "III", "iv", "v", "VI", "VII"];

/// Function label of a scale degree (0-6) in the given mode.
pub fn degree_label(mode: KeyMode, degree: usize) -> &'static str {
    match mode {
        KeyMode::Major => MAJOR_DEGREES[degree % 7],
        KeyMode::Minor => MINOR_DEGREES[degree % 7],
    }
}

/// Diatonic triad qualities per degree.
const MAJOR_TRIADS: [ChordQuality; 7] = [
    ChordQuality::Major,
    ChordQuality::Minor,
    ChordQuality::Minor,
    ChordQuality::Major,
    ChordQuality::Major,
    ChordQuality::Minor,
    ChordQuality::Diminished,
];
const MINOR_TRIADS: [ChordQuality; 7] = [
    ChordQuality::Minor,
    ChordQuality::Diminished,
    ChordQuality::Major,
    ChordQuality::Minor,
    ChordQuality::Minor,
    ChordQuality::Major,
    ChordQuality::Major,
];

/// Diatonic seventh qualities per degree.
const MAJOR_SEVENTHS: [ChordQuality; 7] = [
    ChordQuality::Major7,
    ChordQuality::Minor7,
    ChordQuality::Minor7,
    ChordQuality::Major7,
    ChordQuality::Dominant7,
    ChordQuality::Minor7,
    ChordQuality::HalfDiminished7,
];
const MINOR_SEVENTHS: [ChordQuality; 7] = [
    ChordQuality::Minor7,
    ChordQuality::HalfDiminished7,
    ChordQuality::Major7,
    ChordQuality::Minor7,
    ChordQuality::Minor7,
    ChordQuality::Major7,
    ChordQuality::Dominant7,
];

/// The harmonic vocabulary for one key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChordPool {
    pub chords: Vec<PoolChord>,
}

impl ChordPool {
    /// Build the diatonic pool for a key in the given style and complexity.
    pub fn diatonic(key: Key, style: PoolStyle, complexity: Complexity) -> Self {
        let intervals = key.mode.intervals();
        let (degrees, triads, sevenths) = match key.mode {
            KeyMode::Major => (MAJOR_DEGREES, MAJOR_TRIADS, MAJOR_SEVENTHS),
            KeyMode::Minor => (MINOR_DEGREES, MINOR_TRIADS, MINOR_SEVENTHS),
        };

        let mut chords = Vec::new();
        for (deg, &iv) in intervals.iter().enumerate() {
            let root = key.root_midi() + iv;
            let function = degrees[deg];
            if style == PoolStyle::Chorgi {
                chords.push(PoolChord::new(function, root, triads[deg]));
            }
            chords.push(PoolChord::new(function, root, sevenths[deg]));
        }

        if style == PoolStyle::Chorgi {
            // Sus colors on the primary degrees
            for deg in [0usize, 3, 4] {
                let root = key.root_midi() + intervals[deg];
                chords.push(PoolChord::new(degrees[deg], root, ChordQuality::Sus4));
            }
        }

        if key.mode == KeyMode::Minor {
            // Borrowed dominant so V resolves as a real dominant
            let root = key.root_midi() + intervals[4];
            chords.push(PoolChord::new("V", root, ChordQuality::Dominant7));
        }

        if complexity == Complexity::Extra {
            let ninths: &[(usize, ChordQuality)] = match key.mode {
                KeyMode::Major => &[
                    (0, ChordQuality::Major9),
                    (1, ChordQuality::Minor9),
                    (4, ChordQuality::Dominant9),
                    (5, ChordQuality::Minor9),
                ],
                KeyMode::Minor => &[
                    (0, ChordQuality::Minor9),
                    (3, ChordQuality::Minor9),
                    (4, ChordQuality::Dominant9),
                ],
            };
            for &(deg, quality) in ninths {
                let root = key.root_midi() + intervals[deg];
                chords.push(PoolChord::new(degrees[deg], root, quality));
            }
        }

        ChordPool { chords }
    }

    /// The small I7/IV7/V7 pool used by the 12-bar blues progression.
    /// Minor keys use i7/iv7 with a dominant V7.
    pub fn blues(key: Key) -> Self {
        let root = key.root_midi();
        let chords = match key.mode {
            KeyMode::Major => vec![
                PoolChord::new("I", root, ChordQuality::Dominant7),
                PoolChord::new("IV", root + 5, ChordQuality::Dominant7),
                PoolChord::new("V", root + 7, ChordQuality::Dominant7),
            ],
            KeyMode::Minor => vec![
                PoolChord::new("i", root, ChordQuality::Minor7),
                PoolChord::new("iv", root + 5, ChordQuality::Minor7),
                PoolChord::new("V", root + 7, ChordQuality::Dominant7),
            ],
        };
        ChordPool { chords }
    }

    /// Look up a chord by its harmonic function. `prefer_seventh` picks the
    /// seventh realization over the plain triad when both exist.
    pub fn find_by_function(&self, function: &str, prefer_seventh: bool) -> Option<&PoolChord> {
        self.chords
            .iter()
            .filter(|c| c.function == function)
            .min_by_key(|c| c.quality.lookup_rank(prefer_seventh))
    }
}

/// One chord instance in a progression: an abstract symbol with a duration.
/// The notes are root position; voicing happens later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChordSymbol {
    pub name: String,
    pub function: String,
    /// Root note in the reference octave.
    pub root: u8,
    pub quality: ChordQuality,
    /// Root-position pitches, ascending.
    pub notes: Vec<u8>,
    pub duration_beats: f64,
}

impl ChordSymbol {
    pub fn from_pool(chord: &PoolChord, duration_beats: f64) -> Self {
        ChordSymbol {
            name: chord.name.clone(),
            function: chord.function.clone(),
            root: chord.root,
            quality: chord.quality,
            notes: chord.notes.clone(),
            duration_beats,
        }
    }
}
