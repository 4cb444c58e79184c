// Generation configuration.
//
// A Config is the full set of enumerated options a caller (GUI, CLI) picks
// before generation. It is read-only input to the pipeline: generators
// never mutate it, and together with a seed it fully determines the output.
//
// Serde round-trips as JSON so a front end can persist presets. All option
// enums also parse from their display strings, so a flat string-keyed
// front end can feed this directly.

use crate::arp::{ArpOctaves, ArpPattern, NoteValue};
use crate::bass::BassStyle;
use crate::chord::{Complexity, PoolStyle};
use crate::error::{ChorgiError, Result};
use crate::key::{Key, KeyMode};
use crate::melody::{Articulation, InstrumentHint, MelodyAlgorithm, MelodyRegister, MelodySpeed};
use crate::progression::{Cadence, ChordRate, HarmonicBias, ProgressionStyle};
use crate::voicing::VoicingStyle;
use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

/// Bar counts offered by the front end.
pub const BAR_OPTIONS: [u32; 5] = [4, 8, 12, 16, 24];

/// The full option set for one generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub key: Key,
    pub pool_style: PoolStyle,
    pub complexity: Complexity,
    pub progression_style: ProgressionStyle,
    pub bars: u32,
    pub chord_rate: ChordRate,
    pub voicing_style: VoicingStyle,
    pub cadence: Cadence,
    pub harmonic_bias: HarmonicBias,
    pub bpm: u16,
    pub embed_tempo: bool,

    pub arp_pattern: ArpPattern,
    pub arp_octaves: ArpOctaves,
    pub arp_note_value: NoteValue,
    pub arp_triplets: bool,

    pub melody_algorithm: MelodyAlgorithm,
    pub melody_articulation: Articulation,
    pub melody_speed: MelodySpeed,
    pub melody_register: MelodyRegister,
    pub melody_instrument: InstrumentHint,

    pub bass_style: BassStyle,

    pub include_chords: bool,
    pub include_arp: bool,
    pub include_melody: bool,
    pub include_bass: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            key: Key::new(0, KeyMode::Major),
            pool_style: PoolStyle::Chorgi,
            complexity: Complexity::Standard,
            progression_style: ProgressionStyle::SmoothRandom,
            bars: 8,
            chord_rate: ChordRate::OnePerBar,
            voicing_style: VoicingStyle::RootPosition,
            cadence: Cadence::Any,
            harmonic_bias: HarmonicBias::Standard,
            bpm: 120,
            embed_tempo: true,
            arp_pattern: ArpPattern::RandomConsistent,
            arp_octaves: ArpOctaves::Original,
            arp_note_value: NoteValue::Eighth,
            arp_triplets: false,
            melody_algorithm: MelodyAlgorithm::ChordFocus,
            melody_articulation: Articulation::Legato,
            melody_speed: MelodySpeed::Medium,
            melody_register: MelodyRegister::Mid,
            melody_instrument: InstrumentHint::None,
            bass_style: BassStyle::Standard,
            include_chords: true,
            include_arp: true,
            include_melody: true,
            include_bass: true,
        }
    }
}

impl Config {
    /// Reject option combinations no generator can honor. Runs before any
    /// generation so failures carry no partial output.
    pub fn validate(&self) -> Result<()> {
        // The MIDI tempo meta stores microseconds per beat in 24 bits, so
        // anything under 4 BPM does not fit.
        if self.bpm < 4 {
            return Err(ChorgiError::Configuration(format!(
                "bpm must be at least 4, got {}",
                self.bpm
            )));
        }
        if self.bars == 0 {
            return Err(ChorgiError::Configuration(
                "bar count must be positive".into(),
            ));
        }
        if self.progression_style == ProgressionStyle::Blues12Bar && self.bars != 12 {
            return Err(ChorgiError::Configuration(format!(
                "Blues (12 Bar) requires exactly 12 bars, got {}",
                self.bars
            )));
        }
        Ok(())
    }

    /// Re-roll every option. The seeded stand-in for the front end's
    /// dice button; always leaves the config valid.
    pub fn randomize(&mut self, rng: &mut impl Rng) {
        self.key = Key::new(
            rng.random_range(0..12),
            if rng.random_bool(0.5) {
                KeyMode::Major
            } else {
                KeyMode::Minor
            },
        );
        pick(rng, &[PoolStyle::Chorgi, PoolStyle::Jazzy], &mut self.pool_style);
        pick(
            rng,
            &[Complexity::Standard, Complexity::Extra],
            &mut self.complexity,
        );
        pick(
            rng,
            &[
                ProgressionStyle::SmoothRandom,
                ProgressionStyle::Pop,
                ProgressionStyle::Pachelbel,
                ProgressionStyle::TwoFiveOne,
                ProgressionStyle::Blues12Bar,
            ],
            &mut self.progression_style,
        );
        pick(rng, &BAR_OPTIONS, &mut self.bars);
        if self.progression_style == ProgressionStyle::Blues12Bar {
            self.bars = 12;
        }
        pick(
            rng,
            &[ChordRate::OnePerBar, ChordRate::TwoPerBar],
            &mut self.chord_rate,
        );
        pick(
            rng,
            &[
                VoicingStyle::RootPosition,
                VoicingStyle::Inversions,
                VoicingStyle::Drop2,
                VoicingStyle::Quartal,
                VoicingStyle::SoWhat,
            ],
            &mut self.voicing_style,
        );
        pick(
            rng,
            &[Cadence::Any, Cadence::Authentic, Cadence::Plagal],
            &mut self.cadence,
        );
        pick(
            rng,
            &[
                HarmonicBias::Standard,
                HarmonicBias::Darker,
                HarmonicBias::Lighter,
            ],
            &mut self.harmonic_bias,
        );
        self.bpm = rng.random_range(60..=180);
        self.embed_tempo = rng.random_bool(0.5);

        pick(
            rng,
            &[
                ArpPattern::RandomConsistent,
                ArpPattern::RandomPerBar,
                ArpPattern::Ascending,
                ArpPattern::Descending,
                ArpPattern::UpDown,
                ArpPattern::RandomNotes,
                ArpPattern::ConvergeDiverge,
            ],
            &mut self.arp_pattern,
        );
        pick(
            rng,
            &[
                ArpOctaves::Original,
                ArpOctaves::Up1,
                ArpOctaves::Down1,
                ArpOctaves::Up2,
                ArpOctaves::Down2,
                ArpOctaves::Up3,
                ArpOctaves::Down3,
            ],
            &mut self.arp_octaves,
        );
        pick(
            rng,
            &[NoteValue::Quarter, NoteValue::Eighth, NoteValue::Sixteenth],
            &mut self.arp_note_value,
        );
        self.arp_triplets = rng.random_bool(0.5);

        pick(
            rng,
            &[
                MelodyAlgorithm::ChordFocus,
                MelodyAlgorithm::ScaleWalker,
                MelodyAlgorithm::Experimental,
                MelodyAlgorithm::LeapsSteps,
                MelodyAlgorithm::Minimalist,
                MelodyAlgorithm::SustainedLead,
                MelodyAlgorithm::RandomStyle,
            ],
            &mut self.melody_algorithm,
        );
        pick(
            rng,
            &[Articulation::Legato, Articulation::Staccato],
            &mut self.melody_articulation,
        );
        pick(
            rng,
            &[MelodySpeed::Slow, MelodySpeed::Medium, MelodySpeed::Fast],
            &mut self.melody_speed,
        );
        pick(
            rng,
            &[MelodyRegister::Mid, MelodyRegister::High],
            &mut self.melody_register,
        );
        pick(
            rng,
            &[
                InstrumentHint::None,
                InstrumentHint::SynthLead,
                InstrumentHint::Keys,
                InstrumentHint::Piano,
                InstrumentHint::Pluck,
            ],
            &mut self.melody_instrument,
        );
        pick(
            rng,
            &[
                BassStyle::Standard,
                BassStyle::Walking,
                BassStyle::Pop,
                BassStyle::Rnb,
                BassStyle::HipHop,
                BassStyle::EightOhEight,
            ],
            &mut self.bass_style,
        );

        // Chords always stay in; the other parts toggle freely
        self.include_arp = rng.random_bool(0.5);
        self.include_melody = rng.random_bool(0.5);
        self.include_bass = rng.random_bool(0.5);
    }

    /// Title used for the MIDI conductor track.
    pub fn title(&self) -> String {
        format!("Chorgi {} {}", self.key.name(), self.progression_style)
    }
}

fn pick<T: Copy>(rng: &mut impl Rng, options: &[T], slot: &mut T) {
    if let Some(&choice) = options.choose(rng) {
        *slot = choice;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_bpm_and_bars() {
        let config = Config {
            bpm: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            bars: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_bpm_below_tempo_meta_range() {
        // 60,000,000 / bpm must fit in the 24-bit tempo meta
        for bpm in [1, 2, 3] {
            let config = Config {
                bpm,
                ..Config::default()
            };
            assert!(config.validate().is_err(), "bpm {bpm}");
        }
        let config = Config {
            bpm: 4,
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_blues_with_wrong_bar_count() {
        let mut config = Config {
            progression_style: ProgressionStyle::Blues12Bar,
            bars: 8,
            ..Config::default()
        };
        assert!(config.validate().is_err());
        config.bars = 12;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn randomize_always_produces_valid_configs() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut config = Config::default();
        for _ in 0..200 {
            config.randomize(&mut rng);
            assert!(config.validate().is_ok(), "{config:?}");
            assert!(config.include_chords);
            assert!((60..=180).contains(&config.bpm));
            assert!(BAR_OPTIONS.contains(&config.bars));
        }
    }

    #[test]
    fn randomize_is_seed_deterministic() {
        let mut a = Config::default();
        let mut b = Config::default();
        a.randomize(&mut StdRng::seed_from_u64(99));
        b.randomize(&mut StdRng::seed_from_u64(99));
        assert_eq!(a, b);
    }

    #[test]
    fn json_roundtrip() {
        let mut config = Config::default();
        config.randomize(&mut StdRng::seed_from_u64(7));
        let json = serde_json::to_string(&config).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
