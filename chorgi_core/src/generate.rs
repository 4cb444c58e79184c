// Generation pipeline.
//
// Everything is a pure function of (Config, seed). Each part draws from its
// own RNG stream, derived by XORing the run seed with a per-part salt, so
// regenerating one part re-runs exactly one generator against the fixed
// progression without disturbing the streams the other parts consumed.
//
// Pipeline order: progression first (every other generator reads its
// output), then chords/arp/melody/bass independently, then assembly into
// the timeline. MIDI serialization is a separate terminal step.

use crate::arp::generate_arp;
use crate::bass::generate_bass;
use crate::chord::ChordSymbol;
use crate::config::Config;
use crate::error::Result;
use crate::melody::generate_melody;
use crate::midi::MidiOptions;
use crate::progression::{self, ChordSpan, progression_beats, voice_progression};
use crate::timeline::{NoteEvent, Part, Timeline};
use rand::SeedableRng;
use rand::rngs::StdRng;

const CHORD_VELOCITY: u8 = 85;

const PROGRESSION_SALT: u64 = 0x70726f67_72657373;
const ARP_SALT: u64 = 0x61727065_67676961;
const MELODY_SALT: u64 = 0x6d656c6f_64796d6c;
const BASS_SALT: u64 = 0x62617373_6c696e65;

fn part_rng(seed: u64, salt: u64) -> StdRng {
    StdRng::seed_from_u64(seed ^ salt)
}

/// Generate the harmonic skeleton: voiced chords at absolute positions.
/// Fixed for the lifetime of a piece; "regenerate part" reuses it.
pub fn generate_progression(config: &Config, seed: u64) -> Result<Vec<ChordSpan>> {
    config.validate()?;
    let mut rng = part_rng(seed, PROGRESSION_SALT);
    let symbols = progression::generate_progression(
        config.key,
        config.pool_style,
        config.complexity,
        config.progression_style,
        config.bars,
        config.chord_rate,
        config.cadence,
        config.harmonic_bias,
        &mut rng,
    )?;
    Ok(voice_progression(symbols, config.voicing_style))
}

/// Block-chord events for the chord lane: each voicing held for its full
/// duration, played an octave below the nominal voicing register.
fn chord_events(spans: &[ChordSpan]) -> Vec<NoteEvent> {
    let mut events = Vec::new();
    for span in spans {
        for pitch in span.playback_notes() {
            events.push(NoteEvent::new(
                pitch,
                span.start,
                span.symbol.duration_beats,
                CHORD_VELOCITY,
                Part::Chord,
            ));
        }
    }
    events
}

/// Run one part's generator against a fixed progression.
pub fn generate_part(
    part: Part,
    config: &Config,
    spans: &[ChordSpan],
    seed: u64,
) -> Result<Vec<NoteEvent>> {
    config.validate()?;
    let events = match part {
        Part::Chord => chord_events(spans),
        Part::Arp => generate_arp(
            spans,
            config.key,
            config.arp_pattern,
            config.arp_octaves,
            config.arp_note_value,
            config.arp_triplets,
            &mut part_rng(seed, ARP_SALT),
        ),
        Part::Melody => generate_melody(
            spans,
            config.key,
            config.melody_algorithm,
            config.melody_articulation,
            config.melody_speed,
            config.melody_register,
            config.melody_instrument,
            &mut part_rng(seed, MELODY_SALT),
        ),
        Part::Bass => generate_bass(
            spans,
            config.key,
            config.bass_style,
            &mut part_rng(seed, BASS_SALT),
        ),
    };
    Ok(events)
}

fn included(part: Part, config: &Config) -> bool {
    match part {
        Part::Chord => config.include_chords,
        Part::Arp => config.include_arp,
        Part::Melody => config.include_melody,
        Part::Bass => config.include_bass,
    }
}

/// Full generation run: progression plus every included part, assembled.
pub fn generate_full(config: &Config, seed: u64) -> Result<Timeline> {
    let spans = generate_progression(config, seed)?;
    let mut timeline = Timeline::new(progression_beats(&spans));
    for part in Part::ALL {
        if included(part, config) {
            timeline.set_part(part, generate_part(part, config, &spans, seed)?);
        }
    }
    Ok(timeline)
}

/// Re-run exactly one part with a fresh seed and install it, leaving the
/// progression and every other lane untouched.
pub fn regenerate_part(
    part: Part,
    config: &Config,
    spans: &[ChordSpan],
    timeline: &mut Timeline,
    seed: u64,
) -> Result<()> {
    let events = generate_part(part, config, spans, seed)?;
    timeline.set_part(part, events);
    Ok(())
}

/// The chord-name summary a front end displays, e.g. "C - G - Am - F".
pub fn progression_summary(spans: &[ChordSpan]) -> String {
    spans
        .iter()
        .map(|s| s.voicing.label.as_str())
        .collect::<Vec<_>>()
        .join(" - ")
}

/// Serialization parameters derived from a config.
pub fn midi_options(config: &Config) -> MidiOptions {
    MidiOptions {
        bpm: config.bpm,
        embed_tempo: config.embed_tempo,
        title: config.title(),
        melody_program: config.melody_instrument.program(),
        bass_program: config.bass_style.program(),
    }
}

/// The abstract chord sequence, without voicing or placement.
pub fn chord_symbols(spans: &[ChordSpan]) -> Vec<&ChordSymbol> {
    spans.iter().map(|s| &s.symbol).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progression::ProgressionStyle;

    #[test]
    fn full_run_is_deterministic() {
        let config = Config::default();
        let a = generate_full(&config, 1234).unwrap();
        let b = generate_full(&config, 1234).unwrap();
        assert_eq!(a, b);
        assert!(!a.is_empty());
        assert!(a.events_within_bounds());
    }

    #[test]
    fn different_seeds_differ() {
        let config = Config::default();
        let a = generate_full(&config, 1).unwrap();
        let b = generate_full(&config, 2).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn toggles_leave_lanes_empty() {
        let config = Config {
            include_arp: false,
            include_bass: false,
            ..Config::default()
        };
        let timeline = generate_full(&config, 7).unwrap();
        assert!(timeline.part(Part::Arp).is_empty());
        assert!(timeline.part(Part::Bass).is_empty());
        assert!(!timeline.part(Part::Chord).is_empty());
        assert!(!timeline.part(Part::Melody).is_empty());
    }

    #[test]
    fn regenerate_part_leaves_other_lanes_untouched() {
        let config = Config::default();
        let seed = 42;
        let spans = generate_progression(&config, seed).unwrap();
        let mut timeline = generate_full(&config, seed).unwrap();

        let chords_before = timeline.part(Part::Chord).to_vec();
        let arp_before = timeline.part(Part::Arp).to_vec();
        let bass_before = timeline.part(Part::Bass).to_vec();

        regenerate_part(Part::Melody, &config, &spans, &mut timeline, seed + 1).unwrap();

        assert_eq!(timeline.part(Part::Chord), chords_before.as_slice());
        assert_eq!(timeline.part(Part::Arp), arp_before.as_slice());
        assert_eq!(timeline.part(Part::Bass), bass_before.as_slice());
    }

    #[test]
    fn regenerate_with_same_seed_reproduces_the_lane() {
        let config = Config::default();
        let seed = 42;
        let spans = generate_progression(&config, seed).unwrap();
        let mut timeline = generate_full(&config, seed).unwrap();
        let melody_before = timeline.part(Part::Melody).to_vec();

        regenerate_part(Part::Melody, &config, &spans, &mut timeline, seed).unwrap();
        assert_eq!(timeline.part(Part::Melody), melody_before.as_slice());
    }

    #[test]
    fn progression_is_independent_of_part_options() {
        // Changing a melody option must not shift the harmonic skeleton
        let a = Config::default();
        let b = Config {
            melody_speed: crate::melody::MelodySpeed::Fast,
            arp_triplets: true,
            ..Config::default()
        };
        let spans_a = generate_progression(&a, 9).unwrap();
        let spans_b = generate_progression(&b, 9).unwrap();
        assert_eq!(spans_a, spans_b);
    }

    #[test]
    fn invalid_config_fails_before_generation() {
        let config = Config {
            progression_style: ProgressionStyle::Blues12Bar,
            bars: 8,
            ..Config::default()
        };
        assert!(generate_full(&config, 0).is_err());
        assert!(generate_progression(&config, 0).is_err());
    }

    #[test]
    fn summary_joins_voicing_labels() {
        let config = Config::default();
        let spans = generate_progression(&config, 5).unwrap();
        let summary = progression_summary(&spans);
        assert_eq!(summary.matches(" - ").count(), spans.len() - 1);
        assert!(summary.starts_with(&spans[0].voicing.label));
    }

    #[test]
    fn chord_lane_tiles_the_timeline() {
        let config = Config::default();
        let timeline = generate_full(&config, 3).unwrap();
        let chords = timeline.part(Part::Chord);
        assert!((timeline.total_beats - config.bars as f64 * 4.0).abs() < 1e-9);
        assert!(chords.iter().all(|e| e.velocity == CHORD_VELOCITY));
        // Some chord sounds at every beat
        let mut t = 0.0;
        while t < timeline.total_beats - 1e-6 {
            assert!(
                chords.iter().any(|e| e.start <= t + 1e-6 && e.end() >= t + 1e-6),
                "gap at beat {t}"
            );
            t += 1.0;
        }
    }
}
