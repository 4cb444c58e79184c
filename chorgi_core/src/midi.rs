// MIDI output from the assembled timeline.
//
// Converts a Timeline into a Standard MIDI File for the DAW. Each part maps
// to its own track and channel. Beat positions map to ticks at a fixed
// division of 480 per quarter note.
//
// 808 slide metadata becomes a pitch-bend ramp across the note, using a
// bend sensitivity of 12 semitones (set via RPN 0 at the top of the bass
// track when any slide is present) so a one-octave glide spans the full
// bend range. The wheel is re-centered after the note ends.
//
// Uses the `midly` crate for MIDI writing. Output is SMF Format 1
// (multi-track); re-parsing the emitted bytes reproduces every note at
// tick resolution.

use crate::error::{ChorgiError, Result};
use crate::timeline::{NoteEvent, Part, Timeline};
use midly::{
    Format, Header, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u14, u15, u24, u28},
};
use std::path::Path;

/// Ticks per quarter note in MIDI output.
pub const TICKS_PER_QUARTER: u16 = 480;

/// Semitone range the pitch wheel covers at full deflection.
const BEND_RANGE_SEMITONES: f64 = 12.0;
const BEND_CENTER: i32 = 8192;
/// Number of intermediate wheel positions per slide.
const SLIDE_STEPS: u32 = 16;

/// Serialization parameters that are not part of the timeline itself.
#[derive(Debug, Clone)]
pub struct MidiOptions {
    pub bpm: u16,
    /// Write a tempo meta event into the conductor track.
    pub embed_tempo: bool,
    /// Conductor-track name, e.g. "Chorgi C Pop".
    pub title: String,
    /// General MIDI program for the melody track.
    pub melody_program: u8,
    /// General MIDI program for the bass track.
    pub bass_program: u8,
}

fn beats_to_ticks(beats: f64) -> u32 {
    (beats * TICKS_PER_QUARTER as f64).round() as u32
}

fn channel_for(part: Part) -> u4 {
    u4::new(part.index() as u8)
}

fn program_for(part: Part, options: &MidiOptions) -> u8 {
    match part {
        Part::Chord => 0, // acoustic grand
        Part::Arp => 81,  // saw lead
        Part::Melody => options.melody_program,
        Part::Bass => options.bass_program,
    }
}

/// Ordering key for events sharing a tick: note-offs first so re-attacked
/// pitches never collapse into zero-length notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Phase {
    Off = 0,
    Control = 1,
    On = 2,
}

/// Serialize a timeline and write it to `path`.
pub fn write_midi_file(timeline: &Timeline, options: &MidiOptions, path: &Path) -> Result<()> {
    let bytes = to_midi_bytes(timeline, options)?;
    std::fs::write(path, &bytes).map_err(|source| ChorgiError::Serialization {
        path: path.to_path_buf(),
        source,
    })
}

/// Serialize a timeline to MIDI bytes.
pub fn to_midi_bytes(timeline: &Timeline, options: &MidiOptions) -> Result<Vec<u8>> {
    let smf = timeline_to_smf(timeline, options);
    let mut buf = Vec::new();
    smf.write_std(&mut buf)
        .map_err(|source| ChorgiError::Serialization {
            path: Path::new("<memory>").to_path_buf(),
            source,
        })?;
    Ok(buf)
}

fn timeline_to_smf<'a>(timeline: &Timeline, options: &'a MidiOptions) -> Smf<'a> {
    let mut smf = Smf::new(Header::new(
        Format::Parallel,
        Timing::Metrical(u15::new(TICKS_PER_QUARTER)),
    ));

    // Track 0: conductor track (name, optional tempo)
    let mut conductor: Track<'a> = Vec::new();
    conductor.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(midly::MetaMessage::TrackName(options.title.as_bytes())),
    });
    if options.embed_tempo && options.bpm > 0 {
        let tempo_microseconds = 60_000_000 / options.bpm as u32;
        // The tempo meta is 24-bit; Config::validate keeps bpm in range,
        // but never emit a bit-masked value for a hand-built MidiOptions.
        if tempo_microseconds <= 0x00FF_FFFF {
            conductor.push(TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Meta(midly::MetaMessage::Tempo(u24::new(
                    tempo_microseconds,
                ))),
            });
        }
    }
    conductor.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(midly::MetaMessage::EndOfTrack),
    });
    smf.tracks.push(conductor);

    for part in Part::ALL {
        let events = timeline.part(part);
        if events.is_empty() {
            continue;
        }
        smf.tracks.push(part_track(part, events, options));
    }

    smf
}

fn part_track<'a>(part: Part, events: &[NoteEvent], options: &MidiOptions) -> Track<'a> {
    let channel = channel_for(part);
    let mut track: Track<'a> = Vec::new();

    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(midly::MetaMessage::TrackName(part.label().as_bytes())),
    });
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Midi {
            channel,
            message: MidiMessage::ProgramChange {
                program: u7::new(program_for(part, options).min(127)),
            },
        },
    });

    let has_slides = events.iter().any(|e| e.slide_to.is_some());
    if has_slides {
        // RPN 0: pitch bend sensitivity, 12 semitones
        for (controller, value) in [(101u8, 0u8), (100, 0), (6, 12), (38, 0)] {
            track.push(TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Midi {
                    channel,
                    message: MidiMessage::Controller {
                        controller: u7::new(controller),
                        value: u7::new(value),
                    },
                },
            });
        }
    }

    // Absolute-tick event list, then delta-encode.
    let mut timed: Vec<(u32, Phase, MidiMessage)> = Vec::new();
    for event in events {
        let on_tick = beats_to_ticks(event.start);
        let off_tick = beats_to_ticks(event.end()).max(on_tick + 1);
        timed.push((
            on_tick,
            Phase::On,
            MidiMessage::NoteOn {
                key: u7::new(event.pitch.min(127)),
                vel: u7::new(event.velocity.clamp(1, 127)),
            },
        ));
        timed.push((
            off_tick,
            Phase::Off,
            MidiMessage::NoteOff {
                key: u7::new(event.pitch.min(127)),
                vel: u7::new(0),
            },
        ));
        if let Some(target) = event.slide_to {
            for (tick, bend) in slide_ramp(event, target, on_tick, off_tick) {
                timed.push((
                    tick,
                    Phase::Control,
                    MidiMessage::PitchBend {
                        bend: midly::PitchBend(u14::new(bend)),
                    },
                ));
            }
            // Re-center after the note is done
            timed.push((
                off_tick,
                Phase::On,
                MidiMessage::PitchBend {
                    bend: midly::PitchBend(u14::new(BEND_CENTER as u16)),
                },
            ));
        }
    }
    timed.sort_by_key(|&(tick, phase, _)| (tick, phase));

    let mut last_tick = 0u32;
    for (tick, _, message) in timed {
        track.push(TrackEvent {
            delta: u28::new(tick - last_tick),
            kind: TrackEventKind::Midi { channel, message },
        });
        last_tick = tick;
    }

    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(midly::MetaMessage::EndOfTrack),
    });
    track
}

/// Wheel positions for a continuous glide from the note's pitch to
/// `target`, spread across the note's sounding length.
fn slide_ramp(event: &NoteEvent, target: u8, on_tick: u32, off_tick: u32) -> Vec<(u32, u16)> {
    let delta_semitones = target as f64 - event.pitch as f64;
    let full = (delta_semitones / BEND_RANGE_SEMITONES).clamp(-1.0, 1.0);
    let span = off_tick.saturating_sub(on_tick);
    if span == 0 {
        return Vec::new();
    }
    let steps = SLIDE_STEPS.min(span);
    (1..=steps)
        .map(|i| {
            let tick = on_tick + span * i / steps;
            let fraction = i as f64 / steps as f64;
            let bend = BEND_CENTER as f64 + full * fraction * 8191.0;
            (tick, (bend.round() as i32).clamp(0, 16383) as u16)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::{NoteEvent, Part, Timeline};

    fn options() -> MidiOptions {
        MidiOptions {
            bpm: 120,
            embed_tempo: true,
            title: "Chorgi C Pop".to_string(),
            melody_program: 80,
            bass_program: 33,
        }
    }

    fn simple_timeline() -> Timeline {
        let mut tl = Timeline::new(8.0);
        tl.set_part(
            Part::Chord,
            vec![
                NoteEvent::new(60, 0.0, 4.0, 85, Part::Chord),
                NoteEvent::new(64, 0.0, 4.0, 85, Part::Chord),
                NoteEvent::new(67, 0.0, 4.0, 85, Part::Chord),
            ],
        );
        tl.set_part(
            Part::Melody,
            vec![
                NoteEvent::new(72, 0.0, 1.0, 100, Part::Melody),
                NoteEvent::new(74, 1.0, 0.5, 96, Part::Melody),
            ],
        );
        tl
    }

    #[test]
    fn conductor_plus_one_track_per_nonempty_part() {
        let tl = simple_timeline();
        let opts = options();
        let smf = timeline_to_smf(&tl, &opts);
        // Conductor + chords + melody
        assert_eq!(smf.tracks.len(), 3);
        assert_eq!(
            smf.header.timing,
            Timing::Metrical(u15::new(TICKS_PER_QUARTER))
        );
    }

    #[test]
    fn tempo_embedding_is_optional() {
        let tl = simple_timeline();
        let with_opts = options();
        let with = timeline_to_smf(&tl, &with_opts);
        let mut without_opts = options();
        without_opts.embed_tempo = false;
        let without = timeline_to_smf(&tl, &without_opts);

        let has_tempo = |smf: &Smf| {
            smf.tracks[0].iter().any(|e| {
                matches!(e.kind, TrackEventKind::Meta(midly::MetaMessage::Tempo(_)))
            })
        };
        assert!(has_tempo(&with));
        assert!(!has_tempo(&without));
    }

    #[test]
    fn tempo_meta_is_exact_down_to_the_slowest_supported_bpm() {
        let tl = simple_timeline();
        let tempo_of = |bpm: u16| {
            let opts = MidiOptions { bpm, ..options() };
            let smf = timeline_to_smf(&tl, &opts);
            smf.tracks[0].iter().find_map(|e| match e.kind {
                TrackEventKind::Meta(midly::MetaMessage::Tempo(t)) => Some(t.as_int()),
                _ => None,
            })
        };
        assert_eq!(tempo_of(120), Some(500_000));
        assert_eq!(tempo_of(4), Some(15_000_000));
        // Below the 24-bit range the meta is omitted, never bit-masked
        assert_eq!(tempo_of(1), None);
    }

    #[test]
    fn roundtrip_reproduces_notes_at_tick_resolution() {
        let tl = simple_timeline();
        let bytes = to_midi_bytes(&tl, &options()).unwrap();
        let smf = Smf::parse(&bytes).unwrap();

        // Reconstruct (pitch, on_tick, off_tick, velocity) from the melody track
        let melody_track = smf
            .tracks
            .iter()
            .find(|t| {
                t.iter().any(|e| {
                    matches!(
                        e.kind,
                        TrackEventKind::Meta(midly::MetaMessage::TrackName(b"Melody"))
                    )
                })
            })
            .unwrap();
        let mut tick = 0u32;
        let mut ons = Vec::new();
        let mut offs = Vec::new();
        for event in melody_track {
            tick += event.delta.as_int();
            match event.kind {
                TrackEventKind::Midi {
                    message: MidiMessage::NoteOn { key, vel },
                    ..
                } => ons.push((key.as_int(), tick, vel.as_int())),
                TrackEventKind::Midi {
                    message: MidiMessage::NoteOff { key, .. },
                    ..
                } => offs.push((key.as_int(), tick)),
                _ => {}
            }
        }
        assert_eq!(ons, vec![(72, 0, 100), (74, 480, 96)]);
        assert_eq!(offs, vec![(72, 480), (74, 720)]);
    }

    #[test]
    fn note_off_precedes_reattack_at_same_tick() {
        let mut tl = Timeline::new(2.0);
        tl.set_part(
            Part::Bass,
            vec![
                NoteEvent::new(36, 0.0, 1.0, 90, Part::Bass),
                NoteEvent::new(36, 1.0, 1.0, 90, Part::Bass),
            ],
        );
        let opts = options();
        let smf = timeline_to_smf(&tl, &opts);
        let track = &smf.tracks[1];
        let mut tick = 0u32;
        let mut order = Vec::new();
        for event in track {
            tick += event.delta.as_int();
            match event.kind {
                TrackEventKind::Midi {
                    message: MidiMessage::NoteOn { .. },
                    ..
                } => order.push(("on", tick)),
                TrackEventKind::Midi {
                    message: MidiMessage::NoteOff { .. },
                    ..
                } => order.push(("off", tick)),
                _ => {}
            }
        }
        assert_eq!(
            order,
            vec![("on", 0), ("off", 480), ("on", 480), ("off", 960)]
        );
    }

    #[test]
    fn slides_emit_bend_ramp_and_recenter() {
        let mut tl = Timeline::new(4.0);
        let mut event = NoteEvent::new(36, 0.0, 4.0, 90, Part::Bass);
        event.slide_to = Some(41); // up a fourth
        tl.set_part(Part::Bass, vec![event]);
        let opts = options();
        let smf = timeline_to_smf(&tl, &opts);
        let track = &smf.tracks[1];

        let bends: Vec<u16> = track
            .iter()
            .filter_map(|e| match e.kind {
                TrackEventKind::Midi {
                    message: MidiMessage::PitchBend { bend },
                    ..
                } => Some(bend.0.as_int()),
                _ => None,
            })
            .collect();
        assert!(bends.len() > 2);
        // Monotonic rise toward the target, then re-center
        let last = bends[bends.len() - 1];
        assert_eq!(last, 8192);
        let peak = bends[bends.len() - 2];
        let expected = 8192.0 + (5.0 / 12.0) * 8191.0;
        assert!((peak as f64 - expected).abs() < 2.0);
        assert!(bends.windows(2).take(bends.len() - 2).all(|w| w[0] <= w[1]));

        // Bend sensitivity RPN present
        let has_rpn = track.iter().any(|e| {
            matches!(
                e.kind,
                TrackEventKind::Midi {
                    message: MidiMessage::Controller { controller, value },
                    ..
                } if controller.as_int() == 6 && value.as_int() == 12
            )
        });
        assert!(has_rpn);
    }

    #[test]
    fn zero_length_notes_get_a_minimum_tick() {
        let mut tl = Timeline::new(1.0);
        tl.set_part(
            Part::Melody,
            vec![NoteEvent::new(60, 0.0, 0.0005, 100, Part::Melody)],
        );
        let opts = options();
        let smf = timeline_to_smf(&tl, &opts);
        let track = &smf.tracks[1];
        let mut tick = 0u32;
        let mut off_tick = None;
        for event in track {
            tick += event.delta.as_int();
            if matches!(
                event.kind,
                TrackEventKind::Midi {
                    message: MidiMessage::NoteOff { .. },
                    ..
                }
            ) {
                off_tick = Some(tick);
            }
        }
        assert_eq!(off_tick, Some(1));
    }
}
