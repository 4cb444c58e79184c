// Chorgi Music Generation Core
//
// A procedural MIDI music generator: from a configuration (key, progression
// style, voicing, arp/melody/bass options) and a seed, it produces a
// four-part note-event timeline (chords, arpeggio, melody, bassline) and
// serializes it to a Standard MIDI File. The GUI front end is an external
// collaborator: it feeds a Config in and gets a Timeline out.
//
// Architecture:
// - key.rs: Key/scale model (pitch classes, snapping, extended scales)
// - chord.rs: Chord qualities, diatonic and blues chord pools
// - progression.rs: Chord-sequence generation (templates, smooth random,
//   cadences, harmonic bias) and voicing placement
// - voicing.rs: Voicing styles (inversions, drop-2, quartal, "So What")
// - arp.rs: Arpeggiator patterns over the voiced progression
// - melody.rs: Melody algorithms plus a random meta-mode
// - bass.rs: Six bass styles, including 808 slides
// - timeline.rs: The four-lane note-event timeline
// - midi.rs: SMF serialization (one track per part, pitch-bend slides)
// - config.rs: The full option set, JSON-serializable
// - generate.rs: Pipeline entry points and per-part RNG streams
//
// Every run is deterministic given (Config, seed); regenerating one part
// reuses the fixed progression and touches nothing else.

pub mod arp;
pub mod bass;
pub mod chord;
pub mod config;
pub mod error;
pub mod generate;
pub mod key;
pub mod melody;
pub mod midi;
pub mod progression;
pub mod timeline;
pub mod voicing;
