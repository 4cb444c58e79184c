// Note events and the multi-part timeline.
//
// The timeline is the central output representation: four part lanes
// (chords, arp, melody, bass), each an independently replaceable vector of
// note events with absolute beat positions. MIDI is derived from it, never
// the other way around.
//
// Invariants:
// - Every event's time window lies within `total_beats`.
// - Events within a lane are sorted by start time.
// - Replacing one part's lane never touches the other lanes — this is what
//   makes "regenerate part" safe.

use serde::{Deserialize, Serialize};

/// Which lane an event belongs to. The renderer color-codes by this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Part {
    Chord = 0,
    Arp = 1,
    Melody = 2,
    Bass = 3,
}

impl Part {
    pub const ALL: [Part; 4] = [Part::Chord, Part::Arp, Part::Melody, Part::Bass];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            Part::Chord => "Chords",
            Part::Arp => "Arp",
            Part::Melody => "Melody",
            Part::Bass => "Bass",
        }
    }
}

/// A single timed note. Immutable once emitted by a generator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    /// MIDI pitch (0-127).
    pub pitch: u8,
    /// Absolute start position in beats.
    pub start: f64,
    /// Duration in beats.
    pub duration: f64,
    /// Velocity (1-127).
    pub velocity: u8,
    pub part: Part,
    /// Target pitch of a continuous slide (808 bass only). Serialized as a
    /// pitch-bend ramp across the note's duration.
    pub slide_to: Option<u8>,
}

impl NoteEvent {
    pub fn new(pitch: u8, start: f64, duration: f64, velocity: u8, part: Part) -> Self {
        NoteEvent {
            pitch,
            start,
            duration,
            velocity,
            part,
            slide_to: None,
        }
    }

    /// End position in beats.
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// The assembled multi-part composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    /// Total composition length in beats.
    pub total_beats: f64,
    lanes: [Vec<NoteEvent>; 4],
}

impl Timeline {
    pub fn new(total_beats: f64) -> Self {
        Timeline {
            total_beats,
            lanes: [Vec::new(), Vec::new(), Vec::new(), Vec::new()],
        }
    }

    /// Install a part's events, replacing whatever the lane held. Events
    /// are sorted by start time; their part tags are forced to `part`.
    pub fn set_part(&mut self, part: Part, mut events: Vec<NoteEvent>) {
        for event in &mut events {
            event.part = part;
        }
        events.sort_by(|a, b| a.start.total_cmp(&b.start));
        self.lanes[part.index()] = events;
    }

    /// Replace exactly one part's lane with the matching lane from another
    /// timeline, leaving the other lanes untouched.
    pub fn replace_part(&mut self, part: Part, source: &Timeline) {
        self.lanes[part.index()] = source.lanes[part.index()].clone();
    }

    pub fn part(&self, part: Part) -> &[NoteEvent] {
        &self.lanes[part.index()]
    }

    /// All events across all lanes, ordered by start time.
    pub fn events_ordered(&self) -> Vec<NoteEvent> {
        let mut all: Vec<NoteEvent> = self.lanes.iter().flatten().copied().collect();
        all.sort_by(|a, b| a.start.total_cmp(&b.start));
        all
    }

    pub fn event_count(&self) -> usize {
        self.lanes.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.event_count() == 0
    }

    /// Check the containment invariant: every event window inside
    /// `[0, total_beats]` (with a small tolerance for float rounding).
    pub fn events_within_bounds(&self) -> bool {
        self.lanes
            .iter()
            .flatten()
            .all(|e| e.start >= 0.0 && e.end() <= self.total_beats + 1e-6)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(pitch: u8, start: f64) -> NoteEvent {
        NoteEvent::new(pitch, start, 1.0, 100, Part::Melody)
    }

    #[test]
    fn set_part_sorts_and_tags() {
        let mut tl = Timeline::new(8.0);
        tl.set_part(Part::Arp, vec![event(64, 2.0), event(60, 0.0)]);
        let lane = tl.part(Part::Arp);
        assert_eq!(lane[0].pitch, 60);
        assert_eq!(lane[1].pitch, 64);
        assert!(lane.iter().all(|e| e.part == Part::Arp));
    }

    #[test]
    fn replace_part_leaves_other_lanes_alone() {
        let mut a = Timeline::new(8.0);
        a.set_part(Part::Arp, vec![event(60, 0.0)]);
        a.set_part(Part::Bass, vec![event(36, 0.0)]);

        let mut b = Timeline::new(8.0);
        b.set_part(Part::Arp, vec![event(72, 4.0)]);

        let bass_before = a.part(Part::Bass).to_vec();
        a.replace_part(Part::Arp, &b);
        assert_eq!(a.part(Part::Arp), b.part(Part::Arp));
        assert_eq!(a.part(Part::Bass), bass_before.as_slice());
    }

    #[test]
    fn events_ordered_across_lanes() {
        let mut tl = Timeline::new(8.0);
        tl.set_part(Part::Arp, vec![event(64, 3.0)]);
        tl.set_part(Part::Bass, vec![event(36, 1.0)]);
        tl.set_part(Part::Chord, vec![event(48, 0.0)]);
        let starts: Vec<f64> = tl.events_ordered().iter().map(|e| e.start).collect();
        assert_eq!(starts, vec![0.0, 1.0, 3.0]);
    }

    #[test]
    fn bounds_check() {
        let mut tl = Timeline::new(4.0);
        tl.set_part(Part::Melody, vec![event(60, 3.5)]);
        assert!(!tl.events_within_bounds()); // ends at 4.5
        tl.set_part(Part::Melody, vec![event(60, 3.0)]);
        assert!(tl.events_within_bounds());
    }
}
