use crate::error::PrepError;
use crate::util::write_json;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// A single note, with all timing expressed in ticks.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteEvent {
    pub start_tick: u64,
    pub duration_tick: u64,
    pub pitch: u8,
    pub velocity: u8,
}

impl NoteEvent {
    pub fn new(start_tick: u64, duration_tick: u64, pitch: u8, velocity: u8) -> Self {
        Self {
            start_tick,
            duration_tick,
            pitch,
            velocity,
        }
    }

    pub fn end_tick(&self) -> u64 {
        self.start_tick.saturating_add(self.duration_tick)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Track {
    pub name: Option<String>,
    pub program: u8,
    pub is_drum: bool,
    pub ticks_per_quarter: u16,
    pub notes: Vec<NoteEvent>,
}

impl Track {
    pub fn new(is_drum: bool, notes: Vec<NoteEvent>) -> Self {
        Self {
            name: None,
            program: 0,
            is_drum,
            ticks_per_quarter: crate::TICKS_PER_QUARTER,
            notes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Read a track previously written by [`Track::save`].
    pub fn load(path: &Path) -> Result<Self, PrepError> {
        let file = File::open(path).map_err(|e| PrepError::io(path, e))?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| PrepError::MalformedTrack(format!("{}: {}", path.display(), e)))
    }

    pub fn save(&self, path: &Path) -> Result<(), PrepError> {
        write_json(self, path)
    }

    /// True if notes are in ascending `(start_tick, pitch)` order.
    pub fn is_sorted(&self) -> bool {
        self.notes
            .windows(2)
            .all(|w| (w[0].start_tick, w[0].pitch) <= (w[1].start_tick, w[1].pitch))
    }
}

/// Prefer every non-drum track; if all of them are drums, keep only the first one.
pub fn select_tracks(tracks: Vec<Track>) -> Vec<Track> {
    if tracks.iter().any(|t| !t.is_drum) {
        tracks.into_iter().filter(|t| !t.is_drum).collect()
    } else {
        tracks.into_iter().take(1).collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn track(is_drum: bool, name: &str) -> Track {
        Track {
            name: Some(name.to_owned()),
            ..Track::new(is_drum, vec![NoteEvent::new(0, 240, 60, 100)])
        }
    }

    #[test]
    fn select_prefers_non_drum() {
        let selected = select_tracks(vec![
            track(true, "kit"),
            track(false, "piano"),
            track(false, "bass"),
        ]);

        let names: Vec<_> = selected.iter().filter_map(|t| t.name.as_deref()).collect();
        assert_eq!(names, ["piano", "bass"]);
    }

    #[test]
    fn select_falls_back_to_first_drum() {
        let selected = select_tracks(vec![track(true, "kit"), track(true, "perc")]);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name.as_deref(), Some("kit"));
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("piece_t0_q16.json");

        let original = track(false, "piano");
        original.save(&path).unwrap();
        assert_eq!(Track::load(&path).unwrap(), original);
    }

    #[test]
    fn load_rejects_garbage() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(Track::load(&path), Err(PrepError::MalformedTrack(_))));
    }

    #[test]
    fn select_empty() {
        assert!(select_tracks(Vec::new()).is_empty());
    }
}
