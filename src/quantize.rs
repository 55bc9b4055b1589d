use crate::error::PrepError;
use crate::model::track::{NoteEvent, Track};

pub const TICKS_PER_QUARTER: u16 = 960;

/// One sixteenth note.
pub const GRID_TICKS: u64 = TICKS_PER_QUARTER as u64 / 4;

/// Nearest multiple of `grid` to `ticks`, with exact halves rounded to the even multiple.
fn snap(ticks: u64, grid: u64) -> u64 {
    let q = ticks / grid;
    let r = ticks % grid;

    let q = match (r * 2).cmp(&grid) {
        std::cmp::Ordering::Less => q,
        std::cmp::Ordering::Greater => q + 1,
        std::cmp::Ordering::Equal => q + (q & 1),
    };

    q * grid
}

fn sort_notes(notes: &mut [NoteEvent]) {
    notes.sort_by_key(|n| (n.start_tick, n.pitch));
}

/// Snap note starts and durations onto the sixteenth-note grid.
///
/// Starts are rounded to the nearest grid line, durations to the nearest
/// grid multiple with a floor of one grid unit. The result is ordered by
/// `(start_tick, pitch)`.
pub fn quantize_track(track: &Track) -> Track {
    let mut out = track.clone();
    sort_notes(&mut out.notes);

    for n in out.notes.iter_mut() {
        n.start_tick = snap(n.start_tick, GRID_TICKS);
        n.duration_tick = snap(n.duration_tick, GRID_TICKS).max(GRID_TICKS);
    }

    // two notes can land on the same tick after snapping
    sort_notes(&mut out.notes);
    out
}

/// Like [`quantize_track`] but refuses tracks whose tick resolution does not
/// match the grid or whose notes carry impossible values.
pub fn try_quantize_track(track: &Track) -> Result<Track, PrepError> {
    if track.ticks_per_quarter != TICKS_PER_QUARTER {
        return Err(PrepError::InvalidTrackData(format!(
            "expected {} ticks per quarter, found {}",
            TICKS_PER_QUARTER, track.ticks_per_quarter
        )));
    }

    if let Some(n) = track.notes.iter().find(|n| n.pitch > 127 || n.velocity > 127) {
        return Err(PrepError::InvalidTrackData(format!(
            "note at tick {} has pitch {} / velocity {} outside 0..=127",
            n.start_tick, n.pitch, n.velocity
        )));
    }

    if let Some(n) = track.notes.iter().find(|n| n.start_tick.checked_add(n.duration_tick).is_none()) {
        return Err(PrepError::InvalidTrackData(format!(
            "note at tick {} overflows with duration {}",
            n.start_tick, n.duration_tick
        )));
    }

    Ok(quantize_track(track))
}
