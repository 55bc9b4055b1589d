use crate::error::PrepError;
use crate::model::track::{NoteEvent, Track};
use crate::quantize::TICKS_PER_QUARTER;
use anyhow::{Context, Result};
use log::{debug, warn};
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

const DRUM_CHANNEL: u8 = 9;

#[derive(Default)]
struct ChannelNotes {
    program: u8,
    notes: Vec<NoteEvent>,
}

/// Read a Standard MIDI File and split it into one [`Track`] per (SMF track, channel)
/// that carries notes. Ticks are rescaled to [`TICKS_PER_QUARTER`].
pub fn import_midi_tracks<P: AsRef<Path>>(path: P) -> Result<Vec<Track>> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| PrepError::io(path, e))?;

    midi_bytes_to_tracks(&bytes).with_context(|| format!("Failed to import {}", path.display()))
}

pub fn midi_bytes_to_tracks(bytes: &[u8]) -> Result<Vec<Track>> {
    let smf = Smf::parse(bytes)
        .map_err(|e| PrepError::MalformedTrack(format!("Failed to parse MIDI: {:?}", e)))?;

    let source_tpq = match smf.header.timing {
        Timing::Metrical(t) => t.as_int() as u64,
        Timing::Timecode(_fps, _subframe) => {
            return Err(PrepError::UnsupportedTiming(
                "SMPTE timecode midi timing is not supported".into(),
            )
            .into());
        }
    };

    if source_tpq == 0 {
        return Err(PrepError::MalformedTrack("header declares 0 ticks per quarter".into()).into());
    }

    debug!(
        "MIDI format: {:?}, tracks: {}, ticks per quarter: {}",
        smf.header.format,
        smf.tracks.len(),
        source_tpq
    );

    let rescale = |tick: u64| -> u64 {
        let scaled = tick as u128 * TICKS_PER_QUARTER as u128;
        ((scaled + source_tpq as u128 / 2) / source_tpq as u128) as u64
    };

    let mut out: Vec<Track> = Vec::new();

    for (track_idx, track) in smf.tracks.iter().enumerate() {
        let mut abs_tick: u64 = 0;
        let mut track_name: Option<String> = None;
        let mut channels: BTreeMap<u8, ChannelNotes> = BTreeMap::new();
        let mut open_notes: HashMap<(u8, u8), Vec<(u64, u8)>> = HashMap::new();

        for event in track.iter() {
            abs_tick = abs_tick.saturating_add(event.delta.as_int() as u64);

            match &event.kind {
                TrackEventKind::Meta(MetaMessage::TrackName(bytes)) => {
                    if track_name.is_none() {
                        track_name = Some(String::from_utf8_lossy(bytes).into_owned());
                    }
                }
                TrackEventKind::Midi { channel, message } => {
                    let ch: u8 = channel.as_int();

                    match message {
                        MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                            open_notes
                                .entry((ch, key.as_int()))
                                .or_default()
                                .push((abs_tick, vel.as_int()));
                        }
                        MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                            close_note(&mut open_notes, &mut channels, ch, key.as_int(), abs_tick);
                        }
                        MidiMessage::ProgramChange { program } => {
                            channels.entry(ch).or_default().program = program.as_int();
                        }
                        _ => {}
                    }
                }
                _ => {}
            }
        }

        for ((ch, key), stack) in open_notes.into_iter() {
            for (start_tick, velocity) in stack {
                let end_tick = if abs_tick > start_tick {
                    abs_tick
                } else {
                    start_tick + source_tpq
                };

                warn!(
                    "Unclosed NoteOn for {}, channel: {} at tick: {} auto-closing at: {}..!",
                    key, ch, start_tick, end_tick
                );

                channels.entry(ch).or_default().notes.push(NoteEvent::new(
                    start_tick,
                    end_tick - start_tick,
                    key,
                    velocity,
                ));
            }
        }

        for (ch, ChannelNotes { program, notes }) in channels.into_iter() {
            if notes.is_empty() {
                continue;
            }

            let mut notes: Vec<NoteEvent> = notes
                .into_iter()
                .map(|n| {
                    let start = rescale(n.start_tick);
                    let end = rescale(n.end_tick());
                    NoteEvent::new(start, end - start, n.pitch, n.velocity)
                })
                .collect();
            notes.sort_by_key(|n| (n.start_tick, n.pitch));

            debug!(
                "Track {} channel {} ({:?}): {} notes",
                track_idx,
                ch,
                track_name,
                notes.len()
            );

            out.push(Track {
                name: track_name.clone(),
                program,
                is_drum: ch == DRUM_CHANNEL,
                ticks_per_quarter: TICKS_PER_QUARTER,
                notes,
            });
        }
    }

    Ok(out)
}

fn close_note(
    open_notes: &mut HashMap<(u8, u8), Vec<(u64, u8)>>,
    channels: &mut BTreeMap<u8, ChannelNotes>,
    ch: u8,
    key: u8,
    abs_tick: u64,
) {
    match open_notes.get_mut(&(ch, key)).and_then(|stack| stack.pop()) {
        Some((start_tick, velocity)) => {
            channels.entry(ch).or_default().notes.push(NoteEvent::new(
                start_tick,
                abs_tick - start_tick,
                key,
                velocity,
            ));
        }
        None => {
            debug!("Orphaned NoteOff for {} ch{} at tick {}..!", key, ch, abs_tick);
        }
    }
}

/// Write a single-track SMF containing `(channel, key, start, duration)` notes.
#[cfg(test)]
pub(crate) fn test_midi_bytes(ticks_per_quarter: u16, notes: &[(u8, u8, u32, u32)]) -> Vec<u8> {
    use midly::num::{u4, u7, u15, u28};
    use midly::{Format, Header, TrackEvent};

    // (tick, is_on, channel, key); offs sort before ons on the same tick
    let mut points: Vec<(u32, bool, u8, u8)> = Vec::new();
    for &(ch, key, start, dur) in notes {
        points.push((start, true, ch, key));
        points.push((start + dur, false, ch, key));
    }
    points.sort();

    let mut smf = Smf::new(Header::new(
        Format::SingleTrack,
        Timing::Metrical(u15::new(ticks_per_quarter)),
    ));

    let mut track: midly::Track<'static> = vec![TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::TrackName(&b"fixture"[..])),
    }];

    let mut last = 0;
    for (tick, is_on, ch, key) in points {
        let message = if is_on {
            MidiMessage::NoteOn {
                key: u7::new(key),
                vel: u7::new(100),
            }
        } else {
            MidiMessage::NoteOff {
                key: u7::new(key),
                vel: u7::new(0),
            }
        };
        track.push(TrackEvent {
            delta: u28::new(tick - last),
            kind: TrackEventKind::Midi {
                channel: u4::new(ch),
                message,
            },
        });
        last = tick;
    }
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    smf.tracks.push(track);

    let mut buf = Vec::new();
    smf.write(&mut buf).expect("in-memory MIDI write");
    buf
}
