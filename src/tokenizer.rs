use crate::error::PrepError;
use crate::model::token::{Token, TokenSequence};
use crate::model::track::Track;

/// Maps a track to an ordered token stream with a reserved bar-start id.
pub trait Tokenizer: Send + Sync {
    fn encode(&self, track: &Track) -> Result<Vec<Token>, PrepError>;

    /// Id of the token that opens every measure.
    fn bar_marker(&self) -> u32;

    fn vocab_size(&self) -> usize;

    /// Encode and resolve straight to ids, treating an empty stream as a malformed track.
    fn encode_ids(&self, track: &Track) -> Result<TokenSequence, PrepError> {
        let tokens = self.encode(track)?;
        if tokens.is_empty() {
            return Err(PrepError::MalformedTrack("No tokens generated".into()));
        }
        Ok(TokenSequence::from_tokens(&tokens))
    }
}

pub const PAD_ID: u32 = 0;
pub const BOS_ID: u32 = 1;
pub const EOS_ID: u32 = 2;
pub const BAR_ID: u32 = 3;

const POSITIONS_PER_BAR: u64 = 16;
const POSITION_BASE: u32 = 4;
const PITCH_BASE: u32 = POSITION_BASE + POSITIONS_PER_BAR as u32;
const MAX_DURATION: u64 = 64;
const DURATION_BASE: u32 = PITCH_BASE + 128;
const VOCAB_SIZE: u32 = DURATION_BASE + MAX_DURATION as u32;

/// Fixed-vocabulary REMI-style encoder for 4/4 material at sixteenth-note resolution.
///
/// Each bar opens with `Bar`; every onset position inside the bar emits one
/// `Position_p` followed by a `Pitch_x Duration_d` pair per note starting there.
/// Empty bars still emit their `Bar` token.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemiTokenizer;

impl RemiTokenizer {
    pub fn new() -> Self {
        Self
    }

    pub fn position_id(position: u64) -> u32 {
        POSITION_BASE + position as u32
    }

    pub fn pitch_id(pitch: u8) -> u32 {
        PITCH_BASE + pitch as u32
    }

    /// Durations are counted in sixteenths and clamped to `1..=64`.
    pub fn duration_id(sixteenths: u64) -> u32 {
        DURATION_BASE + (sixteenths.clamp(1, MAX_DURATION) - 1) as u32
    }
}

impl Tokenizer for RemiTokenizer {
    fn encode(&self, track: &Track) -> Result<Vec<Token>, PrepError> {
        let step = track.ticks_per_quarter as u64 / 4;
        if step == 0 {
            return Err(PrepError::InvalidTrackData(format!(
                "{} ticks per quarter is too coarse to tokenize",
                track.ticks_per_quarter
            )));
        }

        let Some(last) = track.notes.iter().map(|n| n.start_tick / step).max() else {
            return Ok(Vec::new());
        };

        let mut notes = track.notes.clone();
        notes.sort_by_key(|n| (n.start_tick, n.pitch));

        let mut tokens = Vec::with_capacity(notes.len() * 3 + 8);
        let mut pending = notes.iter().peekable();

        for bar in 0..=last / POSITIONS_PER_BAR {
            tokens.push(Token::marker(BAR_ID));

            let mut current_position = None;
            while let Some(n) = pending.next_if(|n| n.start_tick / step / POSITIONS_PER_BAR == bar) {
                let position = (n.start_tick / step) % POSITIONS_PER_BAR;
                if current_position != Some(position) {
                    tokens.push(Token::value(Self::position_id(position)));
                    current_position = Some(position);
                }

                tokens.push(Token::value(Self::pitch_id(n.pitch)));
                tokens.push(Token::value(Self::duration_id(n.duration_tick / step)));
            }
        }

        Ok(tokens)
    }

    fn bar_marker(&self) -> u32 {
        BAR_ID
    }

    fn vocab_size(&self) -> usize {
        VOCAB_SIZE as usize
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::track::NoteEvent;

    #[test]
    fn bars_positions_and_notes() {
        let track = Track::new(
            false,
            vec![
                NoteEvent::new(0, 240, 60, 100),
                NoteEvent::new(0, 480, 64, 100),
                NoteEvent::new(960, 240, 67, 100),
                // third bar, position 1
                NoteEvent::new(2 * 3840 + 240, 960, 72, 100),
            ],
        );

        let ids = RemiTokenizer.encode_ids(&track).unwrap().into_ids();
        let expected = vec![
            BAR_ID,
            RemiTokenizer::position_id(0),
            RemiTokenizer::pitch_id(60),
            RemiTokenizer::duration_id(1),
            RemiTokenizer::pitch_id(64),
            RemiTokenizer::duration_id(2),
            RemiTokenizer::position_id(4),
            RemiTokenizer::pitch_id(67),
            RemiTokenizer::duration_id(1),
            BAR_ID,
            BAR_ID,
            RemiTokenizer::position_id(1),
            RemiTokenizer::pitch_id(72),
            RemiTokenizer::duration_id(4),
        ];
        assert_eq!(ids, expected);
    }

    #[test]
    fn markers_are_tagged() {
        let track = Track::new(false, vec![NoteEvent::new(3840, 240, 60, 100)]);
        let tokens = RemiTokenizer.encode(&track).unwrap();

        let markers: Vec<_> = tokens.iter().filter(|t| t.is_marker()).collect();
        assert_eq!(markers.len(), 2);
        assert!(markers.iter().all(|t| t.id == RemiTokenizer.bar_marker()));
    }

    #[test]
    fn empty_track_is_malformed() {
        let err = RemiTokenizer.encode_ids(&Track::new(false, Vec::new())).unwrap_err();
        assert!(matches!(err, PrepError::MalformedTrack(_)));
    }

    #[test]
    fn ids_fit_vocabulary() {
        let track = Track::new(false, vec![NoteEvent::new(15 * 240, 100_000, 127, 1)]);
        let vocab = RemiTokenizer.vocab_size() as u32;
        assert!(RemiTokenizer.encode_ids(&track).unwrap().ids().iter().all(|&id| id < vocab));
    }
}
