use crate::model::token::Chunk;
use rand::Rng;
use rand::seq::SliceRandom;

/// Sequences shorter than this are never chunked.
pub const MIN_SEQUENCE_TOKENS: usize = 100;

/// Rough token density of one bar in the built-in vocabulary.
pub const TOKENS_PER_BAR: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractConfig {
    /// Chunks shorter than this are discarded.
    pub min_tokens: usize,
    pub bars_per_window: usize,
    pub max_chunks_per_track: usize,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            min_tokens: 100,
            bars_per_window: 16,
            max_chunks_per_track: 3,
        }
    }
}

/// Evenly spaced stand-in bar lines for a sequence of `len` tokens.
///
/// These come from token count alone and do not line up with the tokenizer's
/// real bar markers. Empty when the sequence is too short to hold
/// `bars_per_window` estimated bars.
pub fn estimate_bar_positions(len: usize, bars_per_window: usize) -> Vec<usize> {
    if len < MIN_SEQUENCE_TOKENS {
        return Vec::new();
    }

    let estimated_bars = len / TOKENS_PER_BAR;
    if estimated_bars == 0 || estimated_bars < bars_per_window {
        return Vec::new();
    }

    let interval = len / estimated_bars;
    (0..=estimated_bars).map(|i| i * interval).collect()
}

/// Every window of `bars_per_window` estimated bars that holds at least `min_tokens`.
pub fn candidate_windows<'a>(token_ids: &'a [u32], config: &ExtractConfig) -> Vec<&'a [u32]> {
    let bars = config.bars_per_window;
    let positions = estimate_bar_positions(token_ids.len(), bars);

    if bars == 0 || positions.len() < bars + 1 {
        return Vec::new();
    }

    positions
        .windows(bars + 1)
        .map(|w| &token_ids[w[0]..w[bars]])
        .filter(|chunk| chunk.len() >= config.min_tokens)
        .collect()
}

/// Sample up to `max_chunks_per_track` distinct candidate windows.
pub fn extract_chunks<R: Rng + ?Sized>(
    token_ids: &[u32],
    config: &ExtractConfig,
    rng: &mut R,
) -> Vec<Chunk> {
    let candidates = candidate_windows(token_ids, config);

    candidates
        .choose_multiple(rng, config.max_chunks_per_track)
        .map(|w| Chunk::new(w))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn ids(len: usize) -> Vec<u32> {
        (0..len as u32).collect()
    }

    #[test]
    fn short_sequences_yield_nothing() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(extract_chunks(&ids(50), &ExtractConfig::default(), &mut rng).is_empty());
        assert!(extract_chunks(&ids(99), &ExtractConfig::default(), &mut rng).is_empty());
    }

    #[test]
    fn too_few_estimated_bars() {
        // 959 tokens is 15 estimated bars
        let mut rng = StdRng::seed_from_u64(0);
        assert!(estimate_bar_positions(959, 16).is_empty());
        assert!(extract_chunks(&ids(959), &ExtractConfig::default(), &mut rng).is_empty());
    }

    #[test]
    fn exactly_sixteen_bars_gives_one_window() {
        let seq = ids(960);
        let positions = estimate_bar_positions(seq.len(), 16);
        assert_eq!(positions.len(), 17);
        assert_eq!(positions[16], 960);

        let candidates = candidate_windows(&seq, &ExtractConfig::default());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0], &seq[..]);
    }

    #[test]
    fn uniform_partition() {
        // 1234 tokens -> 20 bars of 61 tokens, trailing remainder unused
        let positions = estimate_bar_positions(1234, 16);
        assert_eq!(positions.len(), 21);
        assert!(positions.windows(2).all(|w| w[1] - w[0] == 61));
        assert_eq!(*positions.last().unwrap(), 1220);
    }

    #[test]
    fn chunks_are_capped_and_distinct() {
        let seq = ids(3000);
        let config = ExtractConfig::default();
        let mut rng = StdRng::seed_from_u64(11);

        // 50 bars -> 35 candidate windows
        assert_eq!(candidate_windows(&seq, &config).len(), 35);

        let chunks = extract_chunks(&seq, &config, &mut rng);
        assert_eq!(chunks.len(), 3);
        for c in &chunks {
            assert!(c.length >= config.min_tokens);
            assert_eq!(c.length, c.tokens.len());
            assert_eq!(c.length, 16 * 60);
        }

        let mut firsts: Vec<_> = chunks.iter().map(|c| c.tokens[0]).collect();
        firsts.sort();
        firsts.dedup();
        assert_eq!(firsts.len(), 3);
    }

    #[test]
    fn min_tokens_filters_everything() {
        let config = ExtractConfig {
            min_tokens: 5000,
            ..ExtractConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(2);
        assert!(extract_chunks(&ids(3000), &config, &mut rng).is_empty());
    }

    #[test]
    fn fewer_candidates_than_cap() {
        let config = ExtractConfig {
            max_chunks_per_track: 10,
            ..ExtractConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(5);
        // 17 bars -> 2 candidates
        assert_eq!(extract_chunks(&ids(17 * 60), &config, &mut rng).len(), 2);
    }
}
