use crate::model::token::Chunk;
use rand::Rng;

pub mod estimated;
pub mod exact;

pub use estimated::{ExtractConfig, candidate_windows, estimate_bar_positions, extract_chunks};
pub use exact::{SamplerConfig, WindowDraw, bar_starts, draw_window, sample_window};

/// The two ways of cutting bar-aligned windows out of a token sequence.
///
/// `Exact` follows the tokenizer's real bar markers and yields one random
/// window per call, for training-time sampling. `Estimated` ignores markers,
/// partitions the sequence evenly by token density and yields several windows,
/// for offline dataset builds. The two do not agree on where bars fall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowSelector {
    Exact {
        bar_marker: u32,
        config: SamplerConfig,
    },
    Estimated(ExtractConfig),
}

impl WindowSelector {
    pub fn select<R: Rng + ?Sized>(&self, token_ids: &[u32], rng: &mut R) -> Vec<Chunk> {
        match self {
            WindowSelector::Exact { bar_marker, config } => {
                let window = sample_window(token_ids, *bar_marker, config, rng);
                if window.is_empty() {
                    Vec::new()
                } else {
                    vec![Chunk::new(window)]
                }
            }
            WindowSelector::Estimated(config) => extract_chunks(token_ids, config, rng),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn strategies_disagree_on_markerless_input() {
        // no bar markers at all: exact hands back the whole sequence, estimated still cuts
        let ids: Vec<u32> = (100..1300).collect();
        let mut rng = StdRng::seed_from_u64(9);

        let exact = WindowSelector::Exact {
            bar_marker: 3,
            config: SamplerConfig::default(),
        };
        let estimated = WindowSelector::Estimated(ExtractConfig::default());

        let e = exact.select(&ids, &mut rng);
        assert_eq!(e.len(), 1);
        assert_eq!(e[0].length, ids.len());

        let s = estimated.select(&ids, &mut rng);
        assert_eq!(s.len(), 3);
        assert!(s.iter().all(|c| c.length == 16 * 60));
    }

    #[test]
    fn exact_on_empty_input() {
        let mut rng = StdRng::seed_from_u64(0);
        let exact = WindowSelector::Exact {
            bar_marker: 3,
            config: SamplerConfig::default(),
        };
        assert!(exact.select(&[], &mut rng).is_empty());
    }
}
