use log::debug;
use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerConfig {
    pub bars_per_window: usize,
    /// A window must be strictly longer than this to be accepted.
    pub min_tokens: usize,
    pub max_attempts: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            bars_per_window: 16,
            min_tokens: 100,
            max_attempts: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowDraw<'a> {
    pub window: &'a [u32],
    /// Random draws spent; 0 when the sequence had too few bars to window.
    pub attempts: usize,
    pub accepted: bool,
}

/// Indices of every occurrence of `bar_marker`, ascending.
pub fn bar_starts(token_ids: &[u32], bar_marker: u32) -> Vec<usize> {
    token_ids
        .iter()
        .enumerate()
        .filter(|&(_, &id)| id == bar_marker)
        .map(|(i, _)| i)
        .collect()
}

/// Pick one window spanning `bars_per_window` real bars, starting on a bar marker.
///
/// Sequences with fewer than `bars_per_window + 1` markers come back whole.
/// Otherwise up to `max_attempts` uniform draws are made, keeping the first
/// window longer than `min_tokens`; if none qualifies the last draw is returned.
pub fn sample_window<'a, R: Rng + ?Sized>(
    token_ids: &'a [u32],
    bar_marker: u32,
    config: &SamplerConfig,
    rng: &mut R,
) -> &'a [u32] {
    draw_window(token_ids, bar_marker, config, rng).window
}

pub fn draw_window<'a, R: Rng + ?Sized>(
    token_ids: &'a [u32],
    bar_marker: u32,
    config: &SamplerConfig,
    rng: &mut R,
) -> WindowDraw<'a> {
    let starts = bar_starts(token_ids, bar_marker);
    let bars = config.bars_per_window;

    if bars == 0 || starts.len() < bars + 1 {
        return WindowDraw {
            window: token_ids,
            attempts: 0,
            accepted: false,
        };
    }

    let mut window: &[u32] = &[];
    for attempt in 1..=config.max_attempts.max(1) {
        let s = rng.gen_range(0..starts.len() - bars);
        window = &token_ids[starts[s]..starts[s + bars]];

        if window.len() > config.min_tokens {
            return WindowDraw {
                window,
                attempts: attempt,
                accepted: true,
            };
        }
    }

    debug!(
        "No {}-bar window above {} tokens after {} draws, keeping a {}-token window..!",
        bars,
        config.min_tokens,
        config.max_attempts,
        window.len()
    );

    WindowDraw {
        window,
        attempts: config.max_attempts.max(1),
        accepted: false,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const BAR: u32 = 3;

    /// `bars` bars, each a marker followed by `per_bar - 1` filler tokens.
    fn sequence(bars: usize, per_bar: usize) -> Vec<u32> {
        (0..bars)
            .flat_map(|_| std::iter::once(BAR).chain(std::iter::repeat_n(50, per_bar - 1)))
            .collect()
    }

    #[test]
    fn few_bars_return_everything() {
        let ids = sequence(16, 20);
        let mut rng = StdRng::seed_from_u64(1);
        let draw = draw_window(&ids, BAR, &SamplerConfig::default(), &mut rng);

        assert_eq!(draw.window, &ids[..]);
        assert_eq!(draw.attempts, 0);
    }

    #[test]
    fn accepted_window_spans_sixteen_bars() {
        let ids = sequence(40, 12);
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..50 {
            let draw = draw_window(&ids, BAR, &SamplerConfig::default(), &mut rng);
            assert!(draw.accepted);
            assert_eq!(draw.attempts, 1);
            assert_eq!(draw.window.len(), 16 * 12);
            assert_eq!(draw.window[0], BAR);
            assert_eq!(draw.window.iter().filter(|&&id| id == BAR).count(), 16);
            assert!(draw.window.len() <= ids.len());
        }
    }

    #[test]
    fn short_windows_degrade_after_all_attempts() {
        // 17 markers; bar 0 to bar 16 covers 90 tokens, so no window can exceed 100
        let mut ids: Vec<u32> = Vec::new();
        for i in 0..16 {
            ids.push(BAR);
            let filler = if i < 10 { 5 } else { 4 };
            ids.extend(std::iter::repeat_n(50, filler));
        }
        ids.push(BAR);
        ids.extend(std::iter::repeat_n(50, 30));

        let starts = bar_starts(&ids, BAR);
        assert_eq!(starts.len(), 17);
        assert_eq!(starts[16] - starts[0], 90);

        let mut rng = StdRng::seed_from_u64(42);
        let draw = draw_window(&ids, BAR, &SamplerConfig::default(), &mut rng);

        assert!(!draw.accepted);
        assert_eq!(draw.attempts, 10);
        assert_eq!(draw.window, &ids[..90]);
    }

    #[test]
    fn only_long_window_is_found() {
        // one dense bar at the end makes exactly one of the two windows long enough
        let mut ids = sequence(17, 5);
        ids.splice(16 * 5 + 1..16 * 5 + 1, std::iter::repeat_n(60, 200));
        ids.push(BAR);

        let mut rng = StdRng::seed_from_u64(3);
        let config = SamplerConfig {
            max_attempts: 64,
            ..SamplerConfig::default()
        };
        let window = sample_window(&ids, BAR, &config, &mut rng);

        assert!(window.len() > 100);
        assert_eq!(window.len(), 15 * 5 + 205);
    }
}
