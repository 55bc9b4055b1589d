use crate::model::track::Track;
use crate::pipeline::stages::collect_with_extension;
use crate::tokenizer::{PAD_ID, Tokenizer};
use crate::window::{SamplerConfig, WindowSelector};
use anyhow::{Context, Result, bail};
use log::info;
use rand::Rng;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Label value the loss ignores.
pub const IGNORE_LABEL: i64 = -100;

/// One next-token-prediction example.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrainingSample {
    pub input_ids: Vec<u32>,
    pub attention_mask: Vec<u8>,
    pub labels: Vec<u32>,
}

impl TrainingSample {
    /// Shift `window` by one token into inputs and labels, truncated to `max_seq_len`.
    pub fn from_window(window: &[u32], max_seq_len: usize) -> Self {
        let target_len = window.len().saturating_sub(1).min(max_seq_len);

        Self {
            input_ids: window[..target_len].to_vec(),
            attention_mask: vec![1; target_len],
            labels: window.get(1..target_len + 1).unwrap_or(&[]).to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }
}

/// Right-padded batch of samples.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Batch {
    pub input_ids: Vec<Vec<i64>>,
    pub attention_mask: Vec<Vec<u8>>,
    pub labels: Vec<Vec<i64>>,
}

impl Batch {
    /// `(batch size, padded length)`.
    pub fn shape(&self) -> (usize, usize) {
        (
            self.input_ids.len(),
            self.input_ids.first().map(Vec::len).unwrap_or(0),
        )
    }
}

/// Pad every sample to the longest one: ids with the pad token, mask with 0,
/// labels with [`IGNORE_LABEL`].
pub fn collate(samples: &[TrainingSample]) -> Batch {
    let max_len = samples.iter().map(TrainingSample::len).max().unwrap_or(0);

    let mut batch = Batch {
        input_ids: Vec::with_capacity(samples.len()),
        attention_mask: Vec::with_capacity(samples.len()),
        labels: Vec::with_capacity(samples.len()),
    };

    for s in samples {
        let pad = max_len - s.len();

        let mut ids: Vec<i64> = s.input_ids.iter().map(|&id| id as i64).collect();
        ids.resize(max_len, PAD_ID as i64);

        let mut mask = s.attention_mask.clone();
        mask.resize(max_len, 0);

        let mut labels: Vec<i64> = s.labels.iter().map(|&id| id as i64).collect();
        labels.extend(std::iter::repeat_n(IGNORE_LABEL, pad));

        batch.input_ids.push(ids);
        batch.attention_mask.push(mask);
        batch.labels.push(labels);
    }

    batch
}

/// Quantized tracks of one split, tokenized and windowed on every access.
pub struct QuantizedDataset<T: Tokenizer> {
    files: Vec<PathBuf>,
    tokenizer: T,
    selector: WindowSelector,
    max_seq_len: usize,
}

impl<T: Tokenizer> QuantizedDataset<T> {
    pub fn open(dir: &Path, tokenizer: T, max_seq_len: usize) -> Result<Self> {
        Self::with_sampler(dir, tokenizer, SamplerConfig::default(), max_seq_len)
    }

    pub fn with_sampler(
        dir: &Path,
        tokenizer: T,
        sampler: SamplerConfig,
        max_seq_len: usize,
    ) -> Result<Self> {
        let mut files = Vec::new();
        collect_with_extension(dir, "json", &mut files)?;
        files.sort();

        if files.is_empty() {
            bail!("No quantized track files found in {}", dir.display());
        }

        info!("Loaded {} quantized track files", files.len());

        let selector = WindowSelector::Exact {
            bar_marker: tokenizer.bar_marker(),
            config: sampler,
        };

        Ok(Self {
            files,
            tokenizer,
            selector,
            max_seq_len,
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Build a sample from track `idx`. Each call draws a fresh window.
    pub fn get<R: Rng + ?Sized>(&self, idx: usize, rng: &mut R) -> Result<TrainingSample> {
        let Some(path) = self.files.get(idx) else {
            bail!("Index {} out of range for {} tracks", idx, self.files.len());
        };

        let track = Track::load(path)?;
        let ids = self
            .tokenizer
            .encode_ids(&track)
            .with_context(|| format!("Failed to tokenize {}", path.display()))?;

        let window = self
            .selector
            .select(ids.ids(), rng)
            .into_iter()
            .next()
            .map(|c| c.tokens)
            .unwrap_or_default();

        Ok(TrainingSample::from_window(&window, self.max_seq_len))
    }
}
