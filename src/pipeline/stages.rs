use crate::error::PrepError;
use crate::midi_importer::import_midi_tracks;
use crate::model::track::{Track, select_tracks};
use crate::pipeline::runner::{PipelineRunner, RunOutcome, SuccessInfo};
use crate::quantize::try_quantize_track;
use crate::tokenizer::Tokenizer;
use crate::util::item_rng;
use crate::window::{ExtractConfig, WindowSelector};
use anyhow::{Context, Result};
use log::{info, warn};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub const FAILURE_LOG_NAME: &str = "_failed.txt";
pub const QUANTIZED_SUFFIX: &str = "_q16.json";
pub const MIDI_EXTENSIONS: [&str; 2] = ["mid", "midi"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Split {
    Train,
    Val,
}

impl Split {
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings shared by every stage.
#[derive(Debug, Clone)]
pub struct StageOptions {
    pub base: PathBuf,
    pub workers: usize,
    pub limit: Option<usize>,
}

impl StageOptions {
    pub fn filtered_dir(&self, split: Split) -> PathBuf {
        self.base.join("filtered").join(split.as_str())
    }

    pub fn quantized_dir(&self, split: Split) -> PathBuf {
        self.base.join("quantized").join(split.as_str())
    }

    pub fn tokenized_dir(&self, split: Split) -> PathBuf {
        self.base.join("tokenized").join(split.as_str())
    }
}

/// Counts for one stage over one split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub split: Split,
    pub ok: usize,
    pub failed: usize,
    pub not_run: usize,
    /// Files written across all successful items.
    pub outputs: usize,
    pub failure_log: Option<PathBuf>,
}

impl StageReport {
    fn from_outcome(split: Split, outcome: &RunOutcome<SuccessInfo>, failure_log: Option<PathBuf>) -> Self {
        Self {
            split,
            ok: outcome.successes.len(),
            failed: outcome.failures.len(),
            not_run: outcome.not_run.len(),
            outputs: outcome.total_outputs(),
            failure_log,
        }
    }
}

pub(crate) fn collect_with_extension(dir: &Path, ext: &str, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir).with_context(|| format!("Cannot read directory '{}'", dir.display()))? {
        let path = entry?.path();

        if path.is_dir() {
            collect_with_extension(&path, ext, out)?;
        } else if path.extension().and_then(|e| e.to_str()) == Some(ext) {
            out.push(path);
        }
    }
    Ok(())
}

/// Every `.mid` file under `dir`, sorted, followed by every `.midi` file, sorted.
pub fn discover_midi_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut all = Vec::new();

    for ext in MIDI_EXTENSIONS {
        let mut found = Vec::new();
        collect_with_extension(dir, ext, &mut found)?;
        found.sort();
        all.extend(found);
    }

    Ok(all)
}

/// Quantized track files directly inside `dir`, sorted.
pub fn discover_track_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();

    for entry in fs::read_dir(dir).with_context(|| format!("Cannot read directory '{}'", dir.display()))? {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("json") {
            found.push(path);
        }
    }

    found.sort();
    Ok(found)
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "untitled".into())
}

/// Output stem for each input. Inputs sharing a file stem (same name in
/// different folders, or `.mid` next to `.midi`) get a numeric suffix in
/// discovery order so their outputs never overwrite each other.
pub fn output_stems(files: &[PathBuf]) -> HashMap<PathBuf, String> {
    let mut used: HashSet<String> = files.iter().map(|p| stem_of(p)).collect();
    let mut claimed: HashSet<String> = HashSet::new();
    let mut stems = HashMap::with_capacity(files.len());

    for path in files {
        let stem = stem_of(path);

        let unique = if claimed.insert(stem.clone()) {
            stem
        } else {
            let mut n = 1;
            loop {
                let candidate = format!("{stem}_{n}");
                if used.insert(candidate.clone()) {
                    claimed.insert(candidate.clone());
                    break candidate;
                }
                n += 1;
            }
        };

        stems.insert(path.clone(), unique);
    }

    stems
}

fn apply_limit(mut files: Vec<PathBuf>, limit: Option<usize>) -> Vec<PathBuf> {
    if let Some(limit) = limit {
        files.truncate(limit);
    }
    files
}

/// Import one MIDI file, quantize its retained tracks and write `{stem}_t{i}_q16.json` each.
pub fn quantize_file(path: &Path, out_dir: &Path, stem: &str) -> Result<SuccessInfo> {
    let tracks = import_midi_tracks(path)?;
    if tracks.is_empty() {
        return Err(PrepError::MalformedTrack("no note-bearing tracks".into()).into());
    }

    let selected = select_tracks(tracks);
    for (i, track) in selected.iter().enumerate() {
        let quantized = try_quantize_track(track)?;
        let out_path = out_dir.join(format!("{stem}_t{i}{QUANTIZED_SUFFIX}"));
        quantized.save(&out_path)?;
    }

    Ok(SuccessInfo {
        path: path.to_path_buf(),
        outputs: selected.len(),
    })
}

/// Tokenize one quantized track and write up to `max_chunks_per_track` chunk records.
pub fn extract_file<T: Tokenizer + ?Sized>(
    path: &Path,
    out_dir: &Path,
    tokenizer: &T,
    config: &ExtractConfig,
    seed: Option<u64>,
) -> Result<SuccessInfo> {
    let track = Track::load(path)?;
    let ids = tokenizer.encode_ids(&track)?;

    let stem = stem_of(path);
    let mut rng = item_rng(seed, &stem);
    let chunks = WindowSelector::Estimated(*config).select(ids.ids(), &mut rng);

    if chunks.is_empty() {
        return Err(PrepError::InsufficientStructure(format!(
            "No valid chunks (only {} tokens)",
            ids.len()
        ))
        .into());
    }

    for (i, chunk) in chunks.iter().enumerate() {
        chunk.save(&out_dir.join(format!("{stem}_chunk{i}.json")))?;
    }

    Ok(SuccessInfo {
        path: path.to_path_buf(),
        outputs: chunks.len(),
    })
}

fn finish(split: Split, out_dir: &Path, outcome: RunOutcome<SuccessInfo>) -> StageReport {
    let log_path = out_dir.join(FAILURE_LOG_NAME);

    let failure_log = match outcome.failures.persist(&log_path) {
        Ok(true) => Some(log_path),
        Ok(false) => None,
        Err(e) => {
            warn!("Could not write failure log: {:#}", e);
            None
        }
    };

    StageReport::from_outcome(split, &outcome, failure_log)
}

/// Quantize `<base>/filtered/<split>` into `<base>/quantized/<split>`.
///
/// Returns `Ok(None)` when the split has nothing to process.
pub fn run_quantize_stage(
    opts: &StageOptions,
    split: Split,
    runner: &PipelineRunner,
) -> Result<Option<StageReport>> {
    let in_dir = opts.filtered_dir(split);
    let out_dir = opts.quantized_dir(split);

    if !in_dir.is_dir() {
        warn!("[{}] {} does not exist, skipping..!", split, in_dir.display());
        return Ok(None);
    }

    let files = apply_limit(discover_midi_files(&in_dir)?, opts.limit);
    if files.is_empty() {
        warn!("[{}] No MIDI files in {}", split, in_dir.display());
        return Ok(None);
    }

    fs::create_dir_all(&out_dir).map_err(|e| PrepError::io(&out_dir, e))?;
    info!("[{}] Quantizing {} files -> {}", split, files.len(), out_dir.display());

    let stems = output_stems(&files);
    let outcome = runner.run(files, |path| {
        let stem = stems
            .get(path)
            .cloned()
            .unwrap_or_else(|| stem_of(path));
        quantize_file(path, &out_dir, &stem)
    });

    Ok(Some(finish(split, &out_dir, outcome)))
}

/// Tokenize `<base>/quantized/<split>` and extract chunks into `<base>/tokenized/<split>`.
///
/// Returns `Ok(None)` when the split has nothing to process.
pub fn run_tokenize_stage<T: Tokenizer + ?Sized>(
    opts: &StageOptions,
    split: Split,
    runner: &PipelineRunner,
    tokenizer: &T,
    config: &ExtractConfig,
    seed: Option<u64>,
) -> Result<Option<StageReport>> {
    let in_dir = opts.quantized_dir(split);
    let out_dir = opts.tokenized_dir(split);

    if !in_dir.is_dir() {
        warn!(
            "[{}] {} does not exist! Run the quantize stage first..!",
            split,
            in_dir.display()
        );
        return Ok(None);
    }

    let files = apply_limit(discover_track_files(&in_dir)?, opts.limit);
    if files.is_empty() {
        warn!("[{}] No quantized tracks in {}", split, in_dir.display());
        return Ok(None);
    }

    fs::create_dir_all(&out_dir).map_err(|e| PrepError::io(&out_dir, e))?;
    info!("[{}] Tokenizing {} files -> {}", split, files.len(), out_dir.display());

    let outcome = runner.run(files, |path| extract_file(path, &out_dir, tokenizer, config, seed));

    Ok(Some(finish(split, &out_dir, outcome)))
}
