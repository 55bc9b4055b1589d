use clap::{Args as ClapArgs, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "symprep",
    about = "Prepare quantized, tokenized 16-bar windows of MIDI tracks for training."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Prints extra information to the terminal.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Snap every MIDI file under `<base>/filtered/<split>` onto a sixteenth-note grid.
    Quantize(StageArgs),

    /// Tokenize quantized tracks and extract 16-bar chunks into `<base>/tokenized/<split>`.
    Tokenize(TokenizeArgs),

    /// Build a few training samples from quantized tracks and print their shapes.
    Sample(SampleArgs),

    /// Print the model configuration handed to the external trainer.
    ModelConfig,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct StageArgs {
    /// Root data directory.
    #[arg(long, default_value = "data")]
    pub base: PathBuf,

    /// Which split(s) to process.
    #[arg(long, default_value = "both", value_parser = ["train", "val", "both"])]
    pub split: String,

    /// Number of parallel workers.
    #[arg(long, default_value_t = 8)]
    pub workers: usize,

    /// Only process this many files per split (for quick tests).
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct TokenizeArgs {
    #[command(flatten)]
    pub stage: StageArgs,

    /// Minimum tokens required per chunk.
    #[arg(long = "min-tokens", default_value_t = 100)]
    pub min_tokens: usize,

    /// Maximum chunks kept per track.
    #[arg(long = "max-chunks", default_value_t = 3)]
    pub max_chunks: usize,

    /// Seed for chunk selection; random when omitted.
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct SampleArgs {
    /// Root data directory.
    #[arg(long, default_value = "data")]
    pub base: PathBuf,

    /// Which split(s) to sample from.
    #[arg(long, default_value = "both", value_parser = ["train", "val", "both"])]
    pub split: String,

    /// Longest sequence handed to the model.
    #[arg(long = "max-seq-len", default_value_t = 1024)]
    pub max_seq_len: usize,

    /// How many individual samples to print.
    #[arg(long, default_value_t = 2)]
    pub count: usize,

    /// Samples per collated batch.
    #[arg(long = "batch-size", default_value_t = 4)]
    pub batch_size: usize,

    /// Seed for window sampling; random when omitted.
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Hyperparameters for the external sequence model, passed by value instead of
/// being read from the process environment.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub vocab_size: usize,
    pub n_embd: usize,
    pub n_layer: usize,
    pub head_size_a: usize,
    pub head_size_divisor: usize,
    pub ctx_len: usize,
    pub dropout: f32,
}

impl ModelConfig {
    pub fn new(vocab_size: usize) -> Self {
        Self {
            vocab_size,
            n_embd: 512,
            n_layer: 8,
            head_size_a: 64,
            head_size_divisor: 8,
            ctx_len: 2048,
            dropout: 0.0,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn tokenize_defaults() {
        let args = Args::parse_from(["symprep", "tokenize"]);
        let Command::Tokenize(t) = args.command else {
            panic!("expected tokenize subcommand");
        };

        assert_eq!(t.stage.base, PathBuf::from("data"));
        assert_eq!(t.stage.split, "both");
        assert_eq!(t.stage.workers, 8);
        assert_eq!(t.stage.limit, None);
        assert_eq!(t.min_tokens, 100);
        assert_eq!(t.max_chunks, 3);
    }

    #[test]
    fn rejects_unknown_split() {
        let res = Args::try_parse_from(["symprep", "quantize", "--split", "test"]);
        assert!(res.is_err());
    }

    #[test]
    fn model_config_heads() {
        let cfg = ModelConfig::new(300);
        assert_eq!(cfg.vocab_size, 300);
        assert_eq!(cfg.n_embd % cfg.head_size_a, 0);
    }
}
