use anyhow::Result;
use clap::Parser;
use log::{error, info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use symprep::{
    Args, Command, ExtractConfig, ModelConfig, PipelineRunner, QuantizedDataset, RemiTokenizer,
    SampleArgs, StageOptions, StageReport, Tokenizer, collate, parse_splits, run_quantize_stage,
    run_tokenize_stage,
};

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_for_handler = Arc::clone(&cancel);
    ctrlc::set_handler(move || {
        warn!("Ctrl-C received, finishing in-flight files then stopping..!");
        cancel_for_handler.store(true, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl-C handler..!");

    match args.command {
        Command::Quantize(stage) => {
            let opts = StageOptions {
                base: stage.base,
                workers: stage.workers,
                limit: stage.limit,
            };
            let runner = PipelineRunner::new(opts.workers).with_cancel_flag(Arc::clone(&cancel));

            for split in parse_splits(&stage.split) {
                if cancel.load(Ordering::SeqCst) {
                    break;
                }

                match run_quantize_stage(&opts, split, &runner) {
                    Ok(Some(report)) => print_report(&report, false),
                    Ok(None) => {}
                    Err(e) => error!("[{}] skipped: {:#}", split, e),
                }
            }
        }
        Command::Tokenize(t) => {
            let opts = StageOptions {
                base: t.stage.base,
                workers: t.stage.workers,
                limit: t.stage.limit,
            };
            let config = ExtractConfig {
                min_tokens: t.min_tokens,
                max_chunks_per_track: t.max_chunks,
                ..ExtractConfig::default()
            };
            let tokenizer = RemiTokenizer::new();
            info!("Vocabulary size: {}", tokenizer.vocab_size());

            let runner = PipelineRunner::new(opts.workers).with_cancel_flag(Arc::clone(&cancel));

            for split in parse_splits(&t.stage.split) {
                if cancel.load(Ordering::SeqCst) {
                    break;
                }

                match run_tokenize_stage(&opts, split, &runner, &tokenizer, &config, t.seed) {
                    Ok(Some(report)) => print_report(&report, true),
                    Ok(None) => {}
                    Err(e) => error!("[{}] skipped: {:#}", split, e),
                }
            }
        }
        Command::Sample(sample) => run_sample(sample)?,
        Command::ModelConfig => {
            let config = ModelConfig::new(RemiTokenizer::new().vocab_size());
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn print_report(report: &StageReport, with_chunks: bool) {
    if with_chunks {
        println!(
            "[{}] Done: {} files -> {} chunks, {} failed",
            report.split, report.ok, report.outputs, report.failed
        );
    } else {
        println!(
            "[{}] done: {} ok, {} failed",
            report.split, report.ok, report.failed
        );
    }

    if report.not_run > 0 {
        println!("[{}] {} files not run (interrupted)", report.split, report.not_run);
    }

    if let Some(log) = &report.failure_log {
        println!("Failure log -> {}", log.display());
    }
}

fn run_sample(args: SampleArgs) -> Result<()> {
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    for split in parse_splits(&args.split) {
        let dir = args.base.join("quantized").join(split.as_str());

        if !dir.is_dir() {
            warn!("{} does not exist! Run the quantize stage first..!", dir.display());
            continue;
        }

        let dataset = QuantizedDataset::open(&dir, RemiTokenizer::new(), args.max_seq_len)?;
        println!("[{}] dataset size: {}", split, dataset.len());

        for i in 0..args.count.min(dataset.len()) {
            let sample = dataset.get(i, &mut rng)?;
            println!(
                "Sample {}: input_ids={} labels={}",
                i,
                sample.input_ids.len(),
                sample.labels.len()
            );
        }

        let batch_size = args.batch_size.min(dataset.len());
        let mut samples = Vec::with_capacity(batch_size);
        for i in rand::seq::index::sample(&mut rng, dataset.len(), batch_size) {
            samples.push(dataset.get(i, &mut rng)?);
        }

        let (rows, cols) = collate(&samples).shape();
        println!("[{}] batch input_ids shape: [{}, {}]", split, rows, cols);
    }

    Ok(())
}
