pub mod report;
pub mod runner;
pub mod stages;

pub use report::{FailureInfo, FailureLog, persist_failures, read_failure_log};
pub use runner::{DEFAULT_CONCURRENCY, PipelineRunner, RunOutcome, SuccessInfo};
pub use stages::{
    FAILURE_LOG_NAME, QUANTIZED_SUFFIX, Split, StageOptions, StageReport, discover_midi_files,
    discover_track_files, extract_file, output_stems, quantize_file, run_quantize_stage,
    run_tokenize_stage,
};
