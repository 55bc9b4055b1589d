mod dataset;
mod error;
mod midi_importer;
mod model;
mod quantize;
mod tokenizer;
mod util;

pub mod pipeline;
pub mod window;

pub use dataset::*;
pub use error::*;
pub use midi_importer::*;
pub use model::config::*;
pub use model::token::*;
pub use model::track::*;
pub use pipeline::*;
pub use quantize::*;
pub use tokenizer::*;
pub use util::*;
pub use window::*;
