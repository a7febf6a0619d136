pub mod cleanup;
pub mod merge;
pub mod pipeline;
pub mod scanner;
pub mod synthesizer;
pub mod test_file;

pub use merge::MergeOptions;
pub use pipeline::{CaseType, Pipeline, PipelineConfig, UnitOptions};
pub use synthesizer::ScaffoldTemplate;
