mod function_record;
mod oracle;
mod report;
mod runner;

pub use function_record::FunctionRecord;
pub(crate) use function_record::package_name_for;
pub use oracle::CodeOracle;
pub use report::{PipelineAttempt, PipelineState, UnitReport, UnitStatus, ValidationReport};
pub use runner::{RunnerOutcome, TestRunner};
