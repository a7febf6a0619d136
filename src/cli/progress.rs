use std::time::Instant;

use testsmith::data::{UnitReport, UnitStatus};

pub struct ProgressIndicator {
    processed: usize,
    succeeded: usize,
    warnings: usize,
    failed: usize,
    start_time: Instant,
}

impl ProgressIndicator {
    pub fn new() -> Self {
        Self {
            processed: 0,
            succeeded: 0,
            warnings: 0,
            failed: 0,
            start_time: Instant::now(),
        }
    }

    pub fn record(&mut self, report: &UnitReport) {
        self.processed += 1;
        let mark = match report.status {
            UnitStatus::Success => {
                self.succeeded += 1;
                "✓"
            }
            UnitStatus::SuccessWithWarning => {
                self.warnings += 1;
                "⚠"
            }
            UnitStatus::Failed | UnitStatus::PartiallyFailed => {
                self.failed += 1;
                "✗"
            }
        };
        println!("{} [{}] {}", mark, self.processed, report.status_line());
    }

    pub fn finish(&self) {
        let elapsed = self.start_time.elapsed();
        println!("\n{}", "=".repeat(60));
        println!("Summary:");
        println!("  Total:     {}", self.processed);
        println!("  Succeeded: {}", self.succeeded);
        println!("  Warnings:  {}", self.warnings);
        println!("  Failed:    {}", self.failed);
        println!("  Duration:  {:.2}s", elapsed.as_secs_f64());
        println!("{}", "=".repeat(60));
    }
}
