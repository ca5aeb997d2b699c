//! Output formatting and display system
//!
//! Renders the result envelope as plain text, colored text or JSON.

mod colored;
mod formatter;
mod json;

pub use colored::{ColorScheme, ColoredFormatter, PerformanceLevel};
pub use formatter::{Alignment, Column, FormattingOptions, OutputFormatter, PlainFormatter, RowData, TableFormat};
pub use json::JsonFormatter;

use crate::{error::Result, models::ExecutionResult};

/// Output formatting factory for creating appropriate formatters
pub struct OutputFormatterFactory;

impl OutputFormatterFactory {
    /// JSON wins over color; color selects the colored text formatter
    pub fn create_formatter(json: bool, enable_color: bool, verbose: bool) -> Box<dyn OutputFormatter> {
        if json {
            return Box::new(JsonFormatter::new());
        }

        let options = FormattingOptions {
            enable_color,
            verbose_mode: verbose,
            ..FormattingOptions::default()
        };

        if enable_color {
            Box::new(ColoredFormatter::new(options))
        } else {
            Box::new(PlainFormatter::new(options))
        }
    }

    /// Create a plain text formatter for scripts/logs
    pub fn create_plain_formatter() -> Box<dyn OutputFormatter> {
        Self::create_formatter(false, false, true)
    }
}

/// Main output coordinator that handles all result display
pub struct OutputCoordinator {
    formatter: Box<dyn OutputFormatter>,
}

impl OutputCoordinator {
    pub fn new(formatter: Box<dyn OutputFormatter>) -> Self {
        Self { formatter }
    }

    pub fn display_results(&self, result: &ExecutionResult) -> Result<String> {
        self.formatter.format_execution_result(result)
    }

    /// One line for the end of a text report
    pub fn display_summary(&self, result: &ExecutionResult) -> Result<String> {
        if !result.success {
            return self
                .formatter
                .format_error(result.error.as_deref().unwrap_or("unknown error"));
        }

        let total = result.results.len();
        let passed = result.results.values().filter(|r| r.success()).count();
        let line = format!("{}/{} probes succeeded", passed, total);
        if passed == total {
            self.formatter.format_success(&line)
        } else {
            self.formatter.format_warning(&line)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PingResult, ProbeReport};

    #[test]
    fn test_json_coordinator() {
        let coordinator = OutputCoordinator::new(OutputFormatterFactory::create_formatter(true, true, false));
        let output = coordinator
            .display_results(&ExecutionResult::rejected("", "目标主机不能为空"))
            .unwrap();
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "目标主机不能为空");
    }

    #[test]
    fn test_summary_line() {
        let coordinator = OutputCoordinator::new(OutputFormatterFactory::create_plain_formatter());
        let mut result = ExecutionResult::new("example.com");
        result.results.insert(
            "ping".to_string(),
            ProbeReport::Ping(PingResult::failed("example.com", "unreachable")),
        );
        let summary = coordinator.display_summary(&result).unwrap();
        assert_eq!(summary, "  WARNING: 0/1 probes succeeded");

        assert_eq!(
            coordinator
                .display_summary(&ExecutionResult::rejected("", "目标主机不能为空"))
                .unwrap(),
            "ERROR: 目标主机不能为空"
        );
    }
}
