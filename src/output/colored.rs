//! Colored formatter implementation with terminal color support

use super::formatter::{FormattingOptions, OutputFormatter, PlainFormatter};
use crate::{
    error::Result,
    models::{
        BandwidthResult, BatchPortScanResult, DnsResult, PingResult, QualityAssessment, TracerouteResult,
    },
    types::Rating,
};
use colored::*;

/// Latency classification for color coding
#[derive(Debug, Clone, PartialEq)]
pub enum PerformanceLevel {
    Excellent, // < 50ms
    Good,      // 50-100ms
    Fair,      // 100-300ms
    Poor,      // 300-1000ms
    VeryPoor,  // > 1000ms
}

impl PerformanceLevel {
    pub fn from_response_time(time_ms: f64) -> Self {
        if time_ms < 50.0 {
            Self::Excellent
        } else if time_ms < 100.0 {
            Self::Good
        } else if time_ms < 300.0 {
            Self::Fair
        } else if time_ms < 1000.0 {
            Self::Poor
        } else {
            Self::VeryPoor
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Self::Excellent => Color::Green,
            Self::Good => Color::Cyan,
            Self::Fair => Color::Yellow,
            Self::Poor => Color::Magenta,
            Self::VeryPoor => Color::Red,
        }
    }
}

/// Color scheme configuration
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub header: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub info: Color,
    pub muted: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            header: Color::Blue,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            info: Color::Cyan,
            muted: Color::BrightBlack,
        }
    }
}

/// Colored formatter; section bodies come from the plain formatter
pub struct ColoredFormatter {
    plain_formatter: PlainFormatter,
    options: FormattingOptions,
    color_scheme: ColorScheme,
}

impl ColoredFormatter {
    pub fn new(options: FormattingOptions) -> Self {
        Self::with_color_scheme(options, ColorScheme::default())
    }

    pub fn with_color_scheme(options: FormattingOptions, color_scheme: ColorScheme) -> Self {
        Self {
            plain_formatter: PlainFormatter::new(options.clone()),
            options,
            color_scheme,
        }
    }

    /// Apply color to text if colors are enabled
    fn colorize(&self, text: &str, color: Color) -> ColoredString {
        if self.options.enable_color {
            text.color(color)
        } else {
            text.normal()
        }
    }

    fn bold(&self, text: &str) -> ColoredString {
        if self.options.enable_color {
            text.bold()
        } else {
            text.normal()
        }
    }

    fn rating_color(&self, rating: Rating) -> Color {
        match rating {
            Rating::Excellent => self.color_scheme.success,
            Rating::Good => self.color_scheme.info,
            Rating::Fair => self.color_scheme.warning,
            Rating::Poor => self.color_scheme.error,
        }
    }

    fn status_line(&self, title: &str, success: bool, error: Option<&str>) -> String {
        let title = self.bold(&format!("[{}]", title));
        if success {
            format!("{} {}", title, self.colorize("✓ OK", self.color_scheme.success))
        } else {
            let detail = match error {
                Some(error) => format!("✗ {}", error),
                None => "✗ FAILED".to_string(),
            };
            format!("{} {}", title, self.colorize(&detail, self.color_scheme.error))
        }
    }

    fn warnings_block(&self, warnings: &[String]) -> Result<String> {
        let mut output = String::new();
        for warning in warnings {
            output.push('\n');
            output.push_str(&self.format_warning(warning)?);
        }
        Ok(output)
    }
}

impl OutputFormatter for ColoredFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let border = "═".repeat(title.chars().count() + 4);
        Ok(format!(
            "{}\n  {}  \n{}",
            self.colorize(&border, self.color_scheme.header),
            self.bold(title),
            self.colorize(&border, self.color_scheme.header)
        ))
    }

    fn format_ping(&self, result: &PingResult) -> Result<String> {
        let mut output = self.status_line("PING", result.success, result.error.as_deref());
        if result.success {
            let level = PerformanceLevel::from_response_time(result.avg_latency);
            output.push(' ');
            output.push_str(
                &self
                    .colorize(&format!("avg {:.1}ms", result.avg_latency), level.color())
                    .to_string(),
            );
            output.push('\n');
            output.push_str(&self.plain_formatter.ping_body(result)?);
        }
        output.push_str(&self.warnings_block(&result.warnings)?);
        Ok(output)
    }

    fn format_dns(&self, result: &DnsResult) -> Result<String> {
        let mut output = self.status_line("DNS", result.success, result.error.as_deref());
        output.push('\n');
        output.push_str(&self.plain_formatter.dns_body(result)?);
        output.push_str(&self.warnings_block(&result.warnings)?);
        Ok(output)
    }

    fn format_ports(&self, result: &BatchPortScanResult) -> Result<String> {
        let mut output = self.status_line("PORT", result.success, result.error.as_deref());
        let summary = format!("{}/{} open", result.open_ports.len(), result.scanned_ports);
        let color = if result.open_ports.len() == result.scanned_ports {
            self.color_scheme.success
        } else if result.open_ports.is_empty() {
            self.color_scheme.error
        } else {
            self.color_scheme.warning
        };
        output.push(' ');
        output.push_str(&self.colorize(&summary, color).to_string());
        output.push('\n');
        output.push_str(&self.plain_formatter.ports_body(result)?);
        Ok(output)
    }

    fn format_bandwidth(&self, result: &BandwidthResult) -> Result<String> {
        let mut output = self.status_line("BANDWIDTH", result.success, result.error.as_deref());
        if result.success {
            output.push('\n');
            output.push_str(&self.plain_formatter.bandwidth_body(result)?);
        }
        output.push_str(&self.warnings_block(&result.warnings)?);
        Ok(output)
    }

    fn format_traceroute(&self, result: &TracerouteResult) -> Result<String> {
        let mut output = self.status_line("TRACEROUTE", result.success, result.error.as_deref());
        if result.success {
            output.push('\n');
            output.push_str(&self.plain_formatter.traceroute_body(result)?);
        }
        output.push_str(&self.warnings_block(&result.warnings)?);
        Ok(output)
    }

    fn format_quality(&self, assessment: &QualityAssessment) -> Result<String> {
        let color = self.rating_color(assessment.rating);
        let mut output = format!(
            "{} {} {}",
            self.bold("Quality:"),
            self.colorize(&format!("{:.2}/100", assessment.score), color),
            self.colorize(&format!("({})", assessment.rating), color)
        );
        if !assessment.recommendations.is_empty() {
            output.push('\n');
            output.push_str(&self.colorize("Recommendations:", self.color_scheme.info).to_string());
            output.push('\n');
            output.push_str(&self.plain_formatter.recommendations_body(assessment));
        }
        Ok(output)
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("{} {}", self.colorize("✗ ERROR:", self.color_scheme.error), error))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("  {} {}", self.colorize("⚠", self.color_scheme.warning), warning))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("{} {}", self.colorize("✓", self.color_scheme.success), message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExecutionResult;

    fn formatter() -> ColoredFormatter {
        // Colors off keeps assertions independent of the terminal
        ColoredFormatter::new(FormattingOptions {
            enable_color: false,
            ..FormattingOptions::default()
        })
    }

    #[test]
    fn test_performance_levels() {
        assert_eq!(PerformanceLevel::from_response_time(10.0), PerformanceLevel::Excellent);
        assert_eq!(PerformanceLevel::from_response_time(75.0), PerformanceLevel::Good);
        assert_eq!(PerformanceLevel::from_response_time(150.0), PerformanceLevel::Fair);
        assert_eq!(PerformanceLevel::from_response_time(500.0), PerformanceLevel::Poor);
        assert_eq!(PerformanceLevel::from_response_time(1500.0), PerformanceLevel::VeryPoor);
    }

    #[test]
    fn test_status_lines() {
        let f = formatter();
        assert_eq!(f.status_line("DNS", true, None), "[DNS] ✓ OK");
        assert_eq!(f.status_line("DNS", false, Some("NXDOMAIN")), "[DNS] ✗ NXDOMAIN");
    }

    #[test]
    fn test_quality_line() {
        let output = formatter()
            .format_quality(&QualityAssessment {
                score: 95.0,
                rating: Rating::Excellent,
                recommendations: Vec::new(),
            })
            .unwrap();
        assert_eq!(output, "Quality: 95.00/100 (excellent)");
    }

    #[test]
    fn test_execution_result_sections() {
        let mut envelope = ExecutionResult::new("example.com");
        envelope.results.insert(
            "ping".to_string(),
            crate::models::ProbeReport::Ping(PingResult::failed("example.com", "timeout")),
        );
        let output = formatter().format_execution_result(&envelope).unwrap();
        assert!(output.contains("Network Diagnostics: example.com"));
        assert!(output.contains("[PING] ✗ timeout"));
    }
}
