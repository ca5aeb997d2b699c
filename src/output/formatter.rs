//! Core formatting trait and the plain text implementation
//!
//! Section bodies are shared with the colored formatter; only status
//! lines, warnings and headers differ between the two.

use crate::{
    error::{AppError, Result},
    models::{
        BandwidthResult, BatchPortScanResult, DnsResult, ExecutionResult, PingResult, ProbeReport,
        QualityAssessment, TracerouteResult,
    },
};
use std::fmt::Write as _;

pub(crate) fn fmt_err(e: std::fmt::Error) -> AppError {
    AppError::io(format!("Failed to format output: {}", e))
}

/// Main trait for output formatting
pub trait OutputFormatter {
    fn format_header(&self, title: &str) -> Result<String>;

    fn format_ping(&self, result: &PingResult) -> Result<String>;

    fn format_dns(&self, result: &DnsResult) -> Result<String>;

    fn format_ports(&self, result: &BatchPortScanResult) -> Result<String>;

    fn format_bandwidth(&self, result: &BandwidthResult) -> Result<String>;

    fn format_traceroute(&self, result: &TracerouteResult) -> Result<String>;

    fn format_quality(&self, assessment: &QualityAssessment) -> Result<String>;

    fn format_error(&self, error: &str) -> Result<String>;

    fn format_warning(&self, warning: &str) -> Result<String>;

    fn format_success(&self, message: &str) -> Result<String>;

    /// Format one entry of the results map
    fn format_report(&self, name: &str, report: &ProbeReport) -> Result<String> {
        match report {
            ProbeReport::Ping(r) => self.format_ping(r),
            ProbeReport::Dns(r) => self.format_dns(r),
            ProbeReport::Port(r) => self.format_ports(r),
            ProbeReport::Bandwidth(r) => self.format_bandwidth(r),
            ProbeReport::Traceroute(r) => self.format_traceroute(r),
            ProbeReport::Failed(failure) => Ok(format!(
                "[{}]\n{}",
                name.to_uppercase(),
                self.format_error(&failure.error)?
            )),
        }
    }

    /// Format the whole envelope
    fn format_execution_result(&self, result: &ExecutionResult) -> Result<String> {
        let mut output = self.format_header(&format!("Network Diagnostics: {}", result.target))?;
        output.push_str("\n\n");

        if !result.success {
            output.push_str(&self.format_error(result.error.as_deref().unwrap_or("unknown error"))?);
            return Ok(output);
        }

        for (name, report) in &result.results {
            output.push_str(&self.format_report(name, report)?);
            output.push_str("\n\n");
        }

        if let Some(ref quality) = result.quality {
            output.push_str(&self.format_quality(quality)?);
        }

        Ok(output.trim_end().to_string())
    }
}

/// Configuration options for formatting
#[derive(Debug, Clone)]
pub struct FormattingOptions {
    pub enable_color: bool,
    /// Show samples, per-port rows and per-hop rows
    pub verbose_mode: bool,
    pub table_borders: bool,
    pub max_width: usize,
}

impl Default for FormattingOptions {
    fn default() -> Self {
        Self {
            enable_color: true,
            verbose_mode: false,
            table_borders: true,
            max_width: 120,
        }
    }
}

/// Table formatting configuration
#[derive(Debug, Clone)]
pub struct TableFormat {
    pub columns: Vec<Column>,
    pub show_borders: bool,
    pub show_header: bool,
}

/// Column definition for table formatting
#[derive(Debug, Clone)]
pub struct Column {
    pub header: String,
    pub alignment: Alignment,
    pub min_width: usize,
    pub max_width: usize,
}

impl Column {
    pub fn new(header: &str, alignment: Alignment, max_width: usize) -> Self {
        Self {
            header: header.to_string(),
            alignment,
            min_width: header.chars().count(),
            max_width,
        }
    }
}

/// Text alignment options
#[derive(Debug, Clone)]
pub enum Alignment {
    Left,
    Right,
    Center,
}

/// Row data for table formatting
pub type RowData = Vec<String>;

/// Plain text formatter implementation
pub struct PlainFormatter {
    options: FormattingOptions,
}

impl PlainFormatter {
    pub fn new(options: FormattingOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &FormattingOptions {
        &self.options
    }

    /// Create a table with the given format and data
    pub(crate) fn create_table(&self, format: &TableFormat, rows: &[RowData]) -> String {
        if rows.is_empty() {
            return String::new();
        }

        let column_widths = self.calculate_column_widths(format, rows);
        let mut output = String::new();

        if format.show_header && !format.columns.is_empty() {
            if format.show_borders {
                output.push_str(&self.create_horizontal_border(&column_widths));
                output.push('\n');
            }

            let headers: Vec<String> = format.columns.iter().map(|c| c.header.clone()).collect();
            output.push_str(&self.create_row(&headers, &column_widths, format));
            output.push('\n');

            if format.show_borders {
                output.push_str(&self.create_horizontal_border(&column_widths));
                output.push('\n');
            }
        }

        for row in rows {
            output.push_str(&self.create_row(row, &column_widths, format));
            output.push('\n');
        }

        if format.show_borders {
            output.push_str(&self.create_horizontal_border(&column_widths));
        }

        output.trim_end().to_string()
    }

    fn calculate_column_widths(&self, format: &TableFormat, rows: &[RowData]) -> Vec<usize> {
        let num_columns = format
            .columns
            .len()
            .max(rows.iter().map(|r| r.len()).max().unwrap_or(0));

        (0..num_columns)
            .map(|col_idx| {
                let column = format.columns.get(col_idx);
                let mut width = column.map(|c| c.min_width).unwrap_or(1);
                for row in rows {
                    if let Some(cell) = row.get(col_idx) {
                        width = width.max(cell.chars().count());
                    }
                }
                match column {
                    Some(c) => width.min(c.max_width),
                    None => width.min(self.options.max_width),
                }
            })
            .collect()
    }

    fn create_row(&self, data: &[String], widths: &[usize], format: &TableFormat) -> String {
        let mut row = String::new();

        if format.show_borders {
            row.push('|');
        }

        for (idx, (cell, &width)) in data.iter().zip(widths.iter()).enumerate() {
            let alignment = format
                .columns
                .get(idx)
                .map(|c| &c.alignment)
                .unwrap_or(&Alignment::Left);

            if format.show_borders {
                row.push(' ');
            }
            row.push_str(&align_text(cell, width, alignment));
            if format.show_borders {
                row.push_str(" |");
            } else {
                row.push_str("  ");
            }
        }

        row.trim_end().to_string()
    }

    fn create_horizontal_border(&self, widths: &[usize]) -> String {
        let mut border = String::new();

        if !widths.is_empty() {
            border.push('+');
            for &width in widths {
                border.push_str(&"-".repeat(width + 2));
                border.push('+');
            }
        }

        border
    }

    fn status_line(&self, title: &str, success: bool, error: Option<&str>) -> String {
        match (success, error) {
            (true, _) => format!("[{}] OK", title),
            (false, Some(error)) => format!("[{}] FAILED: {}", title, error),
            (false, None) => format!("[{}] FAILED", title),
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

    pub(crate) fn ping_body(&self, result: &PingResult) -> Result<String> {
        let mut output = String::new();
        writeln!(
            output,
            "  Sent/Received: {}/{}   Loss: {}",
            result.sent,
            result.received,
            format_percentage(result.packet_loss_percent)
        )
        .map_err(fmt_err)?;

        if result.received > 0 {
            writeln!(
                output,
                "  Latency: min {} / avg {} / max {}",
                format_duration(result.min_latency),
                format_duration(result.avg_latency),
                format_duration(result.max_latency)
            )
            .map_err(fmt_err)?;
            write!(
                output,
                "  Jitter: {}   Std Dev: {}",
                format_duration(result.jitter_ms),
                format_duration(result.std_dev_latency)
            )
            .map_err(fmt_err)?;

            if self.options.verbose_mode {
                let samples: Vec<String> = result.samples.iter().map(|s| format!("{:.1}", s)).collect();
                write!(output, "\n  Samples (ms): {}", samples.join(", ")).map_err(fmt_err)?;
            }
        }

        Ok(output.trim_end().to_string())
    }

    pub(crate) fn dns_body(&self, result: &DnsResult) -> Result<String> {
        let mut lines = vec![
            format!("  IPv4: {}", list_or_none(&result.ipv4)),
            format!("  IPv6: {}", list_or_none(&result.ipv6)),
        ];

        if let Some(ref mx) = result.mx {
            let records: Vec<String> = mx
                .iter()
                .map(|r| format!("{} {}", r.priority, r.exchange))
                .collect();
            lines.push(format!("  MX: {}", list_or_none(&records)));
        }
        if let Some(ref txt) = result.txt {
            let records: Vec<String> = txt.iter().map(|chunks| chunks.concat()).collect();
            lines.push(format!("  TXT: {}", list_or_none(&records)));
        }
        if let Some(ref ns) = result.ns {
            lines.push(format!("  NS: {}", list_or_none(ns)));
        }
        if let Some(ref cname) = result.cname {
            lines.push(format!("  CNAME: {}", list_or_none(cname)));
        }
        lines.push(format!("  Resolution time: {}", format_duration(result.resolution_time_ms)));

        Ok(lines.join("\n"))
    }

    pub(crate) fn ports_body(&self, result: &BatchPortScanResult) -> Result<String> {
        let join = |ports: &[u16]| {
            let ports: Vec<String> = ports.iter().map(u16::to_string).collect();
            list_or_none(&ports)
        };

        let mut output = format!(
            "  Scanned: {}   Open: {}   Closed: {}",
            result.scanned_ports,
            join(&result.open_ports),
            join(&result.closed_ports)
        );

        if self.options.verbose_mode && !result.results.is_empty() {
            let format = TableFormat {
                columns: vec![
                    Column::new("Port", Alignment::Right, 5),
                    Column::new("State", Alignment::Left, 6),
                    Column::new("Time", Alignment::Right, 10),
                    Column::new("Error", Alignment::Left, 60),
                ],
                show_borders: self.options.table_borders,
                show_header: true,
            };
            let rows: Vec<RowData> = result
                .results
                .iter()
                .map(|r| {
                    vec![
                        r.port.to_string(),
                        if r.open { "open" } else { "closed" }.to_string(),
                        r.response_time_ms.map(format_duration).unwrap_or_else(|| "-".to_string()),
                        r.error.clone().unwrap_or_default(),
                    ]
                })
                .collect();
            output.push('\n');
            output.push_str(&self.create_table(&format, &rows));
        }

        Ok(output)
    }

    pub(crate) fn bandwidth_body(&self, result: &BandwidthResult) -> Result<String> {
        Ok(format!(
            "  Direction: {}   Transferred: {} bytes in {}\n  Speed: {:.2} {} ({:.2} Mbps)",
            result.direction,
            result.bytes_transferred,
            format_duration(result.duration_ms),
            result.speed.value,
            result.speed.unit,
            result.mbps
        ))
    }

    pub(crate) fn traceroute_body(&self, result: &TracerouteResult) -> Result<String> {
        let mut output = format!("  Hops: {}   Timeouts: {}", result.total_hops, result.timeouts);

        if !result.hops.is_empty() {
            let format = TableFormat {
                columns: vec![
                    Column::new("Hop", Alignment::Right, 3),
                    Column::new("Address", Alignment::Left, 45),
                    Column::new("Latency", Alignment::Right, 10),
                ],
                show_borders: self.options.table_borders,
                show_header: true,
            };
            let rows: Vec<RowData> = result
                .hops
                .iter()
                .map(|hop| {
                    vec![
                        hop.index.to_string(),
                        hop.address.clone().unwrap_or_else(|| "*".to_string()),
                        hop.latency_ms.map(format_duration).unwrap_or_else(|| "*".to_string()),
                    ]
                })
                .collect();
            output.push('\n');
            output.push_str(&self.create_table(&format, &rows));
        }

        Ok(output)
    }

    pub(crate) fn recommendations_body(&self, assessment: &QualityAssessment) -> String {
        assessment
            .recommendations
            .iter()
            .map(|r| format!("  - {}", r))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Align text within specified width, truncating overlong cells
pub(crate) fn align_text(text: &str, width: usize, alignment: &Alignment) -> String {
    let len = text.chars().count();
    if len >= width {
        return text.chars().take(width).collect();
    }

    let padding = width - len;
    match alignment {
        Alignment::Left => format!("{}{}", text, " ".repeat(padding)),
        Alignment::Right => format!("{}{}", " ".repeat(padding), text),
        Alignment::Center => {
            let left_pad = padding / 2;
            let right_pad = padding - left_pad;
            format!("{}{}{}", " ".repeat(left_pad), text, " ".repeat(right_pad))
        }
    }
}

/// Format milliseconds in a human-readable unit
pub(crate) fn format_duration(duration_ms: f64) -> String {
    if duration_ms < 1.0 {
        format!("{:.0}μs", duration_ms * 1000.0)
    } else if duration_ms < 1000.0 {
        format!("{:.1}ms", duration_ms)
    } else if duration_ms < 60000.0 {
        format!("{:.2}s", duration_ms / 1000.0)
    } else {
        let minutes = (duration_ms / 60000.0) as u32;
        let seconds = (duration_ms % 60000.0) / 1000.0;
        format!("{}m{:.1}s", minutes, seconds)
    }
}

pub(crate) fn format_percentage(percentage: f64) -> String {
    if percentage >= 99.95 {
        "100.0%".to_string()
    } else if percentage < 0.05 {
        "0.0%".to_string()
    } else {
        format!("{:.1}%", percentage)
    }
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(", ")
    }
}

impl OutputFormatter for PlainFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let mut output = String::new();
        let border = "=".repeat(title.chars().count() + 4);

        writeln!(output, "{}", border).map_err(fmt_err)?;
        writeln!(output, "  {}  ", title).map_err(fmt_err)?;
        write!(output, "{}", border).map_err(fmt_err)?;

        Ok(output)
    }

    fn format_ping(&self, result: &PingResult) -> Result<String> {
        let mut output = self.status_line("PING", result.success, result.error.as_deref());
        if result.success {
            output.push('\n');
            output.push_str(&self.ping_body(result)?);
        }
        output.push_str(&self.warnings_block(&result.warnings)?);
        Ok(output)
    }

    fn format_dns(&self, result: &DnsResult) -> Result<String> {
        let mut output = self.status_line("DNS", result.success, result.error.as_deref());
        output.push('\n');
        output.push_str(&self.dns_body(result)?);
        output.push_str(&self.warnings_block(&result.warnings)?);
        Ok(output)
    }

    fn format_ports(&self, result: &BatchPortScanResult) -> Result<String> {
        let mut output = self.status_line("PORT", result.success, result.error.as_deref());
        output.push('\n');
        output.push_str(&self.ports_body(result)?);
        Ok(output)
    }

    fn format_bandwidth(&self, result: &BandwidthResult) -> Result<String> {
        let mut output = self.status_line("BANDWIDTH", result.success, result.error.as_deref());
        if result.success {
            output.push('\n');
            output.push_str(&self.bandwidth_body(result)?);
        }
        output.push_str(&self.warnings_block(&result.warnings)?);
        Ok(output)
    }

    fn format_traceroute(&self, result: &TracerouteResult) -> Result<String> {
        let mut output = self.status_line("TRACEROUTE", result.success, result.error.as_deref());
        if result.success {
            output.push('\n');
            output.push_str(&self.traceroute_body(result)?);
        }
        output.push_str(&self.warnings_block(&result.warnings)?);
        Ok(output)
    }

    fn format_quality(&self, assessment: &QualityAssessment) -> Result<String> {
        let mut output = format!(
            "Quality: {:.2}/100 ({})",
            assessment.score, assessment.rating
        );
        if !assessment.recommendations.is_empty() {
            output.push_str("\nRecommendations:\n");
            output.push_str(&self.recommendations_body(assessment));
        }
        Ok(output)
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("ERROR: {}", error))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("  WARNING: {}", warning))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("SUCCESS: {}", message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PortScanResult, TracerouteHop};
    use crate::types::Rating;

    fn plain(verbose: bool) -> PlainFormatter {
        PlainFormatter::new(FormattingOptions {
            enable_color: false,
            verbose_mode: verbose,
            ..FormattingOptions::default()
        })
    }

    #[test]
    fn test_format_header() {
        let header = plain(false).format_header("Test").unwrap();
        assert_eq!(header, "========\n  Test  \n========");
    }

    #[test]
    fn test_align_text() {
        assert_eq!(align_text("ab", 4, &Alignment::Left), "ab  ");
        assert_eq!(align_text("ab", 4, &Alignment::Right), "  ab");
        assert_eq!(align_text("ab", 4, &Alignment::Center), " ab ");
        assert_eq!(align_text("abcdef", 3, &Alignment::Left), "abc");
    }

    #[test]
    fn test_format_duration_and_percentage() {
        assert_eq!(format_duration(0.5), "500μs");
        assert_eq!(format_duration(25.34), "25.3ms");
        assert_eq!(format_duration(1500.0), "1.50s");
        assert_eq!(format_duration(90_000.0), "1m30.0s");
        assert_eq!(format_percentage(0.0), "0.0%");
        assert_eq!(format_percentage(33.333), "33.3%");
        assert_eq!(format_percentage(100.0), "100.0%");
    }

    #[test]
    fn test_create_table() {
        let formatter = plain(false);
        let format = TableFormat {
            columns: vec![
                Column::new("Hop", Alignment::Right, 3),
                Column::new("Address", Alignment::Left, 20),
            ],
            show_borders: true,
            show_header: true,
        };
        let table = formatter.create_table(&format, &[vec!["1".to_string(), "10.0.0.1".to_string()]]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "+-----+----------+");
        assert_eq!(lines[1], "| Hop | Address  |");
        assert_eq!(lines[3], "|   1 | 10.0.0.1 |");
        assert!(formatter.create_table(&format, &[]).is_empty());
    }

    #[test]
    fn test_format_failed_ping() {
        let output = plain(false)
            .format_ping(&PingResult::failed("example.com", "ping: unknown host"))
            .unwrap();
        assert_eq!(output, "[PING] FAILED: ping: unknown host");
    }

    #[test]
    fn test_format_ports_verbose_table() {
        let batch = BatchPortScanResult::from_results(
            "localhost",
            vec![
                PortScanResult {
                    host: "localhost".to_string(),
                    port: 80,
                    open: true,
                    response_time_ms: Some(1.2),
                    error: None,
                },
                PortScanResult {
                    host: "localhost".to_string(),
                    port: 81,
                    open: false,
                    response_time_ms: None,
                    error: Some("Connection refused".to_string()),
                },
            ],
        );

        let compact = plain(false).format_ports(&batch).unwrap();
        assert!(compact.contains("Open: 80"));
        assert!(compact.contains("Closed: 81"));
        assert!(!compact.contains("Connection refused"));

        let verbose = plain(true).format_ports(&batch).unwrap();
        assert!(verbose.contains("Connection refused"));
    }

    #[test]
    fn test_format_traceroute_marks_timeouts() {
        let result = TracerouteResult {
            target: "example.com".to_string(),
            hops: vec![
                TracerouteHop {
                    index: 1,
                    address: Some("10.0.0.1".to_string()),
                    latency_ms: Some(1.0),
                },
                TracerouteHop {
                    index: 2,
                    address: None,
                    latency_ms: None,
                },
            ],
            total_hops: 2,
            timeouts: 1,
            warnings: vec!["检测到 1 个超时跳点".to_string()],
            success: true,
            error: None,
        };
        let output = plain(false).format_traceroute(&result).unwrap();
        assert!(output.contains("Timeouts: 1"));
        assert!(output.contains("|   2 | *"));
        assert!(output.contains("WARNING: 检测到 1 个超时跳点"));
    }

    #[test]
    fn test_format_quality() {
        let assessment = QualityAssessment {
            score: 35.5,
            rating: Rating::Poor,
            recommendations: vec!["优化网络路由".to_string()],
        };
        let output = plain(false).format_quality(&assessment).unwrap();
        assert!(output.starts_with("Quality: 35.50/100 (poor)"));
        assert!(output.contains("  - 优化网络路由"));
    }

    #[test]
    fn test_format_rejected_envelope() {
        let envelope = ExecutionResult::rejected("", "目标主机不能为空");
        let output = plain(false).format_execution_result(&envelope).unwrap();
        assert!(output.ends_with("ERROR: 目标主机不能为空"));
    }
}
