//! Ping output parsing and latency analysis
//!
//! Platform differences in `ping` output are isolated behind
//! [`PingOutputParser`]; [`PingAnalyzer`] turns a parsed run into a
//! [`PingResult`] with statistics, packet loss and threshold warnings.

use crate::{
    error::Result,
    models::{
        results::{clamp_percent, non_negative},
        PingOptions, PingResult, WarningThresholds,
    },
    probe::command::CommandOutput,
    stats::LatencyStatistics,
    types::Platform,
};
use once_cell::sync::Lazy;
use regex::Regex;

pub const WARN_HIGH_LATENCY: &str = "高延迟";
pub const WARN_PACKET_LOSS: &str = "丢包率过高";
pub const WARN_HIGH_JITTER: &str = "网络抖动较大";

static TIME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:time|时间)\s*[=<]\s*([\d.]+)\s*ms").expect("valid time regex")
});

static TIMEOUT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(request timed?\s?out|destination (?:host|net|port) unreachable|no answer yet|请求超时|无法访问目标主机)")
        .expect("valid timeout regex")
});

static TOTAL_LOSS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b100(?:\.0+)?% (?:packet )?loss").expect("valid loss regex"));

static UNIX_SUMMARY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+) packets transmitted, (\d+) (?:packets )?received").expect("valid summary regex")
});

static WINDOWS_SUMMARY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:sent|已发送)\s*=\s*(\d+)[,，]\s*(?:received|已接收)\s*=\s*(\d+)")
        .expect("valid summary regex")
});

/// Raw counts recovered from ping output
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPing {
    /// Round-trip times in ms, in reply order
    pub samples: Vec<f64>,
    /// Attempts that produced no reply
    pub timeouts: u32,
    /// Transmitted count from the summary line, when present
    pub transmitted: Option<u32>,
}

impl ParsedPing {
    /// Total attempts after reconciling with the summary line
    pub fn attempts(&self) -> u32 {
        self.samples.len() as u32 + self.timeouts
    }

    fn reconcile(&mut self) {
        if let Some(transmitted) = self.transmitted {
            let received = self.samples.len() as u32;
            if transmitted > self.attempts() {
                self.timeouts = transmitted.saturating_sub(received);
            }
        }
    }
}

/// Platform-specific ping invocation and output format
pub trait PingOutputParser: Send + Sync {
    /// Executable name
    fn program(&self) -> &'static str;

    /// Arguments for pinging `target`
    fn build_args(&self, target: &str, options: &PingOptions) -> Vec<String>;

    /// Extract samples and timeouts from stdout
    fn parse(&self, output: &str) -> ParsedPing;
}

/// Line scan shared by both platforms; only the summary format differs
fn scan_lines(output: &str, summary: &Regex) -> ParsedPing {
    let mut parsed = ParsedPing::default();
    let mut total_loss_seen = false;

    for line in output.lines() {
        if let Some(caps) = TIME_RE.captures(line) {
            if let Ok(value) = caps[1].parse::<f64>() {
                parsed.samples.push(non_negative(value));
                continue;
            }
        }
        if TIMEOUT_RE.is_match(line) {
            parsed.timeouts += 1;
            continue;
        }
        if let Some(caps) = summary.captures(line) {
            parsed.transmitted = caps[1].parse().ok();
        }
        if TOTAL_LOSS_RE.is_match(line) {
            total_loss_seen = true;
        }
    }

    if total_loss_seen && parsed.attempts() == 0 && parsed.transmitted.is_none() {
        parsed.timeouts = 1;
    }
    parsed.reconcile();
    parsed
}

/// iputils/BSD style `ping`
#[derive(Debug, Clone, Copy, Default)]
pub struct UnixPingParser;

impl PingOutputParser for UnixPingParser {
    fn program(&self) -> &'static str {
        "ping"
    }

    fn build_args(&self, target: &str, options: &PingOptions) -> Vec<String> {
        let wait_secs = options.timeout_ms.div_ceil(1000).max(1);
        let mut args = vec![
            "-c".to_string(),
            options.count.max(1).to_string(),
            "-W".to_string(),
            wait_secs.to_string(),
        ];
        if let Some(size) = options.packet_size {
            args.push("-s".to_string());
            args.push(size.to_string());
        }
        if let Some(interval) = options.interval_ms {
            args.push("-i".to_string());
            args.push(format!("{:.1}", interval as f64 / 1000.0));
        }
        args.push(target.to_string());
        args
    }

    fn parse(&self, output: &str) -> ParsedPing {
        scan_lines(output, &UNIX_SUMMARY_RE)
    }
}

/// Windows `ping.exe`
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsPingParser;

impl PingOutputParser for WindowsPingParser {
    fn program(&self) -> &'static str {
        "ping"
    }

    fn build_args(&self, target: &str, options: &PingOptions) -> Vec<String> {
        let mut args = vec![
            "-n".to_string(),
            options.count.max(1).to_string(),
            "-w".to_string(),
            options.timeout_ms.max(1).to_string(),
        ];
        if let Some(size) = options.packet_size {
            args.push("-l".to_string());
            args.push(size.to_string());
        }
        args.push(target.to_string());
        args
    }

    fn parse(&self, output: &str) -> ParsedPing {
        scan_lines(output, &WINDOWS_SUMMARY_RE)
    }
}

/// Parser for the given platform
pub fn parser_for(platform: Platform) -> Box<dyn PingOutputParser> {
    match platform {
        Platform::Unix => Box::new(UnixPingParser),
        Platform::Windows => Box::new(WindowsPingParser),
    }
}

/// Converts ping output into a [`PingResult`]
pub struct PingAnalyzer {
    parser: Box<dyn PingOutputParser>,
    thresholds: WarningThresholds,
}

impl PingAnalyzer {
    pub fn new(parser: Box<dyn PingOutputParser>, thresholds: WarningThresholds) -> Self {
        Self { parser, thresholds }
    }

    pub fn for_platform(platform: Platform, thresholds: WarningThresholds) -> Self {
        Self::new(parser_for(platform), thresholds)
    }

    pub fn parser(&self) -> &dyn PingOutputParser {
        self.parser.as_ref()
    }

    /// Analyze the outcome of a ping command.
    ///
    /// A runner error short-circuits into a failed result. A non-zero exit is
    /// still analyzed when the output contains replies or timeouts.
    pub fn analyze(&self, target: &str, outcome: Result<CommandOutput>) -> PingResult {
        let output = match outcome {
            Ok(output) => output,
            Err(error) => return PingResult::failed(target, error.message()),
        };

        let parsed = self.parser.parse(&output.stdout);
        if parsed.attempts() == 0 {
            let reason = output
                .failure_reason()
                .unwrap_or_else(|| "无法解析ping输出".to_string());
            return PingResult::failed(target, reason);
        }

        self.build_result(target, parsed)
    }

    /// Analyze raw stdout directly
    pub fn analyze_output(&self, target: &str, stdout: &str) -> PingResult {
        let parsed = self.parser.parse(stdout);
        if parsed.attempts() == 0 {
            return PingResult::failed(target, "无法解析ping输出");
        }
        self.build_result(target, parsed)
    }

    fn build_result(&self, target: &str, parsed: ParsedPing) -> PingResult {
        let stats = LatencyStatistics::from_samples(&parsed.samples);
        let received = parsed.samples.len() as u32;
        let sent = parsed.attempts();

        let packet_loss_percent = if received == 0 {
            100.0
        } else {
            clamp_percent(parsed.timeouts as f64 / sent as f64 * 100.0)
        };

        let mut warnings = Vec::new();
        if received > 0 && stats.mean > self.thresholds.high_latency_ms {
            warnings.push(WARN_HIGH_LATENCY.to_string());
        }
        if packet_loss_percent > self.thresholds.packet_loss_percent {
            warnings.push(WARN_PACKET_LOSS.to_string());
        }
        if stats.jitter > self.thresholds.high_jitter_ms {
            warnings.push(WARN_HIGH_JITTER.to_string());
        }

        PingResult {
            target: target.to_string(),
            samples: parsed.samples,
            sent,
            received,
            min_latency: stats.min,
            avg_latency: stats.mean,
            max_latency: stats.max,
            std_dev_latency: stats.std_dev,
            p95_latency: stats.p95,
            packet_loss_percent,
            jitter_ms: stats.jitter,
            warnings,
            success: true,
            error: None,
        }
    }
}
