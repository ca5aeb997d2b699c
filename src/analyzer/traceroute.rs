//! Traceroute output parsing and hop analysis

use crate::{
    error::Result,
    models::{results::non_negative, TracerouteHop, TracerouteOptions, TracerouteResult},
    probe::command::CommandOutput,
    types::Platform,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::net::IpAddr;

pub const WARN_BLACK_HOLE: &str = "可能存在路由黑洞";

static HOP_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+)\s+(.*)$").expect("valid hop regex"));

static LATENCY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<?\s*([\d.]+)\s*ms").expect("valid latency regex"));

static PAREN_ADDR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(([0-9A-Fa-f:.]+)\)").expect("valid address regex"));

static BRACKET_ADDR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([0-9A-Fa-f:.]+)\]").expect("valid address regex"));

/// Consecutive timed-out hops at or above this length suggest a black hole
const BLACK_HOLE_RUN: usize = 3;

/// Platform-specific traceroute invocation and line format
pub trait TracerouteOutputParser: Send + Sync {
    fn program(&self) -> &'static str;

    fn build_args(&self, target: &str, options: &TracerouteOptions) -> Vec<String>;

    /// Parse one hop line; `None` for headers and blank lines
    fn parse_line(&self, line: &str) -> Option<TracerouteHop>;

    fn parse(&self, output: &str) -> Vec<TracerouteHop> {
        output.lines().filter_map(|line| self.parse_line(line)).collect()
    }
}

fn average_latency(text: &str) -> Option<f64> {
    let values: Vec<f64> = LATENCY_RE
        .captures_iter(text)
        .filter_map(|caps| caps[1].parse::<f64>().ok())
        .map(non_negative)
        .collect();

    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn split_hop_line(line: &str) -> Option<(u32, &str)> {
    let caps = HOP_LINE_RE.captures(line)?;
    let index = caps.get(1)?.as_str().parse::<u32>().ok().filter(|i| *i >= 1)?;
    Some((index, caps.get(2)?.as_str()))
}

/// `traceroute` on Linux and BSD
#[derive(Debug, Clone, Copy, Default)]
pub struct UnixTracerouteParser;

impl TracerouteOutputParser for UnixTracerouteParser {
    fn program(&self) -> &'static str {
        "traceroute"
    }

    fn build_args(&self, target: &str, options: &TracerouteOptions) -> Vec<String> {
        vec![
            "-n".to_string(),
            "-m".to_string(),
            options.max_hops.max(1).to_string(),
            "-w".to_string(),
            options.wait_secs.max(1).to_string(),
            "-q".to_string(),
            options.queries.max(1).to_string(),
            target.to_string(),
        ]
    }

    fn parse_line(&self, line: &str) -> Option<TracerouteHop> {
        let (index, rest) = split_hop_line(line)?;
        let latency_ms = average_latency(rest);

        let address = PAREN_ADDR_RE
            .captures(rest)
            .map(|caps| caps[1].to_string())
            .or_else(|| {
                rest.split_whitespace()
                    .find(|token| {
                        *token != "*"
                            && *token != "ms"
                            && !token.starts_with('!')
                            && !token.starts_with('<')
                            && token.parse::<f64>().is_err()
                    })
                    .map(str::to_string)
            });

        Some(TracerouteHop::new(index, address, latency_ms))
    }
}

/// `tracert` on Windows
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsTracerouteParser;

impl TracerouteOutputParser for WindowsTracerouteParser {
    fn program(&self) -> &'static str {
        "tracert"
    }

    fn build_args(&self, target: &str, options: &TracerouteOptions) -> Vec<String> {
        vec![
            "-d".to_string(),
            "-h".to_string(),
            options.max_hops.max(1).to_string(),
            "-w".to_string(),
            (options.wait_secs.max(1) * 1000).to_string(),
            target.to_string(),
        ]
    }

    fn parse_line(&self, line: &str) -> Option<TracerouteHop> {
        let (index, rest) = split_hop_line(line)?;
        let latency_ms = average_latency(rest);

        let address = BRACKET_ADDR_RE
            .captures(rest)
            .map(|caps| caps[1].to_string())
            .or_else(|| {
                rest.split_whitespace()
                    .last()
                    .filter(|token| token.parse::<IpAddr>().is_ok())
                    .map(str::to_string)
            });

        Some(TracerouteHop::new(index, address, latency_ms))
    }
}

pub fn parser_for(platform: Platform) -> Box<dyn TracerouteOutputParser> {
    match platform {
        Platform::Unix => Box::new(UnixTracerouteParser),
        Platform::Windows => Box::new(WindowsTracerouteParser),
    }
}

/// Converts traceroute output into a [`TracerouteResult`]
pub struct TracerouteAnalyzer {
    parser: Box<dyn TracerouteOutputParser>,
}

impl TracerouteAnalyzer {
    pub fn new(parser: Box<dyn TracerouteOutputParser>) -> Self {
        Self { parser }
    }

    pub fn for_platform(platform: Platform) -> Self {
        Self::new(parser_for(platform))
    }

    pub fn parser(&self) -> &dyn TracerouteOutputParser {
        self.parser.as_ref()
    }

    pub fn analyze(&self, target: &str, outcome: Result<CommandOutput>) -> TracerouteResult {
        let output = match outcome {
            Ok(output) => output,
            Err(error) => return TracerouteResult::failed(target, error.message()),
        };

        let hops = self.parser.parse(&output.stdout);
        if hops.is_empty() {
            let reason = output
                .failure_reason()
                .unwrap_or_else(|| "无法解析traceroute输出".to_string());
            return TracerouteResult::failed(target, reason);
        }

        build_result(target, hops)
    }

    pub fn analyze_output(&self, target: &str, stdout: &str) -> TracerouteResult {
        let hops = self.parser.parse(stdout);
        if hops.is_empty() {
            return TracerouteResult::failed(target, "无法解析traceroute输出");
        }
        build_result(target, hops)
    }
}

fn build_result(target: &str, hops: Vec<TracerouteHop>) -> TracerouteResult {
    let timeouts = hops.iter().filter(|hop| hop.is_timeout()).count();
    let warnings = timeout_warnings(&hops, timeouts);

    TracerouteResult {
        target: target.to_string(),
        total_hops: hops.len(),
        timeouts,
        hops,
        warnings,
        success: true,
        error: None,
    }
}

/// Runs of consecutive timed-out hops as (first index, last index, length)
fn timeout_runs(hops: &[TracerouteHop]) -> Vec<(u32, u32, usize)> {
    let mut runs = Vec::new();
    let mut current: Option<(u32, u32, usize)> = None;

    for hop in hops {
        if hop.is_timeout() {
            current = Some(match current {
                Some((start, _, len)) => (start, hop.index, len + 1),
                None => (hop.index, hop.index, 1),
            });
        } else if let Some(run) = current.take() {
            runs.push(run);
        }
    }
    runs.extend(current);
    runs
}

fn timeout_warnings(hops: &[TracerouteHop], timeouts: usize) -> Vec<String> {
    let mut warnings = Vec::new();
    if timeouts == 0 {
        return warnings;
    }

    warnings.push(format!("检测到 {} 个超时跳点", timeouts));

    let runs = timeout_runs(hops);
    for (start, end, len) in runs.iter().filter(|(_, _, len)| *len >= BLACK_HOLE_RUN) {
        warnings.push(format!("{}: 第 {}-{} 跳连续 {} 跳超时", WARN_BLACK_HOLE, start, end, len));
    }

    let last_index = hops.last().map(|hop| hop.index);
    let isolated = runs
        .iter()
        .filter(|(start, _, len)| *len == 1 && Some(*start) != last_index)
        .count();
    if isolated > 0 {
        warnings.push(format!("存在 {} 个零星超时跳点，可能为路由器限制ICMP响应", isolated));
    }

    if hops.last().is_some_and(|hop| hop.is_timeout()) {
        warnings.push("目标主机未响应路由追踪".to_string());
    }

    warnings
}
