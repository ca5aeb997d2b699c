//! Engine configuration, per-probe options and the diagnostic request model

use crate::types::{AppError, Direction, Platform, Result, TestKind};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Thresholds that trigger warnings on individual probe results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WarningThresholds {
    /// Average ping latency above which "高延迟" is reported
    pub high_latency_ms: f64,
    /// Ping jitter above which "网络抖动较大" is reported
    pub high_jitter_ms: f64,
    /// Packet loss above which "丢包率过高" is reported
    pub packet_loss_percent: f64,
    /// DNS resolution time above which "DNS解析缓慢" is reported
    pub slow_dns_ms: f64,
}

impl Default for WarningThresholds {
    fn default() -> Self {
        Self {
            high_latency_ms: crate::defaults::HIGH_LATENCY_MS,
            high_jitter_ms: crate::defaults::HIGH_JITTER_MS,
            packet_loss_percent: crate::defaults::PACKET_LOSS_PERCENT,
            slow_dns_ms: crate::defaults::SLOW_DNS_MS,
        }
    }
}

/// Baselines and weights of the quality scoring model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QualityThresholds {
    /// Latency at or below this costs no points
    pub excellent_latency_ms: f64,
    pub latency_weight: f64,
    pub max_latency_penalty: f64,
    /// Jitter at or below this costs no points
    pub excellent_jitter_ms: f64,
    pub jitter_weight: f64,
    pub max_jitter_penalty: f64,
    pub packet_loss_weight: f64,
    pub max_packet_loss_penalty: f64,
    /// Bandwidth below this (Mbps) costs up to `max_bandwidth_penalty`
    pub min_bandwidth_mbps: f64,
    pub max_bandwidth_penalty: f64,
    /// Recommendation triggers
    pub recommend_latency_ms: f64,
    pub recommend_packet_loss_percent: f64,
    pub recommend_dns_ms: f64,
    pub recommend_jitter_ms: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            excellent_latency_ms: 30.0,
            latency_weight: 0.1,
            max_latency_penalty: 40.0,
            excellent_jitter_ms: 10.0,
            jitter_weight: 0.5,
            max_jitter_penalty: 20.0,
            packet_loss_weight: 3.0,
            max_packet_loss_penalty: 30.0,
            min_bandwidth_mbps: 10.0,
            max_bandwidth_penalty: 10.0,
            recommend_latency_ms: 400.0,
            recommend_packet_loss_percent: 10.0,
            recommend_dns_ms: 1500.0,
            recommend_jitter_ms: 100.0,
        }
    }
}

/// Read-only engine defaults fixed at construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineOptions {
    /// Upper bound for every probe timeout
    pub timeout_ms: u64,
    pub retries: u32,
    /// Simultaneous connections during batch port scans
    pub max_concurrency: usize,
    pub thresholds: WarningThresholds,
    pub quality: QualityThresholds,
    pub platform: Platform,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            timeout_ms: crate::defaults::ENGINE_TIMEOUT.as_millis() as u64,
            retries: crate::defaults::RETRIES,
            max_concurrency: crate::defaults::MAX_CONCURRENCY,
            thresholds: WarningThresholds::default(),
            quality: QualityThresholds::default(),
            platform: Platform::current(),
        }
    }
}

impl EngineOptions {
    /// Engine-wide timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Cap a per-probe timeout at the engine timeout
    pub fn effective_timeout(&self, probe_timeout_ms: u64) -> Duration {
        Duration::from_millis(probe_timeout_ms.min(self.timeout_ms).max(1))
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(AppError::config("Timeout must be greater than 0"));
        }
        if self.timeout_ms > 300_000 {
            return Err(AppError::config("Timeout cannot exceed 300 seconds"));
        }
        if self.max_concurrency == 0 {
            return Err(AppError::config("Max concurrency must be greater than 0"));
        }
        if self.max_concurrency > 1000 {
            return Err(AppError::config("Max concurrency cannot exceed 1000"));
        }
        if self.retries > crate::defaults::MAX_RETRIES {
            return Err(AppError::config(format!(
                "Retries cannot exceed {}",
                crate::defaults::MAX_RETRIES
            )));
        }
        Ok(())
    }
}

/// Options for the ping probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PingOptions {
    pub count: u32,
    pub timeout_ms: u64,
    pub packet_size: Option<u32>,
    pub interval_ms: Option<u64>,
}

impl Default for PingOptions {
    fn default() -> Self {
        Self {
            count: 4,
            timeout_ms: 5_000,
            packet_size: None,
            interval_ms: None,
        }
    }
}

/// Options for the DNS probe; A and AAAA are always resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DnsOptions {
    /// Extra record type names, matched case-insensitively. Names the
    /// resolver does not support fail only their own entry.
    pub types: Vec<String>,
    pub timeout_ms: u64,
}

impl Default for DnsOptions {
    fn default() -> Self {
        Self {
            types: Vec::new(),
            timeout_ms: 5_000,
        }
    }
}

/// Options for single and batch TCP port scans
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PortOptions {
    pub ports: Vec<u16>,
    pub timeout_ms: u64,
    /// Overrides the engine's max concurrency
    pub concurrency: Option<usize>,
    /// Extra attempts after a timed-out connect
    pub retries: Option<u32>,
}

impl Default for PortOptions {
    fn default() -> Self {
        Self {
            ports: vec![22, 80, 443],
            timeout_ms: 3_000,
            concurrency: None,
            retries: None,
        }
    }
}

/// Options for the bandwidth probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BandwidthOptions {
    /// Payload size in bytes
    pub test_size: u64,
    pub direction: Direction,
    /// Minimum acceptable throughput in Mbps
    pub expected_min_speed: Option<f64>,
    /// Live payload source; synthesised locally when absent
    pub url: Option<String>,
    pub timeout_ms: u64,
}

impl Default for BandwidthOptions {
    fn default() -> Self {
        Self {
            test_size: 1024 * 1024,
            direction: Direction::Download,
            expected_min_speed: None,
            url: None,
            timeout_ms: 30_000,
        }
    }
}

/// Options for the traceroute probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TracerouteOptions {
    pub max_hops: u32,
    pub timeout_ms: u64,
    /// Per-probe wait in seconds
    pub wait_secs: u32,
    /// Probes per hop
    pub queries: u32,
}

impl Default for TracerouteOptions {
    fn default() -> Self {
        Self {
            max_hops: 30,
            timeout_ms: 60_000,
            wait_secs: 2,
            queries: 3,
        }
    }
}

/// A diagnostic request: a target plus the probes to run against it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestConfig {
    #[serde(default)]
    pub target: String,
    /// Requested probe names; unknown names are reported per entry
    #[serde(default = "default_tests")]
    pub tests: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ping_options: Option<PingOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_options: Option<DnsOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_options: Option<PortOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bandwidth_options: Option<BandwidthOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traceroute_options: Option<TracerouteOptions>,
}

impl TestConfig {
    pub fn new<S: Into<String>>(target: S) -> Self {
        Self {
            target: target.into(),
            tests: default_tests(),
            ping_options: None,
            dns_options: None,
            port_options: None,
            bandwidth_options: None,
            traceroute_options: None,
        }
    }

    /// Replace the requested probe list
    pub fn with_tests<I, S>(mut self, tests: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tests = tests.into_iter().map(Into::into).collect();
        self
    }

    /// Parse a JSON request body
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

fn default_tests() -> Vec<String> {
    vec![TestKind::Ping.to_string(), TestKind::Dns.to_string()]
}

/// Application configuration for the CLI: engine options plus output flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineOptions,
    /// Emit the envelope as JSON
    #[serde(default)]
    pub json: bool,
    #[serde(default = "default_enable_color")]
    pub enable_color: bool,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub debug: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine: EngineOptions::default(),
            json: false,
            enable_color: default_enable_color(),
            verbose: false,
            debug: false,
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        self.engine.validate()
    }

    /// Merge `NETDIAG_*` environment variables into this configuration
    pub fn merge_from_env(&mut self) -> Result<()> {
        if let Some(value) = env_value("NETDIAG_TIMEOUT_MS") {
            self.engine.timeout_ms = parse_env("NETDIAG_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = env_value("NETDIAG_RETRIES") {
            self.engine.retries = parse_env("NETDIAG_RETRIES", &value)?;
        }
        if let Some(value) = env_value("NETDIAG_MAX_CONCURRENCY") {
            self.engine.max_concurrency = parse_env("NETDIAG_MAX_CONCURRENCY", &value)?;
        }
        if let Some(value) = env_value("NETDIAG_HIGH_LATENCY_MS") {
            self.engine.thresholds.high_latency_ms = parse_env("NETDIAG_HIGH_LATENCY_MS", &value)?;
        }
        if let Some(value) = env_value("NETDIAG_SLOW_DNS_MS") {
            self.engine.thresholds.slow_dns_ms = parse_env("NETDIAG_SLOW_DNS_MS", &value)?;
        }
        if let Some(value) = env_value("NETDIAG_ENABLE_COLOR") {
            self.enable_color = parse_env("NETDIAG_ENABLE_COLOR", &value)?;
        }
        Ok(())
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))
}

fn default_enable_color() -> bool {
    crate::defaults::ENABLE_COLOR
}
