//! Probe result value objects and the execution envelope

use crate::types::{Direction, Rating, SpeedUnit, TestKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Clamp a percentage into [0, 100], mapping NaN to 0
pub fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// Clamp a duration or latency to be non-negative, mapping NaN to 0
pub fn non_negative(value: f64) -> f64 {
    if value.is_nan() || value < 0.0 {
        0.0
    } else {
        value
    }
}

/// Outcome of the ping probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingResult {
    pub target: String,
    /// Successful round-trip times in milliseconds
    pub samples: Vec<f64>,
    pub sent: u32,
    pub received: u32,
    pub min_latency: f64,
    pub avg_latency: f64,
    pub max_latency: f64,
    pub std_dev_latency: f64,
    pub p95_latency: f64,
    pub packet_loss_percent: f64,
    pub jitter_ms: f64,
    pub warnings: Vec<String>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PingResult {
    /// A ping that could not run at all
    pub fn failed<S: Into<String>>(target: &str, error: S) -> Self {
        Self {
            target: target.to_string(),
            samples: Vec::new(),
            sent: 0,
            received: 0,
            min_latency: 0.0,
            avg_latency: 0.0,
            max_latency: 0.0,
            std_dev_latency: 0.0,
            p95_latency: 0.0,
            packet_loss_percent: 100.0,
            jitter_ms: 0.0,
            warnings: Vec::new(),
            success: false,
            error: Some(error.into()),
        }
    }
}

/// A single MX record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MxRecord {
    pub exchange: String,
    pub priority: u16,
}

/// Outcome of the DNS probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsResult {
    pub target: String,
    pub ipv4: Vec<String>,
    pub ipv6: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mx: Option<Vec<MxRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txt: Option<Vec<Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ns: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cname: Option<Vec<String>>,
    pub resolution_time_ms: f64,
    pub warnings: Vec<String>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DnsResult {
    pub fn empty(target: &str) -> Self {
        Self {
            target: target.to_string(),
            ipv4: Vec::new(),
            ipv6: Vec::new(),
            mx: None,
            txt: None,
            ns: None,
            cname: None,
            resolution_time_ms: 0.0,
            warnings: Vec::new(),
            success: true,
            error: None,
        }
    }
}

/// Outcome of a single TCP connect attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortScanResult {
    pub host: String,
    pub port: u16,
    pub open: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of a batch port scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchPortScanResult {
    pub host: String,
    pub scanned_ports: usize,
    pub open_ports: Vec<u16>,
    pub closed_ports: Vec<u16>,
    /// Per-port details in request order
    pub results: Vec<PortScanResult>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchPortScanResult {
    /// Partition per-port results, preserving their order
    pub fn from_results(host: &str, results: Vec<PortScanResult>) -> Self {
        let (open, closed): (Vec<&PortScanResult>, Vec<&PortScanResult>) =
            results.iter().partition(|r| r.open);
        Self {
            host: host.to_string(),
            scanned_ports: results.len(),
            open_ports: open.iter().map(|r| r.port).collect(),
            closed_ports: closed.iter().map(|r| r.port).collect(),
            results,
            success: true,
            error: None,
        }
    }
}

/// Throughput expressed in the largest fitting unit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Speed {
    pub value: f64,
    pub unit: SpeedUnit,
}

/// Outcome of the bandwidth probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BandwidthResult {
    pub direction: Direction,
    pub bytes_transferred: u64,
    pub duration_ms: f64,
    pub speed: Speed,
    /// Megabits per second
    pub mbps: f64,
    pub warnings: Vec<String>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BandwidthResult {
    pub fn failed<S: Into<String>>(direction: Direction, error: S) -> Self {
        Self {
            direction,
            bytes_transferred: 0,
            duration_ms: 0.0,
            speed: Speed {
                value: 0.0,
                unit: SpeedUnit::BytesPerSec,
            },
            mbps: 0.0,
            warnings: Vec::new(),
            success: false,
            error: Some(error.into()),
        }
    }
}

/// One traceroute hop; a missing address marks a timed-out hop, and a hop
/// without a latency sample never carries an address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TracerouteHop {
    pub index: u32,
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
}

impl TracerouteHop {
    pub fn new(index: u32, address: Option<String>, latency_ms: Option<f64>) -> Self {
        Self {
            index,
            address: latency_ms.and(address),
            latency_ms,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.latency_ms.is_none()
    }
}

/// Outcome of the traceroute probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TracerouteResult {
    pub target: String,
    pub hops: Vec<TracerouteHop>,
    pub total_hops: usize,
    pub timeouts: usize,
    pub warnings: Vec<String>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TracerouteResult {
    pub fn failed<S: Into<String>>(target: &str, error: S) -> Self {
        Self {
            target: target.to_string(),
            hops: Vec::new(),
            total_hops: 0,
            timeouts: 0,
            warnings: Vec::new(),
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Metrics fed into the quality assessment; every field is optional
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityMetrics {
    /// Average latency in ms
    pub latency: Option<f64>,
    /// Jitter in ms
    pub jitter: Option<f64>,
    /// Packet loss percentage
    pub packet_loss: Option<f64>,
    /// Bandwidth in Mbps
    pub bandwidth: Option<f64>,
    /// DNS resolution time in ms
    pub dns_time: Option<f64>,
}

impl QualityMetrics {
    pub fn is_empty(&self) -> bool {
        self.latency.is_none()
            && self.jitter.is_none()
            && self.packet_loss.is_none()
            && self.bandwidth.is_none()
            && self.dns_time.is_none()
    }
}

/// Composite quality score with rating and recommendations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    pub score: f64,
    pub rating: Rating,
    pub recommendations: Vec<String>,
}

/// Result entry for a probe that could not be dispatched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeFailure {
    pub success: bool,
    pub error: String,
}

impl ProbeFailure {
    pub fn new<S: Into<String>>(error: S) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

/// One entry of the `results` map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProbeReport {
    Ping(PingResult),
    Dns(DnsResult),
    Port(BatchPortScanResult),
    Bandwidth(BandwidthResult),
    Traceroute(TracerouteResult),
    Failed(ProbeFailure),
}

impl ProbeReport {
    pub fn success(&self) -> bool {
        match self {
            ProbeReport::Ping(r) => r.success,
            ProbeReport::Dns(r) => r.success,
            ProbeReport::Port(r) => r.success,
            ProbeReport::Bandwidth(r) => r.success,
            ProbeReport::Traceroute(r) => r.success,
            ProbeReport::Failed(_) => false,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ProbeReport::Ping(r) => r.error.as_deref(),
            ProbeReport::Dns(r) => r.error.as_deref(),
            ProbeReport::Port(r) => r.error.as_deref(),
            ProbeReport::Bandwidth(r) => r.error.as_deref(),
            ProbeReport::Traceroute(r) => r.error.as_deref(),
            ProbeReport::Failed(r) => Some(r.error.as_str()),
        }
    }

    pub fn warnings(&self) -> &[String] {
        match self {
            ProbeReport::Ping(r) => &r.warnings,
            ProbeReport::Dns(r) => &r.warnings,
            ProbeReport::Bandwidth(r) => &r.warnings,
            ProbeReport::Traceroute(r) => &r.warnings,
            ProbeReport::Port(_) | ProbeReport::Failed(_) => &[],
        }
    }
}

/// The response envelope of one diagnostic run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub engine: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub target: String,
    /// Keyed by requested test name
    pub results: BTreeMap<String, ProbeReport>,
    /// Reflects target validation only
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<QualityAssessment>,
}

impl ExecutionResult {
    pub fn new(target: &str) -> Self {
        Self {
            engine: crate::ENGINE_NAME.to_string(),
            version: crate::VERSION.to_string(),
            timestamp: Utc::now(),
            target: target.to_string(),
            results: BTreeMap::new(),
            success: true,
            error: None,
            quality: None,
        }
    }

    /// Envelope for a run rejected before any probe started
    pub fn rejected<S: Into<String>>(target: &str, error: S) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::new(target)
        }
    }

    pub fn result(&self, kind: TestKind) -> Option<&ProbeReport> {
        self.results.get(kind.as_str())
    }

    pub fn ping(&self) -> Option<&PingResult> {
        match self.result(TestKind::Ping) {
            Some(ProbeReport::Ping(r)) => Some(r),
            _ => None,
        }
    }

    pub fn dns(&self) -> Option<&DnsResult> {
        match self.result(TestKind::Dns) {
            Some(ProbeReport::Dns(r)) => Some(r),
            _ => None,
        }
    }

    pub fn ports(&self) -> Option<&BatchPortScanResult> {
        match self.result(TestKind::Port) {
            Some(ProbeReport::Port(r)) => Some(r),
            _ => None,
        }
    }

    pub fn bandwidth(&self) -> Option<&BandwidthResult> {
        match self.result(TestKind::Bandwidth) {
            Some(ProbeReport::Bandwidth(r)) => Some(r),
            _ => None,
        }
    }

    pub fn traceroute(&self) -> Option<&TracerouteResult> {
        match self.result(TestKind::Traceroute) {
            Some(ProbeReport::Traceroute(r)) => Some(r),
            _ => None,
        }
    }

    /// Collect quality inputs from every successful probe
    pub fn quality_metrics(&self) -> QualityMetrics {
        let mut metrics = QualityMetrics::default();
        if let Some(ping) = self.ping() {
            if ping.received > 0 {
                metrics.latency = Some(ping.avg_latency);
                metrics.jitter = Some(ping.jitter_ms);
            }
            if ping.sent > 0 {
                metrics.packet_loss = Some(ping.packet_loss_percent);
            }
        }
        if let Some(dns) = self.dns().filter(|d| d.success) {
            metrics.dns_time = Some(dns.resolution_time_ms);
        }
        if let Some(bandwidth) = self.bandwidth().filter(|b| b.success) {
            metrics.bandwidth = Some(bandwidth.mbps);
        }
        metrics
    }
}
