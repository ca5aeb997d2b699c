//! Type definitions shared across probes, analyzers and output

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Re-export commonly used types
pub use crate::error::{AppError, Result};

/// Diagnostic probes that can be requested for a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestKind {
    Ping,
    Dns,
    Port,
    Bandwidth,
    Traceroute,
}

impl TestKind {
    /// All probes in dispatch order
    pub const ALL: [TestKind; 5] = [
        TestKind::Ping,
        TestKind::Dns,
        TestKind::Port,
        TestKind::Bandwidth,
        TestKind::Traceroute,
    ];

    /// Key used in the `results` map of the execution envelope
    pub fn as_str(&self) -> &'static str {
        match self {
            TestKind::Ping => "ping",
            TestKind::Dns => "dns",
            TestKind::Port => "port",
            TestKind::Bandwidth => "bandwidth",
            TestKind::Traceroute => "traceroute",
        }
    }

    /// Human-readable probe name
    pub fn display_name(&self) -> &'static str {
        match self {
            TestKind::Ping => "Ping 延迟",
            TestKind::Dns => "DNS 解析",
            TestKind::Port => "端口扫描",
            TestKind::Bandwidth => "带宽测试",
            TestKind::Traceroute => "路由追踪",
        }
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ping" => Ok(TestKind::Ping),
            "dns" => Ok(TestKind::Dns),
            "port" | "ports" => Ok(TestKind::Port),
            "bandwidth" => Ok(TestKind::Bandwidth),
            "traceroute" | "trace" => Ok(TestKind::Traceroute),
            other => Err(AppError::validation(format!("不支持的测试类型: {}", other))),
        }
    }
}

/// DNS record types the resolver probe understands; names parse
/// case-insensitively from both the CLI and request JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum DnsRecordType {
    A,
    Aaaa,
    Mx,
    Txt,
    Ns,
    Cname,
}

impl DnsRecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DnsRecordType::A => "A",
            DnsRecordType::Aaaa => "AAAA",
            DnsRecordType::Mx => "MX",
            DnsRecordType::Txt => "TXT",
            DnsRecordType::Ns => "NS",
            DnsRecordType::Cname => "CNAME",
        }
    }
}

impl fmt::Display for DnsRecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DnsRecordType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(DnsRecordType::A),
            "AAAA" => Ok(DnsRecordType::Aaaa),
            "MX" => Ok(DnsRecordType::Mx),
            "TXT" => Ok(DnsRecordType::Txt),
            "NS" => Ok(DnsRecordType::Ns),
            "CNAME" => Ok(DnsRecordType::Cname),
            other => Err(AppError::validation(format!(
                "Unsupported DNS record type '{}'. Expected one of A, AAAA, MX, TXT, NS, CNAME",
                other
            ))),
        }
    }
}

impl TryFrom<String> for DnsRecordType {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Transfer direction for the bandwidth probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Download,
    Upload,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Download => f.write_str("download"),
            Direction::Upload => f.write_str("upload"),
        }
    }
}

impl FromStr for Direction {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "download" | "down" => Ok(Direction::Download),
            "upload" | "up" => Ok(Direction::Upload),
            other => Err(AppError::validation(format!(
                "Invalid direction '{}'. Expected 'download' or 'upload'",
                other
            ))),
        }
    }
}

/// Operating system family, selects the ping/traceroute command and parser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Unix,
    Windows,
}

impl Platform {
    /// Platform this binary was compiled for
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::current()
    }
}

/// Throughput unit chosen by `calculate_speed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpeedUnit {
    #[serde(rename = "B/s")]
    BytesPerSec,
    #[serde(rename = "KB/s")]
    KilobytesPerSec,
    #[serde(rename = "MB/s")]
    MegabytesPerSec,
    #[serde(rename = "GB/s")]
    GigabytesPerSec,
}

impl SpeedUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpeedUnit::BytesPerSec => "B/s",
            SpeedUnit::KilobytesPerSec => "KB/s",
            SpeedUnit::MegabytesPerSec => "MB/s",
            SpeedUnit::GigabytesPerSec => "GB/s",
        }
    }
}

impl fmt::Display for SpeedUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Categorical network quality rating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl Rating {
    /// Map a 0-100 score onto the fixed rating breakpoints
    pub fn from_score(score: f64) -> Self {
        if score > 90.0 {
            Rating::Excellent
        } else if score > 70.0 {
            Rating::Good
        } else if score > 40.0 {
            Rating::Fair
        } else {
            Rating::Poor
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Excellent => "excellent",
            Rating::Good => "good",
            Rating::Fair => "fair",
            Rating::Poor => "poor",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
