//! Network Diagnostics
//!
//! A diagnostics engine that runs ping, DNS, TCP port, bandwidth and
//! traceroute probes against a single target and rates the connection
//! quality from the collected metrics.

pub mod analyzer;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod logging;
pub mod models;
pub mod output;
pub mod probe;
pub mod stats;
pub mod types;

// Re-export commonly used types
pub use diagnostics::{normalize_target, NetworkDiagnosticsEngine};
pub use error::{AppError, Result};
pub use models::{
    AppConfig, EngineOptions, ExecutionResult, ProbeReport, QualityAssessment, QualityMetrics,
    TestConfig,
};
pub use output::{ColoredFormatter, OutputCoordinator, OutputFormatter, OutputFormatterFactory, PlainFormatter};
pub use types::{Direction, DnsRecordType, Platform, Rating, TestKind};

/// Engine identifier reported in every result envelope
pub const ENGINE_NAME: &str = "network";

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    pub const HIGH_LATENCY_MS: f64 = 400.0;
    pub const HIGH_JITTER_MS: f64 = 100.0;
    pub const PACKET_LOSS_PERCENT: f64 = 10.0;
    pub const SLOW_DNS_MS: f64 = 1000.0;
    pub const ENGINE_TIMEOUT: Duration = Duration::from_secs(30);
    pub const RETRIES: u32 = 3;
    pub const MAX_RETRIES: u32 = 10;
    pub const MAX_CONCURRENCY: usize = 20;
    pub const ENABLE_COLOR: bool = true;
}
