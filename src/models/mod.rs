//! Data models for diagnostic requests and probe results

pub mod config;
pub mod results;

// Re-export main model types
pub use config::{
    AppConfig, BandwidthOptions, DnsOptions, EngineOptions, PingOptions, PortOptions,
    QualityThresholds, TestConfig, TracerouteOptions, WarningThresholds,
};
pub use results::{
    BandwidthResult, BatchPortScanResult, DnsResult, ExecutionResult, MxRecord, PingResult,
    PortScanResult, ProbeFailure, ProbeReport, QualityAssessment, QualityMetrics, Speed,
    TracerouteHop, TracerouteResult,
};
