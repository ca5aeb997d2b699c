//! JSON rendering of the result envelope

use super::formatter::OutputFormatter;
use crate::{
    error::{AppError, Result},
    models::{
        BandwidthResult, BatchPortScanResult, DnsResult, ExecutionResult, PingResult,
        QualityAssessment, TracerouteResult,
    },
};
use serde::Serialize;

/// Serializes results as pretty-printed JSON
#[derive(Debug, Default)]
pub struct JsonFormatter;

impl JsonFormatter {
    pub fn new() -> Self {
        Self
    }

    fn to_json<T: Serialize>(value: &T) -> Result<String> {
        serde_json::to_string_pretty(value)
            .map_err(|e| AppError::io(format!("Failed to serialize results: {}", e)))
    }

    fn message(kind: &str, text: &str) -> Result<String> {
        let mut object = serde_json::Map::new();
        object.insert(kind.to_string(), serde_json::Value::String(text.to_string()));
        Self::to_json(&object)
    }
}

impl OutputFormatter for JsonFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        Self::message("title", title)
    }

    fn format_ping(&self, result: &PingResult) -> Result<String> {
        Self::to_json(result)
    }

    fn format_dns(&self, result: &DnsResult) -> Result<String> {
        Self::to_json(result)
    }

    fn format_ports(&self, result: &BatchPortScanResult) -> Result<String> {
        Self::to_json(result)
    }

    fn format_bandwidth(&self, result: &BandwidthResult) -> Result<String> {
        Self::to_json(result)
    }

    fn format_traceroute(&self, result: &TracerouteResult) -> Result<String> {
        Self::to_json(result)
    }

    fn format_quality(&self, assessment: &QualityAssessment) -> Result<String> {
        Self::to_json(assessment)
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Self::message("error", error)
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Self::message("warning", warning)
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Self::message("message", message)
    }

    /// The envelope is emitted as one document
    fn format_execution_result(&self, result: &ExecutionResult) -> Result<String> {
        Self::to_json(result)
    }
}
