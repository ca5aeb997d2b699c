//! Network diagnostics engine: validates a target, fans out the requested
//! probes and folds their results into one envelope

use crate::{
    analyzer::{PingAnalyzer, QualityAssessor, TracerouteAnalyzer},
    error::{AppError, Result},
    logging::ProbeLogger,
    models::{
        BandwidthOptions, BandwidthResult, BatchPortScanResult, DnsOptions, DnsResult, EngineOptions,
        ExecutionResult, PingOptions, PingResult, PortOptions, PortScanResult, ProbeFailure, ProbeReport,
        QualityAssessment, QualityMetrics, Speed, TestConfig, TracerouteOptions, TracerouteResult,
    },
    probe::{
        bandwidth, BandwidthProbe, CommandProbe, CommandRunner, Connector, DnsLookup, DnsProbe,
        SocketProbe, SystemCommandRunner, TrustDnsLookup,
    },
    stats,
    types::TestKind,
};
use futures::future::join_all;
use std::collections::HashSet;
use std::net::{IpAddr, Ipv6Addr};
use std::sync::Arc;
use tokio::time::Instant;
use url::{Host, Url};

const MAX_HOSTNAME_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;
/// Slack on top of the summed per-reply waits for process start-up
const PING_DEADLINE_SLACK_MS: u64 = 1000;

/// Reduce a user-supplied target to a bare host name or IP literal.
///
/// Accepts URLs, `host:port`, and IPv6 literals with or without brackets.
pub fn normalize_target(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid_target("目标主机不能为空"));
    }
    let invalid = || AppError::invalid_target(format!("无效的目标主机: {}", trimmed));

    if trimmed.contains("://") {
        let url = Url::parse(trimmed).map_err(|_| invalid())?;
        return match url.host() {
            Some(Host::Domain(domain)) => validate_hostname(domain).ok_or_else(invalid),
            Some(Host::Ipv4(ip)) => Ok(ip.to_string()),
            Some(Host::Ipv6(ip)) => Ok(ip.to_string()),
            None => Err(invalid()),
        };
    }

    if let Ok(ip) = trimmed.parse::<IpAddr>() {
        return Ok(ip.to_string());
    }

    if let Some(inner) = trimmed.strip_prefix('[') {
        // "[::1]" or "[::1]:443"
        let inner = inner.split(']').next().unwrap_or_default();
        return inner
            .parse::<Ipv6Addr>()
            .map(|ip| ip.to_string())
            .map_err(|_| invalid());
    }

    let host = match trimmed.rsplit_once(':') {
        Some((host, port)) if port.parse::<u16>().is_ok() => host,
        Some(_) => return Err(invalid()),
        None => trimmed,
    };
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip.to_string());
    }
    validate_hostname(host).ok_or_else(invalid)
}

fn validate_hostname(host: &str) -> Option<String> {
    let host = host.trim_end_matches('.');
    if host.is_empty() || host.len() > MAX_HOSTNAME_LEN {
        return None;
    }
    let labels_ok = host.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= MAX_LABEL_LEN
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    });
    labels_ok.then(|| host.to_ascii_lowercase())
}

/// Runs network probes against a single target.
///
/// Holds only read-only configuration and stateless probes, so one engine
/// can serve concurrent callers behind an `Arc`.
pub struct NetworkDiagnosticsEngine {
    options: EngineOptions,
    commands: CommandProbe,
    dns: DnsProbe,
    sockets: SocketProbe,
    bandwidth: BandwidthProbe,
    ping_analyzer: PingAnalyzer,
    traceroute_analyzer: TracerouteAnalyzer,
    assessor: QualityAssessor,
    logger: ProbeLogger,
}

impl NetworkDiagnosticsEngine {
    /// Engine backed by system commands and the system resolver
    pub fn new(options: EngineOptions) -> Result<Self> {
        Self::with_logger(options, ProbeLogger::silent())
    }

    pub fn with_logger(options: EngineOptions, logger: ProbeLogger) -> Result<Self> {
        Self::with_components(
            options,
            Arc::new(SystemCommandRunner),
            Arc::new(TrustDnsLookup::new()),
            logger,
        )
    }

    /// Engine with injected command runner and resolver
    pub fn with_components(
        options: EngineOptions,
        runner: Arc<dyn CommandRunner>,
        lookup: Arc<dyn DnsLookup>,
        logger: ProbeLogger,
    ) -> Result<Self> {
        options.validate()?;

        Ok(Self {
            commands: CommandProbe::new(runner, logger.clone()),
            dns: DnsProbe::new(lookup, logger.clone(), options.thresholds.slow_dns_ms),
            sockets: SocketProbe::new(logger.clone(), options.retries, options.max_concurrency)
                .with_budget(options.timeout()),
            bandwidth: BandwidthProbe::new(logger.clone())?,
            ping_analyzer: PingAnalyzer::for_platform(options.platform, options.thresholds.clone()),
            traceroute_analyzer: TracerouteAnalyzer::for_platform(options.platform),
            assessor: QualityAssessor::new(options.quality.clone()),
            logger,
            options,
        })
    }

    /// Replace the TCP connector used by port scans
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.sockets = self.sockets.with_connector(connector);
        self
    }

    /// Default configuration fixed at construction
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Run every requested test concurrently and aggregate the results.
    ///
    /// Only target validation can fail the envelope; each probe reports its
    /// own failure in its entry of `results`.
    pub async fn execute_test(&self, config: &TestConfig) -> ExecutionResult {
        let host = match normalize_target(&config.target) {
            Ok(host) => host,
            Err(error) => {
                self.logger
                    .logger()
                    .warn("Rejected diagnostic target")
                    .field("target", &config.target)
                    .error_info(&error)
                    .log()
                    .await;
                return ExecutionResult::rejected(&config.target, error.message());
            }
        };

        let mut envelope = ExecutionResult::new(&host);
        let mut seen = HashSet::new();
        let mut kinds = Vec::new();

        for name in &config.tests {
            match name.parse::<TestKind>() {
                Ok(kind) => {
                    if seen.insert(kind) {
                        kinds.push(kind);
                    }
                }
                Err(error) => {
                    envelope.results.insert(
                        name.trim().to_string(),
                        ProbeReport::Failed(ProbeFailure::new(error.message())),
                    );
                }
            }
        }

        crate::log_debug!(self.logger.logger(), "Dispatching {} probe(s) for {}", kinds.len(), host);
        let reports = join_all(kinds.iter().map(|kind| self.run_probe(*kind, &host, config))).await;
        for (kind, report) in kinds.iter().zip(reports) {
            envelope.results.insert(kind.as_str().to_string(), report);
        }

        let metrics = envelope.quality_metrics();
        if !metrics.is_empty() {
            envelope.quality = Some(self.assess_quality(&metrics));
        }

        envelope
    }

    async fn run_probe(&self, kind: TestKind, host: &str, config: &TestConfig) -> ProbeReport {
        let correlation_id = self.logger.log_probe_start(kind, host).await;
        let started = Instant::now();

        let report = match kind {
            TestKind::Ping => {
                let options = config.ping_options.clone().unwrap_or_default();
                ProbeReport::Ping(self.test_ping(host, &options).await)
            }
            TestKind::Dns => {
                let options = config.dns_options.clone().unwrap_or_default();
                ProbeReport::Dns(self.test_dns(host, &options).await)
            }
            TestKind::Port => {
                let options = config.port_options.clone().unwrap_or_default();
                ProbeReport::Port(self.scan_ports(host, &options.ports, &options).await)
            }
            TestKind::Bandwidth => {
                let options = config.bandwidth_options.clone().unwrap_or_default();
                ProbeReport::Bandwidth(self.test_bandwidth(&options).await)
            }
            TestKind::Traceroute => {
                let options = config.traceroute_options.clone().unwrap_or_default();
                ProbeReport::Traceroute(self.trace_route(host, &options).await)
            }
        };

        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.logger
            .log_probe_finish(&correlation_id, kind, report.success(), duration_ms, report.error())
            .await;
        report
    }

    pub async fn test_ping(&self, target: &str, options: &PingOptions) -> PingResult {
        let parser = self.ping_analyzer.parser();
        let args = parser.build_args(target, options);

        let per_reply_ms = options.timeout_ms.max(options.interval_ms.unwrap_or(0));
        let deadline_ms = per_reply_ms
            .saturating_mul(options.count.max(1) as u64)
            .saturating_add(PING_DEADLINE_SLACK_MS);

        let outcome = self
            .commands
            .run(parser.program(), &args, self.options.effective_timeout(deadline_ms))
            .await;
        self.ping_analyzer.analyze(target, outcome)
    }

    pub async fn test_dns(&self, target: &str, options: &DnsOptions) -> DnsResult {
        self.dns
            .resolve(target, options, self.options.effective_timeout(options.timeout_ms))
            .await
    }

    pub async fn scan_port(&self, target: &str, port: u16, options: &PortOptions) -> PortScanResult {
        self.socket_probe(options)
            .scan_port(target, port, self.options.effective_timeout(options.timeout_ms))
            .await
    }

    pub async fn scan_ports(&self, target: &str, ports: &[u16], options: &PortOptions) -> BatchPortScanResult {
        self.socket_probe(options)
            .scan_ports(
                target,
                ports,
                self.options.effective_timeout(options.timeout_ms),
                options.concurrency,
            )
            .await
    }

    /// Per-request retries are clamped to the engine maximum; the engine
    /// timeout bounds the whole scan
    fn socket_probe(&self, options: &PortOptions) -> SocketProbe {
        match options.retries {
            Some(retries) => self.sockets.clone().with_retries(retries),
            None => self.sockets.clone(),
        }
    }

    pub async fn test_bandwidth(&self, options: &BandwidthOptions) -> BandwidthResult {
        self.bandwidth
            .measure(options, self.options.effective_timeout(options.timeout_ms))
            .await
    }

    pub async fn trace_route(&self, target: &str, options: &TracerouteOptions) -> TracerouteResult {
        let parser = self.traceroute_analyzer.parser();
        let args = parser.build_args(target, options);
        let outcome = self
            .commands
            .run(parser.program(), &args, self.options.effective_timeout(options.timeout_ms))
            .await;
        self.traceroute_analyzer.analyze(target, outcome)
    }

    pub fn assess_quality(&self, metrics: &QualityMetrics) -> QualityAssessment {
        self.assessor.assess(metrics)
    }

    pub fn generate_recommendations(&self, metrics: &QualityMetrics) -> Vec<String> {
        self.assessor.generate_recommendations(metrics)
    }

    pub fn calculate_jitter(&self, samples: &[f64]) -> f64 {
        stats::calculate_jitter(samples)
    }

    pub fn calculate_speed(&self, bytes: u64, seconds: f64) -> Speed {
        bandwidth::calculate_speed(bytes, seconds)
    }
}
