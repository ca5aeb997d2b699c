//! Engine-level integration tests
//!
//! These tests drive `NetworkDiagnosticsEngine` through its public API with
//! scripted command output, an in-memory resolver and local TCP listeners,
//! so they never depend on external hosts.

use async_trait::async_trait;
use network_diagnostics::{
    logging::ProbeLogger,
    models::{DnsOptions, PingOptions, PortOptions, QualityMetrics, TracerouteOptions},
    probe::{CommandOutput, CommandRunner, ConnectOutcome, Connector, DnsAnswer, DnsLookup},
    types::{DnsRecordType, Platform, Rating, SpeedUnit},
    AppError, EngineOptions, NetworkDiagnosticsEngine, Result, TestConfig,
};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use tokio::{net::TcpListener, time::Instant};

/// Replays canned stdout per program and records every invocation
#[derive(Default)]
struct ScriptedRunner {
    outputs: HashMap<&'static str, &'static str>,
    calls: Mutex<Vec<(String, Vec<String>)>>,
    delay: Duration,
}

impl ScriptedRunner {
    fn with(mut self, program: &'static str, stdout: &'static str) -> Self {
        self.outputs.insert(program, stdout);
        self
    }

    fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, program: &str, args: &[String], _timeout: Duration) -> Result<CommandOutput> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((program.to_string(), args.to_vec()));
        }
        tokio::time::sleep(self.delay).await;
        match self.outputs.get(program) {
            Some(stdout) => Ok(CommandOutput {
                stdout: stdout.to_string(),
                stderr: String::new(),
                status_code: Some(0),
            }),
            None => Err(AppError::probe_execution(format!("{}: command not found", program))),
        }
    }
}

/// Resolver answering A/AAAA after a fixed delay
struct DelayedLookup {
    delay: Duration,
}

#[async_trait]
impl DnsLookup for DelayedLookup {
    async fn lookup(&self, _host: &str, record_type: DnsRecordType) -> Result<DnsAnswer> {
        tokio::time::sleep(self.delay).await;
        Ok(match record_type {
            DnsRecordType::A => DnsAnswer::Addresses(vec!["192.0.2.10".to_string()]),
            DnsRecordType::Aaaa => DnsAnswer::Addresses(vec!["2001:db8::10".to_string()]),
            other => DnsAnswer::empty(other),
        })
    }
}

/// Lets every connect hang until its timeout
#[derive(Default)]
struct SilentConnector {
    calls: AtomicUsize,
}

#[async_trait]
impl Connector for SilentConnector {
    async fn connect(&self, _host: &str, _port: u16, timeout: Duration) -> ConnectOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(timeout).await;
        ConnectOutcome::TimedOut
    }
}

fn engine_with(runner: ScriptedRunner, dns_delay_ms: u64) -> NetworkDiagnosticsEngine {
    let options = EngineOptions {
        platform: Platform::Unix,
        ..EngineOptions::default()
    };
    NetworkDiagnosticsEngine::with_components(
        options,
        Arc::new(runner),
        Arc::new(DelayedLookup {
            delay: Duration::from_millis(dns_delay_ms),
        }),
        ProbeLogger::silent(),
    )
    .unwrap()
}

fn engine() -> NetworkDiagnosticsEngine {
    engine_with(ScriptedRunner::default(), 0)
}

const STEADY_PING: &str = "\
PING example.com (192.0.2.10): 56 data bytes
64 bytes from 192.0.2.10: icmp_seq=0 ttl=55 time=25.3 ms
64 bytes from 192.0.2.10: icmp_seq=1 ttl=55 time=26.1 ms
64 bytes from 192.0.2.10: icmp_seq=2 ttl=55 time=24.8 ms

--- example.com ping statistics ---
3 packets transmitted, 3 packets received, 0.0% packet loss
";

const SLOW_PING: &str = "\
64 bytes from 192.0.2.10: icmp_seq=0 ttl=55 time=480 ms
64 bytes from 192.0.2.10: icmp_seq=1 ttl=55 time=510 ms
64 bytes from 192.0.2.10: icmp_seq=2 ttl=55 time=495 ms
";

const TRACEROUTE: &str = "\
traceroute to example.com (192.0.2.10), 30 hops max, 60 byte packets
 1  gateway (192.168.1.1)  1.123 ms  0.998 ms  1.020 ms
 2  * * *
 3  edge.example.net (198.51.100.7)  12.440 ms  12.301 ms  12.512 ms
 4  example.com (192.0.2.10)  25.004 ms  24.870 ms  25.120 ms
";

#[test]
fn test_engine_exposes_default_options() {
    let engine = engine();
    assert_eq!(engine.options().timeout_ms, 30_000);
    assert_eq!(engine.options().retries, 3);
}

#[tokio::test]
async fn test_ping_statistics_from_scripted_output() {
    let engine = engine_with(ScriptedRunner::default().with("ping", STEADY_PING), 0);
    let result = engine.test_ping("example.com", &PingOptions::default()).await;

    assert!(result.success);
    assert_eq!(result.received, 3);
    assert!((result.avg_latency - 25.4).abs() < 0.01);
    assert_eq!(result.min_latency, 24.8);
    assert_eq!(result.max_latency, 26.1);
    assert_eq!(result.packet_loss_percent, 0.0);
    assert!(result.warnings.is_empty());
}

#[tokio::test]
async fn test_ping_loss_and_high_latency_warnings() {
    let lossy = engine_with(
        ScriptedRunner::default().with("ping", "time=25 ms\nRequest timeout\ntime=26 ms"),
        0,
    );
    let result = lossy.test_ping("example.com", &PingOptions::default()).await;
    assert!(result.packet_loss_percent > 0.0);
    assert!((result.packet_loss_percent - 100.0 / 3.0).abs() < 0.01);

    let slow = engine_with(ScriptedRunner::default().with("ping", SLOW_PING), 0);
    let result = slow.test_ping("example.com", &PingOptions::default()).await;
    assert!(result.avg_latency > 400.0);
    assert!(result.warnings.iter().any(|w| w == "高延迟"));
}

#[tokio::test]
async fn test_ping_passes_count_to_command() {
    let runner = Arc::new(ScriptedRunner::default().with("ping", STEADY_PING));
    let engine = NetworkDiagnosticsEngine::with_components(
        EngineOptions {
            platform: Platform::Unix,
            ..EngineOptions::default()
        },
        runner.clone(),
        Arc::new(DelayedLookup {
            delay: Duration::ZERO,
        }),
        ProbeLogger::silent(),
    )
    .unwrap();

    let options = PingOptions {
        count: 7,
        ..PingOptions::default()
    };
    engine.test_ping("example.com", &options).await;

    let calls = runner.calls.lock().unwrap();
    let (program, args) = &calls[0];
    assert_eq!(program, "ping");
    assert!(args.windows(2).any(|pair| pair[0] == "-c" && pair[1] == "7"));
    assert_eq!(args.last().map(String::as_str), Some("example.com"));
}

#[tokio::test]
async fn test_missing_ping_binary_fails_probe_only() {
    let result = engine()
        .execute_test(&TestConfig::new("example.com").with_tests(["ping", "dns"]))
        .await;

    assert!(result.success);
    let ping = result.ping().unwrap();
    assert!(!ping.success);
    assert!(ping.error.as_deref().unwrap().contains("command not found"));
    assert!(result.dns().unwrap().success);
}

#[tokio::test(start_paused = true)]
async fn test_slow_dns_is_flagged() {
    let engine = engine_with(ScriptedRunner::default(), 2_000);
    let result = engine.test_dns("example.com", &DnsOptions::default()).await;

    assert!(result.success);
    assert!(result.resolution_time_ms > 1_000.0);
    assert!(result.warnings.iter().any(|w| w.contains("DNS解析缓慢")));
    assert_eq!(result.ipv4, vec!["192.0.2.10"]);
    assert_eq!(result.ipv6, vec!["2001:db8::10"]);
}

#[tokio::test(start_paused = true)]
async fn test_dns_timeout_fails_probe() {
    let engine = engine_with(ScriptedRunner::default(), 10_000);
    let options = DnsOptions {
        timeout_ms: 500,
        ..DnsOptions::default()
    };
    let result = engine.test_dns("example.com", &options).await;

    assert!(!result.success);
    assert!(result.error.is_some());
}

#[tokio::test]
async fn test_scan_ports_all_reachable() {
    let mut listeners = Vec::new();
    let mut ports = Vec::new();
    for _ in 0..3 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        ports.push(listener.local_addr().unwrap().port());
        listeners.push(listener);
    }

    let result = engine()
        .scan_ports("127.0.0.1", &ports, &PortOptions::default())
        .await;

    assert_eq!(result.scanned_ports, 3);
    assert_eq!(result.open_ports.len(), 3);
    assert!(result.closed_ports.is_empty());
    assert_eq!(result.open_ports, ports);
    drop(listeners);
}

#[tokio::test]
async fn test_scan_ports_mixed() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let open = listener.local_addr().unwrap().port();

    let closed = {
        let probe = TcpListener::bind("127.0.0.1:0").await.unwrap();
        probe.local_addr().unwrap().port()
    };

    let options = PortOptions {
        timeout_ms: 1_000,
        retries: Some(0),
        ..PortOptions::default()
    };
    let result = engine().scan_ports("127.0.0.1", &[open, closed, 0], &options).await;

    assert_eq!(result.scanned_ports, 3);
    assert_eq!(result.open_ports, vec![open]);
    assert_eq!(result.closed_ports, vec![closed, 0]);
    assert_eq!(
        result.scanned_ports,
        result.open_ports.len() + result.closed_ports.len()
    );
    assert!(result.results[2].error.as_deref().unwrap().contains("无效端口"));
    drop(listener);
}

#[tokio::test]
async fn test_trace_route_from_scripted_output() {
    let engine = engine_with(ScriptedRunner::default().with("traceroute", TRACEROUTE), 0);
    let result = engine
        .trace_route("example.com", &TracerouteOptions::default())
        .await;

    assert!(result.success);
    assert_eq!(result.total_hops, 4);
    assert_eq!(result.timeouts, 1);
    assert_eq!(result.hops[0].address.as_deref(), Some("192.168.1.1"));
    assert!(result.hops[1].address.is_none());
    assert!(!result.warnings.is_empty());
}

#[tokio::test]
async fn test_execute_full_envelope() {
    let runner = ScriptedRunner::default()
        .with("ping", STEADY_PING)
        .with("traceroute", TRACEROUTE);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let mut request = TestConfig::new("127.0.0.1")
        .with_tests(["ping", "dns", "port", "bandwidth", "traceroute", "smtp"]);
    request.port_options = Some(PortOptions {
        ports: vec![port],
        ..PortOptions::default()
    });

    let result = engine_with(runner, 0).execute_test(&request).await;

    assert!(result.success);
    assert_eq!(result.target, "127.0.0.1");
    assert_eq!(result.results.len(), 6);
    assert!(result.ping().unwrap().success);
    assert!(result.dns().unwrap().warnings.iter().any(|w| w.contains("IP")));
    assert_eq!(result.ports().unwrap().open_ports, vec![port]);
    assert!(result.bandwidth().unwrap().success);
    assert!(result.traceroute().unwrap().success);

    let unsupported = &result.results["smtp"];
    assert!(!unsupported.success());
    assert!(unsupported.error().unwrap().contains("smtp"));

    let quality = result.quality.as_ref().unwrap();
    assert!((0.0..=100.0).contains(&quality.score));

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["engine"], "network");
    assert!(json["results"]["ping"]["avgLatency"].is_number());
    assert!(json["results"]["port"]["openPorts"].is_array());
    drop(listener);
}

#[tokio::test(start_paused = true)]
async fn test_slow_dns_does_not_delay_ping() {
    let runner = ScriptedRunner::default()
        .with("ping", STEADY_PING)
        .delayed(Duration::from_millis(1_500));
    let engine = engine_with(runner, 2_000);
    let request = TestConfig::new("example.com").with_tests(["ping", "dns"]);

    let started = Instant::now();
    let result = engine.execute_test(&request).await;
    let elapsed = started.elapsed();

    assert!(result.success);
    assert!(result.ping().unwrap().success);
    assert!(result.dns().unwrap().success);
    assert!(elapsed >= Duration::from_millis(2_000));
    assert!(elapsed < Duration::from_millis(3_000), "ping waited for dns: {:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn test_port_retries_are_bounded_by_engine_timeout() {
    let options = EngineOptions {
        timeout_ms: 2_000,
        platform: Platform::Unix,
        ..EngineOptions::default()
    };
    let connector = Arc::new(SilentConnector::default());
    let engine = NetworkDiagnosticsEngine::with_components(
        options,
        Arc::new(ScriptedRunner::default()),
        Arc::new(DelayedLookup {
            delay: Duration::ZERO,
        }),
        ProbeLogger::silent(),
    )
    .unwrap()
    .with_connector(connector.clone());

    let request = TestConfig::from_json(
        r#"{
            "target": "192.0.2.1",
            "tests": ["port"],
            "portOptions": {"ports": [81, 82], "timeoutMs": 500, "retries": 4000000000}
        }"#,
    )
    .unwrap();

    let started = Instant::now();
    let result = engine.execute_test(&request).await;
    assert!(started.elapsed() < Duration::from_secs(3));

    let ports = result.ports().unwrap();
    assert_eq!(ports.scanned_ports, 2);
    assert_eq!(ports.closed_ports, vec![81, 82]);
    assert!(ports.results.iter().all(|r| r.error.as_deref() == Some("连接超时 (500ms)")));
    assert!(connector.calls.load(Ordering::SeqCst) <= 8);
}

#[tokio::test]
async fn test_empty_target_rejected() {
    let result = engine().execute_test(&TestConfig::new("")).await;

    assert!(!result.success);
    assert!(result.error.as_deref().unwrap().contains("目标主机"));
    assert!(result.results.is_empty());
}

#[test]
fn test_pure_helpers() {
    let engine = engine();

    assert!(engine.calculate_jitter(&[20.0, 25.0, 22.0, 28.0, 24.0]) > 0.0);
    assert_eq!(engine.calculate_jitter(&[30.0, 30.0, 30.0]), 0.0);

    let speed = engine.calculate_speed(10_000_000, 1.0);
    assert_eq!(speed.value, 10.0);
    assert_eq!(speed.unit, SpeedUnit::MegabytesPerSec);

    let good = QualityMetrics {
        latency: Some(25.0),
        jitter: Some(5.0),
        packet_loss: Some(0.0),
        bandwidth: Some(100.0),
        dns_time: None,
    };
    let assessment = engine.assess_quality(&good);
    assert_eq!(assessment.rating, Rating::Excellent);
    assert!(assessment.score > 90.0);

    let bad = QualityMetrics {
        latency: Some(500.0),
        jitter: Some(100.0),
        packet_loss: Some(10.0),
        bandwidth: Some(1.0),
        dns_time: None,
    };
    let assessment = engine.assess_quality(&bad);
    assert_eq!(assessment.rating, Rating::Poor);
    assert!(!assessment.recommendations.is_empty());
}

#[test]
fn test_recommendations() {
    let engine = engine();
    let only = |metrics: QualityMetrics| engine.generate_recommendations(&metrics);

    assert!(only(QualityMetrics {
        latency: Some(500.0),
        ..QualityMetrics::default()
    })
    .iter()
    .any(|r| r == "优化网络路由"));
    assert!(only(QualityMetrics {
        packet_loss: Some(15.0),
        ..QualityMetrics::default()
    })
    .iter()
    .any(|r| r == "检查网络连接"));
    assert!(only(QualityMetrics {
        dns_time: Some(2000.0),
        ..QualityMetrics::default()
    })
    .iter()
    .any(|r| r == "更换DNS服务器"));
}

#[test]
fn test_pure_helpers_are_idempotent() {
    let engine = engine();
    let samples = [12.0, 19.5, 14.2, 30.1];
    let metrics = QualityMetrics {
        latency: Some(120.0),
        jitter: Some(35.0),
        packet_loss: Some(2.0),
        bandwidth: Some(8.0),
        dns_time: Some(300.0),
    };

    assert_eq!(engine.calculate_jitter(&samples), engine.calculate_jitter(&samples));
    assert_eq!(engine.calculate_speed(123_456, 0.7), engine.calculate_speed(123_456, 0.7));
    assert_eq!(engine.assess_quality(&metrics), engine.assess_quality(&metrics));
    assert_eq!(
        engine.generate_recommendations(&metrics),
        engine.generate_recommendations(&metrics)
    );
}

#[test]
fn test_blocking_execution() {
    let result = tokio_test::block_on(async {
        engine_with(ScriptedRunner::default().with("ping", STEADY_PING), 0)
            .execute_test(&TestConfig::new("example.com").with_tests(["ping"]))
            .await
    });
    assert!(result.success);
    assert_eq!(result.quality.unwrap().rating, Rating::Excellent);
}
