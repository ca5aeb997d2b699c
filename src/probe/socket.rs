//! TCP connect probe with bounded-concurrency batch scanning

use crate::{
    defaults::MAX_RETRIES,
    logging::ProbeLogger,
    models::{results::non_negative, BatchPortScanResult, PortScanResult},
};
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tokio::time::Instant;

/// Terminal state of one connect attempt
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectOutcome {
    /// Handshake completed; round-trip in milliseconds
    Open(f64),
    /// The peer or the network rejected the connection
    Closed(String),
    /// No signal before the deadline
    TimedOut,
}

impl ConnectOutcome {
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectOutcome::Open(_))
    }
}

/// Race a connect against a timer. The stream or the pending connect is
/// dropped on every branch, which closes the socket.
pub async fn connect_once(host: &str, port: u16, timeout: Duration) -> ConnectOutcome {
    let started = Instant::now();
    tokio::select! {
        connected = TcpStream::connect((host, port)) => match connected {
            Ok(stream) => {
                let rtt_ms = started.elapsed().as_secs_f64() * 1000.0;
                drop(stream);
                ConnectOutcome::Open(non_negative(rtt_ms))
            }
            Err(e) => ConnectOutcome::Closed(e.to_string()),
        },
        _ = tokio::time::sleep(timeout) => ConnectOutcome::TimedOut,
    }
}

/// Connect seam; tests substitute a scripted implementation
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, host: &str, port: u16, timeout: Duration) -> ConnectOutcome;
}

/// Real TCP handshakes through tokio
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, host: &str, port: u16, timeout: Duration) -> ConnectOutcome {
        connect_once(host, port, timeout).await
    }
}

/// Scans TCP ports, retrying attempts that time out
#[derive(Clone)]
pub struct SocketProbe {
    connector: Arc<dyn Connector>,
    logger: ProbeLogger,
    retries: u32,
    max_concurrency: usize,
    /// Wall-clock limit for a whole `scan_port` or `scan_ports` call
    budget: Option<Duration>,
}

impl SocketProbe {
    pub fn new(logger: ProbeLogger, retries: u32, max_concurrency: usize) -> Self {
        Self {
            connector: Arc::new(TcpConnector),
            logger,
            retries: retries.min(MAX_RETRIES),
            max_concurrency: clamp_concurrency(max_concurrency),
            budget: None,
        }
    }

    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries.min(MAX_RETRIES);
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = clamp_concurrency(max_concurrency);
        self
    }

    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = Some(budget);
        self
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    fn deadline(&self) -> Option<Instant> {
        self.budget.map(|budget| Instant::now() + budget)
    }

    pub async fn scan_port(&self, host: &str, port: u16, timeout: Duration) -> PortScanResult {
        self.scan_port_until(host, port, timeout, self.deadline()).await
    }

    async fn scan_port_until(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
        deadline: Option<Instant>,
    ) -> PortScanResult {
        let mut result = PortScanResult {
            host: host.to_string(),
            port,
            open: false,
            response_time_ms: None,
            error: None,
        };

        if port == 0 {
            result.error = Some("无效端口: 0".to_string());
            return result;
        }

        let attempts = self.connect_with_retries(host, port, timeout);
        let outcome = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, attempts)
                .await
                .unwrap_or(ConnectOutcome::TimedOut),
            None => attempts.await,
        };

        match outcome {
            ConnectOutcome::Open(rtt_ms) => {
                result.open = true;
                result.response_time_ms = Some(rtt_ms);
            }
            ConnectOutcome::Closed(reason) => result.error = Some(reason),
            ConnectOutcome::TimedOut => {
                result.error = Some(format!("连接超时 ({}ms)", timeout.as_millis()));
            }
        }

        self.logger
            .log_connection(host, port, result.open, result.error.as_deref())
            .await;
        result
    }

    async fn connect_with_retries(&self, host: &str, port: u16, timeout: Duration) -> ConnectOutcome {
        let mut outcome = ConnectOutcome::TimedOut;
        for attempt in 0..=self.retries {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(50 * attempt as u64)).await;
            }
            outcome = self.connector.connect(host, port, timeout).await;
            // Refusals are definitive; only silence is worth another try
            if outcome != ConnectOutcome::TimedOut {
                break;
            }
        }
        outcome
    }

    /// Scan every port concurrently, at most `concurrency` in flight and
    /// never more than the scanner's own maximum. Results keep the order of
    /// `ports`, duplicates included.
    pub async fn scan_ports(
        &self,
        host: &str,
        ports: &[u16],
        timeout: Duration,
        concurrency: Option<usize>,
    ) -> BatchPortScanResult {
        let limit = concurrency
            .unwrap_or(self.max_concurrency)
            .clamp(1, self.max_concurrency);
        let semaphore = Arc::new(Semaphore::new(limit));
        let deadline = self.deadline();

        let scans = ports.iter().map(|&port| {
            let semaphore = Arc::clone(&semaphore);
            async move {
                let acquire = semaphore.acquire_owned();
                let permit = match deadline {
                    Some(deadline) => tokio::time::timeout_at(deadline, acquire).await.ok(),
                    None => Some(acquire.await),
                };
                let _permit = match permit {
                    Some(Ok(permit)) => permit,
                    Some(Err(_)) => return unscanned(host, port, "扫描已取消"),
                    None => return unscanned(host, port, &format!("连接超时 ({}ms)", timeout.as_millis())),
                };
                self.scan_port_until(host, port, timeout, deadline).await
            }
        });

        BatchPortScanResult::from_results(host, join_all(scans).await)
    }
}

fn clamp_concurrency(value: usize) -> usize {
    value.clamp(1, Semaphore::MAX_PERMITS)
}

fn unscanned(host: &str, port: u16, reason: &str) -> PortScanResult {
    PortScanResult {
        host: host.to_string(),
        port,
        open: false,
        response_time_ms: None,
        error: Some(reason.to_string()),
    }
}
