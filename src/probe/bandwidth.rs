//! Throughput measurement over a synthetic pipe or a live HTTP endpoint

use crate::{
    error::{AppError, Result},
    logging::ProbeLogger,
    models::{results::non_negative, BandwidthOptions, BandwidthResult, Speed},
    types::{Direction, SpeedUnit},
};
use futures::{stream, StreamExt};
use reqwest::{Body, Client, Url};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::Instant;

pub const WARN_LOW_BANDWIDTH: &str = "带宽不足";

/// Largest payload a single measurement will move (1 GiB)
pub const MAX_TEST_SIZE: u64 = 1024 * 1024 * 1024;

const CHUNK_SIZE: usize = 64 * 1024;
const UNITS: [SpeedUnit; 4] = [
    SpeedUnit::BytesPerSec,
    SpeedUnit::KilobytesPerSec,
    SpeedUnit::MegabytesPerSec,
    SpeedUnit::GigabytesPerSec,
];

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Express `bytes` over `seconds` in the largest decimal unit that keeps
/// the value at or above 1, rounded to two decimals.
pub fn calculate_speed(bytes: u64, seconds: f64) -> Speed {
    if !seconds.is_finite() || seconds <= 0.0 {
        return Speed {
            value: 0.0,
            unit: SpeedUnit::BytesPerSec,
        };
    }

    let mut value = bytes as f64 / seconds;
    let mut index = 0;
    while value >= 1000.0 && index < UNITS.len() - 1 {
        value /= 1000.0;
        index += 1;
    }

    let mut rounded = round2(value);
    if rounded >= 1000.0 && index < UNITS.len() - 1 {
        index += 1;
        rounded = round2(value / 1000.0);
    }

    Speed {
        value: rounded,
        unit: UNITS[index],
    }
}

/// Megabits per second, two decimals
pub fn calculate_mbps(bytes: u64, seconds: f64) -> f64 {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0.0;
    }
    round2(bytes as f64 * 8.0 / seconds / 1_000_000.0)
}

/// Where the measured bytes come from
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadSource {
    /// In-memory pipe, exercises the local stack only
    Synthetic,
    /// Download from or upload to this URL
    Live(Url),
}

impl PayloadSource {
    pub fn from_options(options: &BandwidthOptions) -> Result<Self> {
        match options.url.as_deref().map(str::trim) {
            None | Some("") => Ok(PayloadSource::Synthetic),
            Some(raw) => {
                let url = Url::parse(raw)?;
                match url.scheme() {
                    "http" | "https" => Ok(PayloadSource::Live(url)),
                    other => Err(AppError::validation(format!(
                        "Unsupported bandwidth URL scheme '{}'",
                        other
                    ))),
                }
            }
        }
    }
}

#[derive(Clone)]
pub struct BandwidthProbe {
    client: Client,
    logger: ProbeLogger,
}

impl BandwidthProbe {
    pub fn new(logger: ProbeLogger) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("network-diagnostics/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, logger })
    }

    pub async fn measure(&self, options: &BandwidthOptions, timeout: Duration) -> BandwidthResult {
        let direction = options.direction;
        let source = match PayloadSource::from_options(options) {
            Ok(source) => source,
            Err(e) => return BandwidthResult::failed(direction, e.message()),
        };
        if options.test_size > MAX_TEST_SIZE {
            return BandwidthResult::failed(
                direction,
                format!("测试数据量过大: {} 字节 (最大 {} 字节)", options.test_size, MAX_TEST_SIZE),
            );
        }

        let started = Instant::now();
        let transfer = tokio::time::timeout(timeout, self.transfer(&source, direction, options.test_size)).await;
        let elapsed = started.elapsed();

        let (bytes, mut warnings) = match transfer {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => return BandwidthResult::failed(direction, e.message()),
            Err(_) => {
                return BandwidthResult::failed(
                    direction,
                    format!("带宽测试超时 ({}ms)", timeout.as_millis()),
                )
            }
        };

        let seconds = elapsed.as_secs_f64();
        let mbps = calculate_mbps(bytes, seconds);
        if options.expected_min_speed.is_some_and(|min| mbps < min) {
            warnings.push(WARN_LOW_BANDWIDTH.to_string());
        }

        self.logger
            .logger()
            .debug("Bandwidth transfer finished")
            .field("direction", direction.to_string())
            .field("bytes", bytes)
            .field("duration_ms", seconds * 1000.0)
            .field("mbps", mbps)
            .log()
            .await;

        BandwidthResult {
            direction,
            bytes_transferred: bytes,
            duration_ms: non_negative(seconds * 1000.0),
            speed: calculate_speed(bytes, seconds),
            mbps,
            warnings,
            success: true,
            error: None,
        }
    }

    async fn transfer(&self, source: &PayloadSource, direction: Direction, size: u64) -> Result<(u64, Vec<String>)> {
        match (source, direction) {
            (PayloadSource::Synthetic, _) => Ok((synthesize(size).await?, Vec::new())),
            (PayloadSource::Live(url), Direction::Download) => self.download(url, size).await,
            (PayloadSource::Live(url), Direction::Upload) => {
                self.upload(url, size).await.map(|bytes| (bytes, Vec::new()))
            }
        }
    }

    /// Stream the body until `size` bytes arrived or it ends
    async fn download(&self, url: &Url, size: u64) -> Result<(u64, Vec<String>)> {
        let response = self.client.get(url.clone()).send().await?.error_for_status()?;
        let mut stream = response.bytes_stream();
        let mut received = 0u64;

        while received < size {
            match stream.next().await {
                Some(chunk) => received += chunk?.len() as u64,
                None => break,
            }
        }

        let mut warnings = Vec::new();
        if received < size {
            warnings.push(format!("下载数据量不足: 收到 {} / {} 字节", received, size));
        }
        Ok((received, warnings))
    }

    /// POST `size` zero bytes, streamed in fixed chunks
    async fn upload(&self, url: &Url, size: u64) -> Result<u64> {
        let body = stream::unfold(size, |remaining| async move {
            if remaining == 0 {
                return None;
            }
            let n = remaining.min(CHUNK_SIZE as u64);
            Some((Ok::<_, std::io::Error>(vec![0u8; n as usize]), remaining - n))
        });

        self.client
            .post(url.clone())
            .header(reqwest::header::CONTENT_LENGTH, size)
            .body(Body::wrap_stream(body))
            .send()
            .await?
            .error_for_status()?;
        Ok(size)
    }
}

/// Push `size` zero bytes through an in-memory duplex pipe
async fn synthesize(size: u64) -> Result<u64> {
    let (mut writer, mut reader) = tokio::io::duplex(CHUNK_SIZE);

    let write = async move {
        let chunk = vec![0u8; CHUNK_SIZE];
        let mut remaining = size;
        while remaining > 0 {
            let n = remaining.min(CHUNK_SIZE as u64) as usize;
            writer.write_all(&chunk[..n]).await?;
            remaining -= n as u64;
        }
        writer.shutdown().await
    };

    let read = async move {
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut total = 0u64;
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            total += n as u64;
        }
        Ok::<u64, std::io::Error>(total)
    };

    let (written, read) = tokio::join!(write, read);
    written?;
    Ok(read?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn probe() -> BandwidthProbe {
        BandwidthProbe::new(ProbeLogger::silent()).unwrap()
    }

    fn options(size: u64) -> BandwidthOptions {
        BandwidthOptions {
            test_size: size,
            ..BandwidthOptions::default()
        }
    }

    #[test]
    fn test_calculate_speed_units() {
        assert_eq!(
            calculate_speed(10_000_000, 1.0),
            Speed {
                value: 10.0,
                unit: SpeedUnit::MegabytesPerSec
            }
        );
        assert_eq!(calculate_speed(500, 1.0).unit, SpeedUnit::BytesPerSec);
        assert_eq!(calculate_speed(1_500, 1.0).value, 1.5);
        assert_eq!(calculate_speed(1_500, 1.0).unit, SpeedUnit::KilobytesPerSec);
        assert_eq!(calculate_speed(3_000_000_000, 1.0).unit, SpeedUnit::GigabytesPerSec);
        assert_eq!(calculate_speed(5_000_000_000_000, 1.0).value, 5000.0);
    }

    #[test]
    fn test_calculate_speed_rounding_promotes_unit() {
        let speed = calculate_speed(999_999, 1.0);
        assert_eq!(speed.unit, SpeedUnit::MegabytesPerSec);
        assert_eq!(speed.value, 1.0);
    }

    #[test]
    fn test_calculate_speed_is_deterministic() {
        assert_eq!(calculate_speed(123_456_789, 2.5), calculate_speed(123_456_789, 2.5));
    }

    #[test]
    fn test_calculate_mbps() {
        assert_eq!(calculate_mbps(1_250_000, 1.0), 10.0);
        assert_eq!(calculate_mbps(1_250_000, 0.0), 0.0);
    }

    #[test]
    fn test_payload_source_from_options() {
        assert_eq!(PayloadSource::from_options(&options(1)).unwrap(), PayloadSource::Synthetic);

        let live = BandwidthOptions {
            url: Some("http://127.0.0.1:8080/payload".to_string()),
            ..BandwidthOptions::default()
        };
        assert!(matches!(PayloadSource::from_options(&live).unwrap(), PayloadSource::Live(_)));

        let ftp = BandwidthOptions {
            url: Some("ftp://example.com/file".to_string()),
            ..BandwidthOptions::default()
        };
        assert!(PayloadSource::from_options(&ftp).is_err());
    }

    #[tokio::test]
    async fn test_synthetic_transfer_counts_every_byte() {
        let result = probe().measure(&options(1_000_000), Duration::from_secs(10)).await;
        assert!(result.success);
        assert_eq!(result.bytes_transferred, 1_000_000);
        assert_eq!(result.direction, Direction::Download);
        assert!(result.duration_ms >= 0.0);
    }

    #[tokio::test]
    async fn test_low_speed_warning() {
        let opts = BandwidthOptions {
            test_size: 1024,
            expected_min_speed: Some(f64::MAX),
            ..BandwidthOptions::default()
        };
        let result = probe().measure(&opts, Duration::from_secs(10)).await;
        assert!(result.warnings.contains(&WARN_LOW_BANDWIDTH.to_string()));
    }

    #[tokio::test]
    async fn test_live_download() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/payload"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 200_000]))
            .mount(&server)
            .await;

        let opts = BandwidthOptions {
            test_size: 100_000,
            url: Some(format!("{}/payload", server.uri())),
            ..BandwidthOptions::default()
        };
        let result = probe().measure(&opts, Duration::from_secs(10)).await;
        assert!(result.success, "{:?}", result.error);
        assert!(result.bytes_transferred >= 100_000);
        assert!(result.bytes_transferred <= 200_000);
        assert!(result.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_live_download_short_body_warns() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 10]))
            .mount(&server)
            .await;

        let opts = BandwidthOptions {
            test_size: 1_000,
            url: Some(server.uri()),
            ..BandwidthOptions::default()
        };
        let result = probe().measure(&opts, Duration::from_secs(10)).await;
        assert!(result.success);
        assert_eq!(result.bytes_transferred, 10);
        assert_eq!(result.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_live_upload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let opts = BandwidthOptions {
            test_size: 50_000,
            direction: Direction::Upload,
            url: Some(format!("{}/upload", server.uri())),
            ..BandwidthOptions::default()
        };
        let result = probe().measure(&opts, Duration::from_secs(10)).await;
        assert!(result.success);
        assert_eq!(result.direction, Direction::Upload);
        assert_eq!(result.bytes_transferred, 50_000);
    }

    #[tokio::test]
    async fn test_oversized_payload_is_rejected() {
        let opts = BandwidthOptions {
            test_size: 1 << 50,
            direction: Direction::Upload,
            url: Some("http://127.0.0.1:9/upload".to_string()),
            ..BandwidthOptions::default()
        };
        let result = probe().measure(&opts, Duration::from_secs(2)).await;
        assert!(!result.success);
        assert_eq!(result.bytes_transferred, 0);
        assert!(result.error.unwrap().contains("测试数据量过大"));

        let synthetic = probe().measure(&options(MAX_TEST_SIZE + 1), Duration::from_secs(2)).await;
        assert!(!synthetic.success);
    }

    #[tokio::test]
    async fn test_live_upload_streams_full_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let size = (CHUNK_SIZE as u64) * 3 + 17;
        let opts = BandwidthOptions {
            test_size: size,
            direction: Direction::Upload,
            url: Some(format!("{}/upload", server.uri())),
            ..BandwidthOptions::default()
        };
        let result = probe().measure(&opts, Duration::from_secs(10)).await;
        assert!(result.success, "{:?}", result.error);

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].body.len() as u64, size);
    }

    #[tokio::test]
    async fn test_live_error_status_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let opts = BandwidthOptions {
            url: Some(server.uri()),
            ..BandwidthOptions::default()
        };
        let result = probe().measure(&opts, Duration::from_secs(10)).await;
        assert!(!result.success);
        assert!(result.error.is_some());
        assert_eq!(result.bytes_transferred, 0);
    }
}
