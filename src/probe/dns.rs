//! DNS resolution probe across record types

use crate::{
    error::{AppError, Result},
    logging::ProbeLogger,
    models::{results::non_negative, DnsOptions, DnsResult, MxRecord},
    types::DnsRecordType,
};
use async_trait::async_trait;
use futures::future::join_all;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use trust_dns_resolver::{
    config::{ResolverConfig, ResolverOpts},
    error::{ResolveError, ResolveErrorKind},
    proto::{
        op::ResponseCode,
        rr::{RData, RecordType},
    },
    system_conf, TokioAsyncResolver,
};

pub const WARN_SLOW_DNS: &str = "DNS解析缓慢";

/// Records returned for one record type
#[derive(Debug, Clone, PartialEq)]
pub enum DnsAnswer {
    /// A or AAAA addresses
    Addresses(Vec<String>),
    Mx(Vec<MxRecord>),
    Txt(Vec<Vec<String>>),
    /// NS or CNAME targets
    Names(Vec<String>),
}

impl DnsAnswer {
    /// Empty answer of the shape `record_type` produces
    pub fn empty(record_type: DnsRecordType) -> Self {
        match record_type {
            DnsRecordType::A | DnsRecordType::Aaaa => DnsAnswer::Addresses(Vec::new()),
            DnsRecordType::Mx => DnsAnswer::Mx(Vec::new()),
            DnsRecordType::Txt => DnsAnswer::Txt(Vec::new()),
            DnsRecordType::Ns | DnsRecordType::Cname => DnsAnswer::Names(Vec::new()),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            DnsAnswer::Addresses(v) | DnsAnswer::Names(v) => v.is_empty(),
            DnsAnswer::Mx(v) => v.is_empty(),
            DnsAnswer::Txt(v) => v.is_empty(),
        }
    }
}

/// Resolver seam; an in-memory implementation stands in for tests
#[async_trait]
pub trait DnsLookup: Send + Sync {
    /// Resolve one record type. A "no records" answer that is not NXDOMAIN
    /// is an empty `Ok`, every other failure is an `Err`.
    async fn lookup(&self, host: &str, record_type: DnsRecordType) -> Result<DnsAnswer>;
}

/// Lookup backed by the trust-dns async resolver
pub struct TrustDnsLookup {
    resolver: TokioAsyncResolver,
}

impl TrustDnsLookup {
    /// Use the system resolver configuration, falling back to public defaults
    pub fn new() -> Self {
        match system_conf::read_system_conf() {
            Ok((config, opts)) => Self::with_config(config, opts),
            Err(_) => Self::with_config(ResolverConfig::default(), ResolverOpts::default()),
        }
    }

    pub fn with_config(config: ResolverConfig, opts: ResolverOpts) -> Self {
        Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
        }
    }
}

impl Default for TrustDnsLookup {
    fn default() -> Self {
        Self::new()
    }
}

fn trim_fqdn(name: String) -> String {
    name.trim_end_matches('.').to_string()
}

/// Map "no records" (but not NXDOMAIN) to an empty answer
fn empty_or_error(host: &str, record_type: DnsRecordType, error: ResolveError) -> Result<DnsAnswer> {
    match error.kind() {
        ResolveErrorKind::NoRecordsFound { response_code, .. }
            if *response_code != ResponseCode::NXDomain =>
        {
            Ok(DnsAnswer::empty(record_type))
        }
        _ => Err(AppError::dns_resolution(format!("{} ({}): {}", host, record_type, error))),
    }
}

#[async_trait]
impl DnsLookup for TrustDnsLookup {
    async fn lookup(&self, host: &str, record_type: DnsRecordType) -> Result<DnsAnswer> {
        let answer = match record_type {
            DnsRecordType::A => self.resolver.ipv4_lookup(host).await.map(|lookup| {
                DnsAnswer::Addresses(lookup.iter().map(|a| a.to_string()).collect())
            }),
            DnsRecordType::Aaaa => self.resolver.ipv6_lookup(host).await.map(|lookup| {
                DnsAnswer::Addresses(lookup.iter().map(|aaaa| aaaa.to_string()).collect())
            }),
            DnsRecordType::Mx => self.resolver.mx_lookup(host).await.map(|lookup| {
                DnsAnswer::Mx(
                    lookup
                        .iter()
                        .map(|mx| MxRecord {
                            exchange: trim_fqdn(mx.exchange().to_string()),
                            priority: mx.preference(),
                        })
                        .collect(),
                )
            }),
            DnsRecordType::Txt => self.resolver.txt_lookup(host).await.map(|lookup| {
                DnsAnswer::Txt(
                    lookup
                        .iter()
                        .map(|txt| {
                            txt.txt_data()
                                .iter()
                                .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
                                .collect()
                        })
                        .collect(),
                )
            }),
            DnsRecordType::Ns => self.resolver.ns_lookup(host).await.map(|lookup| {
                DnsAnswer::Names(lookup.iter().map(|ns| trim_fqdn(ns.to_string())).collect())
            }),
            DnsRecordType::Cname => self.resolver.lookup(host, RecordType::CNAME).await.map(|lookup| {
                DnsAnswer::Names(
                    lookup
                        .iter()
                        .filter_map(|rdata| match rdata {
                            RData::CNAME(name) => Some(trim_fqdn(name.to_string())),
                            _ => None,
                        })
                        .collect(),
                )
            }),
        };

        answer.or_else(|error| empty_or_error(host, record_type, error))
    }
}

/// Record types to query: A and AAAA first, then the extras without duplicates
pub fn query_plan(extra: &[DnsRecordType]) -> Vec<DnsRecordType> {
    let mut plan = vec![DnsRecordType::A, DnsRecordType::Aaaa];
    for record_type in extra {
        if !plan.contains(record_type) {
            plan.push(*record_type);
        }
    }
    plan
}

/// Split requested type names into resolvable types and one error per
/// unsupported name
pub fn parse_record_types(names: &[String]) -> (Vec<DnsRecordType>, Vec<String>) {
    let mut types = Vec::new();
    let mut rejected = Vec::new();
    for name in names {
        match name.parse::<DnsRecordType>() {
            Ok(record_type) => types.push(record_type),
            Err(error) => rejected.push(error.message().to_string()),
        }
    }
    (types, rejected)
}

/// Resolves every requested record type concurrently and times the whole run
#[derive(Clone)]
pub struct DnsProbe {
    lookup: Arc<dyn DnsLookup>,
    logger: ProbeLogger,
    slow_threshold_ms: f64,
}

impl DnsProbe {
    pub fn new(lookup: Arc<dyn DnsLookup>, logger: ProbeLogger, slow_threshold_ms: f64) -> Self {
        Self {
            lookup,
            logger,
            slow_threshold_ms,
        }
    }

    pub async fn resolve(&self, target: &str, options: &DnsOptions, timeout: Duration) -> DnsResult {
        let mut result = DnsResult::empty(target);

        if let Ok(ip) = target.parse::<IpAddr>() {
            match ip {
                IpAddr::V4(v4) => result.ipv4.push(v4.to_string()),
                IpAddr::V6(v6) => result.ipv6.push(v6.to_string()),
            }
            result.warnings.push("目标为IP地址，跳过DNS解析".to_string());
            return result;
        }

        let (extra, mut errors) = parse_record_types(&options.types);
        let plan = query_plan(&extra);
        let started = tokio::time::Instant::now();

        let lookups = plan.iter().map(|record_type| {
            let record_type = *record_type;
            async move {
                let attempt_started = tokio::time::Instant::now();
                let answer = match tokio::time::timeout(timeout, self.lookup.lookup(target, record_type)).await {
                    Ok(answer) => answer,
                    Err(_) => Err(AppError::timeout(format!(
                        "{} ({}) 解析超时 ({}ms)",
                        target,
                        record_type,
                        timeout.as_millis()
                    ))),
                };
                let elapsed_ms = attempt_started.elapsed().as_secs_f64() * 1000.0;
                self.logger
                    .log_dns_resolution(target, record_type.as_str(), answer.is_ok(), elapsed_ms)
                    .await;
                (record_type, answer)
            }
        });

        let answers = join_all(lookups).await;
        result.resolution_time_ms = non_negative(started.elapsed().as_secs_f64() * 1000.0);

        for (record_type, answer) in answers {
            match answer {
                Ok(answer) => {
                    if answer.is_empty() {
                        result.warnings.push(format!("未找到 {} 记录", record_type));
                    }
                    apply_answer(&mut result, record_type, answer);
                }
                Err(error) => {
                    apply_answer(&mut result, record_type, DnsAnswer::empty(record_type));
                    errors.push(error.message().to_string());
                }
            }
        }

        if result.resolution_time_ms > self.slow_threshold_ms {
            result.warnings.push(WARN_SLOW_DNS.to_string());
        }

        if !errors.is_empty() {
            result.success = false;
            result.error = Some(errors.join("; "));
        }

        result
    }
}

fn apply_answer(result: &mut DnsResult, record_type: DnsRecordType, answer: DnsAnswer) {
    match (record_type, answer) {
        (DnsRecordType::A, DnsAnswer::Addresses(addresses)) => result.ipv4 = addresses,
        (DnsRecordType::Aaaa, DnsAnswer::Addresses(addresses)) => result.ipv6 = addresses,
        (DnsRecordType::Mx, DnsAnswer::Mx(records)) => result.mx = Some(records),
        (DnsRecordType::Txt, DnsAnswer::Txt(records)) => result.txt = Some(records),
        (DnsRecordType::Ns, DnsAnswer::Names(names)) => result.ns = Some(names),
        (DnsRecordType::Cname, DnsAnswer::Names(names)) => result.cname = Some(names),
        // Mismatched shapes from a custom lookup are dropped
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// In-memory resolver with an optional artificial delay
    struct StaticLookup {
        answers: HashMap<DnsRecordType, Result<DnsAnswer>>,
        delay: Duration,
    }

    impl StaticLookup {
        fn new() -> Self {
            let mut answers = HashMap::new();
            answers.insert(DnsRecordType::A, Ok(DnsAnswer::Addresses(vec!["93.184.216.34".to_string()])));
            answers.insert(DnsRecordType::Aaaa, Ok(DnsAnswer::Addresses(vec!["2606:2800:220:1::248".to_string()])));
            Self {
                answers,
                delay: Duration::ZERO,
            }
        }

        fn with(mut self, record_type: DnsRecordType, answer: Result<DnsAnswer>) -> Self {
            self.answers.insert(record_type, answer);
            self
        }

        fn delayed(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl DnsLookup for StaticLookup {
        async fn lookup(&self, _host: &str, record_type: DnsRecordType) -> Result<DnsAnswer> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.answers
                .get(&record_type)
                .cloned()
                .unwrap_or_else(|| Ok(DnsAnswer::empty(record_type)))
        }
    }

    fn probe(lookup: StaticLookup) -> DnsProbe {
        DnsProbe::new(Arc::new(lookup), ProbeLogger::silent(), 1000.0)
    }

    #[tokio::test]
    async fn test_resolves_a_and_aaaa_by_default() {
        let result = probe(StaticLookup::new())
            .resolve("example.com", &DnsOptions::default(), Duration::from_secs(5))
            .await;
        assert!(result.success);
        assert_eq!(result.ipv4, vec!["93.184.216.34"]);
        assert_eq!(result.ipv6, vec!["2606:2800:220:1::248"]);
        assert!(result.mx.is_none());
        assert!(result.txt.is_none());
        assert!(result.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_extra_record_types() {
        let lookup = StaticLookup::new()
            .with(
                DnsRecordType::Mx,
                Ok(DnsAnswer::Mx(vec![MxRecord {
                    exchange: "mail.example.com".to_string(),
                    priority: 10,
                }])),
            )
            .with(
                DnsRecordType::Txt,
                Ok(DnsAnswer::Txt(vec![vec!["v=spf1 -all".to_string()]])),
            );
        let options = DnsOptions {
            types: vec!["MX".to_string(), "txt".to_string(), "A".to_string()],
            ..DnsOptions::default()
        };
        let result = probe(lookup).resolve("example.com", &options, Duration::from_secs(5)).await;

        assert!(result.success);
        assert_eq!(result.mx.unwrap()[0].priority, 10);
        assert_eq!(result.txt.unwrap(), vec![vec!["v=spf1 -all".to_string()]]);
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_other_types() {
        let lookup = StaticLookup::new().with(
            DnsRecordType::Mx,
            Err(AppError::dns_resolution("example.com (MX): no connections available")),
        );
        let options = DnsOptions {
            types: vec!["MX".to_string()],
            ..DnsOptions::default()
        };
        let result = probe(lookup).resolve("example.com", &options, Duration::from_secs(5)).await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("no connections available"));
        assert_eq!(result.ipv4, vec!["93.184.216.34"]);
        assert_eq!(result.mx, Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_unsupported_type_fails_only_its_entry() {
        let lookup = StaticLookup::new().with(
            DnsRecordType::Mx,
            Ok(DnsAnswer::Mx(vec![MxRecord {
                exchange: "mail.example.com".to_string(),
                priority: 5,
            }])),
        );
        let options = DnsOptions {
            types: vec!["mx".to_string(), "SRV".to_string()],
            ..DnsOptions::default()
        };
        let result = probe(lookup).resolve("example.com", &options, Duration::from_secs(5)).await;

        assert!(!result.success);
        let error = result.error.unwrap();
        assert!(error.contains("SRV"));
        assert!(!error.contains(';'));
        assert_eq!(result.ipv4, vec!["93.184.216.34"]);
        assert_eq!(result.mx.unwrap()[0].exchange, "mail.example.com");
    }

    #[test]
    fn test_parse_record_types() {
        let names = vec!["aaaa".to_string(), "SOA".to_string(), " ns ".to_string()];
        let (types, rejected) = parse_record_types(&names);
        assert_eq!(types, vec![DnsRecordType::Aaaa, DnsRecordType::Ns]);
        assert_eq!(rejected.len(), 1);
        assert!(rejected[0].contains("SOA"));
    }

    #[tokio::test]
    async fn test_empty_answer_is_warning_not_failure() {
        let lookup = StaticLookup::new().with(DnsRecordType::Aaaa, Ok(DnsAnswer::Addresses(Vec::new())));
        let result = probe(lookup)
            .resolve("example.com", &DnsOptions::default(), Duration::from_secs(5))
            .await;
        assert!(result.success);
        assert!(result.ipv6.is_empty());
        assert!(result.warnings.iter().any(|w| w.contains("AAAA")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_resolution_warning() {
        let lookup = StaticLookup::new().delayed(Duration::from_millis(2000));
        let result = probe(lookup)
            .resolve("example.com", &DnsOptions::default(), Duration::from_secs(5))
            .await;
        assert!(result.success);
        assert!(result.resolution_time_ms > 1000.0);
        assert!(result.warnings.contains(&WARN_SLOW_DNS.to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_timeout() {
        let lookup = StaticLookup::new().delayed(Duration::from_secs(10));
        let result = probe(lookup)
            .resolve("example.com", &DnsOptions::default(), Duration::from_millis(500))
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("解析超时"));
        assert!(result.resolution_time_ms >= 500.0);
    }

    #[tokio::test]
    async fn test_ip_literal_skips_resolution() {
        let result = probe(StaticLookup::new())
            .resolve("10.0.0.1", &DnsOptions::default(), Duration::from_secs(5))
            .await;
        assert!(result.success);
        assert_eq!(result.ipv4, vec!["10.0.0.1"]);
        assert_eq!(result.resolution_time_ms, 0.0);
    }

    #[test]
    fn test_query_plan_dedups() {
        let plan = query_plan(&[DnsRecordType::Aaaa, DnsRecordType::Ns, DnsRecordType::Ns]);
        assert_eq!(plan, vec![DnsRecordType::A, DnsRecordType::Aaaa, DnsRecordType::Ns]);
    }

    #[test]
    fn test_trim_fqdn() {
        assert_eq!(trim_fqdn("mail.example.com.".to_string()), "mail.example.com");
    }
}
