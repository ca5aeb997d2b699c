//! Build the application config and the test request from CLI arguments,
//! the environment and an optional request file

use crate::{
    cli::Cli,
    config::env::EnvManager,
    error::{AppError, Result},
    models::{AppConfig, TestConfig},
    types::{Direction, DnsRecordType, TestKind},
};
use std::fs;

/// Configuration parser that combines CLI arguments with environment variables
pub struct ConfigParser {
    cli: Cli,
}

impl ConfigParser {
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Defaults, then .env, then environment, then CLI flags
    pub fn parse(&self) -> Result<AppConfig> {
        let mut config = AppConfig::default();

        EnvManager::load_env_file(self.cli.debug)?;
        config.merge_from_env()?;
        self.apply_cli_overrides(&mut config);
        config.validate()?;

        Ok(config)
    }

    fn apply_cli_overrides(&self, config: &mut AppConfig) {
        if let Some(secs) = self.cli.timeout {
            config.engine.timeout_ms = secs.saturating_mul(1000);
        }
        if self.cli.no_color {
            config.enable_color = false;
        } else if self.cli.color {
            config.enable_color = true;
        }
        config.json = self.cli.json;
        config.verbose = self.cli.verbose;
        config.debug = self.cli.debug;

        if config.debug {
            eprintln!("{}", display_config_summary(config));
        }
    }

    /// The request to execute: the --request file if given, with CLI flags on top
    pub fn build_request(&self) -> Result<TestConfig> {
        let mut request = match &self.cli.request {
            Some(path) => {
                let json = fs::read_to_string(path).map_err(|e| {
                    AppError::config(format!("Failed to read request file {}: {}", path.display(), e))
                })?;
                TestConfig::from_json(&json)?
            }
            None => TestConfig::new(self.cli.target.clone().unwrap_or_default()),
        };

        if let Some(ref target) = self.cli.target {
            request.target = target.clone();
        }
        if !self.cli.tests.is_empty() {
            request.tests = self.cli.tests.iter().map(|t| t.trim().to_string()).collect();
        }

        if let Some(count) = self.cli.count {
            request.ping_options.get_or_insert_with(Default::default).count = count;
        }

        if !self.cli.dns_types.is_empty() {
            let types = self
                .cli
                .dns_types
                .iter()
                .map(|t| t.parse::<DnsRecordType>().map(|t| t.as_str().to_string()))
                .collect::<Result<Vec<_>>>()?;
            request.dns_options.get_or_insert_with(Default::default).types = types;
        }

        if !self.cli.ports.is_empty() {
            request.port_options.get_or_insert_with(Default::default).ports = self.cli.ports.clone();
        }

        let wants_bandwidth = self.cli.size.is_some()
            || self.cli.direction.is_some()
            || self.cli.min_speed.is_some()
            || self.cli.bandwidth_url.is_some();
        if wants_bandwidth {
            let bandwidth = request.bandwidth_options.get_or_insert_with(Default::default);
            if let Some(size) = self.cli.size {
                bandwidth.test_size = size;
            }
            if let Some(ref direction) = self.cli.direction {
                bandwidth.direction = direction.parse::<Direction>()?;
            }
            if self.cli.min_speed.is_some() {
                bandwidth.expected_min_speed = self.cli.min_speed;
            }
            if self.cli.bandwidth_url.is_some() {
                bandwidth.url = self.cli.bandwidth_url.clone();
            }
        }

        if let Some(hops) = self.cli.max_hops {
            request.traceroute_options.get_or_insert_with(Default::default).max_hops = hops;
        }

        Ok(request)
    }
}

/// Load both halves of the run configuration
pub fn load_config(cli: Cli) -> Result<(AppConfig, TestConfig)> {
    let parser = ConfigParser::new(cli);
    let config = parser.parse()?;
    let request = parser.build_request()?;
    Ok((config, request))
}

/// Names of tests that would be rejected as unsupported
pub fn unknown_tests(request: &TestConfig) -> Vec<&str> {
    request
        .tests
        .iter()
        .map(String::as_str)
        .filter(|name| name.parse::<TestKind>().is_err())
        .collect()
}

pub fn display_config_summary(config: &AppConfig) -> String {
    let engine = &config.engine;
    let mut summary = Vec::new();

    summary.push(format!("Timeout: {}ms", engine.timeout_ms));
    summary.push(format!("Retries: {}", engine.retries));
    summary.push(format!("Max Concurrency: {}", engine.max_concurrency));
    summary.push(format!("High Latency Threshold: {}ms", engine.thresholds.high_latency_ms));
    summary.push(format!("Slow DNS Threshold: {}ms", engine.thresholds.slow_dns_ms));
    summary.push(format!("Platform: {:?}", engine.platform));
    summary.push(format!("Color Output: {}", config.enable_color));
    summary.push(format!("JSON Output: {}", config.json));
    summary.push(format!("Verbose: {}", config.verbose));
    summary.push(format!("Debug: {}", config.debug));

    summary.join("\n")
}
