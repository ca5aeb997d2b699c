//! Command-line interface

use clap::Parser;
use std::path::PathBuf;

/// Network diagnostics: ping, DNS, TCP ports, bandwidth and traceroute
/// against a single target, with a composite quality rating
#[derive(Parser, Debug, Clone)]
#[command(name = "netdiag")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Host name, IP address or URL to diagnose
    #[arg(env = "NETDIAG_TARGET")]
    pub target: Option<String>,

    /// Tests to run (ping, dns, port, bandwidth, traceroute)
    #[arg(long, value_delimiter = ',')]
    pub tests: Vec<String>,

    /// Ports to scan for the port test
    #[arg(short, long, value_delimiter = ',')]
    pub ports: Vec<u16>,

    /// Extra DNS record types (MX, TXT, NS, CNAME)
    #[arg(long, value_delimiter = ',')]
    pub dns_types: Vec<String>,

    /// Echo requests sent by the ping test
    #[arg(short, long)]
    pub count: Option<u32>,

    /// Engine-wide timeout in seconds
    #[arg(short, long, value_parser = parse_duration)]
    pub timeout: Option<u64>,

    /// Bytes transferred by the bandwidth test
    #[arg(long)]
    pub size: Option<u64>,

    /// Bandwidth direction (download or upload)
    #[arg(long)]
    pub direction: Option<String>,

    /// Expected minimum bandwidth in Mbps
    #[arg(long, value_name = "MBPS")]
    pub min_speed: Option<f64>,

    /// HTTP endpoint used as the bandwidth payload source
    #[arg(long, value_name = "URL")]
    pub bandwidth_url: Option<String>,

    /// Maximum hops for the traceroute test
    #[arg(long)]
    pub max_hops: Option<u32>,

    /// Read the full test request from a JSON file
    #[arg(long, value_name = "FILE")]
    pub request: Option<PathBuf>,

    /// Print the result envelope as JSON
    #[arg(long)]
    pub json: bool,

    /// Force colored output
    #[arg(long)]
    pub color: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Enable verbose output
    #[arg(long)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,

    /// Show supported environment variables and exit
    #[arg(long)]
    pub env_help: bool,
}

impl Cli {
    /// Validate CLI arguments for conflicts and requirements
    pub fn validate(&self) -> Result<(), String> {
        if self.color && self.no_color {
            return Err("Cannot specify both --color and --no-color".to_string());
        }

        if self.env_help {
            return Ok(());
        }

        if self.target.is_none() && self.request.is_none() {
            return Err("Must specify a target or --request FILE".to_string());
        }

        if let Some(count) = self.count {
            if count == 0 || count > 100 {
                return Err(format!("--count must be between 1 and 100, got: {}", count));
            }
        }

        if let Some(hops) = self.max_hops {
            if hops == 0 || hops > 255 {
                return Err(format!("--max-hops must be between 1 and 255, got: {}", hops));
            }
        }

        if self.min_speed.is_some_and(|speed| !speed.is_finite() || speed < 0.0) {
            return Err("--min-speed must be a non-negative number".to_string());
        }

        Ok(())
    }

    /// Check if colors should be enabled
    pub fn use_colors(&self) -> bool {
        if self.color {
            true
        } else if self.no_color {
            false
        } else {
            supports_color()
        }
    }

    pub fn get_config_summary(&self) -> String {
        let mut summary = String::new();

        summary.push_str("Configuration Summary:\n");
        if let Some(ref target) = self.target {
            summary.push_str(&format!("  Target: {}\n", target));
        }
        if !self.tests.is_empty() {
            summary.push_str(&format!("  Tests: {}\n", self.tests.join(", ")));
        }
        if let Some(timeout) = self.timeout {
            summary.push_str(&format!("  Timeout: {}s\n", timeout));
        }
        summary.push_str(&format!("  JSON output: {}\n", self.json));
        summary.push_str(&format!("  Colored output: {}\n", self.use_colors()));
        summary.push_str(&format!("  Verbose mode: {}\n", self.verbose));
        summary.push_str(&format!("  Debug mode: {}\n", self.debug));

        if let Some(ref request) = self.request {
            summary.push_str(&format!("  Request file: {}\n", request.display()));
        }

        summary
    }
}

/// Parse duration from seconds string
fn parse_duration(s: &str) -> Result<u64, String> {
    if s.starts_with('+') || s.starts_with("0x") || s.starts_with("0X") {
        return Err(format!("Invalid duration: {}", s));
    }

    s.parse::<u64>()
        .map_err(|_| format!("Invalid duration: {}", s))
        .and_then(|secs| {
            if secs == 0 {
                Err("Duration must be greater than 0".to_string())
            } else if secs > 300 {
                Err("Duration cannot exceed 300 seconds".to_string())
            } else {
                Ok(secs)
            }
        })
}

/// Check if the terminal supports color output
fn supports_color() -> bool {
    if let Ok(term) = std::env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    #[cfg(target_os = "windows")]
    {
        if std::env::var("ANSICON").is_ok() || std::env::var("ConEmuANSI").is_ok() {
            return true;
        }
    }

    #[cfg(unix)]
    {
        true
    }
    #[cfg(not(unix))]
    {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing_basic() {
        let cli = Cli::parse_from(["netdiag", "example.com"]);
        assert_eq!(cli.target.as_deref(), Some("example.com"));
        assert!(cli.tests.is_empty());
        assert!(!cli.json);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_cli_parsing_all_options() {
        let cli = Cli::parse_from([
            "netdiag",
            "example.com",
            "--tests", "ping,dns,port",
            "--ports", "22,80,443",
            "--dns-types", "MX,TXT",
            "--count", "10",
            "--timeout", "20",
            "--size", "2048",
            "--direction", "upload",
            "--min-speed", "50",
            "--bandwidth-url", "http://127.0.0.1:9000/blob",
            "--max-hops", "16",
            "--json",
            "--no-color",
            "--verbose",
            "--debug",
        ]);

        assert_eq!(cli.tests, vec!["ping", "dns", "port"]);
        assert_eq!(cli.ports, vec![22, 80, 443]);
        assert_eq!(cli.dns_types, vec!["MX", "TXT"]);
        assert_eq!(cli.count, Some(10));
        assert_eq!(cli.timeout, Some(20));
        assert_eq!(cli.size, Some(2048));
        assert_eq!(cli.direction.as_deref(), Some("upload"));
        assert_eq!(cli.min_speed, Some(50.0));
        assert_eq!(cli.max_hops, Some(16));
        assert!(cli.json && cli.no_color && cli.verbose && cli.debug);
        assert!(!cli.use_colors());
    }

    #[test]
    fn test_duration_parsing() {
        assert_eq!(parse_duration("10"), Ok(10));
        assert_eq!(parse_duration("300"), Ok(300));
        assert!(parse_duration("0").is_err());
        assert!(parse_duration("301").is_err());
        assert!(parse_duration("+5").is_err());
        assert!(parse_duration("0x10").is_err());
        assert!(parse_duration("abc").is_err());
    }

    #[test]
    fn test_cli_validation() {
        let conflicting = Cli::parse_from(["netdiag", "example.com", "--color", "--no-color"]);
        assert!(conflicting.validate().is_err());

        let bad_count = Cli::parse_from(["netdiag", "example.com", "--count", "0"]);
        assert!(bad_count.validate().is_err());

        let bad_hops = Cli::parse_from(["netdiag", "example.com", "--max-hops", "300"]);
        assert!(bad_hops.validate().is_err());

        let env_help = Cli::parse_from(["netdiag", "--env-help"]);
        assert!(env_help.validate().is_ok());

        let request = Cli::parse_from(["netdiag", "--request", "req.json"]);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_config_summary() {
        let cli = Cli::parse_from(["netdiag", "example.com", "--tests", "dns", "--timeout", "5"]);
        let summary = cli.get_config_summary();
        assert!(summary.contains("Target: example.com"));
        assert!(summary.contains("Tests: dns"));
        assert!(summary.contains("Timeout: 5s"));
    }

    #[test]
    fn test_color_flags() {
        let forced = Cli::parse_from(["netdiag", "x", "--color"]);
        assert!(forced.use_colors());
        let disabled = Cli::parse_from(["netdiag", "x", "--no-color"]);
        assert!(!disabled.use_colors());
    }
}
