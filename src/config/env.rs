//! Environment variable handling and .env file management

use crate::error::{AppError, Result};
use std::path::Path;

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Load `.env` from the current directory if it exists
    pub fn load_env_file(debug: bool) -> Result<()> {
        Self::load_env_file_from(Path::new(".env"), debug).map(|_| ())
    }

    /// Load a specific env file; returns whether it existed.
    /// Variables already set in the process environment win.
    pub fn load_env_file_from(path: &Path, debug: bool) -> Result<bool> {
        if !path.exists() {
            if debug {
                eprintln!("No {} file found, using defaults and CLI arguments", path.display());
            }
            return Ok(false);
        }

        dotenv::from_path(path)
            .map_err(|e| AppError::config(format!("Failed to load {}: {}", path.display(), e)))?;

        if debug {
            eprintln!("Loaded configuration from {}", path.display());
        }
        Ok(true)
    }

    /// Create example .env file content
    pub fn create_example_env_content() -> String {
        r#"# Network Diagnostics Configuration
#
# Values here are defaults; environment variables and command-line
# arguments take precedence.

# Engine-wide timeout in milliseconds, caps every probe (1-300000)
# NETDIAG_TIMEOUT_MS=30000

# Retries for port connects that time out (0-10)
# NETDIAG_RETRIES=3

# Maximum simultaneous connections during a port scan (1-1000)
# NETDIAG_MAX_CONCURRENCY=20

# Average ping latency above which a warning is raised
# NETDIAG_HIGH_LATENCY_MS=400

# DNS resolution time above which a warning is raised
# NETDIAG_SLOW_DNS_MS=1000

# Enable colored output (true/false)
# NETDIAG_ENABLE_COLOR=true
"#
        .to_string()
    }

    /// Save example .env file to disk
    pub fn save_example_env_file(path: &Path) -> Result<()> {
        std::fs::write(path, Self::create_example_env_content())
            .map_err(|e| AppError::config(format!("Failed to write example .env file: {}", e)))
    }

    /// Validate environment variable format before parsing
    pub fn validate_env_var(key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "NETDIAG_TIMEOUT_MS" => {
                let timeout: u64 = value
                    .parse()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
                if timeout == 0 || timeout > 300_000 {
                    return Err(AppError::config(format!(
                        "{} must be between 1 and 300000, got: {}",
                        key, timeout
                    )));
                }
            }
            "NETDIAG_RETRIES" => {
                let retries: u32 = value
                    .parse()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
                if retries > 10 {
                    return Err(AppError::config(format!("{} must be at most 10, got: {}", key, retries)));
                }
            }
            "NETDIAG_MAX_CONCURRENCY" => {
                let concurrency: usize = value
                    .parse()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
                if concurrency == 0 || concurrency > 1000 {
                    return Err(AppError::config(format!(
                        "{} must be between 1 and 1000, got: {}",
                        key, concurrency
                    )));
                }
            }
            "NETDIAG_HIGH_LATENCY_MS" | "NETDIAG_SLOW_DNS_MS" => {
                let ms: f64 = value
                    .parse()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
                if !ms.is_finite() || ms < 0.0 {
                    return Err(AppError::config(format!("{} must be a non-negative number", key)));
                }
            }
            "NETDIAG_ENABLE_COLOR" => {
                value
                    .parse::<bool>()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
            }
            _ => {}
        }

        Ok(())
    }

    /// Supported variables as (name, description, example)
    pub fn get_supported_env_vars() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("NETDIAG_TIMEOUT_MS", "Engine-wide timeout in milliseconds (1-300000)", "30000"),
            ("NETDIAG_RETRIES", "Retries for timed-out port connects (0-10)", "3"),
            ("NETDIAG_MAX_CONCURRENCY", "Maximum simultaneous port connects (1-1000)", "20"),
            ("NETDIAG_HIGH_LATENCY_MS", "High latency warning threshold", "400"),
            ("NETDIAG_SLOW_DNS_MS", "Slow DNS warning threshold", "1000"),
            ("NETDIAG_ENABLE_COLOR", "Enable colored output", "true"),
        ]
    }

    pub fn display_env_help() -> String {
        let mut help = String::new();
        help.push_str("Supported Environment Variables:\n\n");

        for (var, description, example) in Self::get_supported_env_vars() {
            help.push_str(&format!("  {:<24} {}\n", var, description));
            help.push_str(&format!("  {:<24} Example: {}\n\n", "", example));
        }

        help.push_str("Configuration Priority (highest to lowest):\n");
        help.push_str("  1. Command-line arguments\n");
        help.push_str("  2. Environment variables\n");
        help.push_str("  3. .env file values\n");
        help.push_str("  4. Default values\n");

        help
    }

    /// Validate all currently set environment variables
    pub fn validate_current_env() -> Vec<String> {
        Self::get_supported_env_vars()
            .into_iter()
            .filter_map(|(name, _, _)| {
                let value = std::env::var(name).ok()?;
                Self::validate_env_var(name, &value)
                    .err()
                    .map(|e| format!("Warning: {}", e))
            })
            .collect()
    }

    /// Validate the lines of an env file without loading it
    pub fn check_env_file(path: &Path) -> Result<Option<Vec<String>>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::config(format!("Failed to read {}: {}", path.display(), e)))?;

        let warnings = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| {
                let (key, value) = line.split_once('=')?;
                Self::validate_env_var(key.trim(), value)
                    .err()
                    .map(|e| format!("Line '{}': {}", line, e))
            })
            .collect();

        Ok(Some(warnings))
    }
}
