//! Configuration management module

pub mod env;
pub mod parser;

pub use env::EnvManager;
pub use parser::{display_config_summary, load_config, unknown_tests, ConfigParser};

pub use crate::models::{AppConfig, EngineOptions, TestConfig};
