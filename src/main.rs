//! Network Diagnostics - Main CLI Application
//!
//! Runs the requested probes against one target and prints the result
//! envelope as text or JSON.

use clap::Parser;
use network_diagnostics::{
    cli::Cli,
    config::{load_config, unknown_tests, EnvManager},
    error::{AppError, ErrorContext, ErrorReporter, Result},
    logging::LoggerFactory,
    output::{OutputCoordinator, OutputFormatterFactory},
    NetworkDiagnosticsEngine, PKG_NAME, VERSION,
};
use std::process;

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
        process::exit(99);
    }));

    let cli = Cli::parse();

    if let Err(message) = cli.validate() {
        eprintln!("Error: {}", message);
        process::exit(1);
    }

    if cli.env_help {
        println!("{}", EnvManager::display_env_help());
        return;
    }

    let reporter = ErrorReporter::new(cli.use_colors(), cli.verbose);

    match run_application(cli).await {
        Ok(code) => process::exit(code),
        Err(e) => {
            reporter.report_error(&e);
            print_error_suggestions(&e);
            process::exit(e.exit_code());
        }
    }
}

/// Main application logic; returns the process exit code
async fn run_application(cli: Cli) -> Result<i32> {
    if cli.debug {
        eprintln!("{} v{}", PKG_NAME, VERSION);
        eprintln!("{}", cli.get_config_summary());
    }

    let use_colors = cli.use_colors();
    let (mut config, request) = load_config(cli)?;
    if !use_colors {
        config.enable_color = false;
    }

    let ignored = unknown_tests(&request);
    if !ignored.is_empty() && config.verbose {
        eprintln!("Unsupported tests will be reported as failures: {}", ignored.join(", "));
    }

    let factory = LoggerFactory::new(config.clone());
    let probe_logger = factory.create_probe_logger().await;
    let engine = NetworkDiagnosticsEngine::with_logger(config.engine.clone(), probe_logger)?;

    let result = engine.execute_test(&request).await;

    let coordinator = OutputCoordinator::new(OutputFormatterFactory::create_formatter(
        config.json,
        config.enable_color,
        config.verbose,
    ));

    let rendered = coordinator
        .display_results(&result)
        .context("Failed to render results")?;
    println!("{}", rendered);
    if !config.json && result.success && config.verbose {
        println!();
        println!("{}", coordinator.display_summary(&result)?);
    }

    if result.success {
        Ok(0)
    } else {
        let error = AppError::invalid_target(result.error.clone().unwrap_or_default());
        factory
            .create_error_logger()
            .log_error(&error, Some("diagnostic run rejected"), Some(factory.session_id()))
            .await;
        Ok(error.exit_code())
    }
}

/// Print helpful suggestions for common errors
fn print_error_suggestions(error: &AppError) {
    match error {
        AppError::Config(_) => {
            eprintln!();
            eprintln!("Configuration help:");
            eprintln!("  - Check your .env file format");
            eprintln!("  - Run with --env-help to list supported variables");
            eprintln!("  - Verify the --request file is valid JSON");
        }
        AppError::Validation(_) => {
            eprintln!();
            eprintln!("Validation help:");
            eprintln!("  - Supported tests: ping, dns, port, bandwidth, traceroute");
            eprintln!("  - Supported DNS record types: A, AAAA, MX, TXT, NS, CNAME");
            eprintln!("  - Bandwidth direction must be download or upload");
        }
        AppError::ProbeExecution(_) | AppError::DnsResolution(_) => {
            eprintln!();
            eprintln!("Network troubleshooting:");
            eprintln!("  - Check your internet connection");
            eprintln!("  - Verify that ping and traceroute are installed");
        }
        _ => {}
    }
}
