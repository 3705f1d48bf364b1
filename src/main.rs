//! BaaS gateway
//!
//! Fronts a Backend-as-a-Service framework and its administrative dashboard
//! with two HTTP applications.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────┐
//!                     │                     BAAS GATEWAY                      │
//!                     │                                                       │
//!   API clients       │  ┌──────────┐   ┌──────────────┐   ┌──────────────┐  │
//!   ──────────────────┼─▶│ api app  │──▶│ stages       │──▶│ upstream     │──┼──▶ BaaS framework
//!   (:1337)           │  │ + live   │   │ (middleware) │   │ hooks, /     │  │
//!                     │  │   query  │   └──────────────┘   └──────────────┘  │
//!                     │  └──────────┘                                         │
//!   Operators         │  ┌──────────┐   ┌──────────────┐   ┌──────────────┐  │
//!   ──────────────────┼─▶│ dashboard│──▶│ stages       │──▶│ gate, config │  │
//!   (:4040)           │  │ app      │   │              │   │ UI bundle    │  │
//!                     │  └──────────┘   └──────────────┘   └──────────────┘  │
//!                     │                                                       │
//!                     │   config · mail · observability · lifecycle          │
//!                     └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use baas_gateway::config::{load_env_file, GatewayConfig, Profile};
use baas_gateway::lifecycle::{install_panic_hook, process_exit, startup};
use baas_gateway::observability::logging;

#[derive(Parser)]
#[command(name = "baas-gateway", version, about = "BaaS and dashboard gateway")]
struct Cli {
    /// Env file to load instead of the profile's default.
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve both applications (default).
    Serve,
    /// Print the BaaS framework options as JSON.
    PrintConfig,
    /// Print the dashboard framework configuration as JSON.
    PrintDashboardConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let profile = Profile::from_env();
    let env_file = cli.env_file.unwrap_or_else(|| profile.env_file());
    let env_file = load_env_file(&env_file);

    if let Err(e) = logging::init(profile) {
        eprintln!("failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }
    install_panic_hook();
    env_file.report();

    tracing::info!(
        profile = %profile,
        env_file = ?env_file.path(),
        "baas-gateway v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let config = match GatewayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Configuration error");
            return ExitCode::FAILURE;
        }
    };

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => match startup::run(config, process_exit()).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!(error = %e, "Startup failed");
                ExitCode::FAILURE
            }
        },
        Command::PrintConfig => print_json(&config.server),
        Command::PrintDashboardConfig => print_json(&serde_json::json!({
            "config": config.dashboard,
            "options": config.dashboard.options,
        })),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Could not serialize configuration");
            ExitCode::FAILURE
        }
    }
}
