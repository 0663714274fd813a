// ABOUTME: fhir-connector CLI - drive SMART login and patient record fetches from a terminal
// ABOUTME: Configuration comes from FHIR_* environment variables, logging from RUST_LOG/LOG_FORMAT
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
//!
//! Usage:
//! ```bash
//! # Print an authorization URL (keep the verifier for the exchange)
//! fhir-connector-cli authorize-url --redirect-uri http://localhost:8080/callback
//!
//! # Exchange the code returned to the redirect URI
//! fhir-connector-cli exchange --code abc --redirect-uri http://localhost:8080/callback --verifier <v>
//!
//! # Fetch and print a patient's assembled record
//! fhir-connector-cli fetch erXuFYUfucBZaryVksYEcMg3
//!
//! # Print the server's SMART configuration
//! fhir-connector-cli discover
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use fhir_connector::config::ConnectorConfig;
use fhir_connector::logging::{self, LoggingConfig};
use tracing::info;

#[derive(Parser)]
#[command(
    name = "fhir-connector-cli",
    about = "SMART-on-FHIR connector CLI",
    long_about = "Authorize against a FHIR server, exchange codes for tokens and fetch normalized patient records."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[non_exhaustive]
#[derive(Subcommand)]
enum Command {
    /// Build a PKCE authorization URL
    AuthorizeUrl {
        /// Redirect URI registered for the client
        #[arg(long)]
        redirect_uri: String,

        /// EHR launch token
        #[arg(long)]
        launch: Option<String>,
    },

    /// Exchange an authorization code for tokens
    Exchange {
        /// Code received on the redirect URI
        #[arg(long)]
        code: String,

        /// Redirect URI used when authorizing
        #[arg(long)]
        redirect_uri: String,

        /// PKCE verifier printed by `authorize-url`
        #[arg(long)]
        verifier: String,
    },

    /// Fetch a patient's normalized record
    Fetch {
        /// Patient logical id
        patient_id: String,

        /// Access token to use instead of refresh or client credentials
        #[arg(long)]
        access_token: Option<String>,
    },

    /// Print the resolved SMART configuration
    Discover,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_config = LoggingConfig::from_env();
    if cli.verbose {
        log_config.level = "debug".to_owned();
    }
    logging::init_logging(&log_config)?;

    let config = ConnectorConfig::from_env()?;
    info!(base_url = %config.base_url, vendor = %config.vendor, "fhir-connector CLI");

    match cli.command {
        Command::AuthorizeUrl {
            redirect_uri,
            launch,
        } => commands::authorize_url(config, redirect_uri, launch).await,
        Command::Exchange {
            code,
            redirect_uri,
            verifier,
        } => commands::exchange(config, &code, &redirect_uri, &verifier).await,
        Command::Fetch {
            patient_id,
            access_token,
        } => commands::fetch(config, &patient_id, access_token).await,
        Command::Discover => commands::discover(config).await,
    }
}
