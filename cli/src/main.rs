/*
 * main.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Scadenziario, a mailbox date-extraction exporter.
 *
 * Scadenziario is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Scadenziario is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Scadenziario.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Command-line shell: argument parsing, interactive device-code login, and
//! the run summary. The core pipeline never talks to the terminal.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use scadenziario_core::config::{default_config_dir, load_defaults, Overrides, RunConfig};
use scadenziario_core::error::Error;
use scadenziario_core::graph::{GraphClient, GRAPH_HOST};
use scadenziario_core::http::HttpsTransport;
use scadenziario_core::oauth::token_store::clear_cache;
use scadenziario_core::oauth::{flow, CachedTokenProvider, MicrosoftProvider, TokenProvider};
use scadenziario_core::run::run_export;
use scadenziario_core::sink::CsvFileSink;

/// Export Outlook mail from the last N days, with dates found in each
/// message body, to a CSV file.
#[derive(Debug, Parser)]
#[command(name = "scadenziario", version, about)]
struct Cli {
    /// Registered application (client) id.
    #[arg(long, value_name = "ID")]
    client_id: Option<String>,

    /// Directory tenant id, or "common".
    #[arg(long, value_name = "TENANT")]
    tenant: Option<String>,

    /// Folder path, e.g. Inbox/Invoices.
    #[arg(long, value_name = "PATH")]
    folder: Option<String>,

    /// Comma-separated search keywords.
    #[arg(long, value_name = "WORDS")]
    keywords: Option<String>,

    /// Lookback window in days.
    #[arg(long, value_name = "N")]
    days: Option<u32>,

    /// Output CSV file.
    #[arg(long, value_name = "FILE")]
    out: Option<PathBuf>,

    /// Defaults file (key=value), read before arguments.
    #[arg(long, value_name = "FILE", default_value = ".env")]
    config: PathBuf,

    /// Discard cached tokens and sign in again.
    #[arg(long)]
    login: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            if matches!(e, Error::Auth(_)) {
                eprintln!("Run again with --login to redo the interactive sign-in.");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Error> {
    let defaults = load_defaults(&cli.config)?;
    let overrides = Overrides {
        folder_path: cli.folder,
        keywords: cli.keywords,
        window_days: cli.days,
        tenant: cli.tenant,
        client_id: cli.client_id,
        output_target: cli.out,
    };
    let config = RunConfig::from_sources(&defaults, &overrides)?;

    let cache_path = default_config_dir()
        .ok_or_else(|| {
            scadenziario_core::error::ConfigError::new("HOME not set; cannot locate token cache")
        })?
        .join("tokens");
    if cli.login {
        clear_cache(&cache_path);
    }

    let tokens = CachedTokenProvider::new(
        MicrosoftProvider::new(&config.client_id, &config.tenant),
        cache_path,
    );
    if !tokens.has_cached_login() {
        sign_in(&config, &tokens).await?;
    }

    let client = GraphClient::new(
        HttpsTransport::new(GRAPH_HOST, 443),
        Arc::new(tokens) as Arc<dyn TokenProvider>,
    );
    let mut sink = CsvFileSink::new(&config.output_target);
    let summary = run_export(&config, &client, &mut sink).await?;

    println!(
        "Fetched {} messages (last {} days), {} dates extracted.",
        summary.messages, config.window_days, summary.dates_found
    );
    println!(
        "Wrote {} rows to {}",
        summary.rows_written,
        config.output_target.display()
    );
    Ok(())
}

/// Interactive device-code sign-in. Only the shell drives this; the core
/// pipeline consumes tokens from the cache afterwards.
async fn sign_in(
    config: &RunConfig,
    tokens: &CachedTokenProvider<MicrosoftProvider>,
) -> Result<(), Error> {
    let provider = MicrosoftProvider::new(&config.client_id, &config.tenant);
    let grant = flow::request_device_code(&provider).await?;
    match &grant.message {
        Some(message) => println!("\n>>> {}", message),
        None => println!(
            "\n>>> Open {} and enter code: {}",
            grant.verification_uri, grant.user_code
        ),
    }
    println!(">>> Waiting for sign-in...");
    let result = flow::poll_for_tokens(&provider, &grant).await?;
    tokens.store_tokens(&result).await?;
    println!(">>> Signed in.");
    Ok(())
}
