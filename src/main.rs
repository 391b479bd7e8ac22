//! Binary entry point for paperless-checksum.
//!
//! Runs the webhook server, or fingerprints a local file the same way the
//! server fingerprints uploads.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, Subcommand};
use paperless_checksum::config::LoggingSettings;
use paperless_checksum::{
    ChecksumConfig, ChecksumService, Fingerprint, PaperlessClient, Result, observability, server,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// Paperless Checksum - stamps Paperless-ngx documents with the SHA-256 of their upload.
#[derive(Parser)]
#[command(name = "paperless-checksum")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Start the webhook server.
    Serve {
        /// Listen address, overriding `BIND_ADDR`.
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },

    /// Print the SHA-256 and MD5 of a local file.
    Fingerprint {
        /// File to fingerprint.
        path: PathBuf,
    },
}

/// Main entry point.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve { bind } => cmd_serve(bind, cli.verbose).await,
        Commands::Fingerprint { path } => cmd_fingerprint(&path, cli.verbose),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Starts the webhook server.
async fn cmd_serve(bind: Option<SocketAddr>, verbose: bool) -> Result<()> {
    let mut config = ChecksumConfig::from_env()?;
    if let Some(addr) = bind {
        config = config.with_bind_addr(addr);
    }

    observability::init(&config.logging, verbose)?;

    let client = PaperlessClient::new(&config.paperless)?;
    let service = Arc::new(ChecksumService::new(client, &config)?);

    server::serve(service, &config).await
}

/// Prints `<sha256>  <md5>  <path>`.
fn cmd_fingerprint(path: &std::path::Path, verbose: bool) -> Result<()> {
    observability::init(&LoggingSettings::default(), verbose)?;

    let mut file = std::fs::File::open(path)
        .map_err(|e| paperless_checksum::Error::io("open_file", format!("{}: {e}", path.display())))?;
    let fingerprint = Fingerprint::from_reader(&mut file)?;

    println!("{}  {}  {}", fingerprint.sha256, fingerprint.md5, path.display());
    Ok(())
}
