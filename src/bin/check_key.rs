//! Key Check CLI Tool
//!
//! Runs the connection authorization check offline against the configured
//! key sources, so operators can test trust files without opening a session.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use ssh_key::{HashAlg, PublicKey};
use tracing_subscriber::EnvFilter;

use term_info::authorization::{Authorizer, Decision};
use term_info::config::AppConfig;

#[derive(Parser)]
#[command(name = "check-key")]
#[command(about = "Check whether a public key would be allowed to connect")]
#[command(version)]
struct Cli {
    /// Path to the config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Public key file in OpenSSH format (e.g. id_ed25519.pub)
    public_key: PathBuf,
}

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;
    let candidate = PublicKey::read_openssh_file(&cli.public_key)
        .with_context(|| format!("failed to read public key {:?}", cli.public_key))?;

    println!("Key: {}", candidate.fingerprint(HashAlg::Sha256));

    let authorizer = Authorizer::new(config.authorization());
    if let Some(path) = authorizer.config().user_source() {
        println!("  user source:     {}", path.display());
    }
    for path in authorizer.config().operator_sources() {
        println!("  operator source: {}", path.display());
    }

    match authorizer.evaluate(&candidate) {
        Decision::Allow { source, path } => {
            println!("ALLOW ({} source {})", source, path.display());
            Ok(ExitCode::SUCCESS)
        }
        Decision::Deny => {
            println!("DENY");
            Ok(ExitCode::FAILURE)
        }
    }
}
