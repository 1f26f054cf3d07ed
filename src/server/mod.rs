//! SSH Server Module
//!
//! Wires the authorization evaluator into a `russh` server. Public-key auth is
//! the only method offered; each connection gets its own [`SessionHandler`].

pub mod session;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::OsRng;
use russh::server::{Config, Server};
use russh::MethodSet;
use russh_keys::key::KeyPair;
use ssh_key::{Algorithm, HashAlg, LineEnding, PrivateKey};
use tracing::{debug, info};

use crate::authorization::Authorizer;
use crate::config::AppConfig;
use crate::error::TermInfoError;

pub use session::SessionHandler;

#[derive(Debug, Clone)]
pub struct TermInfoServer {
    authorizer: Authorizer,
}

impl TermInfoServer {
    pub fn new(authorizer: Authorizer) -> Self {
        Self { authorizer }
    }
}

impl Server for TermInfoServer {
    type Handler = SessionHandler;

    fn new_client(&mut self, peer_addr: Option<SocketAddr>) -> SessionHandler {
        SessionHandler::new(self.authorizer.clone(), peer_addr)
    }
}

/// Run the SSH server until it fails or the process receives Ctrl+C.
pub async fn run(config: &AppConfig) -> Result<(), TermInfoError> {
    let host_key = load_or_generate_host_key(&config.host_key_path)?;

    let ssh_config = Config {
        methods: MethodSet::PUBLICKEY,
        auth_rejection_time: Duration::from_secs(1),
        inactivity_timeout: Some(Duration::from_secs(3600)),
        keys: vec![host_key],
        ..Default::default()
    };

    let authorizer = Authorizer::new(config.authorization());
    info!(
        "Authorization sources: {} operator, user source {}",
        authorizer.config().operator_sources().len(),
        if authorizer.config().user_source().is_some() { "present" } else { "absent" }
    );

    let mut server = TermInfoServer::new(authorizer);
    info!("Server listening on {}", config.addr);

    tokio::select! {
        result = server.run_on_address(Arc::new(ssh_config), config.addr.as_str()) => {
            result.map_err(|e| TermInfoError::ServerError(format!("{}: {}", config.addr, e)))
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            Ok(())
        }
    }
}

/// Load the server's host key, generating an Ed25519 key first if the file
/// does not exist yet.
pub fn load_or_generate_host_key(path: &Path) -> Result<KeyPair, TermInfoError> {
    if !path.exists() {
        generate_host_key(path)?;
    }

    debug!("Loading host key from {:?}", path);
    russh_keys::load_secret_key(path, None).map_err(|e| {
        TermInfoError::HostKeyError(format!("failed to load host key {:?}: {}", path, e))
    })
}

fn generate_host_key(path: &Path) -> Result<(), TermInfoError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let key = PrivateKey::random(&mut OsRng, Algorithm::Ed25519)?;
    key.write_openssh_file(path, LineEnding::LF)?;

    info!(
        "Generated new host key {:?} ({})",
        path,
        key.public_key().fingerprint(HashAlg::Sha256)
    );
    Ok(())
}
