//! Connection Authorization Module
//!
//! Decides whether a public key presented during the SSH handshake is trusted,
//! based on OpenSSH `authorized_keys` files configured at startup.

pub mod keystore;
pub mod verification;

pub use keystore::{read_keys, CandidateKey, SourceOutcome};
pub use verification::{AuthorizationConfig, Authorizer, Decision, SourceKind};
