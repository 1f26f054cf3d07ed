#![allow(dead_code)]

use rand::rngs::OsRng;
use ssh_key::{Algorithm, PrivateKey, PublicKey};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Generate a fresh Ed25519 public key with the given comment
pub fn generate_key(comment: &str) -> PublicKey {
    let private = PrivateKey::random(&mut OsRng, Algorithm::Ed25519)
        .expect("Failed to generate test key");
    let mut public = private.public_key().clone();
    public.set_comment(comment);
    public
}

/// Render a key as an `authorized_keys` line
pub fn authorized_line(key: &PublicKey) -> String {
    key.to_openssh().expect("Failed to encode test key")
}

/// Temporary directory holding fixture key files
pub struct KeyFixtures {
    dir: TempDir,
}

impl KeyFixtures {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("Failed to create temp dir"),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write a key file from individual lines
    pub fn write(&self, name: &str, lines: &[String]) -> PathBuf {
        let path = self.path(name);
        let mut contents = lines.join("\n");
        contents.push('\n');
        fs::write(&path, contents).expect("Failed to write fixture");
        path
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }
}
