//! Authorization Evaluator
//!
//! Decides whether a candidate key may open a session by consulting the
//! configured key sources in precedence order: the user source first (first
//! substantive line only), then each operator source in full. The first match
//! allows; anything else, including every kind of source error, denies.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use super::keystore::{read_keys, CandidateKey, SourceOutcome};

/// Immutable snapshot of the trusted key sources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationConfig {
    operator_sources: Vec<PathBuf>,
    user_source: Option<PathBuf>,
}

impl AuthorizationConfig {
    pub fn new(operator_sources: Vec<PathBuf>, user_source: Option<PathBuf>) -> Self {
        Self {
            operator_sources,
            user_source,
        }
    }

    pub fn operator_sources(&self) -> &[PathBuf] {
        &self.operator_sources
    }

    pub fn user_source(&self) -> Option<&Path> {
        self.user_source.as_deref()
    }

    /// True when no source is configured at all.
    pub fn is_empty(&self) -> bool {
        self.operator_sources.is_empty() && self.user_source.is_none()
    }

    /// Sources in the order they are consulted.
    pub fn sources(&self) -> impl Iterator<Item = (SourceKind, &Path)> {
        self.user_source
            .iter()
            .map(|path| (SourceKind::User, path.as_path()))
            .chain(
                self.operator_sources
                    .iter()
                    .map(|path| (SourceKind::Operator, path.as_path())),
            )
    }
}

/// Origin of a trusted key file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Per-principal file; only its first substantive line is trusted.
    User,
    /// Centrally configured file; every entry is trusted.
    Operator,
}

impl SourceKind {
    pub fn first_line_only(&self) -> bool {
        matches!(self, SourceKind::User)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::User => "user",
            SourceKind::Operator => "operator",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single authorization attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow { source: SourceKind, path: PathBuf },
    Deny,
}

impl Decision {
    pub fn is_allow(&self) -> bool {
        matches!(self, Decision::Allow { .. })
    }
}

/// Evaluates candidate keys against an [`AuthorizationConfig`].
///
/// Cheap to clone; every clone shares the same configuration. Decisions are
/// computed fresh on every call.
#[derive(Debug, Clone)]
pub struct Authorizer {
    config: Arc<AuthorizationConfig>,
}

impl Authorizer {
    pub fn new(config: AuthorizationConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &AuthorizationConfig {
        &self.config
    }

    /// Returns `true` only if some configured source contains `candidate`.
    pub fn authorize<K>(&self, candidate: &K) -> bool
    where
        K: CandidateKey + ?Sized,
    {
        self.evaluate(candidate).is_allow()
    }

    /// Like [`authorize`](Self::authorize), but reports which source allowed.
    pub fn evaluate<K>(&self, candidate: &K) -> Decision
    where
        K: CandidateKey + ?Sized,
    {
        for (kind, path) in self.config.sources() {
            match read_keys(path, kind.first_line_only(), candidate) {
                SourceOutcome::Matched => {
                    return Decision::Allow {
                        source: kind,
                        path: path.to_path_buf(),
                    };
                }
                SourceOutcome::NotMatched => {
                    debug!(source = %kind, path = %path.display(), "no matching key");
                }
                SourceOutcome::Failed(err) => {
                    warn!(
                        source = %kind,
                        path = %path.display(),
                        error = %err,
                        "skipping key source"
                    );
                }
            }
        }

        Decision::Deny
    }
}
