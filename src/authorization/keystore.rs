//! Key Store Reader
//!
//! Scans OpenSSH `authorized_keys` files for an entry matching a candidate
//! key. Blank lines and `#` comments are skipped; every other line must parse
//! as an authorized-key entry or the whole source is rejected.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::str::FromStr;

use ssh_key::authorized_keys::Entry;
use ssh_key::public::KeyData;
use ssh_key::PublicKey;
use tracing::debug;

use crate::error::KeySourceError;

/// Longest line accepted in a key source, newline excluded.
pub const MAX_LINE_LEN: usize = 16 * 1024;

/// A key presented by a connecting party.
///
/// Implementors decide what "the same key" means against a parsed
/// `authorized_keys` entry. The provided impls compare raw key material, so
/// comments and options on the entry never affect the result.
pub trait CandidateKey {
    fn matches(&self, entry: &PublicKey) -> bool;
}

impl CandidateKey for PublicKey {
    fn matches(&self, entry: &PublicKey) -> bool {
        self.key_data() == entry.key_data()
    }
}

impl CandidateKey for KeyData {
    fn matches(&self, entry: &PublicKey) -> bool {
        self == entry.key_data()
    }
}

/// Result of consulting a single key source.
#[derive(Debug)]
pub enum SourceOutcome {
    Matched,
    NotMatched,
    Failed(KeySourceError),
}

impl SourceOutcome {
    pub fn is_match(&self) -> bool {
        matches!(self, SourceOutcome::Matched)
    }
}

/// Check whether the file at `path` contains `candidate`.
///
/// With `first_line_only` set, reading stops after the first substantive line
/// whether or not it matched. The file handle is dropped before returning.
pub fn read_keys<K>(path: &Path, first_line_only: bool, candidate: &K) -> SourceOutcome
where
    K: CandidateKey + ?Sized,
{
    let file = match open_source(path) {
        Ok(file) => file,
        Err(err) => return SourceOutcome::Failed(err),
    };

    scan_entries(BufReader::new(file), path, first_line_only, candidate)
}

fn open_source(path: &Path) -> Result<File, KeySourceError> {
    // Stat before opening: opening a FIFO for reading blocks until a writer
    // shows up.
    let metadata = std::fs::metadata(path).map_err(|source| KeySourceError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    if !metadata.is_file() {
        return Err(KeySourceError::NotAFile {
            path: path.to_path_buf(),
        });
    }

    let file = File::open(path).map_err(|source| KeySourceError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;

    let metadata = file.metadata().map_err(|source| KeySourceError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;

    if !metadata.is_file() {
        return Err(KeySourceError::NotAFile {
            path: path.to_path_buf(),
        });
    }

    Ok(file)
}

pub(crate) fn scan_entries<R, K>(
    mut reader: R,
    path: &Path,
    first_line_only: bool,
    candidate: &K,
) -> SourceOutcome
where
    R: BufRead,
    K: CandidateKey + ?Sized,
{
    let mut raw = Vec::new();
    let mut index = 0;
    loop {
        raw.clear();
        let limit = (MAX_LINE_LEN + 1) as u64;
        // A read error ends the source the same way EOF does.
        match reader.by_ref().take(limit).read_until(b'\n', &mut raw) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        index += 1;

        if raw.len() > MAX_LINE_LEN && raw.last() != Some(&b'\n') {
            return SourceOutcome::Failed(KeySourceError::Malformed {
                path: path.to_path_buf(),
                line: index,
                reason: format!("line longer than {} bytes", MAX_LINE_LEN),
            });
        }

        let decoded = String::from_utf8_lossy(&raw);
        let text = decoded.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }

        let entry = match Entry::from_str(text) {
            Ok(entry) => entry,
            Err(err) => {
                return SourceOutcome::Failed(KeySourceError::Malformed {
                    path: path.to_path_buf(),
                    line: index,
                    reason: err.to_string(),
                })
            }
        };

        if candidate.matches(entry.public_key()) {
            debug!(path = %path.display(), line = index, "candidate key matched");
            return SourceOutcome::Matched;
        }

        if first_line_only {
            break;
        }
    }

    SourceOutcome::NotMatched
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;
    use ssh_key::{Algorithm, PrivateKey};
    use std::io::Cursor;

    fn generate_key(comment: &str) -> PublicKey {
        let private = PrivateKey::random(&mut OsRng, Algorithm::Ed25519).unwrap();
        let mut public = private.public_key().clone();
        public.set_comment(comment);
        public
    }

    fn scan(contents: &str, first_line_only: bool, candidate: &PublicKey) -> SourceOutcome {
        scan_entries(
            Cursor::new(contents.as_bytes().to_vec()),
            Path::new("fixture"),
            first_line_only,
            candidate,
        )
    }

    #[test]
    fn test_matches_any_line_when_reading_all() {
        let alice = generate_key("alice");
        let bob = generate_key("bob");
        let contents = format!(
            "{}\n{}\n",
            alice.to_openssh().unwrap(),
            bob.to_openssh().unwrap()
        );

        assert!(scan(&contents, false, &bob).is_match());
        assert!(scan(&contents, false, &alice).is_match());
    }

    #[test]
    fn test_first_line_only_ignores_later_entries() {
        let alice = generate_key("alice");
        let bob = generate_key("bob");
        let contents = format!(
            "{}\n{}\n",
            alice.to_openssh().unwrap(),
            bob.to_openssh().unwrap()
        );

        assert!(scan(&contents, true, &alice).is_match());
        assert!(matches!(scan(&contents, true, &bob), SourceOutcome::NotMatched));
    }

    #[test]
    fn test_blank_and_comment_lines_are_not_substantive() {
        let alice = generate_key("alice");
        let contents = format!(
            "\n   \n# operator keys\n   # indented comment\n{}\n",
            alice.to_openssh().unwrap()
        );

        assert!(scan(&contents, true, &alice).is_match());
    }

    #[test]
    fn test_comment_does_not_affect_match() {
        let alice = generate_key("alice");
        let mut renamed = alice.clone();
        renamed.set_comment("someone-else@laptop");

        let contents = format!("{}\n", renamed.to_openssh().unwrap());
        assert!(scan(&contents, false, &alice).is_match());
    }

    #[test]
    fn test_malformed_line_fails_the_whole_source() {
        let alice = generate_key("alice");
        let contents = format!("not-a-valid-key-line\n{}\n", alice.to_openssh().unwrap());

        match scan(&contents, false, &alice) {
            SourceOutcome::Failed(KeySourceError::Malformed { line, .. }) => assert_eq!(line, 1),
            other => panic!("expected malformed source, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_line_after_match_is_not_reached() {
        let alice = generate_key("alice");
        let contents = format!("{}\ngarbage here\n", alice.to_openssh().unwrap());

        assert!(scan(&contents, false, &alice).is_match());
    }

    #[test]
    fn test_empty_source_is_not_matched() {
        let alice = generate_key("alice");
        assert!(matches!(scan("", false, &alice), SourceOutcome::NotMatched));
        assert!(matches!(
            scan("# only comments\n\n", true, &alice),
            SourceOutcome::NotMatched
        ));
    }

    #[test]
    fn test_crlf_line_endings() {
        let alice = generate_key("alice");
        let contents = format!("# keys\r\n{}\r\n", alice.to_openssh().unwrap());

        assert!(scan(&contents, true, &alice).is_match());
    }

    #[test]
    fn test_key_data_candidate() {
        let alice = generate_key("alice");
        let contents = format!("{}\n", alice.to_openssh().unwrap());

        let candidate = alice.key_data().clone();
        let outcome = scan_entries(
            Cursor::new(contents.into_bytes()),
            Path::new("fixture"),
            false,
            &candidate,
        );
        assert!(outcome.is_match());
    }

    #[test]
    fn test_oversized_line_fails_the_source() {
        let alice = generate_key("alice");
        let contents = format!(
            "{}\n{}\n",
            "A".repeat(MAX_LINE_LEN + 100),
            alice.to_openssh().unwrap()
        );

        match scan(&contents, false, &alice) {
            SourceOutcome::Failed(KeySourceError::Malformed { line, .. }) => assert_eq!(line, 1),
            other => panic!("expected malformed source, got {:?}", other),
        }
    }

    #[test]
    fn test_line_at_length_limit_is_parsed() {
        let alice = generate_key("alice");
        let line = alice.to_openssh().unwrap();
        let padded = format!("{}{}", line, " ".repeat(MAX_LINE_LEN - line.len()));
        let contents = format!("{}\n", padded);

        assert!(scan(&contents, false, &alice).is_match());
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let alice = generate_key("alice");
        let outcome = read_keys(Path::new("/nonexistent/authorized_keys"), false, &alice);

        assert!(matches!(
            outcome,
            SourceOutcome::Failed(KeySourceError::Unreadable { .. })
        ));
    }

    #[test]
    fn test_directory_is_not_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let alice = generate_key("alice");

        let outcome = read_keys(dir.path(), false, &alice);
        assert!(matches!(
            outcome,
            SourceOutcome::Failed(KeySourceError::NotAFile { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_fifo_is_rejected_without_blocking() {
        let dir = tempfile::tempdir().unwrap();
        let fifo = dir.path().join("trusted.fifo");
        let status = std::process::Command::new("mkfifo").arg(&fifo).status().unwrap();
        assert!(status.success());

        let (tx, rx) = std::sync::mpsc::channel();
        let path = fifo.clone();
        std::thread::spawn(move || {
            let alice = generate_key("alice");
            let outcome = read_keys(&path, false, &alice);
            let _ = tx.send(matches!(
                outcome,
                SourceOutcome::Failed(KeySourceError::NotAFile { .. })
            ));
        });

        let rejected = rx
            .recv_timeout(std::time::Duration::from_secs(3))
            .expect("reading a FIFO key source blocked");
        assert!(rejected);
    }
}
