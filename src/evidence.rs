//! Evidence construction for check details.
//!
//! Checks attach structured context (file path + hash, timestamps, network
//! data, process trees) through [`EvidenceBuilder`]. The builder yields
//! `None` when no context field was populated, so empty evidence never
//! reaches the report.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::report::{Evidence, RiskLevel};

/// Files larger than this are recorded without a hash.
const MAX_HASH_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Streaming SHA-256 of a file, as 64 lowercase hex chars.
///
/// Returns `None` on read errors or when the file exceeds the 50 MiB cap;
/// evidence is then emitted without `fileHash`.
pub fn hash_file(path: &Path) -> Option<String> {
    let metadata = std::fs::metadata(path).ok()?;
    if metadata.len() > MAX_HASH_FILE_SIZE {
        debug!(path = %path.display(), size = metadata.len(), "file exceeds hash cap");
        return None;
    }

    let mut file = File::open(path).ok()?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => hasher.update(&buf[..n]),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "hashing aborted");
                return None;
            }
        }
    }
    Some(format!("{:x}", hasher.finalize()))
}

/// Builder for [`Evidence`].
#[derive(Debug, Clone)]
pub struct EvidenceBuilder {
    evidence: Evidence,
    populated: bool,
}

impl EvidenceBuilder {
    pub fn new(risk_level: RiskLevel) -> Self {
        Self {
            evidence: Evidence {
                file_path: None,
                file_hash: None,
                timestamp: None,
                network_conn: None,
                process_tree: None,
                risk_level,
            },
            populated: false,
        }
    }

    /// Records the file path and attempts a streaming hash of it.
    pub fn file(mut self, path: &Path) -> Self {
        self.evidence.file_path = Some(path.display().to_string());
        self.evidence.file_hash = hash_file(path);
        self.populated = true;
        self
    }

    /// Records the file path without hashing.
    pub fn file_path_only(mut self, path: &Path) -> Self {
        self.evidence.file_path = Some(path.display().to_string());
        self.populated = true;
        self
    }

    pub fn timestamp(mut self, ms: i64) -> Self {
        self.evidence.timestamp = Some(ms);
        self.populated = true;
        self
    }

    pub fn timestamp_now(self) -> Self {
        let ms = Utc::now().timestamp_millis();
        self.timestamp(ms)
    }

    pub fn network_conn(mut self, conn: impl Into<String>) -> Self {
        self.evidence.network_conn = Some(conn.into());
        self.populated = true;
        self
    }

    pub fn process_tree(mut self, lines: Vec<String>) -> Self {
        self.evidence.process_tree = Some(lines);
        self.populated = true;
        self
    }

    /// Finishes the build; `None` when nothing beyond the risk level was
    /// set.
    pub fn build(self) -> Option<Evidence> {
        self.populated.then_some(self.evidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_builder_is_none() {
        assert!(EvidenceBuilder::new(RiskLevel::Low).build().is_none());
    }

    #[test]
    fn test_hash_known_content() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"hello world\n").unwrap();
        let hash = hash_file(tmp.path()).unwrap();
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        // sha256 of "hello world\n"
        assert_eq!(
            hash,
            "a948904f2f0f479b8f8197694b30184b0d2ed1c1cd2a1ec0fb85d299a192a447"
        );
    }

    #[test]
    fn test_hash_missing_file() {
        assert!(hash_file(Path::new("/nonexistent/hostaudit")).is_none());
    }

    #[test]
    fn test_file_evidence() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"payload").unwrap();
        let evidence = EvidenceBuilder::new(RiskLevel::High)
            .file(tmp.path())
            .build()
            .unwrap();
        assert_eq!(evidence.risk_level, RiskLevel::High);
        assert!(evidence.file_path.is_some());
        assert!(evidence.file_hash.is_some());
    }

    #[test]
    fn test_read_error_drops_hash_only() {
        let evidence = EvidenceBuilder::new(RiskLevel::Medium)
            .file(Path::new("/nonexistent/hostaudit"))
            .build()
            .unwrap();
        assert!(evidence.file_path.is_some());
        assert!(evidence.file_hash.is_none());
    }
}
