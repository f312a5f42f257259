//! Storage for scored bulk files, addressed by a random result identifier

use crate::error::{LoanError, Result};
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Identifier of a stored result: 32 lowercase hex characters
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResultId(String);

impl ResultId {
    /// Fresh random identifier
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Accept only well-formed identifiers
    pub fn parse(s: &str) -> Option<Self> {
        let well_formed =
            s.len() == 32 && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        well_formed.then(|| Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the stored file for this identifier
    pub fn file_name(&self) -> String {
        format!("predictions_{}.csv", self.0)
    }
}

impl fmt::Display for ResultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Directory of `predictions_<id>.csv` files
#[derive(Debug, Clone)]
pub struct ResultStore {
    dir: PathBuf,
}

impl ResultStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist a scored file under a new identifier
    pub fn save(&self, contents: &[u8]) -> Result<ResultId> {
        std::fs::create_dir_all(&self.dir)?;

        let id = ResultId::generate();
        let path = self.path_for(&id);
        std::fs::write(&path, contents)?;

        info!(result_id = %id, path = %path.display(), bytes = contents.len(), "Stored bulk result");
        Ok(id)
    }

    pub fn path_for(&self, id: &ResultId) -> PathBuf {
        self.dir.join(id.file_name())
    }

    /// Read a stored result.
    ///
    /// Unknown, fabricated and malformed identifiers are all reported as not found.
    pub fn load(&self, id: &str) -> Result<Vec<u8>> {
        let Some(result_id) = ResultId::parse(id) else {
            debug!(result_id = %id, "Rejected malformed result identifier");
            return Err(LoanError::NotFound { id: id.to_string() });
        };

        match std::fs::read(self.path_for(&result_id)) {
            Ok(contents) => Ok(contents),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(LoanError::NotFound { id: id.to_string() })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve a download file name to a path inside the store
    pub fn resolve_download(&self, file_name: &str) -> Result<PathBuf> {
        if file_name.is_empty()
            || file_name.contains("..")
            || file_name.starts_with('/')
            || file_name.contains('\\')
        {
            return Err(LoanError::InvalidFileName {
                name: file_name.to_string(),
            });
        }

        let path = self.dir.join(file_name);
        if path.is_file() {
            Ok(path)
        } else {
            Err(LoanError::NotFound {
                id: file_name.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_id_format() {
        let id = ResultId::generate();
        assert_eq!(id.as_str().len(), 32);
        assert_eq!(ResultId::parse(id.as_str()), Some(id.clone()));
        assert!(id.file_name().starts_with("predictions_"));
        assert!(id.file_name().ends_with(".csv"));
    }

    #[test]
    fn test_result_id_rejects_malformed() {
        assert!(ResultId::parse("deadbeef").is_none());
        assert!(ResultId::parse("../../../../etc/passwd").is_none());
        assert!(ResultId::parse("ABCDEF0123456789ABCDEF0123456789").is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path().join("static"));

        let id = store.save(b"Age,Prediction\n30,1\n").unwrap();
        assert_eq!(store.load(id.as_str()).unwrap(), b"Age,Prediction\n30,1\n");
    }

    #[test]
    fn test_unknown_id_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path());

        let fabricated = ResultId::generate();
        match store.load(fabricated.as_str()) {
            Err(LoanError::NotFound { id }) => assert_eq!(id, fabricated.as_str()),
            other => panic!("expected NotFound, got {:?}", other),
        }
        assert_eq!(store.load("not-an-id").unwrap_err().kind(), "not_found");
    }

    #[test]
    fn test_resolve_download() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path());
        let id = store.save(b"x\n").unwrap();

        assert_eq!(
            store.resolve_download(&id.file_name()).unwrap(),
            store.path_for(&id)
        );
        assert_eq!(
            store.resolve_download("../secrets.csv").unwrap_err().kind(),
            "invalid_file_name"
        );
        assert_eq!(
            store.resolve_download("/etc/passwd").unwrap_err().kind(),
            "invalid_file_name"
        );
        assert_eq!(
            store.resolve_download("predictions_missing.csv").unwrap_err().kind(),
            "not_found"
        );
    }
}
