use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{LedgerError, LedgerResult, LedgerStore, dedup_ids};

/// Ledger stored as a JSON array of ids in a single file.
///
/// Writes go to a sibling temporary file which is then renamed over the
/// ledger, so a crash never leaves a half-written file behind.
#[derive(Debug, Clone)]
pub struct FileLedger {
    path: PathBuf,
}

impl FileLedger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> LedgerError {
        LedgerError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl LedgerStore for FileLedger {
    async fn load(&self) -> LedgerResult<Vec<String>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(e)),
        };

        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> =
            serde_json::from_str(&contents).map_err(|source| LedgerError::Deserialization {
                path: self.path.clone(),
                source,
            })?;

        tracing::debug!(path = ?self.path, entries = ids.len(), "Loaded ledger");
        Ok(ids)
    }

    async fn save(&self, ids: &[String]) -> LedgerResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let json = serde_json::to_string_pretty(&dedup_ids(ids))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        tracing::debug!(path = ?self.path, entries = ids.len(), "Saved ledger");
        Ok(())
    }

    async fn clear(&self) -> LedgerResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = FileLedger::new(dir.path().join("failed.json"));
        assert!(ledger.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_round_trip_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state").join("failed.json");
        let ledger = FileLedger::new(&path);

        ledger.save(&ids(&["10", "20", "10"])).await.unwrap();
        assert!(path.exists());
        assert_eq!(ledger.load().await.unwrap(), ids(&["10", "20"]));

        // The on-disk form is a plain JSON array.
        let raw: Vec<String> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw, ids(&["10", "20"]));
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = FileLedger::new(dir.path().join("failed.json"));
        ledger.save(&ids(&["1", "2"])).await.unwrap();
        ledger.save(&ids(&["3"])).await.unwrap();
        assert_eq!(ledger.load().await.unwrap(), ids(&["3"]));
    }

    #[tokio::test]
    async fn test_clear_removes_file_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("failed.json");
        let ledger = FileLedger::new(&path);
        ledger.save(&ids(&["1"])).await.unwrap();

        ledger.clear().await.unwrap();
        assert!(!path.exists());
        ledger.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("failed.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = FileLedger::new(&path).load().await.unwrap_err();
        assert!(matches!(err, LedgerError::Deserialization { .. }));
    }
}
