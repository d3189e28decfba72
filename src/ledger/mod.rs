//! Persisted list of post ids whose deletion failed.
//!
//! A run overwrites the ledger with its own failures, or clears it when
//! nothing failed. `resume` replays whatever the ledger holds.

mod error;
mod file;
mod memory;

use async_trait::async_trait;

pub use error::{LedgerError, LedgerResult};
pub use file::FileLedger;
pub use memory::MemoryLedger;

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Stored ids, in the order they were saved. Empty if nothing is stored.
    async fn load(&self) -> LedgerResult<Vec<String>>;

    /// Replace the stored ids. Duplicates are dropped, keeping first occurrence.
    async fn save(&self, ids: &[String]) -> LedgerResult<()>;

    /// Remove all stored ids.
    async fn clear(&self) -> LedgerResult<()>;
}

/// Drop repeated ids, keeping the first occurrence of each.
pub(crate) fn dedup_ids(ids: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

/// Persist the outcome of a run: clear on zero failures, otherwise overwrite.
pub async fn record_run(store: &dyn LedgerStore, failed_ids: &[String]) -> LedgerResult<()> {
    if failed_ids.is_empty() {
        store.clear().await?;
        tracing::debug!("No failures, ledger cleared");
    } else {
        store.save(failed_ids).await?;
        tracing::info!(failed = failed_ids.len(), "Failed ids saved for resume");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        assert_eq!(dedup_ids(&ids(&["3", "1", "3", "2", "1"])), ids(&["3", "1", "2"]));
    }

    #[tokio::test]
    async fn test_record_run_overwrites_then_clears() {
        let store = MemoryLedger::new();
        store.save(&ids(&["old"])).await.unwrap();

        record_run(&store, &ids(&["1", "2"])).await.unwrap();
        assert_eq!(store.load().await.unwrap(), ids(&["1", "2"]));

        record_run(&store, &[]).await.unwrap();
        assert!(store.load().await.unwrap().is_empty());
    }
}
