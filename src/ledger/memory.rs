use async_trait::async_trait;
use parking_lot::Mutex;

use super::{LedgerResult, LedgerStore, dedup_ids};

/// In-process ledger; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    ids: Mutex<Vec<String>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn load(&self) -> LedgerResult<Vec<String>> {
        Ok(self.ids.lock().clone())
    }

    async fn save(&self, ids: &[String]) -> LedgerResult<()> {
        *self.ids.lock() = dedup_ids(ids);
        Ok(())
    }

    async fn clear(&self) -> LedgerResult<()> {
        self.ids.lock().clear();
        Ok(())
    }
}
