use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Record selection rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SelectionConfig {
    /// Delete records created on or before this day (midnight UTC).
    /// Defaults to one year before the run when unset.
    #[serde(default)]
    pub before: Option<NaiveDate>,

    /// Ignore the date cutoff and select every non-protected record.
    #[serde(default)]
    pub delete_all: bool,

    /// Never select records from the last 7 days.
    /// Has no effect when `delete_all` is set.
    #[serde(default = "default_true")]
    pub keep_recent: bool,

    /// Identifiers that are never deleted.
    #[serde(default)]
    pub protected_ids: Vec<String>,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            before: None,
            delete_all: false,
            keep_recent: true,
            protected_ids: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

impl SelectionConfig {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(bad) = self
            .protected_ids
            .iter()
            .find(|id| id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()))
        {
            return Err(format!(
                "selection.protected_ids must contain numeric identifiers, got '{bad}'"
            ));
        }
        Ok(())
    }
}
