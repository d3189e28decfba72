//! Record selection.
//!
//! Splits loaded records into three disjoint sets:
//!
//! - **protected**: identifier is on the allow-list, whatever its date
//! - **eligible**: not protected, and created on or before the cutoff (if any)
//! - **skipped**: not protected, but newer than the cutoff
//!
//! With no cutoff ("delete all"), every non-protected record is eligible.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};

use crate::{archive::Record, config::SelectionConfig};

/// Records from the last this-many days are kept when `keep_recent` is on.
pub const KEEP_RECENT_DAYS: i64 = 7;

/// Cutoff used when neither a date nor delete-all is configured.
pub const DEFAULT_CUTOFF_DAYS: i64 = 365;

/// Selection rules resolved for one run.
#[derive(Debug, Clone)]
pub struct SelectionPolicy {
    cutoff: Option<DateTime<Utc>>,
    keep_recent: bool,
    protected: HashSet<String>,
}

impl SelectionPolicy {
    pub fn new(
        cutoff: Option<DateTime<Utc>>,
        keep_recent: bool,
        protected: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            cutoff,
            keep_recent,
            protected: protected.into_iter().collect(),
        }
    }

    /// Resolve the configured rules against the current instant.
    pub fn from_config(config: &SelectionConfig, now: DateTime<Utc>) -> Self {
        let cutoff = if config.delete_all {
            None
        } else {
            Some(
                config
                    .before
                    .and_then(|day| day.and_hms_opt(0, 0, 0))
                    .map(|dt| dt.and_utc())
                    .unwrap_or_else(|| now - Duration::days(DEFAULT_CUTOFF_DAYS)),
            )
        };

        Self::new(cutoff, config.keep_recent, config.protected_ids.clone())
    }

    /// The cutoff actually applied at `now`, or `None` in delete-all mode.
    pub fn effective_cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        effective_cutoff(self.cutoff, self.keep_recent, now)
    }

    pub fn is_protected(&self, id: &str) -> bool {
        self.protected.contains(id)
    }

    /// Partition `records` into protected, eligible and skipped sets.
    /// Input order is preserved within each set.
    pub fn partition(&self, records: Vec<Record>, now: DateTime<Utc>) -> SelectionOutcome {
        let cutoff = self.effective_cutoff(now);
        let mut outcome = SelectionOutcome {
            cutoff,
            ..Default::default()
        };

        for record in records {
            if self.is_protected(&record.id) {
                outcome.protected.push(record);
            } else if cutoff.is_none_or(|c| record.created_at <= c) {
                outcome.eligible.push(record);
            } else {
                outcome.skipped.push(record);
            }
        }

        tracing::debug!(
            protected = outcome.protected.len(),
            eligible = outcome.eligible.len(),
            skipped = outcome.skipped.len(),
            cutoff = ?cutoff,
            "Partitioned records"
        );

        outcome
    }
}

/// Tighten `cutoff` to at most [`KEEP_RECENT_DAYS`] before `now` when
/// `keep_recent` is set. Never loosens it, and has no effect without a cutoff.
pub fn effective_cutoff(
    cutoff: Option<DateTime<Utc>>,
    keep_recent: bool,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    cutoff.map(|c| {
        if keep_recent {
            c.min(now - Duration::days(KEEP_RECENT_DAYS))
        } else {
            c
        }
    })
}

/// Disjoint partition of the loaded records.
#[derive(Debug, Clone, Default)]
pub struct SelectionOutcome {
    pub protected: Vec<Record>,
    pub eligible: Vec<Record>,
    pub skipped: Vec<Record>,
    /// Cutoff that was applied; `None` in delete-all mode.
    pub cutoff: Option<DateTime<Utc>>,
}

impl SelectionOutcome {
    pub fn total(&self) -> usize {
        self.protected.len() + self.eligible.len() + self.skipped.len()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone};
    use rstest::rstest;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn record(id: &str, days_ago: i64) -> Record {
        Record::new(id, now() - Duration::days(days_ago), format!("post {id}"))
    }

    #[test]
    fn test_scenario_one_protected_one_skipped() {
        let records = vec![
            record("1", 400),
            record("2", 300),
            record("3", 200),
            record("4", 10),
            record("5", 500),
        ];
        let cutoff = now() - Duration::days(100);
        let policy = SelectionPolicy::new(Some(cutoff), false, ["5".to_string()]);

        let outcome = policy.partition(records, now());

        assert_eq!(outcome.protected.len(), 1);
        assert_eq!(outcome.eligible.len(), 3);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.protected[0].id, "5");
        assert_eq!(outcome.skipped[0].id, "4");
        let eligible: Vec<_> = outcome.eligible.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(eligible, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_protected_wins_regardless_of_date() {
        let policy = SelectionPolicy::new(None, false, ["1".to_string(), "2".to_string()]);
        let outcome = policy.partition(vec![record("1", 0), record("2", 1000)], now());
        assert_eq!(outcome.protected.len(), 2);
        assert!(outcome.eligible.is_empty());
    }

    #[test]
    fn test_delete_all_has_no_skipped() {
        let policy = SelectionPolicy::new(None, true, Vec::<String>::new());
        let outcome = policy.partition(vec![record("1", 0), record("2", 3), record("3", 900)], now());
        assert_eq!(outcome.eligible.len(), 3);
        assert!(outcome.skipped.is_empty());
        assert!(outcome.cutoff.is_none());
    }

    #[test]
    fn test_cutoff_is_inclusive() {
        let cutoff = now() - Duration::days(30);
        let policy = SelectionPolicy::new(Some(cutoff), false, Vec::<String>::new());
        let exact = Record::new("1", cutoff, "");
        let outcome = policy.partition(vec![exact], now());
        assert_eq!(outcome.eligible.len(), 1);
    }

    #[test]
    fn test_partition_is_disjoint_and_complete() {
        let protected: Vec<String> = (0..100).step_by(7).map(|i| i.to_string()).collect();
        let policy = SelectionPolicy::new(Some(now() - Duration::days(50)), true, protected);
        let records: Vec<Record> = (0..100).map(|i| record(&i.to_string(), i * 3 % 120)).collect();

        let outcome = policy.partition(records.clone(), now());

        assert_eq!(outcome.total(), records.len());
        let mut seen = HashSet::new();
        for r in outcome
            .protected
            .iter()
            .chain(&outcome.eligible)
            .chain(&outcome.skipped)
        {
            assert!(seen.insert(r.id.clone()), "record {} in two sets", r.id);
        }
        let input: HashSet<String> = records.into_iter().map(|r| r.id).collect();
        assert_eq!(seen, input);
    }

    #[rstest]
    #[case::cutoff_older_than_week(30, true, 30)]
    #[case::cutoff_inside_week_tightened(2, true, 7)]
    #[case::cutoff_in_future_tightened(-5, true, 7)]
    #[case::keep_recent_off(2, false, 2)]
    fn test_effective_cutoff(
        #[case] cutoff_days_ago: i64,
        #[case] keep_recent: bool,
        #[case] expected_days_ago: i64,
    ) {
        let cutoff = now() - Duration::days(cutoff_days_ago);
        let effective = effective_cutoff(Some(cutoff), keep_recent, now()).unwrap();
        assert_eq!(effective, now() - Duration::days(expected_days_ago));
    }

    #[test]
    fn test_effective_cutoff_none_in_delete_all_mode() {
        assert!(effective_cutoff(None, true, now()).is_none());
    }

    #[test]
    fn test_from_config_uses_midnight_utc() {
        let config = SelectionConfig {
            before: NaiveDate::from_ymd_opt(2023, 1, 1),
            keep_recent: false,
            ..Default::default()
        };
        let policy = SelectionPolicy::from_config(&config, now());
        assert_eq!(
            policy.effective_cutoff(now()),
            Some(Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_from_config_defaults_to_one_year() {
        let policy = SelectionPolicy::from_config(&SelectionConfig::default(), now());
        assert_eq!(
            policy.effective_cutoff(now()),
            Some(now() - Duration::days(DEFAULT_CUTOFF_DAYS))
        );
    }

    #[test]
    fn test_from_config_delete_all_ignores_date() {
        let config = SelectionConfig {
            before: NaiveDate::from_ymd_opt(2023, 1, 1),
            delete_all: true,
            ..Default::default()
        };
        let policy = SelectionPolicy::from_config(&config, now());
        assert!(policy.effective_cutoff(now()).is_none());
    }
}
