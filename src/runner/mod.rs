//! One end-to-end run: load, select, delete, persist.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    archive::{self, ArchiveError, ArchiveFormat, Record},
    client::{ClientError, DeletionClient, GraphqlClient, SimulatedClient},
    config::{ConfigError, PurgeConfig},
    ledger::{self, LedgerError, LedgerStore},
    pipeline::{
        DeletionPipeline, NoopObserver, PassSummary, ProgressObserver, RunControl, RunCounters,
    },
    report::{ReportError, RunReport},
    selection::{SelectionOutcome, SelectionPolicy},
    session::{Credentials, SessionError},
};

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error("Nothing to resume: the failed-item ledger is empty")]
    NothingToResume,
}

/// Archive loaded and partitioned, ready to execute.
#[derive(Debug, Clone)]
pub struct Plan {
    pub format: ArchiveFormat,
    /// Archive entries rejected while loading.
    pub dropped: usize,
    pub selection: SelectionOutcome,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub summary: PassSummary,
    pub report: RunReport,
}

/// Load `archive` and partition it under the selection rules in `config`.
pub async fn plan(config: &PurgeConfig, archive: &Path) -> Result<Plan, RunError> {
    let loaded = archive::load_file(archive, &config.archive).await?;
    let now = Utc::now();
    let policy = SelectionPolicy::from_config(&config.selection, now);
    let selection = policy.partition(loaded.records, now);

    tracing::info!(
        archive = %archive.display(),
        format = %loaded.format,
        found = selection.total(),
        eligible = selection.eligible.len(),
        skipped = selection.skipped.len(),
        protected = selection.protected.len(),
        dropped = loaded.dropped,
        "Archive planned"
    );

    Ok(Plan {
        format: loaded.format,
        dropped: loaded.dropped,
        selection,
    })
}

pub struct Runner {
    config: PurgeConfig,
    client: Arc<dyn DeletionClient>,
    ledger: Arc<dyn LedgerStore>,
    control: RunControl,
    observer: Arc<dyn ProgressObserver>,
}

impl Runner {
    pub fn new(
        config: PurgeConfig,
        client: Arc<dyn DeletionClient>,
        ledger: Arc<dyn LedgerStore>,
        control: RunControl,
    ) -> Self {
        Self {
            config,
            client,
            ledger,
            control,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Build the deletion client the configuration asks for. Test mode needs
    /// no credentials.
    pub fn from_config(
        config: PurgeConfig,
        ledger: Arc<dyn LedgerStore>,
        control: RunControl,
    ) -> Result<Self, RunError> {
        let client: Arc<dyn DeletionClient> = if config.deletion.test_mode {
            Arc::new(SimulatedClient::new(config.deletion.test_delay()))
        } else {
            let credentials = Credentials::from_config(&config.session)?;
            Arc::new(GraphqlClient::new(&config.endpoint, &credentials)?)
        };
        Ok(Self::new(config, client, ledger, control))
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &PurgeConfig {
        &self.config
    }

    /// Load `archive` and partition it under the configured selection rules.
    pub async fn plan(&self, archive: &Path) -> Result<Plan, RunError> {
        plan(&self.config, archive).await
    }

    /// Delete every eligible record, then overwrite or clear the ledger.
    pub async fn execute(&self, selection: SelectionOutcome) -> Result<RunOutcome, RunError> {
        let summary = self.run_pass(&selection, Utc::now()).await;
        ledger::record_run(self.ledger.as_ref(), &summary.failed_ids).await?;
        Ok(self.outcome(summary, selection.cutoff))
    }

    /// Load, select and execute in one step.
    pub async fn run(&self, archive: &Path) -> Result<RunOutcome, RunError> {
        let plan = self.plan(archive).await?;
        self.execute(plan.selection).await
    }

    /// Replay the ids held in the ledger. Protected ids are still honoured;
    /// date rules are not, since the ledger carries no timestamps.
    ///
    /// Ids left unattempted by an early stop stay in the ledger.
    pub async fn resume(&self) -> Result<RunOutcome, RunError> {
        let ids = self.ledger.load().await?;
        if ids.is_empty() {
            return Err(RunError::NothingToResume);
        }

        let records: Vec<Record> = ids
            .into_iter()
            .map(|id| Record::new(id, DateTime::<Utc>::UNIX_EPOCH, ""))
            .collect();
        let policy = SelectionPolicy::new(None, false, self.config.selection.protected_ids.clone());
        let selection = policy.partition(records, Utc::now());

        tracing::info!(
            ids = selection.eligible.len(),
            protected = selection.protected.len(),
            "Resuming from ledger"
        );

        let summary = self.run_pass(&selection, Utc::now()).await;
        let mut keep = summary.failed_ids.clone();
        keep.extend(summary.remaining_ids.iter().cloned());
        ledger::record_run(self.ledger.as_ref(), &keep).await?;

        Ok(self.outcome(summary, None))
    }

    /// Write the report into `dir`.
    pub async fn export_report(&self, report: &RunReport, dir: &Path) -> Result<PathBuf, RunError> {
        Ok(report.export(dir).await?)
    }

    async fn run_pass(&self, selection: &SelectionOutcome, started_at: DateTime<Utc>) -> PassSummary {
        let counters = RunCounters::from_selection(selection, started_at);
        let pipeline = DeletionPipeline::new(
            self.client.clone(),
            self.config.deletion.clone(),
            self.control.clone(),
        )
        .with_observer(self.observer.clone());

        pipeline
            .run(&selection.eligible, &counters, self.config.deletion.concurrency)
            .await
    }

    fn outcome(&self, summary: PassSummary, cutoff: Option<DateTime<Utc>>) -> RunOutcome {
        let report = RunReport::new(
            &summary,
            cutoff,
            self.config.deletion.test_mode,
            self.config.selection.protected_ids.clone(),
            Utc::now(),
        );
        RunOutcome { summary, report }
    }
}
