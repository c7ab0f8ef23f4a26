use crate::adapters::http::PaginatedFetcher;
use crate::adapters::xlsx::{SheetOptions, SpreadsheetWriter};
use crate::config::toml_config::TomlConfig;
use crate::core::filter::StatusFilter;
use crate::core::flatten::flatten;
use crate::core::projection::Projector;
use crate::core::{
    Extraction, LoadResult, Notice, Notifier, NotifyOutcome, OutputTable, Pipeline, RawRecord,
    Storage,
};
use crate::utils::error::Result;

/// Registry studies to a filtered, formatted spreadsheet and an email.
pub struct TrialsPipeline<S: Storage, N: Notifier> {
    config: TomlConfig,
    storage: S,
    notifier: Option<N>,
    projector: Projector,
    filter: StatusFilter,
}

impl<S: Storage, N: Notifier> TrialsPipeline<S, N> {
    /// `notifier` is ignored when `notify.enabled` is false.
    pub fn new(config: TomlConfig, storage: S, notifier: Option<N>) -> Self {
        let projector = Projector::new(
            config.projection.columns.clone(),
            config.projection.link.clone(),
            config.projection.operator_columns.clone(),
        );
        let filter = StatusFilter::new(
            config.filter.status_column.clone(),
            config.filter.allowed_statuses.clone(),
        );
        let notifier = notifier.filter(|_| config.notify.enabled);

        Self {
            config,
            storage,
            notifier,
            projector,
            filter,
        }
    }

    fn sheet_options(&self) -> SheetOptions {
        SheetOptions {
            sheet_name: self.config.load.sheet_name.clone(),
            hyperlink_column: self.config.load.hyperlink_column.clone(),
            max_column_width: self.config.load.max_column_width,
        }
    }
}

#[async_trait::async_trait]
impl<S: Storage, N: Notifier> Pipeline for TrialsPipeline<S, N> {
    async fn extract(&self) -> Result<Extraction> {
        tracing::info!(
            "🚀 Fetching studies from: {}",
            self.config.source.studies_url()
        );
        let fetcher = PaginatedFetcher::new(&self.config.source)?;
        Ok(fetcher.fetch_all().await)
    }

    async fn transform(&self, data: Vec<RawRecord>) -> Result<OutputTable> {
        tracing::info!("🔧 Flattening and projecting {} studies", data.len());

        let rows = data
            .iter()
            .map(|record| self.projector.project(&flatten(record)))
            .collect::<Vec<_>>();
        let (kept, _report) = self.filter.apply(rows);

        let mut table = OutputTable::new(self.projector.header());
        for row in kept {
            table.push(row)?;
        }
        Ok(table)
    }

    async fn load(&self, table: &OutputTable) -> Result<LoadResult> {
        let writer = SpreadsheetWriter::new(&self.storage, self.sheet_options());
        writer
            .write_and_format(&self.config.load.filename, table)
            .await
    }

    async fn notify(&self, notice: &Notice) -> NotifyOutcome {
        match &self.notifier {
            Some(notifier) => notifier.notify(notice).await,
            None => {
                tracing::info!("📭 Email notification disabled, skipping");
                NotifyOutcome::Skipped
            }
        }
    }
}
