use crate::core::{Notice, Pipeline, RunSummary};
use crate::utils::error::Result;

/// Drives one fetch, transform, write and notify pass.
pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub async fn run(&self) -> Result<RunSummary> {
        tracing::info!("🚀 Starting trial-watch run");

        // Extract
        let extraction = self.pipeline.extract().await?;
        let pages_fetched = extraction.pages;
        let records_fetched = extraction.records.len();
        let fetch_complete = extraction.complete;
        tracing::info!(
            "📥 Extracted {} records from {} pages{}",
            records_fetched,
            pages_fetched,
            if fetch_complete { "" } else { " (incomplete)" }
        );

        // Transform
        let table = self.pipeline.transform(extraction.records).await?;
        tracing::info!("🔧 {} rows retained after filtering", table.len());

        // Load
        let output = if records_fetched == 0 {
            tracing::info!("📭 No studies fetched, skipping spreadsheet");
            None
        } else {
            Some(self.pipeline.load(&table).await?)
        };

        // Notify
        let notice = Notice {
            row_count: table.len(),
            attachment: output
                .as_ref()
                .filter(|_| !table.is_empty())
                .map(|o| o.path.clone()),
        };
        let notification = self.pipeline.notify(&notice).await;

        Ok(RunSummary {
            pages_fetched,
            records_fetched,
            fetch_complete,
            rows_retained: table.len(),
            output,
            notification,
        })
    }
}
