use crate::domain::model::{Extraction, LoadResult, Notice, NotifyOutcome, OutputTable, RawRecord};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::PathBuf;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    /// Where `path` lives, for handing to code outside the storage layer.
    fn locate(&self, path: &str) -> PathBuf;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Never fails: every transport problem is logged and reported in the outcome.
    async fn notify(&self, notice: &Notice) -> NotifyOutcome;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Extraction>;
    async fn transform(&self, data: Vec<RawRecord>) -> Result<OutputTable>;
    async fn load(&self, table: &OutputTable) -> Result<LoadResult>;
    async fn notify(&self, notice: &Notice) -> NotifyOutcome;
}
