pub mod etl;
pub mod filter;
pub mod flatten;
pub mod projection;

pub use crate::domain::model::{
    Extraction, FlatRecord, FlatValue, LoadResult, Notice, NotifyOutcome, OutputTable,
    ProjectedRow, RawRecord, RunSummary,
};
pub use crate::domain::ports::{Notifier, Pipeline, Storage};
pub use crate::utils::error::Result;
