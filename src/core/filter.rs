use crate::domain::model::ProjectedRow;

pub fn default_allowed_statuses() -> Vec<String> {
    vec!["RECRUITING".to_string(), "NOT_YET_RECRUITING".to_string()]
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterReport {
    pub kept: usize,
    pub rejected: usize,
    pub missing_status: usize,
}

/// Keeps rows whose status column exactly matches one of the allowed values.
#[derive(Debug, Clone)]
pub struct StatusFilter {
    status_column: String,
    allowed: Vec<String>,
}

impl StatusFilter {
    pub fn new(status_column: impl Into<String>, allowed: Vec<String>) -> Self {
        Self {
            status_column: status_column.into(),
            allowed,
        }
    }

    /// Case-sensitive; a row without the status column never passes.
    pub fn retains(&self, row: &ProjectedRow) -> bool {
        row.get(&self.status_column)
            .map(|status| self.allowed.iter().any(|a| a == status))
            .unwrap_or(false)
    }

    pub fn apply(&self, rows: Vec<ProjectedRow>) -> (Vec<ProjectedRow>, FilterReport) {
        let mut report = FilterReport::default();
        let mut kept = Vec::with_capacity(rows.len());

        for row in rows {
            if row.get(&self.status_column).is_none() {
                report.missing_status += 1;
            } else if self.retains(&row) {
                kept.push(row);
            } else {
                report.rejected += 1;
            }
        }
        report.kept = kept.len();

        if report.missing_status > 0 {
            tracing::warn!(
                "⚠️ Dropped {} rows without a '{}' column",
                report.missing_status,
                self.status_column
            );
        }
        tracing::info!(
            "🔎 Filtered to {} rows with status in {:?} ({} rejected)",
            report.kept,
            self.allowed,
            report.rejected
        );

        (kept, report)
    }
}

impl Default for StatusFilter {
    fn default() -> Self {
        Self::new("Trial Status", default_allowed_statuses())
    }
}
