use crate::core::projection::{default_columns, default_operator_columns, ColumnMapping, DetailLink};
use crate::core::filter::default_allowed_statuses;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Largest page the registry will serve.
pub const MAX_PAGE_SIZE: u32 = 1000;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub source: SourceConfig,
    pub projection: ProjectionConfig,
    pub filter: FilterConfig,
    pub load: LoadConfig,
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Registry API root; pages are requested from `{endpoint}/studies`.
    pub endpoint: String,
    pub page_size: u32,
    pub timeout_seconds: u64,
    /// Stop after this many pages even if a continuation token is returned.
    pub max_pages: Option<usize>,
    pub user_agent: String,
    pub headers: BTreeMap<String, String>,
    /// Extra query parameters sent with every page, e.g. `query.locn`.
    pub parameters: BTreeMap<String, String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://clinicaltrials.gov/api/v2".to_string(),
            page_size: MAX_PAGE_SIZE,
            timeout_seconds: 30,
            max_pages: None,
            user_agent: "Mozilla/5.0".to_string(),
            headers: BTreeMap::new(),
            parameters: BTreeMap::new(),
        }
    }
}

impl SourceConfig {
    pub fn studies_url(&self) -> String {
        format!("{}/studies", self.endpoint.trim_end_matches('/'))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    pub columns: Vec<ColumnMapping>,
    pub link: Option<DetailLink>,
    pub operator_columns: Vec<String>,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            columns: default_columns(),
            link: Some(DetailLink::default()),
            operator_columns: default_operator_columns(),
        }
    }
}

impl ProjectionConfig {
    pub fn header(&self) -> Vec<&str> {
        self.columns
            .iter()
            .map(|c| c.name.as_str())
            .chain(self.link.iter().map(|l| l.column.as_str()))
            .chain(self.operator_columns.iter().map(String::as_str))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub status_column: String,
    pub allowed_statuses: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            status_column: "Trial Status".to_string(),
            allowed_statuses: default_allowed_statuses(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    pub output_path: String,
    pub filename: String,
    pub sheet_name: String,
    /// Column whose cells become clickable links.
    pub hyperlink_column: Option<String>,
    pub max_column_width: usize,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            output_path: "./output".to_string(),
            filename: "clinical_trials_angola.xlsx".to_string(),
            sheet_name: "Trials".to_string(),
            hyperlink_column: Some(DetailLink::default().column),
            max_column_width: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub enabled: bool,
    pub smtp_host: String,
    pub smtp_port: u16,
    /// Defaults to `sender` when absent.
    pub username: Option<String>,
    pub password: Option<String>,
    pub sender: String,
    pub recipients: Vec<String>,
    pub subject: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            smtp_host: "smtp-mail.outlook.com".to_string(),
            smtp_port: 587,
            username: None,
            password: None,
            sender: String::new(),
            recipients: Vec::new(),
            subject: "New Clinical Trials Found".to_string(),
        }
    }
}

impl NotifyConfig {
    pub fn login(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.sender)
    }
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;
        Ok(toml::from_str(&processed_content)?)
    }

    /// 替換環境變數 (例如 ${SMTP_PASSWORD})，找不到的保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| EtlError::ConfigError {
            message: format!("invalid placeholder pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        let source = &self.source;
        validation::validate_url("source.endpoint", &source.endpoint)?;
        validation::validate_range("source.page_size", source.page_size, 1, MAX_PAGE_SIZE)?;
        validation::validate_positive_number("source.timeout_seconds", source.timeout_seconds, 1)?;
        if let Some(max_pages) = source.max_pages {
            validation::validate_positive_number("source.max_pages", max_pages as u64, 1)?;
        }

        let header = self.projection.header();
        validation::validate_unique_names("projection.columns", header.iter().copied())?;
        for mapping in &self.projection.columns {
            validation::validate_non_empty_string("projection.columns.source", &mapping.source)?;
        }
        if let Some(link) = &self.projection.link {
            validation::validate_url("projection.link.base_url", &link.base_url)?;
            validation::validate_non_empty_string(
                "projection.link.identifier_path",
                &link.identifier_path,
            )?;
        }

        Self::validate_known_column("filter.status_column", &self.filter.status_column, &header)?;
        if self.filter.allowed_statuses.is_empty() {
            return Err(EtlError::InvalidConfigValueError {
                field: "filter.allowed_statuses".to_string(),
                value: "[]".to_string(),
                reason: "At least one status must be allowed".to_string(),
            });
        }

        validation::validate_path("load.output_path", &self.load.output_path)?;
        validation::validate_file_extension("load.filename", &self.load.filename, "xlsx")?;
        validation::validate_non_empty_string("load.sheet_name", &self.load.sheet_name)?;
        validation::validate_range("load.max_column_width", self.load.max_column_width, 1, 255)?;
        if let Some(column) = &self.load.hyperlink_column {
            Self::validate_known_column("load.hyperlink_column", column, &header)?;
        }

        if self.notify.enabled {
            self.validate_notify()?;
        }

        Ok(())
    }

    fn validate_notify(&self) -> Result<()> {
        let notify = &self.notify;
        validation::validate_non_empty_string("notify.smtp_host", &notify.smtp_host)?;
        validation::validate_positive_number("notify.smtp_port", notify.smtp_port as u64, 1)?;
        if notify.sender.is_empty() {
            return Err(EtlError::MissingConfigError {
                field: "notify.sender".to_string(),
            });
        }
        validation::validate_mailbox("notify.sender", &notify.sender)?;
        if notify.recipients.is_empty() {
            return Err(EtlError::MissingConfigError {
                field: "notify.recipients".to_string(),
            });
        }
        for recipient in &notify.recipients {
            validation::validate_mailbox("notify.recipients", recipient)?;
        }

        let password = validation::validate_required_field("notify.password", &notify.password)?;
        Self::validate_resolved("notify.password", password)?;
        Self::validate_resolved("notify.username", notify.login())?;
        Ok(())
    }

    fn validate_known_column(field: &str, column: &str, header: &[&str]) -> Result<()> {
        if header.contains(&column) {
            Ok(())
        } else {
            Err(EtlError::InvalidConfigValueError {
                field: field.to_string(),
                value: column.to_string(),
                reason: "Not one of the configured output columns".to_string(),
            })
        }
    }

    // A placeholder survives substitution only when its variable is unset.
    fn validate_resolved(field: &str, value: &str) -> Result<()> {
        if value.contains("${") {
            return Err(EtlError::MissingConfigError {
                field: format!("{} (environment variable in '{}' is not set)", field, value),
            });
        }
        Ok(())
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn notify_section() -> &'static str {
        r#"
[notify]
sender = "network@example.org"
recipients = ["one@example.org", "two@example.org"]
password = "secret"
"#
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = TomlConfig::from_toml_str("").unwrap();

        assert_eq!(config.source.studies_url(), "https://clinicaltrials.gov/api/v2/studies");
        assert_eq!(config.source.page_size, 1000);
        assert_eq!(config.filter.allowed_statuses, vec!["RECRUITING", "NOT_YET_RECRUITING"]);
        assert_eq!(config.projection.columns.len(), 16);
        assert_eq!(config.projection.header().len(), 23);
        assert_eq!(config.load.filename, "clinical_trials_angola.xlsx");
        assert_eq!(config.notify.smtp_port, 587);
        assert!(config.notify.enabled);
    }

    #[test]
    fn test_defaults_fail_validation_without_mail_settings() {
        let config = TomlConfig::default();
        assert!(matches!(
            config.validate(),
            Err(EtlError::MissingConfigError { .. })
        ));
    }

    #[test]
    fn test_parse_full_config() {
        let toml_content = format!(
            r#"
[source]
endpoint = "https://registry.example/api/v2/"
page_size = 50
max_pages = 3

[source.parameters]
"query.locn" = "Angola"

[projection]
operator_columns = ["Notes"]

[[projection.columns]]
source = "protocolSection.identificationModule.nctId"
name = "ID"

[[projection.columns]]
source = "protocolSection.statusModule.overallStatus"
name = "Status"

[projection.link]
column = "Link"
base_url = "https://registry.example/study"
identifier_path = "protocolSection.identificationModule.nctId"

[filter]
status_column = "Status"
allowed_statuses = ["RECRUITING"]

[load]
output_path = "./out"
filename = "angola.xlsx"
hyperlink_column = "Link"
{}"#,
            notify_section()
        );

        let config = TomlConfig::from_toml_str(&toml_content).unwrap();

        assert_eq!(config.source.studies_url(), "https://registry.example/api/v2/studies");
        assert_eq!(config.source.max_pages, Some(3));
        assert_eq!(config.source.parameters.get("query.locn").map(String::as_str), Some("Angola"));
        assert_eq!(config.projection.header(), vec!["ID", "Status", "Link", "Notes"]);
        assert_eq!(config.notify.login(), "network@example.org");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("TRIAL_WATCH_TEST_PASSWORD", "hunter2");

        let toml_content = r#"
[notify]
sender = "network@example.org"
recipients = ["one@example.org"]
password = "${TRIAL_WATCH_TEST_PASSWORD}"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.notify.password.as_deref(), Some("hunter2"));
        assert!(config.validate().is_ok());

        std::env::remove_var("TRIAL_WATCH_TEST_PASSWORD");
    }

    #[test]
    fn test_unset_env_var_is_rejected() {
        let toml_content = r#"
[notify]
sender = "network@example.org"
recipients = ["one@example.org"]
password = "${TRIAL_WATCH_TEST_UNSET_VARIABLE}"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(
            config.notify.password.as_deref(),
            Some("${TRIAL_WATCH_TEST_UNSET_VARIABLE}")
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation() {
        let mut config = TomlConfig::from_toml_str(notify_section()).unwrap();
        assert!(config.validate().is_ok());

        config.source.endpoint = "invalid-url".to_string();
        assert!(config.validate().is_err());

        let mut config = TomlConfig::from_toml_str(notify_section()).unwrap();
        config.source.page_size = 5000;
        assert!(config.validate().is_err());

        let mut config = TomlConfig::from_toml_str(notify_section()).unwrap();
        config.filter.status_column = "Nope".to_string();
        assert!(config.validate().is_err());

        let mut config = TomlConfig::from_toml_str(notify_section()).unwrap();
        config.load.filename = "trials.csv".to_string();
        assert!(config.validate().is_err());

        let mut config = TomlConfig::from_toml_str(notify_section()).unwrap();
        config.notify.recipients = vec!["broken".to_string()];
        assert!(config.validate().is_err());

        let mut config = TomlConfig::from_toml_str(notify_section()).unwrap();
        config.projection.operator_columns.push("Trial Status".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_disabled_notify_skips_mail_checks() {
        let config = TomlConfig::from_toml_str("[notify]\nenabled = false\n").unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(matches!(
            TomlConfig::from_toml_str("[source\nendpoint = 1"),
            Err(EtlError::TomlError(_))
        ));
    }

    #[test]
    fn test_bundled_config_parses() {
        let config = TomlConfig::from_toml_str(include_str!("../../trial-watch.toml")).unwrap();
        assert_eq!(config.source.max_pages, None);
        assert_eq!(config.projection.header().len(), 23);
        assert_eq!(config.load.hyperlink_column.as_deref(), Some("Trial Link"));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(notify_section().as_bytes()).unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.notify.recipients.len(), 2);
    }
}
