use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Spreadsheet error: {0}")]
    XlsxError(#[from] rust_xlsxwriter::XlsxError),

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("Email composition failed: {0}")]
    EmailError(#[from] lettre::error::Error),

    #[error("Invalid email address: {0}")]
    AddressError(#[from] lettre::address::AddressError),

    #[error("SMTP error: {0}")]
    SmtpError(#[from] lettre::transport::smtp::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration field '{field}' has invalid value '{value}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Spreadsheet formatting error: {message}")]
    FormatError { message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Io,
    Data,
    Configuration,
    Notification,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::ApiError(_) => ErrorCategory::Network,
            EtlError::IoError(_) => ErrorCategory::Io,
            EtlError::SerializationError(_)
            | EtlError::XlsxError(_)
            | EtlError::ZipError(_)
            | EtlError::FormatError { .. }
            | EtlError::ProcessingError { .. } => ErrorCategory::Data,
            EtlError::EmailError(_) | EtlError::AddressError(_) | EtlError::SmtpError(_) => {
                ErrorCategory::Notification
            }
            EtlError::ConfigError { .. }
            | EtlError::TomlError(_)
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Notification => ErrorSeverity::Low,
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Data | ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Io => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => "Check network connectivity and the registry endpoint, then run again",
            ErrorCategory::Io => "Check that the output directory exists, is writable and has free space",
            ErrorCategory::Data => "Inspect the API response and the column mapping in the config file",
            ErrorCategory::Configuration => "Fix the configuration file or the environment variables it references",
            ErrorCategory::Notification => "Check SMTP host, port, credentials and recipient addresses",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            EtlError::InvalidConfigValueError { field, reason, .. } => {
                format!("Invalid setting '{}': {}", field, reason)
            }
            EtlError::MissingConfigError { field } => {
                format!("Missing setting '{}'", field)
            }
            EtlError::ApiError(e) if e.is_timeout() => {
                "The clinical trial registry did not answer in time".to_string()
            }
            EtlError::IoError(e) => format!("File system error: {}", e),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_are_high_severity() {
        let err = EtlError::MissingConfigError {
            field: "notify.sender".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert_eq!(err.user_friendly_message(), "Missing setting 'notify.sender'");
    }

    #[test]
    fn test_io_errors_are_critical() {
        let err = EtlError::from(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk full",
        ));
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert!(err.user_friendly_message().contains("disk full"));
    }
}
