//! Run summary email over SMTP with STARTTLS.

use crate::config::toml_config::NotifyConfig;
use crate::core::{Notice, Notifier, NotifyOutcome};
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::response::{Category, Code, Detail, Severity};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::path::Path;

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";


/// Plain text and HTML bodies for a notice.
pub fn render_bodies(row_count: usize, generated_at: DateTime<Local>) -> (String, String) {
    let timestamp = generated_at.format("%Y-%m-%d %H:%M");
    if row_count > 0 {
        let plain = format!(
            "New clinical trials found\n\n{} new clinical trial(s) found and saved to the attached spreadsheet.\n\nGenerated {}\n",
            row_count, timestamp
        );
        let html = format!(
            "<html>\n<body>\n<h2>New Clinical Trials Found</h2>\n<p>{} new clinical trial(s) found and saved to the attached spreadsheet.</p>\n<p><small>Generated {}</small></p>\n</body>\n</html>\n",
            row_count, timestamp
        );
        (plain, html)
    } else {
        let plain = format!(
            "No new clinical trials found\n\nNo matching clinical trials were found at this time.\n\nGenerated {}\n",
            timestamp
        );
        let html = format!(
            "<html>\n<body>\n<h2>No New Clinical Trials Found</h2>\n<p>No matching clinical trials were found at this time.</p>\n<p><small>Generated {}</small></p>\n</body>\n</html>\n",
            timestamp
        );
        (plain, html)
    }
}

pub struct SmtpNotifier {
    config: NotifyConfig,
}

impl SmtpNotifier {
    pub fn new(config: NotifyConfig) -> Self {
        Self { config }
    }

    pub fn compose(&self, notice: &Notice, attachment: Option<(String, Vec<u8>)>) -> Result<Message> {
        let mut builder = Message::builder()
            .from(self.config.sender.parse::<Mailbox>()?)
            .subject(self.config.subject.clone());
        for recipient in &self.config.recipients {
            builder = builder.to(recipient.parse::<Mailbox>()?);
        }

        let (plain, html) = render_bodies(notice.row_count, Local::now());
        let alternative = MultiPart::alternative_plain_html(plain, html);

        let body = match attachment {
            Some((filename, bytes)) => {
                let content_type = ContentType::parse(XLSX_CONTENT_TYPE).map_err(|e| {
                    EtlError::ProcessingError {
                        message: format!("invalid attachment content type: {}", e),
                    }
                })?;
                MultiPart::mixed()
                    .multipart(alternative)
                    .singlepart(Attachment::new(filename).body(bytes, content_type))
            }
            None => alternative,
        };

        Ok(builder.multipart(body)?)
    }

    /// A missing file is logged and the email goes out without it.
    pub async fn load_attachment(path: &Path) -> Option<(String, Vec<u8>)> {
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "trials.xlsx".to_string());

        match tokio::fs::read(path).await {
            Ok(bytes) => Some((filename, bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::error!(
                    "❌ Spreadsheet '{}' not found, sending email without attachment",
                    path.display()
                );
                None
            }
            Err(e) => {
                tracing::error!(
                    "❌ Could not read spreadsheet '{}': {}, sending email without attachment",
                    path.display(),
                    e
                );
                None
            }
        }
    }

    async fn send(&self, message: Message) -> Result<()> {
        let credentials = Credentials::new(
            self.config.login().to_string(),
            self.config.password.clone().unwrap_or_default(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)?
            .port(self.config.smtp_port)
            .credentials(credentials)
            .timeout(None)
            .build();

        transport.send(message).await?;
        Ok(())
    }
}

/// Sorts an SMTP reply code into the outcome it is logged as.
/// 530 authentication required, 534 mechanism too weak and 535 credentials
/// rejected are authentication failures; any other code is a protocol
/// failure; no code at all (connection, TLS, I/O) is a generic failure.
pub fn classify_reply(code: Option<Code>, message: String) -> NotifyOutcome {
    match code {
        Some(Code {
            severity: Severity::PermanentNegativeCompletion,
            category: Category::Unspecified3,
            detail: Detail::Zero | Detail::Four | Detail::Five,
        }) => NotifyOutcome::AuthenticationFailed(message),
        Some(_) => NotifyOutcome::ProtocolFailed(message),
        None => NotifyOutcome::Failed(message),
    }
}

pub fn classify_send_error(err: &EtlError) -> NotifyOutcome {
    match err {
        EtlError::SmtpError(smtp) => classify_reply(smtp.status(), err.to_string()),
        other => NotifyOutcome::Failed(other.to_string()),
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, notice: &Notice) -> NotifyOutcome {
        let attachment = match &notice.attachment {
            Some(path) if notice.row_count > 0 => Self::load_attachment(path).await,
            _ => None,
        };

        let message = match self.compose(notice, attachment) {
            Ok(message) => message,
            Err(e) => {
                tracing::error!("❌ Could not compose email: {}", e);
                return NotifyOutcome::Failed(e.to_string());
            }
        };

        let outcome = match self.send(message).await {
            Ok(()) => NotifyOutcome::Sent,
            Err(e) => classify_send_error(&e),
        };

        match &outcome {
            NotifyOutcome::Sent => tracing::info!(
                "📧 Email sent to {} recipients",
                self.config.recipients.len()
            ),
            NotifyOutcome::AuthenticationFailed(e) => tracing::error!(
                "❌ SMTP authentication failed: {}. Check the sender and password",
                e
            ),
            NotifyOutcome::ProtocolFailed(e) => {
                tracing::error!("❌ SMTP error: {}. The email was not sent", e)
            }
            NotifyOutcome::Failed(e) => {
                tracing::error!("❌ Unexpected error while sending email: {}", e)
            }
            NotifyOutcome::Skipped => {}
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn config() -> NotifyConfig {
        NotifyConfig {
            smtp_host: "127.0.0.1".to_string(),
            sender: "network@example.org".to_string(),
            recipients: vec!["one@example.org".to_string(), "two@example.org".to_string()],
            password: Some("secret".to_string()),
            ..NotifyConfig::default()
        }
    }

    fn formatted(message: &Message) -> String {
        String::from_utf8_lossy(&message.formatted()).to_string()
    }

    #[test]
    fn test_render_bodies_with_rows() {
        let at = Local.with_ymd_and_hms(2026, 10, 14, 9, 30, 0).unwrap();
        let (plain, html) = render_bodies(3, at);

        assert!(plain.contains("3 new clinical trial(s) found"));
        assert!(html.contains("<h2>New Clinical Trials Found</h2>"));
        assert!(html.contains("Generated 2026-10-14 09:30"));
    }

    #[test]
    fn test_render_bodies_without_rows() {
        let at = Local.with_ymd_and_hms(2026, 10, 14, 9, 30, 0).unwrap();
        let (plain, html) = render_bodies(0, at);

        assert!(plain.contains("No matching clinical trials"));
        assert!(html.contains("<h2>No New Clinical Trials Found</h2>"));
    }

    #[test]
    fn test_compose_with_attachment() {
        let notifier = SmtpNotifier::new(config());
        let notice = Notice {
            row_count: 2,
            attachment: Some(PathBuf::from("trials.xlsx")),
        };

        let message = notifier
            .compose(&notice, Some(("trials.xlsx".to_string(), b"PK".to_vec())))
            .unwrap();
        let raw = formatted(&message);

        assert!(raw.contains("Subject: New Clinical Trials Found"));
        assert!(raw.contains("one@example.org"));
        assert!(raw.contains("two@example.org"));
        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("text/html"));
        assert!(raw.contains(XLSX_CONTENT_TYPE));
        assert!(raw.contains("trials.xlsx"));
    }

    #[test]
    fn test_compose_without_attachment() {
        let notifier = SmtpNotifier::new(config());
        let notice = Notice {
            row_count: 0,
            attachment: None,
        };

        let raw = formatted(&notifier.compose(&notice, None).unwrap());

        assert!(raw.contains("multipart/alternative"));
        assert!(!raw.contains("multipart/mixed"));
        assert!(!raw.contains(XLSX_CONTENT_TYPE));
    }

    #[test]
    fn test_compose_rejects_bad_sender() {
        let notifier = SmtpNotifier::new(NotifyConfig {
            sender: "nobody".to_string(),
            ..config()
        });
        let notice = Notice {
            row_count: 0,
            attachment: None,
        };

        assert!(matches!(
            notifier.compose(&notice, None),
            Err(EtlError::AddressError(_))
        ));
    }

    fn code(severity: Severity, category: Category, detail: Detail) -> Option<Code> {
        Some(Code::new(severity, category, detail))
    }

    #[test]
    fn test_rejected_credentials_are_authentication_failures() {
        for detail in [Detail::Zero, Detail::Four, Detail::Five] {
            let reply = code(Severity::PermanentNegativeCompletion, Category::Unspecified3, detail);
            assert!(matches!(
                classify_reply(reply, "auth".to_string()),
                NotifyOutcome::AuthenticationFailed(_)
            ));
        }
    }

    #[test]
    fn test_other_reply_codes_are_protocol_failures() {
        let rejected = code(Severity::PermanentNegativeCompletion, Category::MailSystem, Detail::Four);
        assert_eq!(rejected.as_ref().map(ToString::to_string).as_deref(), Some("554"));
        assert_eq!(
            classify_reply(rejected, "554 transaction failed".to_string()),
            NotifyOutcome::ProtocolFailed("554 transaction failed".to_string())
        );

        let busy = code(Severity::TransientNegativeCompletion, Category::MailSystem, Detail::One);
        assert!(matches!(
            classify_reply(busy, "451".to_string()),
            NotifyOutcome::ProtocolFailed(_)
        ));

        let unrelated_53x = code(Severity::PermanentNegativeCompletion, Category::Unspecified3, Detail::Eight);
        assert!(matches!(
            classify_reply(unrelated_53x, "538".to_string()),
            NotifyOutcome::ProtocolFailed(_)
        ));
    }

    #[test]
    fn test_missing_reply_code_is_generic_failure() {
        assert_eq!(
            classify_reply(None, "connection refused".to_string()),
            NotifyOutcome::Failed("connection refused".to_string())
        );
    }

    #[test]
    fn test_non_smtp_errors_are_generic_failures() {
        let err = EtlError::ProcessingError {
            message: "boom".to_string(),
        };
        assert!(matches!(classify_send_error(&err), NotifyOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn test_load_attachment() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trials.xlsx");
        std::fs::write(&path, b"workbook").unwrap();

        let (name, bytes) = SmtpNotifier::load_attachment(&path).await.unwrap();
        assert_eq!(name, "trials.xlsx");
        assert_eq!(bytes, b"workbook");

        assert!(SmtpNotifier::load_attachment(&dir.path().join("missing.xlsx"))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_reported_not_raised() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let notifier = SmtpNotifier::new(NotifyConfig {
            smtp_port: port,
            ..config()
        });
        let notice = Notice {
            row_count: 1,
            attachment: Some(PathBuf::from("/nonexistent/trials.xlsx")),
        };

        let outcome = notifier.notify(&notice).await;
        assert!(matches!(outcome, NotifyOutcome::Failed(_)));
    }
}
