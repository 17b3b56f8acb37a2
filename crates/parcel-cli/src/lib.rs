use parcel_core::validation::{format_file_size, short_file_name};
use parcel_core::{AppError, ErrorMetadata, LogLevel, UploadStatus};
use parcel_upload::UploadSnapshot;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Longest file name shown in status lines.
pub const NAME_WIDTH: usize = 32;

/// Initialize tracing for the CLI. Logs go to stderr so stdout stays usable
/// for payload output.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "parcel=info".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn app_error(err: &anyhow::Error) -> Option<&AppError> {
    err.chain().find_map(|e| e.downcast_ref::<AppError>())
}

/// Text shown to the user for a failed command.
///
/// Errors carrying an [`AppError`] show its client message and suggested
/// action, prefixed by the outermost context when there is one. Anything
/// else shows the full cause chain.
pub fn error_report(err: &anyhow::Error) -> String {
    let Some(app) = app_error(err) else {
        return format!("error: {:#}", err);
    };

    let outer = err.to_string();
    let mut report = if outer == app.to_string() {
        format!("error: {}", app.client_message())
    } else {
        format!("error: {}: {}", outer, app.client_message())
    };
    if let Some(action) = app.suggested_action() {
        report.push_str("\n  hint: ");
        report.push_str(action);
    }
    report
}

/// Log a failed command at the level its error calls for, then print the
/// user-facing report to stderr.
pub fn report_error(err: &anyhow::Error) {
    let detail = format!("{:#}", err);
    match app_error(err) {
        Some(app) => {
            let code = app.error_code();
            let recoverable = app.is_recoverable();
            match app.log_level() {
                LogLevel::Debug => {
                    tracing::debug!(error_code = code, recoverable, error = %detail, "Command failed")
                }
                LogLevel::Warn => {
                    tracing::warn!(error_code = code, recoverable, error = %detail, "Command failed")
                }
                LogLevel::Error => {
                    tracing::error!(error_code = code, recoverable, error = %detail, "Command failed")
                }
            }
        }
        None => tracing::error!(error = %detail, "Command failed"),
    }

    eprintln!("{}", error_report(err));
}

pub fn status_label(status: UploadStatus) -> &'static str {
    match status {
        UploadStatus::Pending => "uploading",
        UploadStatus::Succeeded => "uploaded",
        UploadStatus::RemoteRejected => "failed",
        UploadStatus::SizeRejected => "too large",
    }
}

/// One line per attachment: kind, size, status and (shortened) name.
pub fn status_line(entry: &UploadSnapshot) -> String {
    format!(
        "{:<8} {:>9}  {:<10} {}",
        entry.record.kind.as_str(),
        format_file_size(entry.record.byte_size),
        status_label(entry.status),
        short_file_name(&entry.record.name, NAME_WIDTH)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use parcel_core::{FileRecord, SelectedFile};
    use std::sync::Arc;

    fn snapshot(name: &str, status: UploadStatus) -> UploadSnapshot {
        UploadSnapshot {
            record: Arc::new(FileRecord::prepare(SelectedFile::new(name, vec![0u8; 2048]))),
            status,
            final_url: String::new(),
            attempts: 1,
        }
    }

    #[test]
    fn status_line_shows_kind_and_status() {
        let line = status_line(&snapshot("photo.png", UploadStatus::Succeeded));
        assert!(line.starts_with("image"));
        assert!(line.contains("uploaded"));
        assert!(line.ends_with("photo.png"));
    }

    #[test]
    fn status_line_shortens_long_names() {
        let name = format!("{}.pdf", "x".repeat(80));
        let line = status_line(&snapshot(&name, UploadStatus::RemoteRejected));
        assert!(line.contains("failed"));
        assert!(!line.contains(&name));
    }

    #[test]
    fn error_report_uses_client_message_and_hint() {
        let err = anyhow::Error::from(AppError::Config(
            "MAX_FILE_SIZE_MB is too large: 17592186044416".to_string(),
        ))
        .context("Failed to load configuration");

        let report = error_report(&err);
        assert_eq!(
            report,
            "error: Failed to load configuration: MAX_FILE_SIZE_MB is too large: 17592186044416\n  hint: Check environment variables"
        );
    }

    #[test]
    fn error_report_hides_storage_details() {
        let err = anyhow::Error::from(AppError::Storage("connection refused 10.0.0.4".to_string()));

        let report = error_report(&err);
        assert!(report.starts_with("error: Failed to reach file storage"));
        assert!(report.contains("hint: Retry after a short delay"));
        assert!(!report.contains("10.0.0.4"));
    }

    #[test]
    fn error_report_falls_back_to_chain() {
        let err = anyhow::anyhow!("connection reset").context("Failed to send message");
        assert_eq!(
            error_report(&err),
            "error: Failed to send message: connection reset"
        );
    }

    #[test]
    fn size_rejection_label() {
        assert_eq!(status_label(UploadStatus::SizeRejected), "too large");
    }
}
