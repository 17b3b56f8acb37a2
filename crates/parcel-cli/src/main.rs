//! Parcel CLI: attach files to a chat message, upload them and send it.
//!
//! Set PARCEL_API_KEY and PARCEL_API_URL (or API_URL). Uses X-API-Key auth.
//! With STORAGE_BACKEND=local and `--dry-run` no backend is needed.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use parcel_api_client::ApiClient;
use parcel_cli::{init_tracing, report_error, status_line};
use parcel_core::validation::{format_file_size, validate_file_size};
use parcel_core::{AppError, Config, OutgoingMessage, SelectedFile, UploadStatus};
use parcel_storage::{create_storage, CredentialIssuer};
use parcel_upload::{
    initial_status, intake, ComposeSession, SendTransport, SubmitError, UploadRegistry,
};

#[derive(Parser)]
#[command(name = "parcel", about = "Attach files to a chat message and send it")]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload files and send them with a message
    Send {
        /// Message text
        #[arg(long, default_value = "")]
        text: String,
        /// Retry failed uploads up to this many times
        #[arg(long, default_value = "0")]
        retries: u32,
        /// Print the composed payload instead of sending it
        #[arg(long)]
        dry_run: bool,
        /// Files to attach
        files: Vec<PathBuf>,
    },
    /// Show how files would be accepted, without uploading
    Check {
        /// Files to inspect
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

/// Prints the payload to stdout instead of posting it.
struct PrintTransport;

#[async_trait]
impl SendTransport for PrintTransport {
    async fn send_message(&self, message: &OutgoingMessage) -> Result<()> {
        let out = serde_json::to_string_pretty(message).map_err(AppError::from)?;
        println!("{}", out);
        Ok(())
    }
}

async fn read_files(paths: &[PathBuf]) -> Result<Vec<SelectedFile>> {
    futures::future::try_join_all(paths.iter().map(|path| async move {
        SelectedFile::from_path(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))
    }))
    .await
}

fn check(config: &Config, files: Vec<SelectedFile>) {
    let upload = config.upload();
    let total = files.len();
    let records = intake(files, Vec::new(), upload.max_attachments);

    for record in records.iter().take(upload.max_attachments) {
        let status = initial_status(record, upload.max_file_size_bytes);
        let note = match validate_file_size(record.byte_size, upload.max_file_size_bytes) {
            Ok(()) => String::new(),
            Err(e) => format!("  ({})", e),
        };
        println!(
            "{:<8} {:>9}  {:<14} {}{}",
            record.kind.as_str(),
            format_file_size(record.byte_size),
            status.as_str(),
            record.name,
            note
        );
    }

    if total > upload.max_attachments {
        println!(
            "{} file(s) over the limit of {} would be dropped",
            total - upload.max_attachments,
            upload.max_attachments
        );
    }
}

async fn send(
    config: &Config,
    text: String,
    retries: u32,
    dry_run: bool,
    files: Vec<SelectedFile>,
) -> Result<()> {
    let backends = create_storage(config)
        .await
        .map_err(AppError::from)
        .context("Failed to initialize storage backend")?;

    let api = if backends.issuer.is_none() || !dry_run {
        let client = ApiClient::from_config(config)
            .map_err(|e| AppError::Config(format!("{:#}", e)))
            .context(
                "Failed to create API client. Set PARCEL_API_KEY and PARCEL_API_URL (or API_URL)",
            )?;
        Some(Arc::new(client))
    } else {
        None
    };

    let issuer: Arc<dyn CredentialIssuer> = match (&backends.issuer, &api) {
        (Some(issuer), _) => issuer.clone(),
        (None, Some(api)) => api.clone(),
        (None, None) => anyhow::bail!("No credential issuer available"),
    };
    let transport: Arc<dyn SendTransport> = match (&api, dry_run) {
        (Some(api), false) => api.clone(),
        _ => Arc::new(PrintTransport),
    };

    let registry = UploadRegistry::new(config.upload().clone(), issuer, backends.transfer);
    let mut session = ComposeSession::new(registry, transport);
    session.set_text(text);

    let requested = files.len();
    let added = session.attach(files, Vec::new());
    if added.len() < requested {
        tracing::warn!(
            requested,
            added = added.len(),
            "Some files were dropped: attachment limit reached"
        );
    }

    session.registry().wait_settled().await;

    for round in 1..=retries {
        let failed: Vec<String> = session
            .attachments()
            .iter()
            .filter(|e| e.status == UploadStatus::RemoteRejected)
            .map(|e| e.id().to_string())
            .collect();
        if failed.is_empty() {
            break;
        }

        tracing::info!(round, failed = failed.len(), "Retrying failed uploads");
        for id in &failed {
            session.retry(id);
        }
        session.registry().wait_settled().await;
    }

    for entry in session.attachments() {
        eprintln!("{}", status_line(&entry));
    }

    match session.submit().await {
        Ok(message) => {
            if !dry_run {
                let count = message.attachments.as_ref().map_or(0, Vec::len);
                eprintln!("Sent message with {} attachment(s)", count);
            }
            Ok(())
        }
        Err(SubmitError::Unresolved { id, status }) => {
            let name = session
                .registry()
                .get(&id)
                .map(|e| e.record.name.clone())
                .unwrap_or(id);
            Err(AppError::InvalidInput(format!(
                "{} was not uploaded ({}); remove or retry it before sending",
                name, status
            ))
            .into())
        }
        Err(SubmitError::Transport(e)) => Err(AppError::Transport(format!("{:#}", e)).into()),
        Err(e @ (SubmitError::Empty | SubmitError::TextTooLong { .. })) => {
            Err(AppError::InvalidInput(e.to_string()).into())
        }
        Err(e) => Err(AppError::Internal(e.to_string()).into()),
    }
}

fn load_config() -> Result<Config, AppError> {
    let config = Config::from_env().map_err(|e| AppError::Config(format!("{:#}", e)))?;
    config
        .validate()
        .map_err(|e| AppError::Config(format!("{:#}", e)))?;
    Ok(config)
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config().context("Failed to load configuration")?;

    match cli.command {
        Commands::Send {
            text,
            retries,
            dry_run,
            files,
        } => {
            let files = read_files(&files).await?;
            send(&config, text, retries, dry_run, files).await?;
        }
        Commands::Check { files } => {
            let files = read_files(&files).await?;
            check(&config, files);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e);
            ExitCode::FAILURE
        }
    }
}
