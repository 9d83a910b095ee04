use super::message::EmailMessage;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("mail serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("message rejected: {0}")]
    Rejected(String),

    #[error("bad mail address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("could not build message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("smtp error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Delivers email. Implementations block until the message is handed off.
pub trait Mailer: Send + Sync {
    fn send(&self, message: &EmailMessage) -> Result<(), MailError>;
}

/// Logs the envelope and drops the message.
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        info!(
            "Mail from {} to {:?}: '{}' ({} attachment(s))",
            message.sender,
            message.recipients,
            message.subject,
            message.attachments.len()
        );
        Ok(())
    }
}

/// Writes each message as a JSON file into a pickup directory, where an
/// external relay collects it.
pub struct OutboxMailer {
    dir: PathBuf,
}

impl OutboxMailer {
    pub fn new(dir: &Path) -> Result<Self, MailError> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }
}

impl Mailer for OutboxMailer {
    fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        if message.recipients.is_empty() {
            return Err(MailError::Rejected("no recipients".to_string()));
        }
        // The relay only ever sees complete files
        let mut file = NamedTempFile::new_in(&self.dir)?;
        serde_json::to_writer_pretty(&mut file, message)?;
        file.flush()?;
        let target = self.dir.join(format!("{}.json", uuid::Uuid::new_v4()));
        file.persist(&target).map_err(|e| MailError::Io(e.error))?;
        info!("Queued mail '{}' at {:?}", message.subject, target);
        Ok(())
    }
}

/// Keeps sent messages in memory. Used by tests and local runs.
#[derive(Default, Clone)]
pub struct MemoryMailer {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

impl Mailer for MemoryMailer {
    fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Send on the calling thread and return the outcome.
    Sync,
    /// Send on a blocking worker. Failures are only logged.
    Detached,
}

pub fn send_email(
    mailer: Arc<dyn Mailer>,
    message: EmailMessage,
    mode: DeliveryMode,
) -> Result<(), MailError> {
    match mode {
        DeliveryMode::Sync => mailer.send(&message),
        DeliveryMode::Detached => {
            let job = move || {
                if let Err(e) = mailer.send(&message) {
                    error!("Detached mail '{}' failed: {}", message.subject, e);
                }
            };
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn_blocking(job);
                }
                Err(_) => {
                    std::thread::spawn(job);
                }
            }
            Ok(())
        }
    }
}
