//! Outgoing email.

mod mailer;
mod message;
mod smtp;

pub use mailer::{send_email, DeliveryMode, LogMailer, MailError, Mailer, MemoryMailer, OutboxMailer};
pub use message::{Attachment, EmailMessage};
pub use smtp::SmtpMailer;

use crate::config::MailSettings;
use std::sync::Arc;
use tracing::info;

/// Picks the mailer for the configured delivery method. An SMTP relay wins
/// over an outbox directory, and with neither mail is only logged.
pub fn create_mailer(settings: &MailSettings) -> Result<Arc<dyn Mailer>, MailError> {
    if let Some(smtp) = &settings.smtp {
        info!("Sending mail through SMTP relay {}:{}", smtp.server, smtp.port);
        return Ok(Arc::new(SmtpMailer::new(smtp)?));
    }
    match &settings.outbox_dir {
        Some(dir) => {
            info!("Writing mail to outbox {:?}", dir);
            Ok(Arc::new(OutboxMailer::new(dir)?))
        }
        None => Ok(Arc::new(LogMailer)),
    }
}
