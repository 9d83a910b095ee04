//! SMTP delivery through a relay.

use super::mailer::{MailError, Mailer};
use super::message::EmailMessage;
use crate::config::SmtpSettings;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::info;

pub struct SmtpMailer {
    transport: SmtpTransport,
}

impl SmtpMailer {
    /// Builds the transport. No connection is made until the first send.
    pub fn new(settings: &SmtpSettings) -> Result<Self, MailError> {
        let builder = if settings.use_tls {
            SmtpTransport::starttls_relay(&settings.server)?
        } else {
            SmtpTransport::builder_dangerous(&settings.server)
        };
        let mut builder = builder.port(settings.port);
        if settings.username.is_some() || settings.password.is_some() {
            builder = builder.credentials(Credentials::new(
                settings.username.clone().unwrap_or_default(),
                settings.password.clone().unwrap_or_default(),
            ));
        }
        Ok(Self {
            transport: builder.build(),
        })
    }
}

impl Mailer for SmtpMailer {
    fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        let mime = to_mime(message)?;
        self.transport.send(&mime)?;
        info!(
            "Sent mail '{}' to {} recipient(s)",
            message.subject,
            message.recipients.len()
        );
        Ok(())
    }
}

/// Text and html alternatives, followed by the attachments.
fn to_mime(message: &EmailMessage) -> Result<Message, MailError> {
    if message.recipients.is_empty() {
        return Err(MailError::Rejected("no recipients".to_string()));
    }
    let mut builder = Message::builder()
        .from(message.sender.parse::<Mailbox>()?)
        .subject(message.subject.clone());
    for recipient in &message.recipients {
        builder = builder.to(recipient.parse::<Mailbox>()?);
    }

    let body = match &message.html_body {
        Some(html) => MultiPart::alternative_plain_html(message.text_body.clone(), html.clone()),
        None => MultiPart::alternative().singlepart(SinglePart::plain(message.text_body.clone())),
    };
    let mut content = MultiPart::mixed().multipart(body);
    for attachment in &message.attachments {
        let content_type = ContentType::parse(&attachment.content_type).map_err(|e| {
            MailError::Rejected(format!(
                "bad content type '{}': {}",
                attachment.content_type, e
            ))
        })?;
        content = content.singlepart(
            Attachment::new(attachment.filename.clone())
                .body(attachment.data.clone(), content_type),
        );
    }
    Ok(builder.multipart(content)?)
}
