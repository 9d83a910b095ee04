use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    #[serde(serialize_with = "serialize_base64")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailMessage {
    pub subject: String,
    pub sender: String,
    pub recipients: Vec<String>,
    pub text_body: String,
    pub html_body: Option<String>,
    pub attachments: Vec<Attachment>,
}

impl EmailMessage {
    pub fn new(subject: &str, sender: &str, recipients: Vec<String>, text_body: String) -> Self {
        Self {
            subject: subject.to_string(),
            sender: sender.to_string(),
            recipients,
            text_body,
            html_body: None,
            attachments: Vec::new(),
        }
    }

    pub fn with_html(mut self, html_body: String) -> Self {
        self.html_body = Some(html_body);
        self
    }

    pub fn attach(mut self, filename: &str, content_type: &str, data: Vec<u8>) -> Self {
        self.attachments.push(Attachment {
            filename: filename.to_string(),
            content_type: content_type.to_string(),
            data,
        });
        self
    }
}

fn serialize_base64<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(data))
}
