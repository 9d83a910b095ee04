use super::RequestsLoggingLevel;
use crate::config::{AppConfig, DEFAULT_MAIL_SENDER, DEFAULT_POSTS_PER_PAGE};

#[derive(Clone)]
pub struct ServerConfig {
    pub requests_logging_level: RequestsLoggingLevel,
    pub port: u16,
    pub frontend_dir_path: Option<String>,
    /// Default page size of post listings.
    pub posts_per_page: u32,
    /// Usernames allowed on the admin routes.
    pub admins: Vec<String>,
    /// Recipients of error reports. Empty disables them.
    pub admin_emails: Vec<String>,
    pub mail_sender: String,
}

impl ServerConfig {
    pub fn is_admin(&self, username: &str) -> bool {
        self.admins.iter().any(|admin| admin == username)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            requests_logging_level: RequestsLoggingLevel::Path,
            port: 5000,
            frontend_dir_path: None,
            posts_per_page: DEFAULT_POSTS_PER_PAGE,
            admins: Vec::new(),
            admin_emails: Vec::new(),
            mail_sender: DEFAULT_MAIL_SENDER.to_string(),
        }
    }
}

impl From<&AppConfig> for ServerConfig {
    fn from(config: &AppConfig) -> Self {
        ServerConfig {
            requests_logging_level: config.logging_level.clone(),
            port: config.port,
            frontend_dir_path: config.frontend_dir_path.clone(),
            posts_per_page: config.posts_per_page,
            admins: config.admins.clone(),
            admin_emails: config.mail.admin_emails.clone(),
            mail_sender: config.mail.sender.clone(),
        }
    }
}
