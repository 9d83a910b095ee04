mod error_mail;
mod requests_logging;

pub use error_mail::{mail_internal_errors, ERROR_REPORT_SUBJECT};
pub use requests_logging::{log_requests, RequestsLoggingLevel};
