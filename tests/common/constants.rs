//! Shared constants for end-to-end tests
//!
//! When seeded users or timeouts change, update only this file.

// ============================================================================
// Test Users
// ============================================================================

/// Regular test user
pub const TEST_USER: &str = "susan";
pub const TEST_USER_EMAIL: &str = "susan@example.com";

/// Second regular user, for follow and message tests
pub const OTHER_USER: &str = "miguel";
pub const OTHER_USER_EMAIL: &str = "miguel@example.com";

/// Listed in the server's `admins`
pub const ADMIN_USER: &str = "admin";
pub const ADMIN_USER_EMAIL: &str = "admin@example.com";

/// Sender address configured for task mail
pub const MAIL_SENDER: &str = "no-reply@microblog.test";

// ============================================================================
// Timeouts
// ============================================================================

/// Maximum time to wait for server to become ready
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Polling interval when waiting for server readiness
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 10;

/// Per-request timeout of the test client
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Maximum time to wait for a background task to finish
pub const TASK_TIMEOUT_MS: u64 = 5000;
