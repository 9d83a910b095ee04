//! Seed data for the test database

use super::constants::*;
use anyhow::Result;
use microblog_server::store::Database;

/// A user created at startup, with a live API token.
#[derive(Debug, Clone)]
pub struct SeededUser {
    pub id: i64,
    pub username: String,
    pub token: String,
}

fn seed_user(db: &Database, username: &str, email: &str) -> Result<SeededUser> {
    let user = db.write(|tx| tx.insert_user(username, email))?;
    let token = db.issue_token(user.id)?;
    Ok(SeededUser {
        id: user.id,
        username: user.username,
        token: token.0,
    })
}

/// Creates the regular, other and admin users, in that order.
pub fn seed_users(db: &Database) -> Result<(SeededUser, SeededUser, SeededUser)> {
    Ok((
        seed_user(db, TEST_USER, TEST_USER_EMAIL)?,
        seed_user(db, OTHER_USER, OTHER_USER_EMAIL)?,
        seed_user(db, ADMIN_USER, ADMIN_USER_EMAIL)?,
    ))
}
