//! Opaque API bearer tokens.
//!
//! Only the SHA-256 digest of a token is persisted; the raw value is shown
//! once, when it is issued.

use base64::{engine::general_purpose::STANDARD, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};

pub const TOKEN_LIFETIME_SECS: i64 = 3600;
const TOKEN_BYTES: usize = 24;

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ApiToken(pub String);

impl ApiToken {
    pub fn generate() -> ApiToken {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        ApiToken(STANDARD.encode(bytes))
    }

    pub fn hash(&self) -> String {
        hash_token(&self.0)
    }
}

pub fn hash_token(raw: &str) -> String {
    let digest = Sha256::digest(raw.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
