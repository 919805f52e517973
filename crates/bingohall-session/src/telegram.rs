//! Telegram Web App init-data verification.
//!
//! A Mini App receives `initData` from Telegram as a URL-encoded query
//! string, e.g.
//!
//! ```text
//! query_id=AAH...&user=%7B%22id%22%3A42%2C%22first_name%22%3A%22Ada%22%7D&auth_date=1700000000&hash=9f1c...
//! ```
//!
//! The client forwards it verbatim as its `hello` token. To check it:
//!
//! 1. decode the pairs and take out `hash`,
//! 2. sort the rest by key and join them as `key=value` lines,
//! 3. HMAC-SHA256 that string with a secret derived from the bot token,
//! 4. compare against `hash` in constant time.
//!
//! The player's id and name come from the `user` JSON field.

use std::collections::BTreeMap;

use bingohall_protocol::PlayerId;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use url::form_urlencoded;

use crate::{Authenticator, Identity, SessionError};

type HmacSha256 = Hmac<Sha256>;

/// How the HMAC key is derived from the bot token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecretDerivation {
    /// `SHA256(bot_token)`.
    #[default]
    Sha256Token,
    /// `HMAC_SHA256(key = "WebAppData", msg = bot_token)`, as in Telegram's
    /// Web App documentation.
    WebAppData,
}

/// Verifies Telegram init data against a bot token.
#[derive(Clone)]
pub struct TelegramAuthenticator {
    secret: Vec<u8>,
}

impl std::fmt::Debug for TelegramAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramAuthenticator").finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct TelegramUser {
    id: u64,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    username: Option<String>,
}

impl TelegramAuthenticator {
    pub fn new(bot_token: &str) -> Self {
        Self::with_derivation(bot_token, SecretDerivation::default())
    }

    pub fn with_derivation(bot_token: &str, derivation: SecretDerivation) -> Self {
        let secret = match derivation {
            SecretDerivation::Sha256Token => Sha256::digest(bot_token.as_bytes()).to_vec(),
            SecretDerivation::WebAppData => {
                let mut mac = new_mac(b"WebAppData");
                mac.update(bot_token.as_bytes());
                mac.finalize().into_bytes().to_vec()
            }
        };
        Self { secret }
    }

    /// Checks the signature and extracts the identity.
    ///
    /// # Errors
    /// - [`SessionError::MalformedToken`] for a non-hex hash or an
    ///   unreadable `user` field.
    /// - [`SessionError::MissingField`] if `hash` or `user` is absent.
    /// - [`SessionError::InvalidSignature`] if the hash does not match.
    pub fn verify(&self, init_data: &str) -> Result<Identity, SessionError> {
        let mut fields = parse_query(init_data);
        let hash = fields.remove("hash").ok_or(SessionError::MissingField("hash"))?;
        let expected = hex::decode(hash.trim())
            .map_err(|e| SessionError::MalformedToken(format!("hash: {e}")))?;

        let data_check_string = fields
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("\n");

        let mut mac = new_mac(&self.secret);
        mac.update(data_check_string.as_bytes());
        mac.verify_slice(&expected)
            .map_err(|_| SessionError::InvalidSignature)?;

        let user = fields.get("user").ok_or(SessionError::MissingField("user"))?;
        let user: TelegramUser = serde_json::from_str(user)
            .map_err(|e| SessionError::MalformedToken(format!("user: {e}")))?;

        Ok(Identity {
            player_id: PlayerId(user.id),
            name: display_name(&user),
        })
    }
}

impl Authenticator for TelegramAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<Identity, SessionError> {
        self.verify(token)
    }
}

fn new_mac(key: &[u8]) -> HmacSha256 {
    HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length")
}

fn display_name(user: &TelegramUser) -> String {
    let full = match &user.last_name {
        Some(last) if !last.is_empty() => format!("{} {last}", user.first_name),
        _ => user.first_name.clone(),
    };
    if full.trim().is_empty() {
        user.username.clone().unwrap_or_default()
    } else {
        full
    }
}

/// Splits `a=1&b=2` into a key-sorted map. Later duplicates win.
fn parse_query(query: &str) -> BTreeMap<String, String> {
    form_urlencoded::parse(query.as_bytes()).into_owned().collect()
}

// =========================================================================
// Tests
// =========================================================================
