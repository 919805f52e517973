//! Turning a `hello` token into a player identity.
//!
//! The server calls an [`Authenticator`] exactly once per connection,
//! during the handshake. Whatever identity comes back is the only player
//! that connection may act for afterwards.

use bingohall_protocol::PlayerId;

use crate::SessionError;

/// Who a verified connection belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub player_id: PlayerId,
    /// Display name; may be empty.
    pub name: String,
}

/// Validates a client's token and returns their identity.
pub trait Authenticator: Send + Sync + 'static {
    /// # Errors
    /// Any [`SessionError`]; the handler answers with `error{401}` and
    /// closes the connection.
    fn authenticate(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<Identity, SessionError>> + Send;
}

/// Trusts the token: `"<id>"` or `"<id>:<name>"`.
///
/// For local development and tests only.
#[derive(Debug, Clone, Copy, Default)]
pub struct DevAuthenticator;

impl Authenticator for DevAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<Identity, SessionError> {
        let (id, name) = token.split_once(':').unwrap_or((token, ""));
        let id: u64 = id.trim().parse().map_err(|_| {
            SessionError::MalformedToken(format!("{id:?} is not a player id"))
        })?;
        Ok(Identity {
            player_id: PlayerId(id),
            name: name.to_string(),
        })
    }
}
