//! Error types for the session layer.

/// Errors from authenticating a `hello` token.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The token could not be parsed at all.
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// A field the authenticator needs is absent.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// The signature did not match.
    #[error("invalid signature")]
    InvalidSignature,

    #[error("authentication failed: {0}")]
    AuthFailed(String),
}
