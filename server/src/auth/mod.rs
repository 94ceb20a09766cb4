//! Identity Resolution
//!
//! Binds each socket connection to an authenticated user before any hub
//! event is processed. Hub handlers trust only this binding, never
//! client-supplied user fields.

pub mod error;
pub mod jwt;

pub use error::{AuthError, AuthResult};

/// Authenticated identity bound to a connection at upgrade time.
#[derive(Debug, Clone)]
pub struct Identity {
    /// User ID (the token's subject).
    pub user_id: String,
    /// Display name carried in the token claims.
    pub display_name: String,
}

/// Resolve the identity asserted by a bearer token.
///
/// User IDs are whitespace-trimmed on ingress; comparisons elsewhere are
/// case-preserving.
pub fn resolve_identity(token: &str, secret: &str) -> AuthResult<Identity> {
    let claims = jwt::validate_access_token(token, secret)?;
    Ok(Identity {
        user_id: claims.sub.trim().to_string(),
        display_name: claims.name,
    })
}
