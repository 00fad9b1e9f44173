//! Bearer token issue and verification
//!
//! Tokens are HS256 JWTs whose subject is the user id. The auth middleware
//! in `lib.rs` verifies them and stores an [`AuthUser`] in the request
//! extensions for handlers to pick up.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use tally_core::models::UserId;

/// Default token lifetime
pub const DEFAULT_TOKEN_TTL_DAYS: i64 = 7;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub iat: u64,
    pub exp: u64,
}

/// The caller identified by a valid bearer token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: UserId,
}

/// Issue a token for `user` valid for `ttl_days`
pub fn issue_token(user: &UserId, secret: &str, ttl_days: i64) -> anyhow::Result<String> {
    let iat = jsonwebtoken::get_current_timestamp();
    let ttl_secs = u64::try_from(ttl_days.max(1) * 24 * 60 * 60)?;
    let claims = Claims {
        sub: user.as_str().to_string(),
        iat,
        exp: iat + ttl_secs,
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

/// Verify signature and expiry, returning the claims
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let validation = Validation::new(Algorithm::HS256);
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(data.claims)
}

/// Pull the token out of an `Authorization: Bearer <token>` header value
pub fn bearer_token(header_value: &str) -> Option<&str> {
    header_value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
