//! Credential handling: Argon2 password hashing and the JWT session
//! tokens handed out at signup/login.

use crate::config::Config;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Claims carried by a session token
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id (subject)
    pub sub: String,
    /// Username the token was issued for
    pub username: String,
    /// Expiry, unix seconds
    pub exp: i64,
    /// Issued at, unix seconds
    pub iat: i64,
}

/// Hash a password with Argon2 and a fresh random salt.
///
/// Rejects passwords under 8 characters before any hashing work.
pub fn hash_password(password: &str) -> Result<String, String> {
    if password.len() < 8 {
        return Err("Password must be at least 8 characters long".to_string());
    }

    let salt = SaltString::generate(&mut OsRng);

    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| format!("Failed to hash password: {}", e))?
        .to_string();

    Ok(password_hash)
}

/// Verify a password against a stored hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, String> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| format!("Failed to parse hash: {}", e))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Issue a session token for a user, signed with the configured secret
/// and expiring after the configured number of hours
pub fn encode_jwt(user_id: i64, username: String, config: &Config) -> Result<String, String> {
    let now = Utc::now();
    let exp = now + Duration::hours(config.jwt_expiration_hours);

    let claims = Claims {
        sub: user_id.to_string(),
        username,
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| format!("Failed to encode JWT: {}", e))
}

/// Decode and validate a session token, returning its claims
pub fn decode_jwt(token: &str, config: &Config) -> Result<Claims, String> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| format!("Failed to decode JWT: {}", e))?;

    Ok(token_data.claims)
}
