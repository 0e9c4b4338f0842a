use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use regex::Regex;
use tracing::error;

use super::dto::RegisterRequest;

pub const MIN_PASSWORD_LEN: usize = 8;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Normalizes the request in place and returns the first problem found.
pub fn validate_registration(req: &mut RegisterRequest) -> Result<(), &'static str> {
    req.email = normalize_email(&req.email);
    req.name = req.name.trim().to_string();
    req.veo3_api_key = req.veo3_api_key.trim().to_string();

    if req.name.is_empty() {
        return Err("Name is required");
    }
    if !is_valid_email(&req.email) {
        return Err("Invalid email");
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err("Password too short");
    }
    if req.password != req.confirm_password {
        return Err("Passwords do not match");
    }
    if req.veo3_api_key.is_empty() {
        return Err("VEO-3 API key is required");
    }
    Ok(())
}

/// Last four characters only, e.g. `••••a1b2`.
pub fn mask_api_key(key: &str) -> String {
    let tail: String = key
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("••••{}", tail)
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}
