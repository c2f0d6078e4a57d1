//! Password hashing for the session login and admin user-management routes.

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use password_hash::{rand_core::OsRng, SaltString};

pub fn hash(password: &str) -> Result<String, gateway_core::AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| gateway_core::AppError::Internal(format!("password hashing failed: {e}")))
}

pub fn verify(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_round_trips() {
        let hashed = hash("correct horse battery staple").unwrap();
        assert!(verify("correct horse battery staple", &hashed));
        assert!(!verify("wrong password", &hashed));
    }
}
