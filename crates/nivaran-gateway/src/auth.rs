use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use nivaran_types::api::Claims;

use crate::error::{GatewayError, GatewayResult};

pub const MIN_PASSWORD_LEN: usize = 6;

pub fn validate_credentials(email: &str, password: &str) -> GatewayResult<()> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(GatewayError::Rejected("invalid email address".into()));
    }
    validate_password(password)
}

pub fn validate_password(password: &str) -> GatewayResult<()> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(GatewayError::Rejected(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Argon2id hash in PHC string form.
pub fn hash_password(password: &str) -> GatewayResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| GatewayError::Unavailable(format!("password hashing failed: {}", e)))
}

pub fn verify_password(password: &str, stored_hash: &str) -> GatewayResult<()> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| GatewayError::Unavailable(format!("corrupt password hash: {}", e)))?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| GatewayError::Unauthorized("invalid email or password".into()))
}

pub fn create_token(secret: &str, user_id: Uuid, email: &str) -> GatewayResult<String> {
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| GatewayError::Unavailable(format!("token signing failed: {}", e)))
}

pub fn verify_token(secret: &str, token: &str) -> GatewayResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| GatewayError::Unauthorized("invalid or expired token".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("hunter22").unwrap();
        assert!(verify_password("hunter22", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong-one", &hash),
            Err(GatewayError::Unauthorized(_))
        ));
    }

    #[test]
    fn token_carries_subject() {
        let id = Uuid::new_v4();
        let token = create_token("secret", id, "a@b.org").unwrap();
        let claims = verify_token("secret", &token).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.email, "a@b.org");
        assert!(verify_token("other-secret", &token).is_err());
    }

    #[test]
    fn rejects_bad_credentials() {
        assert!(validate_credentials("not-an-email", "longenough").is_err());
        assert!(validate_credentials("a@b.org", "short").is_err());
        assert!(validate_credentials("a@b.org", "longenough").is_ok());
    }
}
