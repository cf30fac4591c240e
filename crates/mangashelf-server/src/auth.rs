//! Bearer token issuing and validation (HS256).

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use mangashelf_core::UserId;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// JWT claims.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// User id.
    pub sub: String,
    /// Expiration time (unix timestamp).
    pub exp: usize,
    /// Issued at (unix timestamp).
    pub iat: usize,
}

/// Create a token for a user, valid for `expiry_hours`.
pub fn create_token(user_id: &UserId, secret: &str, expiry_hours: i64) -> Result<String, ApiError> {
    let now = chrono::Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (now + chrono::Duration::hours(expiry_hours)).timestamp() as usize,
        iat: now.timestamp() as usize,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("Failed to create token: {e}")))
}

/// Validate a token and return its claims.
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, ApiError> {
    if secret.is_empty() {
        return Err(ApiError::Unauthorized(
            "bearer tokens are not accepted by this server".to_string(),
        ));
    }

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        tracing::debug!(error = %e, "JWT validation failed");
        ApiError::Unauthorized(format!("Invalid token: {e}"))
    })?;

    if token_data.claims.sub.trim().is_empty() {
        return Err(ApiError::Unauthorized("token has an empty subject".to_string()));
    }
    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_validate_token() {
        let secret = "test_secret_key_12345";
        let token = create_token(&UserId::from("reader-1"), secret, 24).unwrap();
        let claims = validate_token(&token, secret).unwrap();
        assert_eq!(claims.sub, "reader-1");
    }

    #[test]
    fn test_validate_token_wrong_secret() {
        let token = create_token(&UserId::from("reader-1"), "secret1", 24).unwrap();
        assert!(validate_token(&token, "secret2").is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = create_token(&UserId::from("reader-1"), "secret", -2).unwrap();
        assert!(validate_token(&token, "secret").is_err());
    }

    #[test]
    fn test_no_secret_rejects_everything() {
        let token = create_token(&UserId::from("reader-1"), "secret", 1).unwrap();
        assert!(matches!(
            validate_token(&token, ""),
            Err(ApiError::Unauthorized(_))
        ));
    }
}
