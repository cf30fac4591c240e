//! Caller identity from a Bearer token or the `X-User-Id` header (dev mode).

use axum::{extract::FromRequestParts, http::request::Parts};
use mangashelf_core::UserId;

use crate::auth::validate_token;
use crate::error::ApiError;
use crate::state::AppState;

/// Header accepted as identity when `ALLOW_DEV_IDENTITY` is set.
pub const DEV_IDENTITY_HEADER: &str = "X-User-Id";

/// The authenticated caller.
///
/// Priority:
/// 1. `Authorization: Bearer <jwt>`, the `sub` claim is the user id.
/// 2. `X-User-Id`, only if `allow_dev_identity` is true in config.
/// 3. Otherwise `Unauthorized`.
///
/// Admin rights are not carried here; admin-only services check them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
}

impl FromRequestParts<AppState> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let config = state.config();

        if let Some(auth_header) = parts.headers.get("Authorization") {
            let auth_str = auth_header.to_str().map_err(|_| {
                ApiError::Unauthorized("Authorization header contains invalid characters".into())
            })?;

            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                let claims = validate_token(token.trim(), &config.jwt_secret)?;
                return Ok(Identity {
                    user_id: UserId::from(claims.sub),
                });
            }
        }

        if config.allow_dev_identity {
            return identity_from_dev_header(parts);
        }

        Err(ApiError::Unauthorized(
            "Missing Authorization: Bearer <jwt> header".into(),
        ))
    }
}

fn identity_from_dev_header(parts: &Parts) -> Result<Identity, ApiError> {
    let header_value = parts.headers.get(DEV_IDENTITY_HEADER).ok_or_else(|| {
        ApiError::Unauthorized(format!("Missing {DEV_IDENTITY_HEADER} header"))
    })?;

    let user_id = header_value
        .to_str()
        .map_err(|_| {
            ApiError::BadRequest(format!("{DEV_IDENTITY_HEADER} header contains invalid characters"))
        })?
        .trim();
    if user_id.is_empty() {
        return Err(ApiError::BadRequest(format!("{DEV_IDENTITY_HEADER} header is empty")));
    }

    tracing::debug!(user_id = %user_id, "Using dev identity");
    Ok(Identity {
        user_id: UserId::from(user_id),
    })
}
