//! Authentication extractor for admin API routes.
//!
//! API callers present the configured token as `Authorization: Bearer <token>`.
//! Tokens are compared by SHA-256 digest so the comparison time does not
//! depend on how many leading bytes match.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};
use secrecy::ExposeSecret;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::state::AppState;

/// Header naming the admin acting through the API.
pub const ADMIN_USER_HEADER: &str = "x-admin-user";

/// Name recorded when no `X-Admin-User` header is sent.
const DEFAULT_ADMIN_NAME: &str = "admin";

/// Longest admin name recorded, in characters.
const MAX_ADMIN_NAME_LEN: usize = 64;

/// The admin making an authenticated request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentAdmin {
    /// Name recorded in `updated_by` columns.
    pub name: String,
}

/// Extractor that requires a valid API token.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAdminToken(admin): RequireAdminToken,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", admin.name)
/// }
/// ```
pub struct RequireAdminToken(pub CurrentAdmin);

/// Error returned when the API token is missing or wrong.
#[derive(Debug)]
pub enum AdminAuthRejection {
    /// No bearer token was sent.
    MissingToken,
    /// A token was sent but does not match.
    InvalidToken,
}

impl IntoResponse for AdminAuthRejection {
    fn into_response(self) -> Response {
        let message = match self {
            Self::MissingToken => "Missing bearer token",
            Self::InvalidToken => "Invalid bearer token",
        };
        (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, "Bearer")],
            message,
        )
            .into_response()
    }
}

impl FromRequestParts<AppState> for RequireAdminToken {
    type Rejection = AdminAuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let presented = bearer_token(&parts.headers).ok_or(AdminAuthRejection::MissingToken)?;
        let expected = state.config().api_token.expose_secret();

        if !tokens_match(presented, expected) {
            tracing::warn!(uri = %parts.uri, "Rejected API request with invalid token");
            return Err(AdminAuthRejection::InvalidToken);
        }

        Ok(Self(CurrentAdmin {
            name: admin_name(&parts.headers),
        }))
    }
}

/// Extract the token from an `Authorization: Bearer` header.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Compare two tokens by digest.
fn tokens_match(presented: &str, expected: &str) -> bool {
    Sha256::digest(presented.as_bytes()) == Sha256::digest(expected.as_bytes())
}

/// The acting admin's name from `X-Admin-User`, or the default.
fn admin_name(headers: &HeaderMap) -> String {
    headers
        .get(ADMIN_USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map_or_else(
            || DEFAULT_ADMIN_NAME.to_string(),
            |name| name.chars().take(MAX_ADMIN_NAME_LEN).collect(),
        )
}
