//! API key authentication
//!
//! With `server.auth.enabled`, every call endpoint requires
//! `Authorization: Bearer <server.auth.api_key>`. Paths under
//! `server.auth.public_paths` (health, readiness and metrics by default)
//! stay open.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use cold_call_config::Settings;

use crate::state::AppState;
use crate::ServerError;

/// Key a request to `path` must present, if any
fn required_key(settings: &Settings, path: &str) -> Result<Option<String>, ServerError> {
    let auth = &settings.server.auth;
    if !auth.enabled || auth.public_paths.iter().any(|p| path.starts_with(p.as_str())) {
        return Ok(None);
    }

    match auth.api_key.as_deref() {
        Some(key) if !key.is_empty() => Ok(Some(key.to_string())),
        _ => Err(ServerError::Internal(
            "auth is enabled but no API key is configured".to_string(),
        )),
    }
}

/// Token from `Authorization: Bearer <token>`; `None` without the header
fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, ServerError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|token| Some(token.trim()))
        .ok_or_else(|| {
            ServerError::InvalidRequest(
                "Authorization header must be 'Bearer <api_key>'".to_string(),
            )
        })
}

/// Compares every byte so timing does not leak the matching prefix
fn keys_match(provided: &str, expected: &str) -> bool {
    provided.len() == expected.len()
        && provided
            .bytes()
            .zip(expected.bytes())
            .fold(0u8, |diff, (a, b)| diff | (a ^ b))
            == 0
}

/// Reject call requests without the configured API key
///
/// A malformed header is a 400, a missing or wrong key a 401.
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let path = request.uri().path();
    let expected = required_key(&state.config.read(), path)?;

    if let Some(expected) = expected {
        match bearer_token(request.headers())? {
            Some(token) if keys_match(token, &expected) => {}
            Some(_) => {
                tracing::warn!(
                    path = %path,
                    forwarded_for = ?request.headers().get("X-Forwarded-For"),
                    "Rejected request with wrong API key"
                );
                return Err(ServerError::Auth("Invalid API key".to_string()));
            }
            None => return Err(ServerError::Auth("Missing Authorization header".to_string())),
        }
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn secured() -> Settings {
        let mut settings = Settings::default();
        settings.server.auth.enabled = true;
        settings.server.auth.api_key = Some("secret".to_string());
        settings
    }

    #[test]
    fn test_keys_match() {
        assert!(keys_match("cc-key", "cc-key"));
        assert!(!keys_match("cc-key", "cc-ke"));
        assert!(!keys_match("cc-key", "cc-keY"));
    }

    #[test]
    fn test_required_key_by_path() {
        let settings = secured();
        assert_eq!(required_key(&settings, "/health").unwrap(), None);
        assert_eq!(
            required_key(&settings, "/call/turn").unwrap().as_deref(),
            Some("secret")
        );
        assert_eq!(required_key(&Settings::default(), "/call/turn").unwrap(), None);
    }

    #[test]
    fn test_enabled_without_key_is_internal_error() {
        let mut settings = secured();
        settings.server.auth.api_key = Some(String::new());
        assert!(matches!(
            required_key(&settings, "/call/start"),
            Err(ServerError::Internal(_))
        ));
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers).unwrap(), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc "));
        assert_eq!(bearer_token(&headers).unwrap(), Some("abc"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(matches!(
            bearer_token(&headers),
            Err(ServerError::InvalidRequest(_))
        ));
    }
}
