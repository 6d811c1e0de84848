use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header::AUTHORIZATION, request::Parts, HeaderMap, HeaderValue};

use crate::claims::Claims;
use crate::error::{AuthError, AuthResult};
use crate::verifier::JwtVerifier;

/// Verified caller identity. Produced by the permission gate or extracted
/// directly from the `Authorization` header.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub claims: Claims,
    pub token: String,
}

impl AuthContext {
    /// Verify the bearer token carried by `headers`.
    pub async fn from_headers(verifier: &JwtVerifier, headers: &HeaderMap) -> AuthResult<Self> {
        let header_value = headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthorization)?;

        let token = parse_bearer(header_value)?;
        let claims = verifier.authenticate(&token).await?;

        Ok(Self { claims, token })
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.claims.has_permission(permission)
    }

    pub fn subject(&self) -> &str {
        &self.claims.subject
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    Arc<JwtVerifier>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(existing) = parts.extensions.get::<AuthContext>() {
            return Ok(existing.clone());
        }

        let verifier = Arc::<JwtVerifier>::from_ref(state);
        AuthContext::from_headers(&verifier, &parts.headers).await
    }
}

/// Extract the token from a `Bearer <token>` header value.
pub fn parse_bearer(value: &HeaderValue) -> AuthResult<String> {
    let raw = value
        .to_str()
        .map_err(|_| AuthError::InvalidAuthorization)?
        .trim();

    let token = raw
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidAuthorization)?
        .trim();

    if token.is_empty() || token.contains(' ') {
        return Err(AuthError::InvalidAuthorization);
    }

    Ok(token.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;

    #[test]
    fn parse_bearer_accepts_valid_token() {
        let header = HeaderValue::from_static("Bearer abc.def.ghi");
        let token = parse_bearer(&header).expect("token");
        assert_eq!(token, "abc.def.ghi");
    }

    #[test]
    fn parse_bearer_rejects_wrong_scheme() {
        let header = HeaderValue::from_static("Basic credentials");
        let err = parse_bearer(&header).expect_err("should reject");
        assert!(matches!(err, AuthError::InvalidAuthorization));
    }

    #[test]
    fn parse_bearer_rejects_empty_value() {
        let header = HeaderValue::from_static("Bearer    ");
        let err = parse_bearer(&header).expect_err("should reject empty token");
        assert!(matches!(err, AuthError::InvalidAuthorization));
    }

    #[test]
    fn parse_bearer_rejects_extra_segments() {
        let header = HeaderValue::from_static("Bearer abc def");
        let err = parse_bearer(&header).expect_err("should reject two tokens");
        assert!(matches!(err, AuthError::InvalidAuthorization));
    }

    #[tokio::test]
    async fn missing_header_is_reported_before_verification() {
        let verifier = JwtVerifier::new(JwtConfig::new("issuer", "aud"));
        let err = AuthContext::from_headers(&verifier, &HeaderMap::new())
            .await
            .expect_err("no header");
        assert!(matches!(err, AuthError::MissingAuthorization));
    }
}
