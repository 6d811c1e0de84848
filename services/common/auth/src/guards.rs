use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

use crate::error::{AuthError, AuthResult};
use crate::extractors::AuthContext;
use crate::verifier::JwtVerifier;

/// Requires a verified bearer token carrying one specific permission.
///
/// Attach to a route with
/// `axum::middleware::from_fn_with_state(gate, require_permission)`.
#[derive(Clone)]
pub struct PermissionGate {
    verifier: Arc<JwtVerifier>,
    permission: &'static str,
}

impl PermissionGate {
    pub fn new(verifier: Arc<JwtVerifier>, permission: &'static str) -> Self {
        Self { verifier, permission }
    }

    pub async fn check(&self, headers: &HeaderMap) -> AuthResult<AuthContext> {
        let auth = AuthContext::from_headers(&self.verifier, headers).await?;
        if !auth.has_permission(self.permission) {
            debug!(
                subject = %auth.subject(),
                permission = self.permission,
                "permission not granted"
            );
            return Err(AuthError::MissingPermission(self.permission.to_string()));
        }
        Ok(auth)
    }
}

/// Middleware body for [`PermissionGate`]. Rejects before the wrapped handler
/// runs; on success the [`AuthContext`] is available as a request extension.
pub async fn require_permission(
    State(gate): State<PermissionGate>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let (mut parts, body) = request.into_parts();
    let auth = gate.check(&parts.headers).await?;
    parts.extensions.insert(auth);
    Ok(next.run(Request::from_parts(parts, body)).await)
}
