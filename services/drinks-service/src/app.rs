use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::{FromRef, Request};
use axum::http::header::{ACCEPT, ALLOW, AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post};
use axum::Router;
use common_auth::{require_permission, JwtConfig, JwtVerifier, PermissionGate};
use common_http_errors::{ApiError, ERROR_CODE_HEADER};
use tokio::time::{interval, MissedTickBehavior};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::config::{AllowedOrigins, AuthSettings};
use crate::drink_handlers::{
    create_drink, delete_drink, list_drinks, list_drinks_detail, update_drink,
    PERM_DELETE_DRINKS, PERM_GET_DRINKS_DETAIL, PERM_PATCH_DRINKS, PERM_POST_DRINKS,
};
use crate::metrics::{http_error_metrics, metrics_handler};
use crate::store::MenuStore;

/// Shared application state; the store is injected at startup.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MenuStore>,
    pub jwt_verifier: Arc<JwtVerifier>,
}

impl AppState {
    pub fn new(store: Arc<dyn MenuStore>, jwt_verifier: Arc<JwtVerifier>) -> Self {
        Self { store, jwt_verifier }
    }
}

impl FromRef<AppState> for Arc<JwtVerifier> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt_verifier.clone()
    }
}

pub async fn health() -> &'static str {
    "ok"
}

async fn not_found() -> ApiError {
    ApiError::NotFound { code: "not_found" }
}

/// Gives axum's bare 405 responses the standard error envelope.
async fn method_not_allowed_envelope(req: Request, next: Next) -> Response {
    let resp = next.run(req).await;
    if resp.status() == StatusCode::METHOD_NOT_ALLOWED
        && !resp.headers().contains_key(ERROR_CODE_HEADER)
    {
        let allow = resp.headers().get(ALLOW).cloned();
        let mut normalized = ApiError::MethodNotAllowed.into_response();
        if let Some(allow) = allow {
            normalized.headers_mut().insert(ALLOW, allow);
        }
        return normalized;
    }
    resp
}

pub fn cors_layer(origins: &AllowedOrigins) -> CorsLayer {
    let allow_origin = match origins {
        AllowedOrigins::Any => AllowOrigin::from(Any),
        AllowedOrigins::List(list) => AllowOrigin::list(
            list.iter().filter_map(|o| o.parse::<HeaderValue>().ok()).collect::<Vec<_>>(),
        ),
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers([ACCEPT, CONTENT_TYPE, AUTHORIZATION])
}

pub fn build_router(state: AppState, cors: CorsLayer) -> Router {
    let verifier = state.jwt_verifier.clone();
    let gate = |permission: &'static str| {
        let gate = PermissionGate::new(verifier.clone(), permission);
        middleware::from_fn_with_state(gate, require_permission)
    };

    Router::new()
        .route("/healthz", get(health))
        .route("/metrics", get(metrics_handler))
        .route(
            "/drinks",
            get(list_drinks).merge(post(create_drink).route_layer(gate(PERM_POST_DRINKS))),
        )
        .route(
            "/drinks-detail",
            get(list_drinks_detail).route_layer(gate(PERM_GET_DRINKS_DETAIL)),
        )
        .route(
            "/drinks/:id",
            patch(update_drink)
                .route_layer(gate(PERM_PATCH_DRINKS))
                .merge(delete(delete_drink).route_layer(gate(PERM_DELETE_DRINKS))),
        )
        .fallback(not_found)
        .with_state(state)
        .layer(middleware::from_fn(method_not_allowed_envelope))
        .layer(middleware::from_fn(http_error_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn build_jwt_verifier(settings: &AuthSettings) -> anyhow::Result<Arc<JwtVerifier>> {
    let mut config = JwtConfig::new(settings.issuer.clone(), settings.audience.clone());
    if let Some(leeway) = settings.leeway_seconds {
        config = config.with_leeway(leeway);
    }
    let mut builder = JwtVerifier::builder(config);
    if let Some(url) = &settings.jwks_url {
        info!(jwks_url = %url, "Configuring JWKS fetcher");
        builder = builder.with_jwks_url(url.clone());
    }
    if let Some(pem) = &settings.dev_public_key_pem {
        warn!("Using JWT_DEV_PUBLIC_KEY_PEM for verification; do not enable in production");
        builder = builder
            .with_rsa_pem("local-dev", pem.as_bytes())
            .context("JWT_DEV_PUBLIC_KEY_PEM is not a valid RSA public key")?;
    }
    let verifier = builder.build().await.context("failed to load signing keys")?;
    info!(keys = verifier.keys().len(), "JWT verifier initialised");
    Ok(Arc::new(verifier))
}

/// Refresh the cached signing keys every `every`; failures keep the previous set.
pub fn spawn_jwks_refresh(verifier: Arc<JwtVerifier>, every: Duration) {
    let Some(fetcher) = verifier.jwks_fetcher() else {
        return;
    };
    let url = fetcher.url().to_owned();
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately and the builder already loaded keys
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match verifier.refresh_jwks().await {
                Ok(count) => {
                    debug!(count, jwks_url = %url, "Refreshed JWKS keys");
                }
                Err(err) => {
                    warn!(error = %err, jwks_url = %url, "Failed to refresh JWKS keys");
                }
            }
        }
    });
}
