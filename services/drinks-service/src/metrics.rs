use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use common_http_errors::ERROR_CODE_HEADER;
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

pub const SERVICE_NAME: &str = "drinks-service";

pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

pub static HTTP_ERRORS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let v = IntCounterVec::new(
        Opts::new("http_errors_total", "Count of HTTP error responses emitted (status >= 400)"),
        &["service", "code", "status"],
    )
    .expect("valid http_errors_total definition");
    REGISTRY.register(Box::new(v.clone())).ok();
    v
});

pub static DRINK_MUTATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let v = IntCounterVec::new(
        Opts::new("drink_mutations_total", "Successful menu writes by action"),
        &["action"],
    )
    .expect("valid drink_mutations_total definition");
    REGISTRY.register(Box::new(v.clone())).ok();
    v
});

pub fn record_mutation(action: &str) {
    DRINK_MUTATIONS_TOTAL.with_label_values(&[action]).inc();
}

pub async fn http_error_metrics(req: Request, next: Next) -> Response {
    let resp = next.run(req).await;
    let status = resp.status();
    if status.as_u16() >= 400 {
        let code = resp
            .headers()
            .get(ERROR_CODE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown");
        HTTP_ERRORS_TOTAL
            .with_label_values(&[SERVICE_NAME, code, status.as_str()])
            .inc();
    }
    resp
}

pub async fn metrics_handler() -> (StatusCode, String) {
    // touch lazies so the families are present before the first event
    Lazy::force(&HTTP_ERRORS_TOTAL);
    Lazy::force(&DRINK_MUTATIONS_TOTAL);

    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buf) {
        return (StatusCode::INTERNAL_SERVER_ERROR, format!("metrics encode error: {e}"));
    }
    (StatusCode::OK, String::from_utf8_lossy(&buf).to_string())
}
