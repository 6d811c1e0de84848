#![allow(dead_code)]

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{header, Method, Request};
use axum::response::Response;
use axum::Router;
use chrono::{Duration, Utc};
use common_auth::{JwtConfig, JwtVerifier};
use drinks_service::app::{build_router, cors_layer, AppState};
use drinks_service::config::AllowedOrigins;
use drinks_service::store::InMemoryMenuStore;
use http_body_util::BodyExt;
use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
use rsa::pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey, LineEnding};
use rsa::rand_core::OsRng;
use rsa::RsaPrivateKey;
use serde::Serialize;
use serde_json::Value;

pub const ISSUER: &str = "https://coffee-shop.test";
pub const AUDIENCE: &str = "drinks";
pub const KID: &str = "test-kid";

pub const BARISTA: &[&str] = &["get:drinks-detail"];
pub const MANAGER: &[&str] = &["get:drinks-detail", "post:drinks", "patch:drinks", "delete:drinks"];

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

fn keys() -> &'static Keys {
    static KEYS: OnceLock<Keys> = OnceLock::new();
    KEYS.get_or_init(|| {
        let private_key = RsaPrivateKey::new(&mut OsRng, 2048).expect("key generation");
        let private_pem = private_key.to_pkcs1_pem(LineEnding::LF).expect("private pem");
        let public_pem = private_key
            .to_public_key()
            .to_pkcs1_pem(LineEnding::LF)
            .expect("public pem");
        Keys {
            encoding: EncodingKey::from_rsa_pem(private_pem.as_bytes()).expect("encoding key"),
            decoding: DecodingKey::from_rsa_pem(public_pem.as_bytes()).expect("decoding key"),
        }
    })
}

#[derive(Serialize)]
struct TokenClaims<'a> {
    sub: &'a str,
    permissions: &'a [&'a str],
    iss: &'a str,
    aud: &'a str,
    exp: i64,
    iat: i64,
}

pub fn token(permissions: &[&str]) -> String {
    token_for(permissions, AUDIENCE, Duration::minutes(10))
}

/// Sign a token for `audience` that expires `lifetime` from now (negative
/// lifetimes produce an already expired token).
pub fn token_for(permissions: &[&str], audience: &str, lifetime: Duration) -> String {
    let now = Utc::now();
    let claims = TokenClaims {
        sub: "auth0|tester",
        permissions,
        iss: ISSUER,
        aud: audience,
        exp: (now + lifetime).timestamp(),
        iat: now.timestamp(),
    };
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(KID.to_string());
    encode(&header, &claims, &keys().encoding).expect("sign token")
}

pub fn verifier() -> Arc<JwtVerifier> {
    let verifier = JwtVerifier::new(JwtConfig::new(ISSUER, AUDIENCE));
    verifier.keys().insert_key(KID, keys().decoding.clone());
    Arc::new(verifier)
}

pub fn app() -> Router {
    let state = AppState::new(Arc::new(InMemoryMenuStore::new()), verifier());
    build_router(state, cors_layer(&AllowedOrigins::Any))
}

pub fn request(
    method: Method,
    uri: &str,
    bearer: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

pub async fn body_text(response: Response) -> String {
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf8 body")
}
