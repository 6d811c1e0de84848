use jsonwebtoken::DecodingKey;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::{AuthError, AuthResult};

/// Downloads the issuer's published signing keys (RFC 7517 key set).
#[derive(Clone)]
pub struct JwksFetcher {
    client: Client,
    url: String,
}

impl JwksFetcher {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn fetch(&self) -> AuthResult<Vec<(String, DecodingKey)>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|err| AuthError::JwksFetch(err.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::JwksFetch(format!(
                "HTTP {} from {}",
                response.status(),
                self.url
            )));
        }

        let body: JwksResponse = response
            .json()
            .await
            .map_err(|err| AuthError::JwksDecode(err.to_string()))?;

        parse_keys(body.keys)
    }
}

fn parse_keys(entries: Vec<JwkEntry>) -> AuthResult<Vec<(String, DecodingKey)>> {
    let mut keys = Vec::new();
    for key in entries.into_iter() {
        let kid = key.kid.ok_or(AuthError::JwksMissingKid)?;
        if matches!(key.key_use.as_deref(), Some(usage) if usage != "sig") {
            debug!(kid, "skipping non-signing JWKS key");
            continue;
        }

        let kty = key.kty.unwrap_or_else(|| "RSA".to_string());
        if kty != "RSA" {
            return Err(AuthError::JwksUnsupportedKey { kid, kty });
        }

        if let Some(alg) = key.alg {
            if alg != "RS256" {
                return Err(AuthError::JwksUnsupportedAlg { kid, alg });
            }
        }

        let modulus = key
            .n
            .ok_or_else(|| AuthError::JwksMissingComponents(kid.clone()))?;
        let exponent = key
            .e
            .ok_or_else(|| AuthError::JwksMissingComponents(kid.clone()))?;

        let decoding_key = DecodingKey::from_rsa_components(&modulus, &exponent)
            .map_err(|err| AuthError::KeyParse(kid.clone(), err.to_string()))?;
        keys.push((kid, decoding_key));
    }

    Ok(keys)
}

#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<JwkEntry>,
}

#[derive(Debug, Deserialize)]
struct JwkEntry {
    kid: Option<String>,
    kty: Option<String>,
    alg: Option<String>,
    #[serde(rename = "use")]
    key_use: Option<String>,
    n: Option<String>,
    e: Option<String>,
}
