use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::claims::Claims;
use crate::config::JwtConfig;
use crate::error::{AuthError, AuthResult};
use crate::jwks::JwksFetcher;

/// Minimum spacing between JWKS fetches triggered by an unrecognised `kid`.
pub const DEFAULT_ROTATION_COOLDOWN: Duration = Duration::from_secs(30);

#[derive(Default)]
struct KeySet {
    fetched: HashMap<String, DecodingKey>,
    pinned: HashMap<String, DecodingKey>,
    refreshed_at: Option<Instant>,
}

/// Process-wide cache of issuer signing keys, keyed by `kid`.
///
/// A JWKS refresh swaps the fetched keys at once. Keys loaded from a PEM are
/// pinned and survive every swap.
#[derive(Clone, Default)]
pub struct SigningKeys {
    inner: Arc<RwLock<KeySet>>,
}

impl SigningKeys {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, KeySet> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, KeySet> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Cache a key until the next JWKS swap.
    pub fn insert_key(&self, kid: impl Into<String>, key: DecodingKey) {
        self.write().fetched.insert(kid.into(), key);
    }

    /// Pin a PEM-encoded RSA public key under `kid`.
    pub fn insert_rsa_pem(&self, kid: impl Into<String>, pem: &[u8]) -> AuthResult<()> {
        let kid = kid.into();
        let key = DecodingKey::from_rsa_pem(pem)
            .map_err(|err| AuthError::KeyParse(kid.clone(), err.to_string()))?;
        self.write().pinned.insert(kid, key);
        Ok(())
    }

    pub fn get(&self, kid: &str) -> Option<DecodingKey> {
        let guard = self.read();
        guard
            .fetched
            .get(kid)
            .or_else(|| guard.pinned.get(kid))
            .cloned()
    }

    pub fn contains(&self, kid: &str) -> bool {
        let guard = self.read();
        guard.fetched.contains_key(kid) || guard.pinned.contains_key(kid)
    }

    pub fn len(&self) -> usize {
        let guard = self.read();
        guard.fetched.len() + guard.pinned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Time since the last successful swap, `None` if the set was never fetched.
    pub fn age(&self) -> Option<Duration> {
        self.read().refreshed_at.map(|at| at.elapsed())
    }

    pub fn replace_all<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (String, DecodingKey)>,
    {
        let fetched: HashMap<_, _> = entries.into_iter().collect();
        let mut guard = self.write();
        guard.fetched = fetched;
        guard.refreshed_at = Some(Instant::now());
    }
}

/// Verifies RS256 bearer tokens against cached issuer keys and checks
/// `exp`, `iss` and `aud`.
#[derive(Clone)]
pub struct JwtVerifier {
    config: JwtConfig,
    keys: SigningKeys,
    jwks: Option<JwksFetcher>,
    rotation_cooldown: Duration,
    last_rotation_fetch: Arc<Mutex<Option<Instant>>>,
}

impl JwtVerifier {
    pub fn new(config: JwtConfig) -> Self {
        Self::with_keys(config, SigningKeys::new())
    }

    pub fn with_keys(config: JwtConfig, keys: SigningKeys) -> Self {
        Self {
            config,
            keys,
            jwks: None,
            rotation_cooldown: DEFAULT_ROTATION_COOLDOWN,
            last_rotation_fetch: Arc::default(),
        }
    }

    pub fn builder(config: JwtConfig) -> JwtVerifierBuilder {
        JwtVerifierBuilder::new(config)
    }

    pub fn keys(&self) -> &SigningKeys {
        &self.keys
    }

    pub fn jwks_fetcher(&self) -> Option<&JwksFetcher> {
        self.jwks.as_ref()
    }

    /// Verify against the cached keys only.
    pub fn verify(&self, token: &str) -> AuthResult<Claims> {
        let header =
            decode_header(token).map_err(|err| AuthError::InvalidHeader(err.to_string()))?;
        let kid = header.kid.ok_or(AuthError::MissingKeyId)?;
        let key = self
            .keys
            .get(&kid)
            .ok_or_else(|| AuthError::UnknownKeyId(kid.clone()))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[self.config.issuer.clone()]);
        validation.set_audience(&[self.config.audience.clone()]);
        validation.leeway = self.config.leeway_seconds.into();

        let token_data = decode::<Value>(token, &key, &validation)?;
        let claims = Claims::try_from(token_data.claims)?;
        debug!(
            kid,
            subject = %claims.subject,
            permissions = claims.permissions.len(),
            "verified JWT"
        );
        Ok(claims)
    }

    /// Verify a token, refetching the JWKS once when it names a key we have
    /// not seen. Issuers rotate keys ahead of the periodic refresh.
    pub async fn authenticate(&self, token: &str) -> AuthResult<Claims> {
        match self.verify(token) {
            Err(AuthError::UnknownKeyId(kid)) if self.claim_rotation_fetch() => {
                info!(kid = %kid, "unknown signing key; refreshing JWKS");
                if let Err(err) = self.refresh_jwks().await {
                    warn!(error = %err, "JWKS refresh for unknown key failed");
                    return Err(AuthError::UnknownKeyId(kid));
                }
                self.verify(token)
            }
            other => other,
        }
    }

    fn claim_rotation_fetch(&self) -> bool {
        if self.jwks.is_none() {
            return false;
        }
        let mut last = self
            .last_rotation_fetch
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match *last {
            Some(at) if at.elapsed() < self.rotation_cooldown => false,
            _ => {
                *last = Some(Instant::now());
                true
            }
        }
    }

    pub async fn refresh_jwks(&self) -> AuthResult<usize> {
        let Some(fetcher) = &self.jwks else {
            return Ok(0);
        };

        let keys = fetcher.fetch().await?;
        let count = keys.len();
        if count > 0 {
            self.keys.replace_all(keys);
        } else {
            warn!(
                jwks_url = %fetcher.url(),
                "JWKS response contained no signing keys; keeping cached set"
            );
        }
        Ok(count)
    }
}

pub struct JwtVerifierBuilder {
    config: JwtConfig,
    keys: SigningKeys,
    jwks: Option<JwksFetcher>,
    rotation_cooldown: Duration,
}

impl JwtVerifierBuilder {
    fn new(config: JwtConfig) -> Self {
        Self {
            config,
            keys: SigningKeys::new(),
            jwks: None,
            rotation_cooldown: DEFAULT_ROTATION_COOLDOWN,
        }
    }

    pub fn with_rsa_pem(self, kid: impl Into<String>, pem: &[u8]) -> AuthResult<Self> {
        self.keys.insert_rsa_pem(kid, pem)?;
        Ok(self)
    }

    pub fn with_jwks_url(self, url: impl Into<String>) -> Self {
        self.with_jwks_fetcher(JwksFetcher::new(url))
    }

    pub fn with_jwks_fetcher(mut self, fetcher: JwksFetcher) -> Self {
        self.jwks = Some(fetcher);
        self
    }

    pub fn with_rotation_cooldown(mut self, cooldown: Duration) -> Self {
        self.rotation_cooldown = cooldown;
        self
    }

    /// Build the verifier. With a JWKS source configured the first fetch
    /// happens here and its failure is fatal.
    pub async fn build(self) -> AuthResult<JwtVerifier> {
        let mut verifier = JwtVerifier::with_keys(self.config, self.keys);
        verifier.jwks = self.jwks;
        verifier.rotation_cooldown = self.rotation_cooldown;

        if verifier.jwks.is_some() {
            verifier.refresh_jwks().await?;
        }

        Ok(verifier)
    }
}
