use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};
use crate::permissions::PermissionSet;

/// Application-focused representation of verified JWT claims.
#[derive(Debug, Clone, Serialize)]
pub struct Claims {
    pub subject: String,
    pub permissions: PermissionSet,
    pub expires_at: DateTime<Utc>,
    pub issued_at: Option<DateTime<Utc>>,
    pub issuer: String,
    pub audience: Vec<String>,
    pub raw: serde_json::Value,
}

impl Claims {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

#[derive(Debug, Deserialize)]
struct ClaimsRepr {
    sub: String,
    #[serde(default)]
    permissions: Option<Vec<String>>,
    exp: i64,
    #[serde(default)]
    iat: Option<i64>,
    iss: String,
    #[serde(default)]
    aud: Option<AudienceRepr>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AudienceRepr {
    Single(String),
    Many(Vec<String>),
}

impl TryFrom<ClaimsRepr> for Claims {
    type Error = AuthError;

    fn try_from(value: ClaimsRepr) -> AuthResult<Self> {
        if value.sub.trim().is_empty() {
            return Err(AuthError::InvalidClaim("sub", value.sub));
        }

        let expires_at = Utc
            .timestamp_opt(value.exp, 0)
            .single()
            .ok_or_else(|| AuthError::InvalidClaim("exp", value.exp.to_string()))?;

        let issued_at = match value.iat {
            Some(iat) => Some(
                Utc.timestamp_opt(iat, 0)
                    .single()
                    .ok_or_else(|| AuthError::InvalidClaim("iat", iat.to_string()))?,
            ),
            None => None,
        };

        let audience = match value.aud {
            Some(AudienceRepr::Single(item)) => vec![item],
            Some(AudienceRepr::Many(items)) => items,
            None => Vec::new(),
        };

        Ok(Self {
            subject: value.sub,
            permissions: value.permissions.unwrap_or_default().into_iter().collect(),
            expires_at,
            issued_at,
            issuer: value.iss,
            audience,
            raw: serde_json::Value::Null,
        })
    }
}

impl TryFrom<serde_json::Value> for Claims {
    type Error = AuthError;

    fn try_from(value: serde_json::Value) -> AuthResult<Self> {
        let repr: ClaimsRepr = serde_json::from_value(value.clone())
            .map_err(|err| AuthError::InvalidJson(err.to_string()))?;
        let mut claims = Claims::try_from(repr)?;
        claims.raw = value;
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_permissions_claim_is_empty_set() {
        let claims = Claims::try_from(json!({
            "sub": "auth0|barista",
            "iss": "https://issuer.example.com/",
            "aud": ["drinks", "userinfo"],
            "exp": 4_102_444_800i64,
        }))
        .expect("claims parse");
        assert!(claims.permissions.is_empty());
        assert_eq!(claims.audience, vec!["drinks".to_string(), "userinfo".to_string()]);
        assert!(claims.issued_at.is_none());
    }

    #[test]
    fn permissions_claim_is_collected() {
        let claims = Claims::try_from(json!({
            "sub": "auth0|manager",
            "iss": "issuer",
            "aud": "drinks",
            "exp": 4_102_444_800i64,
            "iat": 1_700_000_000i64,
            "permissions": ["get:drinks-detail", "patch:drinks"],
        }))
        .expect("claims parse");
        assert!(claims.has_permission("patch:drinks"));
        assert!(!claims.has_permission("delete:drinks"));
        assert_eq!(claims.raw["sub"], "auth0|manager");
    }

    #[test]
    fn non_array_permissions_is_malformed() {
        let err = Claims::try_from(json!({
            "sub": "auth0|x",
            "iss": "issuer",
            "exp": 4_102_444_800i64,
            "permissions": "post:drinks",
        }))
        .expect_err("should reject");
        assert!(matches!(err, AuthError::InvalidJson(_)));
    }
}
