pub mod claims;
pub mod config;
pub mod error;
pub mod extractors;
pub mod guards;
pub mod jwks;
pub mod permissions;
pub mod verifier;

pub use claims::Claims;
pub use config::JwtConfig;
pub use error::{AuthError, AuthErrorKind, AuthResult};
pub use extractors::{parse_bearer, AuthContext};
pub use guards::{require_permission, PermissionGate};
pub use jwks::JwksFetcher;
pub use permissions::PermissionSet;
pub use verifier::{SigningKeys, JwtVerifier, JwtVerifierBuilder};
