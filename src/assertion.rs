use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, EncodingKey, Header};

use crate::{error::Error, pem::KeyPem};

/// How long an app assertion is accepted for, counted from `iat`.
pub(crate) const ASSERTION_TTL: Duration = Duration::from_secs(600);

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub(crate) struct AssertionClaims {
    pub(crate) iss: String,
    pub(crate) iat: u64,
    pub(crate) exp: u64,
}

impl AssertionClaims {
    pub(crate) fn new(issuer: &str, issued_at: SystemTime) -> Self {
        let iat = issued_at
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Self {
            iss: issuer.to_string(),
            iat,
            exp: iat + ASSERTION_TTL.as_secs(),
        }
    }
}

/// A compact RS256 JWT identifying the app to the platform. Used once as a bearer credential.
pub(crate) struct AppAssertion(String);

impl AppAssertion {
    pub(crate) fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AppAssertion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AppAssertion(<redacted>)")
    }
}

pub(crate) fn parse_signing_key(pem: &KeyPem) -> Result<EncodingKey, Error> {
    EncodingKey::from_rsa_pem(pem.as_bytes()).map_err(Error::KeyParse)
}

#[tracing::instrument(skip(key))]
pub(crate) fn sign_assertion(
    issuer: &str,
    key: &EncodingKey,
    issued_at: SystemTime,
) -> Result<AppAssertion, Error> {
    let claims = AssertionClaims::new(issuer, issued_at);
    let token = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, key)
        .map_err(Error::Signing)?;

    tracing::debug!(iat = claims.iat, exp = claims.exp, "Signed app assertion");
    Ok(AppAssertion(token))
}
