// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The audience and token types used by identity-token exchanges.

use crate::Result;
use crate::errors::Error;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::Instant;
use url::Url;

/// The origin an identity token is bound to.
///
/// An audience is the `scheme://host` of the intended token recipient; it
/// binds a token to one destination so it cannot be replayed against
/// another service. Port, path, and query never participate: the issuer and
/// the verifier agree on the origin alone.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Audience(String);

impl Audience {
    /// Creates an audience from an already-formatted origin string.
    pub fn new<S: Into<String>>(origin: S) -> Self {
        Audience(origin.into())
    }

    /// Derives the audience from a destination URL.
    ///
    /// Must be recomputed per destination; one client instance may fan out
    /// to differently-audienced destinations within a single task.
    pub fn from_url(url: &Url) -> Result<Self> {
        let host = url.host_str().ok_or_else(|| {
            Error::mint(format!("cannot derive an audience from {url}: missing host"))
        })?;
        Ok(Audience(format!("{}://{host}", url.scheme())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Audience {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A short-lived bearer credential asserting the caller's identity to one
/// [Audience].
///
/// The value is opaque to this crate apart from the expiry extracted from
/// its `exp` claim. Tokens are minted fresh for every outbound call and
/// discarded once the call completes.
#[derive(Clone, PartialEq)]
pub struct IdentityToken {
    /// The value used in the `Authorization:` header.
    pub value: String,

    /// The instant at which the issuer expires the token, if known.
    pub expires_at: Option<Instant>,
}

impl std::fmt::Debug for IdentityToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityToken")
            .field("value", &"[censored]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Parses the issuer's raw JWT into an [IdentityToken].
pub(crate) fn parse_identity_token(raw: String) -> Result<IdentityToken> {
    let parts: Vec<&str> = raw.split('.').collect();
    if parts.len() != 3 {
        return Err(Error::mint("the issuer returned a malformed identity token"));
    }
    let payload = URL_SAFE_NO_PAD
        .decode(parts[1])
        .map_err(|e| Error::mint_source("the identity token payload is not base64", e))?;
    let claims: HashMap<String, Value> = serde_json::from_slice(&payload)
        .map_err(|e| Error::mint_source("the identity token payload is not JSON", e))?;

    let expires_at = claims
        .get("exp")
        .and_then(Value::as_u64)
        .and_then(instant_from_epoch_seconds);

    Ok(IdentityToken {
        value: raw,
        expires_at,
    })
}

fn instant_from_epoch_seconds(secs: u64) -> Option<Instant> {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(now) => {
            let diff = now.abs_diff(Duration::from_secs(secs));
            Some(Instant::now() + diff)
        }
        Err(_) => None,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use test_case::test_case;

    type TestResult = anyhow::Result<()>;

    const TEST_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

    /// Generates a fake, but valid enough, identity token for tests in this
    /// crate.
    pub(crate) fn generate_test_identity_token<S: Into<String>>(audience: S) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before the epoch");
        let then = now + TEST_TOKEN_LIFETIME;
        let claims = serde_json::json!({
            "iss": "test-issuer",
            "aud": audience.into(),
            "exp": then.as_secs(),
            "iat": now.as_secs(),
        });
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string().as_bytes());
        format!("test-header.{payload}.test-signature")
    }

    #[test_case("https://svc.internal/data?x=1", "https://svc.internal"; "path and query stripped")]
    #[test_case("https://svc.internal:8443/", "https://svc.internal"; "port stripped")]
    #[test_case("http://receiving.example.com/a/b/c", "http://receiving.example.com"; "scheme preserved")]
    #[test_case("https://svc.internal", "https://svc.internal"; "bare origin unchanged")]
    fn audience_from_url(destination: &str, expected: &str) -> TestResult {
        let url = Url::parse(destination)?;
        let audience = Audience::from_url(&url)?;
        assert_eq!(audience.as_str(), expected);
        Ok(())
    }

    #[test]
    fn audience_requires_host() -> TestResult {
        let url = Url::parse("data:text/plain,hello")?;
        let err = Audience::from_url(&url).unwrap_err();
        assert!(matches!(err, Error::TokenMint { .. }), "{err:?}");
        assert!(!err.is_transient());
        Ok(())
    }

    #[test]
    fn audience_display() {
        let audience = Audience::new("https://svc.internal");
        assert_eq!(format!("{audience}"), "https://svc.internal");
    }

    #[test]
    fn parse_extracts_expiry() -> TestResult {
        let raw = generate_test_identity_token("https://svc.internal");
        let token = parse_identity_token(raw.clone())?;
        assert_eq!(token.value, raw);

        let expires_at = token.expires_at.expect("expiry should be extracted");
        let remaining = expires_at.duration_since(Instant::now());
        let skew = Duration::from_secs(2);
        assert!(remaining > TEST_TOKEN_LIFETIME - skew, "{remaining:?}");
        assert!(remaining < TEST_TOKEN_LIFETIME + skew, "{remaining:?}");
        Ok(())
    }

    #[test]
    fn parse_rejects_non_jwt() {
        let err = parse_identity_token("not-a-jwt".into()).unwrap_err();
        assert!(matches!(err, Error::TokenMint { .. }), "{err:?}");
    }

    #[test]
    fn parse_tolerates_missing_expiry() -> TestResult {
        let payload = URL_SAFE_NO_PAD.encode(br#"{"iss":"test-issuer"}"#);
        let token = parse_identity_token(format!("h.{payload}.s"))?;
        assert!(token.expires_at.is_none());
        Ok(())
    }

    #[test]
    fn debug_censors_value() {
        let token = IdentityToken {
            value: "super-secret-token".into(),
            expires_at: None,
        };
        let fmt = format!("{token:?}");
        assert!(!fmt.contains("super-secret-token"), "{fmt}");
        assert!(fmt.contains("[censored]"), "{fmt}");
    }
}
