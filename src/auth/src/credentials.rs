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

//! Ambient credential resolution and identity-token minting.
//!
//! Resolution follows the usual application-default order: a credential
//! file named by `GOOGLE_APPLICATION_CREDENTIALS`, then the gcloud
//! well-known file, then the platform metadata service. Whatever is found
//! is held process-wide and reused; a failed resolution is never cached, so
//! the next call can retry once the environment is fixed.

pub mod mds;
pub mod service_account;

use crate::Result;
use crate::errors::Error;
use crate::token::{Audience, IdentityToken, parse_identity_token};
use async_trait::async_trait;
use serde::Deserialize;
use service_account::ServiceAccountKey;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

pub(crate) const CREDENTIALS_ENV_VAR: &str = "GOOGLE_APPLICATION_CREDENTIALS";
const WINDOWS_APPDATA_ENV_VAR: &str = "APPDATA";
const UNIX_HOME_ENV_VAR: &str = "HOME";
const WELL_KNOWN_FILE: &str = "application_default_credentials.json";

const DEFAULT_MINT_TIMEOUT: Duration = Duration::from_secs(10);

/// The identity the execution environment provides to the running process.
///
/// Resolved once per process (on first use) and shared read-only
/// afterwards. Not every resolvable identity can mint identity tokens;
/// [AmbientCredentials::supports_identity_tokens] reports the capability
/// and minting fails fast with [Error::UnsupportedCredential] when it is
/// absent.
#[derive(Clone, Debug)]
pub enum AmbientCredentials {
    /// The platform metadata service mints tokens for the instance's
    /// default service account.
    MetadataServer { endpoint: String },
    /// A service account key file; tokens are minted by signing an
    /// assertion with the key.
    ServiceAccount { key: ServiceAccountKey },
    /// A gcloud end-user credential. It identifies a person, not a
    /// workload, and cannot mint identity tokens for an arbitrary audience.
    AuthorizedUser,
}

impl AmbientCredentials {
    pub fn kind(&self) -> &'static str {
        match self {
            AmbientCredentials::MetadataServer { .. } => "metadata server",
            AmbientCredentials::ServiceAccount { .. } => "service account",
            AmbientCredentials::AuthorizedUser => "authorized user",
        }
    }

    /// Whether this identity can mint identity tokens for an audience.
    pub fn supports_identity_tokens(&self) -> bool {
        !matches!(self, AmbientCredentials::AuthorizedUser)
    }
}

/// A minimal representation of a credential file, to determine its type.
#[derive(Deserialize)]
struct CredentialFile {
    #[serde(rename = "type")]
    credential_type: String,
}

/// A source of identity tokens scoped to a caller-chosen audience.
///
/// [IdentityTokenProvider] is the production implementation. Implement the
/// trait directly to plug in another authentication system, or to mock
/// minting in tests.
#[async_trait]
pub trait IdentityTokenSource: std::fmt::Debug + Send + Sync {
    /// Mints an identity token bound to `audience`.
    async fn identity_token(&self, audience: &Audience) -> Result<IdentityToken>;
}

/// Mints identity tokens with the ambient identity of the process.
///
/// Every call performs a token exchange with the issuer; the provider
/// holds no token cache. The ambient identity itself is resolved once and
/// reused (see module docs). Cloning is cheap and clones share the
/// resolved identity.
#[derive(Clone, Debug)]
pub struct IdentityTokenProvider {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    http: reqwest::Client,
    ambient: OnceCell<AmbientCredentials>,
    mds_endpoint: Option<String>,
    token_uri: String,
    timeout: Duration,
}

impl IdentityTokenProvider {
    /// Creates a provider with the default configuration.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> Builder {
        Builder::default()
    }

    /// The resolved ambient identity, resolving it on first use.
    ///
    /// Concurrent first calls collapse into a single resolution; a failure
    /// leaves nothing cached, so the next caller retries.
    pub async fn ambient(&self) -> Result<&AmbientCredentials> {
        self.inner
            .ambient
            .get_or_try_init(|| self.detect())
            .await
    }

    async fn detect(&self) -> Result<AmbientCredentials> {
        if let Ok(path) = std::env::var(CREDENTIALS_ENV_VAR) {
            return load_credential_file(PathBuf::from(path)).await;
        }
        if let Some(path) = well_known_file() {
            if path.exists() {
                return load_credential_file(path).await;
            }
        }
        if let Ok(host) = std::env::var(mds::GCE_METADATA_HOST_ENV_VAR) {
            return Ok(AmbientCredentials::MetadataServer {
                endpoint: format!("http://{host}"),
            });
        }
        if let Some(endpoint) = &self.inner.mds_endpoint {
            return Ok(AmbientCredentials::MetadataServer {
                endpoint: endpoint.clone(),
            });
        }
        if mds::probe(&self.inner.http, mds::METADATA_ROOT).await {
            return Ok(AmbientCredentials::MetadataServer {
                endpoint: mds::METADATA_ROOT.to_string(),
            });
        }
        Err(Error::resolution(format!(
            "no credential file found and no metadata service reachable; \
             set {CREDENTIALS_ENV_VAR} or run on a platform that provides an identity"
        )))
    }
}

impl Default for IdentityTokenProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityTokenSource for IdentityTokenProvider {
    async fn identity_token(&self, audience: &Audience) -> Result<IdentityToken> {
        let credentials = self.ambient().await?;
        let raw = match credentials {
            AmbientCredentials::MetadataServer { endpoint } => {
                mds::fetch_identity_token(&self.inner.http, endpoint, audience, self.inner.timeout)
                    .await?
            }
            AmbientCredentials::ServiceAccount { key } => {
                service_account::fetch_identity_token(
                    &self.inner.http,
                    key,
                    &self.inner.token_uri,
                    audience,
                    self.inner.timeout,
                )
                .await?
            }
            unsupported => return Err(Error::UnsupportedCredential(unsupported.kind())),
        };
        parse_identity_token(raw)
    }
}

async fn load_credential_file(path: PathBuf) -> Result<AmbientCredentials> {
    let contents = tokio::fs::read(&path).await.map_err(|e| {
        Error::resolution(format!("could not read credential file {}: {e}", path.display()))
    })?;
    let sniff: CredentialFile = serde_json::from_slice(&contents).map_err(|e| {
        Error::resolution(format!("could not parse credential file {}: {e}", path.display()))
    })?;
    match sniff.credential_type.as_str() {
        "service_account" => {
            let key: ServiceAccountKey = serde_json::from_slice(&contents).map_err(|e| {
                Error::resolution(format!(
                    "malformed service account key in {}: {e}",
                    path.display()
                ))
            })?;
            Ok(AmbientCredentials::ServiceAccount { key })
        }
        "authorized_user" => Ok(AmbientCredentials::AuthorizedUser),
        other => Err(Error::resolution(format!(
            "unsupported credential type {other:?} in {}",
            path.display()
        ))),
    }
}

/// The path of the gcloud user credential, when one can be derived.
fn well_known_file() -> Option<PathBuf> {
    let mut path = if cfg!(windows) {
        PathBuf::from(std::env::var_os(WINDOWS_APPDATA_ENV_VAR)?)
    } else {
        let mut home = PathBuf::from(std::env::var_os(UNIX_HOME_ENV_VAR)?);
        home.push(".config");
        home
    };
    path.push("gcloud");
    path.push(WELL_KNOWN_FILE);
    Some(path)
}

/// Configures and creates an [IdentityTokenProvider].
#[derive(Debug, Default)]
pub struct Builder {
    mds_endpoint: Option<String>,
    token_uri: Option<String>,
    timeout: Option<Duration>,
}

impl Builder {
    /// Sets the metadata service endpoint.
    ///
    /// Specify the base URL without a trailing slash. The
    /// `GCE_METADATA_HOST` environment variable takes precedence when set.
    pub fn with_mds_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.mds_endpoint = Some(endpoint.into());
        self
    }

    /// Sets the OAuth2 token endpoint used for service-account exchanges.
    pub fn with_token_uri<S: Into<String>>(mut self, token_uri: S) -> Self {
        self.token_uri = Some(token_uri.into());
        self
    }

    /// Bounds each exchange request. Defaults to 10 seconds.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> IdentityTokenProvider {
        // Tests build reqwest clients in-process without going through a
        // binary's `main`, so install the same process-default crypto
        // provider the binaries install before the first client is built.
        #[cfg(test)]
        let _ = rustls::crypto::ring::default_provider().install_default();
        IdentityTokenProvider {
            inner: Arc::new(Inner {
                http: reqwest::Client::new(),
                ambient: OnceCell::new(),
                mds_endpoint: self.mds_endpoint,
                token_uri: self
                    .token_uri
                    .unwrap_or_else(|| service_account::OAUTH2_TOKEN_URI.to_string()),
                timeout: self.timeout.unwrap_or(DEFAULT_MINT_TIMEOUT),
            }),
        }
    }
}
