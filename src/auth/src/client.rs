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

//! An HTTP client that authenticates every outbound request.

use crate::Result;
use crate::credentials::IdentityTokenSource;
use crate::errors::Error;
use crate::token::Audience;
use http::HeaderValue;
use http::header::AUTHORIZATION;
use reqwest::Method;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// An HTTP client wrapper that attaches an identity token to every request.
///
/// All dispatch funnels through [AuthenticatedClient::send], which derives
/// the audience from the outgoing request's own URL immediately before the
/// request leaves the process. One client instance can therefore fan out to
/// differently-audienced destinations; nothing about the audience is
/// configured up front.
///
/// If minting fails the request is never sent and the failure is returned
/// to the caller as-is. Retrying is left to callers: a rejected audience
/// does not get better by asking again.
///
/// Call sites that need to prepare a header ahead of time (for a request
/// dispatched by other means) can use
/// [AuthenticatedClient::bearer_header]; it is the same header construction
/// `send` uses, so the two paths cannot drift apart.
#[derive(Clone, Debug)]
pub struct AuthenticatedClient {
    inner: reqwest::Client,
    source: Arc<dyn IdentityTokenSource>,
    timeout: Duration,
}

impl AuthenticatedClient {
    /// Creates a client with the default configuration.
    pub fn new<S>(source: S) -> Self
    where
        S: IdentityTokenSource + 'static,
    {
        Self::builder(source).build()
    }

    pub fn builder<S>(source: S) -> Builder
    where
        S: IdentityTokenSource + 'static,
    {
        Builder {
            source: Arc::new(source),
            http: None,
            timeout: None,
        }
    }

    /// Performs an authenticated GET and returns the response body.
    pub async fn get(&self, url: &str) -> Result<String> {
        let request = self.request(Method::GET, url)?;
        let response = self.send(request).await?;
        response
            .text()
            .await
            .map_err(|e| Error::downstream_source("could not read the destination response", e))
    }

    /// Builds a bare request for `method` and `url`, to be dispatched with
    /// [AuthenticatedClient::send].
    pub fn request(&self, method: Method, url: &str) -> Result<reqwest::Request> {
        let url = Url::parse(url)
            .map_err(|e| Error::downstream(format!("invalid destination URL {url:?}: {e}")))?;
        Ok(reqwest::Request::new(method, url))
    }

    /// Authenticates and dispatches `request`.
    ///
    /// This is the interception point every outbound request flows through:
    /// the audience is computed from the request URL here, at dispatch
    /// time, and a token is minted for it. On mint failure the destination
    /// is never contacted.
    pub async fn send(&self, mut request: reqwest::Request) -> Result<reqwest::Response> {
        let audience = Audience::from_url(request.url())?;
        let header = self.bearer_header(&audience).await?;
        request.headers_mut().insert(AUTHORIZATION, header);
        if request.timeout().is_none() {
            *request.timeout_mut() = Some(self.timeout);
        }

        let response = self
            .inner
            .execute(request)
            .await
            .map_err(Error::downstream_send)?;
        if !response.status().is_success() {
            return Err(Error::downstream_status(response.status()));
        }
        Ok(response)
    }

    /// Mints a token for `audience` and formats it as an `Authorization`
    /// header value.
    pub async fn bearer_header(&self, audience: &Audience) -> Result<HeaderValue> {
        let token = self.source.identity_token(audience).await?;
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token.value))
            .map_err(|e| Error::mint_source("the minted token is not a valid header value", e))?;
        value.set_sensitive(true);
        Ok(value)
    }
}

/// Configures and creates an [AuthenticatedClient].
pub struct Builder {
    source: Arc<dyn IdentityTokenSource>,
    http: Option<reqwest::Client>,
    timeout: Option<Duration>,
}

impl Builder {
    /// Supplies a preconfigured HTTP client.
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    /// Bounds each destination call. Defaults to 30 seconds. A timeout set
    /// on an individual request takes precedence.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> AuthenticatedClient {
        // Tests build reqwest clients in-process without going through a
        // binary's `main`, so install the same process-default crypto
        // provider the binaries install before the first client is built.
        #[cfg(test)]
        let _ = rustls::crypto::ring::default_provider().install_default();
        AuthenticatedClient {
            inner: self.http.unwrap_or_default(),
            source: self.source,
            timeout: self.timeout.unwrap_or(DEFAULT_CALL_TIMEOUT),
        }
    }
}
