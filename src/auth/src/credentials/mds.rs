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

//! Identity tokens from the platform [metadata service].
//!
//! Managed compute environments provide a service local to the VM (or pod)
//! that, among other metadata, mints identity tokens for the default
//! service account of the instance. The default host is
//! `metadata.google.internal`; a different host can be set with the
//! `GCE_METADATA_HOST` environment variable.
//!
//! [metadata service]: https://cloud.google.com/compute/docs/metadata/overview

use crate::Result;
use crate::errors::Error;
use crate::token::Audience;
use http::HeaderValue;
use std::time::Duration;

pub(crate) const GCE_METADATA_HOST_ENV_VAR: &str = "GCE_METADATA_HOST";
pub(crate) const METADATA_ROOT: &str = "http://metadata.google.internal";
pub(crate) const METADATA_FLAVOR: &str = "metadata-flavor";
pub(crate) const METADATA_FLAVOR_VALUE: &str = "Google";
pub(crate) const IDENTITY_PATH: &str =
    "/computeMetadata/v1/instance/service-accounts/default/identity";

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Fetches an identity token for `audience` from the metadata service.
///
/// The audience travels as a query parameter; the response body is the raw
/// JWT.
pub(crate) async fn fetch_identity_token(
    http: &reqwest::Client,
    endpoint: &str,
    audience: &Audience,
    timeout: Duration,
) -> Result<String> {
    let response = http
        .get(format!("{endpoint}{IDENTITY_PATH}"))
        .header(
            METADATA_FLAVOR,
            HeaderValue::from_static(METADATA_FLAVOR_VALUE),
        )
        .query(&[("audience", audience.as_str())])
        .timeout(timeout)
        .send()
        .await
        .map_err(Error::mint_send)?;

    if !response.status().is_success() {
        return Err(Error::mint_status(response.status()));
    }

    response
        .text()
        .await
        .map_err(|e| Error::mint_source("could not read the metadata service response", e))
}

/// Returns `true` when a metadata service answers at `endpoint` with the
/// expected flavor header.
pub(crate) async fn probe(http: &reqwest::Client, endpoint: &str) -> bool {
    http.get(endpoint)
        .header(
            METADATA_FLAVOR,
            HeaderValue::from_static(METADATA_FLAVOR_VALUE),
        )
        .timeout(PROBE_TIMEOUT)
        .send()
        .await
        .map(|response| {
            response
                .headers()
                .get(METADATA_FLAVOR)
                .is_some_and(|v| v == METADATA_FLAVOR_VALUE)
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::tests::generate_test_identity_token;
    use httptest::matchers::{all_of, contains, request, url_decoded};
    use httptest::responders::status_code;
    use httptest::{Expectation, Server};

    type TestResult = anyhow::Result<()>;

    const TEST_TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn fetch_sends_audience_query() -> TestResult {
        let server = Server::run();
        let audience = Audience::new("https://svc.internal");
        let token = generate_test_identity_token(audience.as_str());
        server.expect(
            Expectation::matching(all_of![
                request::method("GET"),
                request::path(IDENTITY_PATH),
                request::query(url_decoded(contains(("audience", "https://svc.internal")))),
            ])
            .respond_with(status_code(200).body(token.clone())),
        );

        let got = fetch_identity_token(
            &reqwest::Client::new(),
            &format!("http://{}", server.addr()),
            &audience,
            TEST_TIMEOUT,
        )
        .await?;
        assert_eq!(got, token);
        Ok(())
    }

    #[tokio::test]
    async fn fetch_surfaces_issuer_errors() -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::path(IDENTITY_PATH)).respond_with(status_code(503)),
        );

        let err = fetch_identity_token(
            &reqwest::Client::new(),
            &format!("http://{}", server.addr()),
            &Audience::new("https://svc.internal"),
            TEST_TIMEOUT,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::TokenMint { .. }), "{err:?}");
        assert!(err.is_transient(), "{err:?}");
        Ok(())
    }

    #[tokio::test]
    async fn fetch_rejected_audience_is_not_transient() -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::path(IDENTITY_PATH)).respond_with(status_code(400)),
        );

        let err = fetch_identity_token(
            &reqwest::Client::new(),
            &format!("http://{}", server.addr()),
            &Audience::new("https://svc.internal"),
            TEST_TIMEOUT,
        )
        .await
        .unwrap_err();
        assert!(!err.is_transient(), "{err:?}");
        Ok(())
    }

    #[tokio::test]
    async fn probe_accepts_flavored_response() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method("GET")).respond_with(
                status_code(200).append_header(METADATA_FLAVOR, METADATA_FLAVOR_VALUE),
            ),
        );
        assert!(probe(&reqwest::Client::new(), &format!("http://{}", server.addr())).await);
    }

    #[tokio::test]
    async fn probe_rejects_unflavored_response() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method("GET")).respond_with(status_code(200)),
        );
        assert!(!probe(&reqwest::Client::new(), &format!("http://{}", server.addr())).await);
    }

    #[tokio::test]
    async fn probe_rejects_unreachable_endpoint() {
        // Nothing listens on this port.
        assert!(!probe(&reqwest::Client::new(), "http://127.0.0.1:9").await);
    }
}
