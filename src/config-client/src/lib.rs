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

//! A client for an internal configuration service.
//!
//! Configuration servers sit behind the same identity-token check as any
//! other internal service, so the client fetches environment documents
//! through [crosscall_auth::AuthenticatedClient] and the interception there
//! handles the credentials.
//!
//! An environment document lists one or more property sources, most
//! specific first; a property lookup returns the value from the first
//! source that defines the key.

use crosscall_auth::AuthenticatedClient;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

/// Represents a failure to fetch or interpret a configuration document.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The authenticated call to the configuration service failed.
    #[error(transparent)]
    Fetch(#[from] crosscall_auth::Error),

    /// The service replied with something that is not an environment
    /// document.
    #[error("malformed configuration document")]
    Malformed(#[source] serde_json::Error),
}

/// The environment document a configuration server returns.
#[derive(Clone, Debug, Deserialize)]
pub struct ConfigDocument {
    pub name: String,
    #[serde(default)]
    pub profiles: Vec<String>,
    #[serde(default, rename = "propertySources")]
    pub property_sources: Vec<PropertySource>,
}

/// One named group of properties within a document.
#[derive(Clone, Debug, Deserialize)]
pub struct PropertySource {
    pub name: String,
    #[serde(default)]
    pub source: HashMap<String, Value>,
}

impl ConfigDocument {
    /// Looks up `key`, honoring source precedence: the first source that
    /// defines the key wins.
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.property_sources
            .iter()
            .find_map(|source| source.source.get(key))
    }
}

/// Fetches configuration documents for an application and profile.
#[derive(Clone, Debug)]
pub struct ConfigClient {
    client: AuthenticatedClient,
    endpoint: String,
}

impl ConfigClient {
    /// Creates a client for the configuration service at `endpoint`.
    pub fn new<S: Into<String>>(client: AuthenticatedClient, endpoint: S) -> Self {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        Self { client, endpoint }
    }

    /// Fetches the document for `application` under `profile`.
    pub async fn fetch(
        &self,
        application: &str,
        profile: &str,
    ) -> std::result::Result<ConfigDocument, Error> {
        let url = format!("{}/{application}/{profile}", self.endpoint);
        let body = self.client.get(&url).await?;
        serde_json::from_str(&body).map_err(Error::Malformed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crosscall_auth::{Audience, IdentityToken, IdentityTokenSource};
    use httptest::matchers::{all_of, contains, request};
    use httptest::responders::{json_encoded, status_code};
    use httptest::{Expectation, Server};

    type TestResult = anyhow::Result<()>;

    #[derive(Debug)]
    struct StaticTokenSource(&'static str);

    #[async_trait::async_trait]
    impl IdentityTokenSource for StaticTokenSource {
        async fn identity_token(
            &self,
            _audience: &Audience,
        ) -> crosscall_auth::Result<IdentityToken> {
            Ok(IdentityToken {
                value: self.0.to_string(),
                expires_at: None,
            })
        }
    }

    fn config_client(server: &Server) -> ConfigClient {
        // The authenticated client builds a reqwest client, which needs a
        // process-default crypto provider installed (the binaries install
        // one in `main`; tests must do the same).
        let _ = rustls::crypto::ring::default_provider().install_default();
        let client = AuthenticatedClient::new(StaticTokenSource("test-token-123"));
        ConfigClient::new(client, format!("http://{}/", server.addr()))
    }

    fn sample_document() -> serde_json::Value {
        serde_json::json!({
            "name": "calling",
            "profiles": ["prod"],
            "propertySources": [
                {
                    "name": "calling-prod.yml",
                    "source": { "receiving.url": "https://receiving.internal", "retries": 3 }
                },
                {
                    "name": "application.yml",
                    "source": { "receiving.url": "http://localhost:8081", "region": "World" }
                }
            ]
        })
    }

    #[tokio::test]
    async fn fetch_is_authenticated() -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method("GET"),
                request::path("/calling/prod"),
                request::headers(contains(("authorization", "Bearer test-token-123"))),
            ])
            .respond_with(json_encoded(sample_document())),
        );

        let document = config_client(&server).fetch("calling", "prod").await?;
        assert_eq!(document.name, "calling");
        assert_eq!(document.profiles, vec!["prod".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn first_property_source_wins() -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::path("/calling/prod"))
                .respond_with(json_encoded(sample_document())),
        );

        let document = config_client(&server).fetch("calling", "prod").await?;
        assert_eq!(
            document.property("receiving.url"),
            Some(&Value::String("https://receiving.internal".into()))
        );
        // Only the fallback source defines this one.
        assert_eq!(
            document.property("region"),
            Some(&Value::String("World".into()))
        );
        assert_eq!(document.property("no.such.key"), None);
        Ok(())
    }

    #[tokio::test]
    async fn malformed_document_is_a_distinct_error() -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::path("/calling/prod"))
                .respond_with(status_code(200).body("not-json")),
        );

        let err = config_client(&server)
            .fetch("calling", "prod")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Malformed(_)), "{err:?}");
        Ok(())
    }

    #[tokio::test]
    async fn fetch_failure_is_propagated() -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::path("/calling/prod"))
                .respond_with(status_code(404)),
        );

        let err = config_client(&server)
            .fetch("calling", "prod")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Fetch(_)), "{err:?}");
        Ok(())
    }
}
