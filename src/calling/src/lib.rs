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

//! The calling service.
//!
//! One endpoint that performs an authenticated call to the configured
//! receiving service and relays the outcome. The endpoint itself always
//! replies 200: a downstream failure is reported in the body text rather
//! than as a failure of this service. Every failure is logged where it is
//! caught.

use axum::Router;
use axum::extract::State;
use axum::routing;
use crosscall_auth::AuthenticatedClient;
use tokio::task::JoinHandle;

#[derive(Clone, Debug)]
pub struct AppState {
    client: AuthenticatedClient,
    receiving_url: String,
}

impl AppState {
    pub fn new<S: Into<String>>(client: AuthenticatedClient, receiving_url: S) -> Self {
        Self {
            client,
            receiving_url: receiving_url.into(),
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", routing::get(relay))
        .with_state(state)
}

async fn relay(State(state): State<AppState>) -> String {
    let payload = match state.client.get(&state.receiving_url).await {
        Ok(body) => body,
        Err(e) => {
            tracing::error!(error = %e, url = %state.receiving_url, "call to the receiving service failed");
            e.to_string()
        }
    };
    format!("Receiving service says: \"{payload}\"")
}

/// Serves the app on an ephemeral local port. Used by tests.
pub async fn start(state: AppState) -> std::io::Result<(String, JoinHandle<()>)> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let server = tokio::spawn(async move {
        axum::serve(listener, app(state)).await.unwrap();
    });
    Ok((format!("http://{}:{}", addr.ip(), addr.port()), server))
}
