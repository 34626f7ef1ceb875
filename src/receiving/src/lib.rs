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

//! The destination service.
//!
//! A single endpoint replying with a greeting. Token verification for
//! inbound calls belongs to the platform in front of the service, not to
//! the handler; by the time a request arrives here it is authenticated.

use axum::Router;
use axum::extract::State;
use axum::routing;
use tokio::task::JoinHandle;

/// The region label used when the deployment does not configure one.
pub const DEFAULT_REGION: &str = "World";

pub fn app(region: String) -> Router {
    Router::new()
        .route("/", routing::get(hello))
        .with_state(region)
}

async fn hello(State(region): State<String>) -> String {
    format!("Hello from {region}")
}

/// Serves the app on an ephemeral local port. Used by tests.
pub async fn start(region: String) -> std::io::Result<(String, JoinHandle<()>)> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let server = tokio::spawn(async move {
        axum::serve(listener, app(region)).await.unwrap();
    });
    Ok((format!("http://{}:{}", addr.ip(), addr.port()), server))
}
