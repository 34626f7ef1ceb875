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

use clap::Parser;
use crosscall_auth::{AuthenticatedClient, IdentityTokenProvider};
use crosscall_calling::{AppState, app};

/// Configuration for the calling service.
#[derive(Clone, Debug, Parser)]
#[command(about = "Relays an authenticated call to the receiving service")]
struct Args {
    /// The URL of the receiving service.
    #[arg(long, env = "RECEIVING_URL")]
    receiving_url: String,

    /// The port to listen on.
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Outbound TLS requires a process-default crypto provider.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let args = Args::parse();
    let client = AuthenticatedClient::new(IdentityTokenProvider::new());
    let state = AppState::new(client, args.receiving_url.clone());

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", args.port)).await?;
    tracing::info!(
        port = args.port,
        receiving_url = %args.receiving_url,
        "calling service listening"
    );
    axum::serve(listener, app(state)).await?;
    Ok(())
}
