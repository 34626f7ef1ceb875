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

//! Identity-token acquisition and injection for service-to-service calls.
//!
//! Services that trust a common identity provider authenticate calls between
//! each other with short-lived [identity tokens]: the caller obtains a token
//! bound to the destination's origin (`scheme://host`) and attaches it as a
//! `Authorization: Bearer` header; the receiving side (or the platform in
//! front of it) verifies the token before the request reaches application
//! code.
//!
//! This crate provides the two pieces a caller needs:
//!
//! - [credentials::IdentityTokenProvider] resolves the ambient identity of
//!   the running process (a credential file named by
//!   `GOOGLE_APPLICATION_CREDENTIALS`, the gcloud well-known file, or the
//!   platform metadata service) and exchanges it for identity tokens scoped
//!   to a target [token::Audience].
//! - [client::AuthenticatedClient] wraps an HTTP client so that every
//!   outbound request is intercepted immediately before dispatch, the
//!   audience is derived from the request's own URL, and a freshly minted
//!   token is attached. Call sites never manage tokens by hand.
//!
//! ```no_run
//! # use crosscall_auth::{AuthenticatedClient, IdentityTokenProvider};
//! # tokio_test::block_on(async {
//! let client = AuthenticatedClient::new(IdentityTokenProvider::new());
//! let body = client.get("https://receiving-service.internal/").await?;
//! # Ok::<(), crosscall_auth::Error>(())
//! # });
//! ```
//!
//! [identity tokens]: https://cloud.google.com/docs/authentication/token-types#identity-tokens

pub mod client;
pub mod credentials;
pub mod errors;
pub mod token;

pub use client::AuthenticatedClient;
pub use credentials::{AmbientCredentials, IdentityTokenProvider, IdentityTokenSource};
pub use errors::Error;
pub use token::{Audience, IdentityToken};

/// A `Result` alias where the `Err` case is [Error].
pub type Result<T> = std::result::Result<T, Error>;
