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

use http::StatusCode;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Represents a failure to authenticate or perform an outbound call.
///
/// Every failure is fatal to the call that produced it, never to the
/// process. [Error::TokenMint] and [Error::Downstream] carry a transience
/// hint so that a higher layer can decide whether a retry is worthwhile;
/// this crate itself performs no retries.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// No ambient identity could be resolved from the environment.
    #[error("unable to resolve ambient credentials: {0}")]
    CredentialResolution(String),

    /// An identity was resolved but it cannot mint identity tokens.
    #[error("{0} credentials cannot mint identity tokens")]
    UnsupportedCredential(&'static str),

    /// The issuer rejected the token exchange or was unreachable.
    #[error("identity token exchange failed: {message}")]
    TokenMint {
        message: String,
        transient: bool,
        #[source]
        source: Option<BoxError>,
    },

    /// The destination was unreachable or returned a non-success status.
    #[error("downstream call failed: {message}")]
    Downstream {
        message: String,
        status: Option<StatusCode>,
        #[source]
        source: Option<BoxError>,
    },
}

impl Error {
    pub(crate) fn resolution<T: Into<String>>(message: T) -> Self {
        Error::CredentialResolution(message.into())
    }

    pub(crate) fn mint<T: Into<String>>(message: T) -> Self {
        Error::TokenMint {
            message: message.into(),
            transient: false,
            source: None,
        }
    }

    pub(crate) fn mint_source<T, E>(message: T, source: E) -> Self
    where
        T: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::TokenMint {
            message: message.into(),
            transient: false,
            source: Some(Box::new(source)),
        }
    }

    /// The exchange request never produced a response.
    pub(crate) fn mint_send(source: reqwest::Error) -> Self {
        Error::TokenMint {
            message: format!("could not reach the token issuer: {source}"),
            transient: !source.is_decode(),
            source: Some(Box::new(source)),
        }
    }

    pub(crate) fn mint_status(status: StatusCode) -> Self {
        Error::TokenMint {
            message: format!("the token issuer returned HTTP {status}"),
            transient: is_retryable(status),
            source: None,
        }
    }

    pub(crate) fn downstream<T: Into<String>>(message: T) -> Self {
        Error::Downstream {
            message: message.into(),
            status: None,
            source: None,
        }
    }

    pub(crate) fn downstream_source<T, E>(message: T, source: E) -> Self
    where
        T: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Downstream {
            message: message.into(),
            status: None,
            source: Some(Box::new(source)),
        }
    }

    pub(crate) fn downstream_send(source: reqwest::Error) -> Self {
        Error::Downstream {
            message: format!("could not reach the destination: {source}"),
            status: None,
            source: Some(Box::new(source)),
        }
    }

    pub(crate) fn downstream_status(status: StatusCode) -> Self {
        Error::Downstream {
            message: format!("the destination returned HTTP {status}"),
            status: Some(status),
            source: None,
        }
    }

    /// Returns `true` if a future attempt of the same call might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::CredentialResolution(_) | Error::UnsupportedCredential(_) => false,
            Error::TokenMint { transient, .. } => *transient,
            Error::Downstream { status, source, .. } => match status {
                Some(status) => is_retryable(*status),
                None => source.is_some(),
            },
        }
    }

    /// The HTTP status of a failed destination call, if one was received.
    pub fn downstream_status_code(&self) -> Option<StatusCode> {
        match self {
            Error::Downstream { status, .. } => *status,
            _ => None,
        }
    }
}

pub(crate) fn is_retryable(c: StatusCode) -> bool {
    matches!(
        c,
        // Server-side failures do not indicate that anything is wrong with
        // the request itself.
        StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
    )
}
