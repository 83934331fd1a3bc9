// Copyright 2017 Dmitry Tantsur <divius.inside@gmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Authentication protocols.
//!
//! Three protocols are supported:
//!
//! * [V1Auth](struct.V1Auth.html) - the legacy header-based protocol,
//! * [V2Auth](struct.V2Auth.html) - Identity API v2 with either a password or
//!   an API key,
//! * [V3Auth](struct.V3Auth.html) - Identity API v3 with password, token or
//!   application credential authentication and optional scoping.
//!
//! All of them implement the [Authenticator](trait.Authenticator.html) trait,
//! so callers normally use [create](fn.create.html) and never care which
//! protocol is actually spoken.
//!
//! An authentication attempt consists of building a request with
//! [request](trait.Authenticator.html#tymethod.request), sending it (see
//! [http::execute](../http/fn.execute.html)) and feeding the response back
//! via [response](trait.Authenticator.html#tymethod.response). An external
//! retry loop may repeat the attempt on failure:
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), swiftauth::Error> {
//! use swiftauth::http::{self, HttpTransport};
//!
//! let creds = swiftauth::Credentials::from_env()?;
//! let transport = HttpTransport::new()?;
//! let mut auth = creds.authenticator()?;
//!
//! let mut attempt = 0;
//! loop {
//!     attempt += 1;
//!     let request = auth.request(&creds)?;
//!     match http::execute(request, &transport).await {
//!         Ok(resp) => break auth.response(resp).await?,
//!         Err(e) if e.is_retryable() && attempt < 2 => continue,
//!         Err(e) => return Err(e),
//!     }
//! }
//!
//! println!("Storage URL: {:?}", auth.storage_url(false));
//! # Ok(()) }
//! ```

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use log::{debug, error};
use reqwest::header::{HeaderValue, CONTENT_TYPE, USER_AGENT};
use reqwest::{Method, Request, Response, Url};
use serde::Serialize;

use super::http::{self, Transport};
use super::{AuthVersion, Credentials, Error, ErrorKind, InterfaceType, Result};

mod v1;
mod v2;
mod v3;

pub use self::v1::V1Auth;
pub use self::v2::{CredentialEncoding, V2Auth};
pub use self::v3::V3Auth;

/// Length starting from which a v2 secret is assumed to be an API key.
const API_KEY_MIN_LENGTH: usize = 32;

/// Authentication protocol implementation.
///
/// An authenticator owns the state of the last successful authentication:
/// every successful [response](#tymethod.response) replaces it as a whole,
/// a failed one leaves it untouched. Queries made before the first
/// successful authentication return `None`.
///
/// Instances must not be shared between concurrent authentication attempts.
#[async_trait]
pub trait Authenticator: fmt::Debug + Send + Sync {
    /// Protocol version spoken by this authenticator.
    fn version(&self) -> AuthVersion;

    /// Build an authentication request from the credentials.
    ///
    /// Fails with `InvalidConfig` before any I/O if the credentials are
    /// incomplete or ambiguous.
    fn request(&mut self, credentials: &Credentials) -> Result<Request>;

    /// Consume a successful response to the request.
    async fn response(&mut self, response: Response) -> Result<()>;

    /// Authentication token.
    fn token(&self) -> Option<&str>;

    /// Storage URL, either public or internal (service network).
    fn storage_url(&self, internal: bool) -> Option<String> {
        let interface = if internal {
            InterfaceType::Internal
        } else {
            InterfaceType::Public
        };
        self.storage_url_for_endpoint(interface)
    }

    /// Storage URL for the given interface type.
    ///
    /// Only supported by catalog-based protocols.
    fn storage_url_for_endpoint(&self, _interface: InterfaceType) -> Option<String> {
        None
    }

    /// Token expiration time, if known.
    fn expires(&self) -> Option<DateTime<FixedOffset>> {
        None
    }

    /// CDN management URL, if provided by the protocol.
    fn cdn_url(&self) -> Option<String> {
        None
    }

    /// Run a single authentication attempt over the given transport.
    async fn authenticate(
        &mut self,
        credentials: &Credentials,
        transport: &dyn Transport,
    ) -> Result<()> {
        let request = self.request(credentials)?;
        let response = http::execute(request, transport).await?;
        self.response(response).await
    }
}

/// Create an authenticator.
///
/// A `version` of 0 means detecting it from `auth_url`: a URL containing
/// `v3` selects Identity API v3, `v2` selects v2 and `v1` selects the legacy
/// protocol. The `api_key` is only used to guess how to encode v2
/// credentials; the guess is corrected automatically on retries.
pub fn create(
    auth_url: &str,
    api_key: &str,
    version: u32,
    timeout: Duration,
) -> Result<Box<dyn Authenticator>> {
    let version = AuthVersion::from_hint(version, auth_url)?;
    debug!("Using {} authentication for {}", version, auth_url);
    Ok(match version {
        AuthVersion::V1 => Box::new(V1Auth::new(timeout)),
        AuthVersion::V2 => {
            let encoding = if api_key.len() >= API_KEY_MIN_LENGTH {
                CredentialEncoding::ApiKey
            } else {
                CredentialEncoding::Password
            };
            Box::new(V2Auth::new(encoding, timeout))
        }
        AuthVersion::V3 => Box::new(V3Auth::new(timeout)),
    })
}

/// Append a path to the authentication URL, adding a slash if needed.
pub(crate) fn join_url(auth_url: &str, suffix: &str) -> Result<Url> {
    let mut url = String::from(auth_url);
    if !url.ends_with('/') {
        url.push('/');
    }
    url.push_str(suffix);
    parse_url(&url)
}

pub(crate) fn parse_url(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|e| {
        error!("Invalid auth_url {}: {}", url, e);
        Error::new(
            ErrorKind::InvalidConfig,
            format!("Invalid auth_url {}: {}", url, e),
        )
    })
}

/// The API key from the credentials, refusing an empty one.
pub(crate) fn require_api_key<'c>(credentials: &'c Credentials, what: &str) -> Result<&'c str> {
    if credentials.api_key.is_empty() {
        error!("No {} provided for {}", what, credentials.auth_url);
        Err(Error::new(
            ErrorKind::InvalidConfig,
            format!("{} required", what),
        ))
    } else {
        Ok(&credentials.api_key)
    }
}

pub(crate) fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|_| {
        Error::new(
            ErrorKind::InvalidConfig,
            format!("Value of {} cannot be used in an HTTP header", name),
        )
    })
}

/// Create a request with the common headers and the deadline set.
///
/// A zero timeout means no deadline.
pub(crate) fn new_request(
    method: Method,
    url: Url,
    credentials: &Credentials,
    timeout: Duration,
) -> Result<Request> {
    let mut request = Request::new(method, url);
    if !timeout.is_zero() {
        *request.timeout_mut() = Some(timeout);
    }
    let _ = request.headers_mut().insert(
        USER_AGENT,
        header_value("User-Agent", &credentials.user_agent)?,
    );
    Ok(request)
}

/// Serialize the body as JSON into the request.
pub(crate) fn set_json_body<T: Serialize>(request: &mut Request, body: &T) -> Result<()> {
    let bytes = serde_json::to_vec(body).map_err(|e| {
        Error::new(
            ErrorKind::InvalidConfig,
            format!("Cannot serialize authentication request: {}", e),
        )
    })?;
    let _ = request
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    *request.body_mut() = Some(bytes.into());
    Ok(())
}
