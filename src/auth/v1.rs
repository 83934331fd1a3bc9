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

//! Legacy header-based authentication.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use reqwest::header::HeaderMap;
use reqwest::{Method, Request, Response, Url};
use static_assertions::assert_impl_all;

use super::{header_value, new_request, parse_url, require_api_key, Authenticator};
use crate::{AuthVersion, Credentials, Result};

const AUTH_USER: &str = "x-auth-user";
const AUTH_KEY: &str = "x-auth-key";
const AUTH_TOKEN: &str = "x-auth-token";
const STORAGE_URL: &str = "x-storage-url";
const CDN_MANAGEMENT_URL: &str = "x-cdn-management-url";

/// Host prefix of the service network endpoints.
const SERVICE_NET_PREFIX: &str = "snet-";

/// Legacy authentication: credentials and results travel in headers.
///
/// The response body is ignored, the token and URLs are taken from the
/// response headers. Token expiration is not reported by this protocol.
#[derive(Debug, Clone)]
pub struct V1Auth {
    timeout: Duration,
    headers: Option<HeaderMap>,
}

assert_impl_all!(V1Auth: Send, Sync);

impl V1Auth {
    /// Create a new authenticator with the given deadline.
    pub fn new(timeout: Duration) -> V1Auth {
        V1Auth {
            timeout,
            headers: None,
        }
    }

    /// Headers of the last successful response.
    #[inline]
    pub fn headers(&self) -> Option<&HeaderMap> {
        self.headers.as_ref()
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .as_ref()
            .and_then(|h| h.get(name))
            .and_then(|v| v.to_str().ok())
            .filter(|s| !s.is_empty())
    }
}

/// Rewrite a storage URL to point to the service network.
fn service_net_url(storage_url: &str) -> String {
    let mut url = match Url::parse(storage_url) {
        Ok(url) => url,
        Err(_) => return String::from(storage_url),
    };
    let host = match url.host_str() {
        Some(host) => format!("{}{}", SERVICE_NET_PREFIX, host),
        None => return String::from(storage_url),
    };
    match url.set_host(Some(&host)) {
        Ok(()) => url.into(),
        Err(_) => String::from(storage_url),
    }
}

#[async_trait]
impl Authenticator for V1Auth {
    fn version(&self) -> AuthVersion {
        AuthVersion::V1
    }

    fn request(&mut self, credentials: &Credentials) -> Result<Request> {
        let url = parse_url(&credentials.auth_url)?;
        let api_key = require_api_key(credentials, "key")?;
        let mut request = new_request(Method::GET, url, credentials, self.timeout)?;
        let user_name = credentials.user_name.as_deref().unwrap_or_default();
        let headers = request.headers_mut();
        let _ = headers.insert(AUTH_KEY, header_value("X-Auth-Key", api_key)?);
        let _ = headers.insert(AUTH_USER, header_value("X-Auth-User", user_name)?);
        debug!(
            "Requesting a v1 token for user {} from {}",
            user_name, credentials.auth_url
        );
        Ok(request)
    }

    async fn response(&mut self, response: Response) -> Result<()> {
        let headers = response.headers().clone();
        // The body carries nothing useful, but it still has to be consumed.
        let _ = response.bytes().await?;
        self.headers = Some(headers);
        info!(
            "Received a v1 token, storage URL is {:?}",
            self.header(STORAGE_URL)
        );
        Ok(())
    }

    fn token(&self) -> Option<&str> {
        self.header(AUTH_TOKEN)
    }

    fn storage_url(&self, internal: bool) -> Option<String> {
        let storage_url = self.header(STORAGE_URL)?;
        Some(if internal {
            service_net_url(storage_url)
        } else {
            String::from(storage_url)
        })
    }

    fn cdn_url(&self) -> Option<String> {
        self.header(CDN_MANAGEMENT_URL).map(String::from)
    }
}
