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

//! Authentication using Identity API v2.

mod protocol;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use log::{debug, info, trace};
use reqwest::{Method, Request, Response};
use static_assertions::assert_impl_all;

use super::{join_url, new_request, require_api_key, set_json_body, Authenticator};
use crate::catalog::{ServiceCatalog, OBJECT_STORE};
use crate::credentials::non_empty;
use crate::http::read_json;
use crate::{AuthVersion, Credentials, InterfaceType, Result};

/// Service type of the CDN management service.
const CDN_SERVICE_TYPE: &str = "rax:object-cdn";

/// How the secret is sent to the Identity service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialEncoding {
    /// Standard `passwordCredentials`.
    Password,
    /// Rackspace-style `RAX-KSKEY:apiKeyCredentials`.
    ApiKey,
}

impl CredentialEncoding {
    fn flipped(self) -> CredentialEncoding {
        match self {
            CredentialEncoding::Password => CredentialEncoding::ApiKey,
            CredentialEncoding::ApiKey => CredentialEncoding::Password,
        }
    }
}

/// Tracks which credential encoding the server accepts.
///
/// Every attempt after the first one uses the other encoding, until a
/// response is successfully parsed. After that the encoding never changes.
#[derive(Debug, Clone, Copy)]
struct EncodingToggle {
    encoding: CredentialEncoding,
    attempted: bool,
    confirmed: bool,
}

impl EncodingToggle {
    fn new(encoding: CredentialEncoding) -> EncodingToggle {
        EncodingToggle {
            encoding,
            attempted: false,
            confirmed: false,
        }
    }

    fn next_attempt(&mut self) -> CredentialEncoding {
        if self.attempted && !self.confirmed {
            self.encoding = self.encoding.flipped();
            debug!("Switching v2 credentials encoding to {:?}", self.encoding);
        }
        self.attempted = true;
        self.encoding
    }

    fn confirm(&mut self) {
        self.confirmed = true;
    }
}

/// Authentication using Identity API v2.
///
/// The secret from the credentials can be either a password or an API key,
/// and there is no way to tell them apart. The authenticator starts with a
/// guess and alternates between the two encodings on every new request until
/// one of them results in a valid response.
#[derive(Debug, Clone)]
pub struct V2Auth {
    timeout: Duration,
    region: Option<String>,
    toggle: EncodingToggle,
    access: Option<protocol::Access>,
    catalog: ServiceCatalog,
}

assert_impl_all!(V2Auth: Send, Sync);

impl V2Auth {
    /// Create a new authenticator starting with the given encoding.
    pub fn new(encoding: CredentialEncoding, timeout: Duration) -> V2Auth {
        V2Auth {
            timeout,
            region: None,
            toggle: EncodingToggle::new(encoding),
            access: None,
            catalog: ServiceCatalog::default(),
        }
    }

    /// Encoding used by the last request (or to be used by the first one).
    #[inline]
    pub fn encoding(&self) -> CredentialEncoding {
        self.toggle.encoding
    }

    /// Whether the encoding has been confirmed by a successful response.
    #[inline]
    pub fn is_encoding_confirmed(&self) -> bool {
        self.toggle.confirmed
    }

    /// Service catalog of the last successful authentication.
    #[inline]
    pub fn catalog(&self) -> &ServiceCatalog {
        &self.catalog
    }

    /// ID of the tenant the token is scoped to.
    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant().and_then(|t| t.id.as_deref())
    }

    /// Name of the tenant the token is scoped to.
    pub fn tenant_name(&self) -> Option<&str> {
        self.tenant().and_then(|t| t.name.as_deref())
    }

    /// ID of the authenticated user.
    pub fn user_id(&self) -> Option<&str> {
        self.access.as_ref().and_then(|a| a.user.id.as_deref())
    }

    /// Name of the authenticated user.
    pub fn user_name(&self) -> Option<&str> {
        self.access.as_ref().and_then(|a| a.user.name.as_deref())
    }

    /// Default region of the user (a Rackspace extension).
    pub fn default_region(&self) -> Option<&str> {
        self.access
            .as_ref()
            .and_then(|a| a.user.default_region.as_deref())
    }

    /// Names of the roles of the authenticated user.
    pub fn roles(&self) -> Vec<&str> {
        self.access
            .as_ref()
            .map(|a| a.user.roles.iter().map(|r| r.name.as_str()).collect())
            .unwrap_or_default()
    }

    fn tenant(&self) -> Option<&protocol::Tenant> {
        self.access.as_ref().and_then(|a| a.token.tenant.as_ref())
    }

    fn endpoint_url(&self, service_type: &str, interface: InterfaceType) -> Option<String> {
        self.catalog
            .find_url(service_type, interface, self.region.as_deref())
            .map(String::from)
    }
}

fn auth_body(credentials: &Credentials, encoding: CredentialEncoding) -> protocol::AuthRoot {
    let username = credentials.user_name.clone().unwrap_or_default();
    let secret = credentials.api_key.clone();
    let (password_credentials, api_key_credentials) = match encoding {
        CredentialEncoding::Password => (
            Some(protocol::PasswordCredentials {
                username,
                password: secret,
            }),
            None,
        ),
        CredentialEncoding::ApiKey => (
            None,
            Some(protocol::ApiKeyCredentials {
                username,
                api_key: secret,
            }),
        ),
    };
    protocol::AuthRoot {
        auth: protocol::Auth {
            password_credentials,
            api_key_credentials,
            tenant_name: non_empty(&credentials.tenant).map(String::from),
            tenant_id: non_empty(&credentials.tenant_id).map(String::from),
        },
    }
}

#[async_trait]
impl Authenticator for V2Auth {
    fn version(&self) -> AuthVersion {
        AuthVersion::V2
    }

    fn request(&mut self, credentials: &Credentials) -> Result<Request> {
        let url = join_url(&credentials.auth_url, "tokens")?;
        let _ = require_api_key(credentials, "password or API key")?;
        self.region = non_empty(&credentials.region).map(String::from);

        let encoding = self.toggle.next_attempt();
        debug!(
            "Requesting a v2 token for user {:?} from {} using {:?}",
            credentials.user_name, url, encoding
        );

        let mut request = new_request(Method::POST, url, credentials, self.timeout)?;
        set_json_body(&mut request, &auth_body(credentials, encoding))?;
        Ok(request)
    }

    async fn response(&mut self, response: Response) -> Result<()> {
        let root: protocol::AccessRoot = read_json(response).await?;
        self.toggle.confirm();

        let catalog = root.access.catalog();
        info!(
            "Received a v2 token for user {:?}, expiring at {:?}",
            root.access.user.name, root.access.token.expires
        );
        trace!("Received catalog: {:?}", catalog);
        self.catalog = catalog;
        self.access = Some(root.access);
        Ok(())
    }

    fn token(&self) -> Option<&str> {
        self.access
            .as_ref()
            .map(|a| a.token.id.as_str())
            .filter(|s| !s.is_empty())
    }

    fn storage_url_for_endpoint(&self, interface: InterfaceType) -> Option<String> {
        self.endpoint_url(OBJECT_STORE, interface)
    }

    fn expires(&self) -> Option<DateTime<FixedOffset>> {
        self.access
            .as_ref()
            .and_then(|a| a.token.expires.as_deref())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
    }

    fn cdn_url(&self) -> Option<String> {
        self.endpoint_url(CDN_SERVICE_TYPE, InterfaceType::Public)
    }
}
