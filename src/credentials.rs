// Copyright 2020 Dmitry Tantsur <dtantsur@protonmail.com>
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

//! Credentials supplied by the caller.

use std::collections::hash_map::DefaultHasher;
use std::env;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use log::debug;

use super::auth::{self, Authenticator};
use super::{Error, ErrorKind, InterfaceType, Result};

/// Default deadline for a single authentication attempt.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default value of the User-Agent header.
pub const DEFAULT_USER_AGENT: &str = concat!("swiftauth/", env!("CARGO_PKG_VERSION"));

/// Credentials used for one or more authentication attempts.
///
/// Which fields are required depends on the protocol version in use. The
/// authenticators only read credentials, so the same value can be reused
/// across attempts.
///
/// `api_key` is interpreted by the protocol: a key or password for v1, a
/// password or an API key for v2, and a password or an existing token for v3.
#[derive(Clone)]
pub struct Credentials {
    /// Authentication endpoint.
    pub auth_url: String,
    /// User name.
    pub user_name: Option<String>,
    /// User ID (v3 only).
    pub user_id: Option<String>,
    /// API key, password or token.
    pub api_key: String,
    /// Tenant (project) name.
    pub tenant: Option<String>,
    /// Tenant (project) ID.
    pub tenant_id: Option<String>,
    /// Name of the tenant domain (v3 only).
    pub tenant_domain: Option<String>,
    /// ID of the tenant domain (v3 only).
    pub tenant_domain_id: Option<String>,
    /// Name of the user domain (v3 only).
    pub domain: Option<String>,
    /// ID of the user domain (v3 only).
    pub domain_id: Option<String>,
    /// Trust ID (v3 only).
    pub trust_id: Option<String>,
    /// Application credential ID (v3 only).
    pub application_credential_id: Option<String>,
    /// Application credential name (v3 only).
    pub application_credential_name: Option<String>,
    /// Application credential secret (v3 only).
    pub application_credential_secret: Option<String>,
    /// Region to pick endpoints from (any region if unset).
    pub region: Option<String>,
    /// Value of the User-Agent header.
    pub user_agent: String,
    /// Deadline for a single authentication attempt.
    pub timeout: Duration,
    /// Protocol version, 0 to detect it from `auth_url`.
    pub auth_version: u32,
    /// Endpoint interface the caller prefers for the storage URL.
    pub endpoint_type: InterfaceType,
}

/// Treat empty strings the same way as missing values.
#[inline]
pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    match value {
        Some(s) if !s.is_empty() => Some(s.as_str()),
        _ => None,
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_first(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| env_var(name))
}

fn hash_secret(secret: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    secret.hash(&mut hasher);
    hasher.finish()
}

impl Default for Credentials {
    fn default() -> Credentials {
        Credentials {
            auth_url: String::new(),
            user_name: None,
            user_id: None,
            api_key: String::new(),
            tenant: None,
            tenant_id: None,
            tenant_domain: None,
            tenant_domain_id: None,
            domain: None,
            domain_id: None,
            trust_id: None,
            application_credential_id: None,
            application_credential_name: None,
            application_credential_secret: None,
            region: None,
            user_agent: String::from(DEFAULT_USER_AGENT),
            timeout: DEFAULT_TIMEOUT,
            auth_version: 0,
            endpoint_type: InterfaceType::Public,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("auth_url", &self.auth_url)
            .field("user_name", &self.user_name)
            .field("user_id", &self.user_id)
            .field("api_key", &format!("hash({})", hash_secret(&self.api_key)))
            .field("tenant", &self.tenant)
            .field("tenant_id", &self.tenant_id)
            .field("tenant_domain", &self.tenant_domain)
            .field("tenant_domain_id", &self.tenant_domain_id)
            .field("domain", &self.domain)
            .field("domain_id", &self.domain_id)
            .field("trust_id", &self.trust_id)
            .field("application_credential_id", &self.application_credential_id)
            .field(
                "application_credential_name",
                &self.application_credential_name,
            )
            .field(
                "application_credential_secret",
                &self
                    .application_credential_secret
                    .as_deref()
                    .map(|s| format!("hash({})", hash_secret(s))),
            )
            .field("region", &self.region)
            .field("user_agent", &self.user_agent)
            .field("timeout", &self.timeout)
            .field("auth_version", &self.auth_version)
            .field("endpoint_type", &self.endpoint_type)
            .finish()
    }
}

impl Credentials {
    /// Create credentials from an authentication URL, a user name and a key.
    pub fn new<U, S1, S2>(auth_url: U, user_name: S1, api_key: S2) -> Credentials
    where
        U: Into<String>,
        S1: Into<String>,
        S2: Into<String>,
    {
        Credentials {
            auth_url: auth_url.into(),
            user_name: Some(user_name.into()),
            api_key: api_key.into(),
            ..Credentials::default()
        }
    }

    /// Create credentials from environment variables.
    ///
    /// The usual `OS_*` variables are used, with the legacy `ST_AUTH`,
    /// `ST_USER` and `ST_KEY` variables as a fallback.
    pub fn from_env() -> Result<Credentials> {
        let auth_url = env_first(&["OS_AUTH_URL", "ST_AUTH"]).ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidConfig,
                "Neither OS_AUTH_URL nor ST_AUTH is set",
            )
        })?;

        let auth_version = match env_var("OS_IDENTITY_API_VERSION") {
            Some(value) => parse_version(&value)?,
            None => 0,
        };

        let endpoint_type = match env_first(&["OS_INTERFACE", "OS_ENDPOINT_TYPE"]) {
            Some(value) => value.parse()?,
            None => InterfaceType::Public,
        };

        let creds = Credentials {
            auth_url,
            user_name: env_first(&["OS_USERNAME", "ST_USER"]),
            user_id: env_var("OS_USER_ID"),
            api_key: env_first(&["OS_PASSWORD", "OS_AUTH_TOKEN", "ST_KEY"]).unwrap_or_default(),
            tenant: env_first(&["OS_PROJECT_NAME", "OS_TENANT_NAME"]),
            tenant_id: env_first(&["OS_PROJECT_ID", "OS_TENANT_ID"]),
            tenant_domain: env_var("OS_PROJECT_DOMAIN_NAME"),
            tenant_domain_id: env_var("OS_PROJECT_DOMAIN_ID"),
            domain: env_first(&["OS_USER_DOMAIN_NAME", "OS_DOMAIN_NAME"]),
            domain_id: env_first(&["OS_USER_DOMAIN_ID", "OS_DOMAIN_ID"]),
            trust_id: env_var("OS_TRUST_ID"),
            application_credential_id: env_var("OS_APPLICATION_CREDENTIAL_ID"),
            application_credential_name: env_var("OS_APPLICATION_CREDENTIAL_NAME"),
            application_credential_secret: env_var("OS_APPLICATION_CREDENTIAL_SECRET"),
            region: env_var("OS_REGION_NAME"),
            auth_version,
            endpoint_type,
            ..Credentials::default()
        };
        debug!("Loaded credentials from the environment: {:?}", creds);
        Ok(creds)
    }

    /// Use the given tenant (project) name.
    pub fn with_tenant<S: Into<String>>(mut self, tenant: S) -> Credentials {
        self.tenant = Some(tenant.into());
        self
    }

    /// Use the given tenant (project) ID.
    pub fn with_tenant_id<S: Into<String>>(mut self, tenant_id: S) -> Credentials {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Use the given user domain name.
    pub fn with_domain<S: Into<String>>(mut self, domain: S) -> Credentials {
        self.domain = Some(domain.into());
        self
    }

    /// Use the given region.
    pub fn with_region<S: Into<String>>(mut self, region: S) -> Credentials {
        self.region = Some(region.into());
        self
    }

    /// Scope the token to the given trust.
    pub fn with_trust<S: Into<String>>(mut self, trust_id: S) -> Credentials {
        self.trust_id = Some(trust_id.into());
        self
    }

    /// Authenticate with an application credential ID and secret.
    pub fn with_application_credential<S1, S2>(mut self, id: S1, secret: S2) -> Credentials
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        self.application_credential_id = Some(id.into());
        self.application_credential_secret = Some(secret.into());
        self
    }

    /// Use an explicit protocol version instead of detecting it.
    pub fn with_auth_version(mut self, auth_version: u32) -> Credentials {
        self.auth_version = auth_version;
        self
    }

    /// Use the given deadline for each authentication attempt.
    pub fn with_timeout(mut self, timeout: Duration) -> Credentials {
        self.timeout = timeout;
        self
    }

    /// Create an authenticator suitable for these credentials.
    ///
    /// A shortcut for [create](auth/fn.create.html).
    pub fn authenticator(&self) -> Result<Box<dyn Authenticator>> {
        auth::create(&self.auth_url, &self.api_key, self.auth_version, self.timeout)
    }

    /// Storage URL for the preferred `endpoint_type`.
    pub fn storage_url(&self, auth: &dyn Authenticator) -> Option<String> {
        match self.endpoint_type {
            InterfaceType::Public => auth.storage_url(false),
            InterfaceType::Internal => auth.storage_url(true),
            other => auth.storage_url_for_endpoint(other),
        }
    }
}

/// Parse a version like `3` or `2.0`.
pub(crate) fn parse_version(value: &str) -> Result<u32> {
    let major = value.split('.').next().unwrap_or(value);
    major.trim().parse().map_err(|_| {
        Error::new(
            ErrorKind::InvalidConfig,
            format!("Invalid identity API version {}", value),
        )
    })
}
