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

//! Authentication using Identity API v3.

mod protocol;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use log::{debug, error, info, trace};
use reqwest::header::HeaderMap;
use reqwest::{Method, Request, Response};
use static_assertions::assert_impl_all;

use self::protocol::Domain;
use super::{join_url, new_request, require_api_key, set_json_body, Authenticator};
use crate::catalog::{ServiceCatalog, OBJECT_STORE};
use crate::credentials::non_empty;
use crate::http::read_json;
use crate::{AuthVersion, Credentials, Error, ErrorKind, InterfaceType, Result};

const SUBJECT_TOKEN: &str = "x-subject-token";

#[derive(Debug, Clone)]
struct V3State {
    headers: HeaderMap,
    token: protocol::Token,
    catalog: ServiceCatalog,
}

/// Authentication using Identity API v3.
///
/// The identity method is picked from the credentials in this order:
///
/// 1. application credential, if its ID or name is set together with a secret,
/// 2. token, if neither user name nor user ID is set (the API key is the token),
/// 3. password otherwise.
///
/// Unless an application credential is used, the token is scoped to the trust
/// or to the project from the credentials. The token itself is returned in the
/// `X-Subject-Token` response header.
#[derive(Debug, Clone)]
pub struct V3Auth {
    timeout: Duration,
    region: Option<String>,
    state: Option<V3State>,
}

assert_impl_all!(V3Auth: Send, Sync);

impl V3Auth {
    /// Create a new authenticator with the given deadline.
    pub fn new(timeout: Duration) -> V3Auth {
        V3Auth {
            timeout,
            region: None,
            state: None,
        }
    }

    /// Headers of the last successful response.
    #[inline]
    pub fn headers(&self) -> Option<&HeaderMap> {
        self.state.as_ref().map(|s| &s.headers)
    }

    /// Service catalog of the last successful authentication.
    pub fn catalog(&self) -> Option<&ServiceCatalog> {
        self.state.as_ref().map(|s| &s.catalog)
    }

    /// Authentication methods reported by the server.
    pub fn methods(&self) -> &[String] {
        self.token_info().map(|t| &t.methods[..]).unwrap_or_default()
    }

    /// Audit IDs of the token.
    pub fn audit_ids(&self) -> &[String] {
        self.token_info()
            .map(|t| &t.audit_ids[..])
            .unwrap_or_default()
    }

    /// Names of the roles granted to the token.
    pub fn roles(&self) -> Vec<&str> {
        self.token_info()
            .map(|t| t.roles.iter().map(|r| r.name.as_str()).collect())
            .unwrap_or_default()
    }

    /// ID of the project the token is scoped to.
    pub fn project_id(&self) -> Option<&str> {
        self.project().and_then(|p| p.id.as_deref())
    }

    /// Name of the project the token is scoped to.
    pub fn project_name(&self) -> Option<&str> {
        self.project().and_then(|p| p.name.as_deref())
    }

    /// Name of the domain of the scoped project.
    pub fn project_domain_name(&self) -> Option<&str> {
        self.project()
            .and_then(|p| p.domain.as_ref())
            .and_then(|d| d.name.as_deref())
    }

    /// ID of the domain of the scoped project.
    pub fn project_domain_id(&self) -> Option<&str> {
        self.project()
            .and_then(|p| p.domain.as_ref())
            .and_then(|d| d.id.as_deref())
    }

    /// ID of the authenticated user.
    pub fn user_id(&self) -> Option<&str> {
        self.user().and_then(|u| u.id.as_deref())
    }

    /// Name of the authenticated user.
    pub fn user_name(&self) -> Option<&str> {
        self.user().and_then(|u| u.name.as_deref())
    }

    /// Name of the domain of the authenticated user.
    pub fn user_domain_name(&self) -> Option<&str> {
        self.user()
            .and_then(|u| u.domain.as_ref())
            .and_then(|d| d.name.as_deref())
    }

    /// ID of the domain of the authenticated user.
    pub fn user_domain_id(&self) -> Option<&str> {
        self.user()
            .and_then(|u| u.domain.as_ref())
            .and_then(|d| d.id.as_deref())
    }

    /// Time the token was issued at, if known.
    pub fn issued_at(&self) -> Option<DateTime<FixedOffset>> {
        self.token_info()
            .and_then(|t| t.issued_at.as_deref())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
    }

    fn token_info(&self) -> Option<&protocol::Token> {
        self.state.as_ref().map(|s| &s.token)
    }

    fn project(&self) -> Option<&protocol::ProjectInfo> {
        self.token_info().and_then(|t| t.project.as_ref())
    }

    fn user(&self) -> Option<&protocol::UserInfo> {
        self.token_info().and_then(|t| t.user.as_ref())
    }
}

fn config_error(message: &str) -> Error {
    error!("Invalid v3 credentials: {}", message);
    Error::new(ErrorKind::InvalidConfig, message)
}

fn owned(value: &Option<String>) -> Option<String> {
    non_empty(value).map(String::from)
}

/// User reference embedded into an application credential.
fn application_credential_user(credentials: &Credentials) -> Result<protocol::User> {
    if non_empty(&credentials.application_credential_id).is_some() {
        return Ok(protocol::User::default());
    }

    if let Some(user_id) = non_empty(&credentials.user_id) {
        return Ok(protocol::User {
            id: Some(String::from(user_id)),
            ..protocol::User::default()
        });
    }

    let user_name =
        owned(&credentials.user_name).ok_or_else(|| config_error("user id or name required"))?;
    let domain = if let Some(domain_id) = non_empty(&credentials.domain_id) {
        Domain::with_id(domain_id)
    } else if let Some(domain) = non_empty(&credentials.domain) {
        Domain::with_name(domain)
    } else {
        return Err(config_error("domain id or name required"));
    };

    Ok(protocol::User {
        name: Some(user_name),
        domain: Some(domain),
        ..protocol::User::default()
    })
}

fn identity(credentials: &Credentials) -> Result<protocol::Identity> {
    let app_cred_id = owned(&credentials.application_credential_id);
    let app_cred_name = owned(&credentials.application_credential_name);
    let app_cred_secret = owned(&credentials.application_credential_secret);

    if (app_cred_id.is_some() || app_cred_name.is_some()) && app_cred_secret.is_some() {
        let user = application_credential_user(credentials)?;
        // Name is only meaningful without an ID.
        let name = if app_cred_id.is_some() {
            None
        } else {
            app_cred_name
        };
        return Ok(protocol::Identity {
            methods: vec![protocol::METHOD_APPLICATION_CREDENTIAL],
            application_credential: Some(protocol::ApplicationCredential {
                id: app_cred_id,
                name,
                secret: app_cred_secret,
                user: Some(user),
            }),
            ..protocol::Identity::default()
        });
    }

    let user_name = owned(&credentials.user_name);
    let user_id = owned(&credentials.user_id);
    if user_name.is_none() && user_id.is_none() {
        return Ok(protocol::Identity {
            methods: vec![protocol::METHOD_TOKEN],
            token: Some(protocol::TokenAuth {
                id: String::from(require_api_key(credentials, "token")?),
            }),
            ..protocol::Identity::default()
        });
    }

    let password = String::from(require_api_key(credentials, "password")?);
    let domain = if let Some(domain) = non_empty(&credentials.domain) {
        Some(Domain::with_name(domain))
    } else {
        non_empty(&credentials.domain_id).map(Domain::with_id)
    };
    Ok(protocol::Identity {
        methods: vec![protocol::METHOD_PASSWORD],
        password: Some(protocol::PasswordAuth {
            user: protocol::User {
                domain,
                id: user_id,
                name: user_name,
                password: Some(password),
            },
        }),
        ..protocol::Identity::default()
    })
}

fn project_domain(credentials: &Credentials) -> Domain {
    if let Some(name) = non_empty(&credentials.tenant_domain) {
        Domain::with_name(name)
    } else if let Some(id) = non_empty(&credentials.tenant_domain_id) {
        Domain::with_id(id)
    } else if let Some(name) = non_empty(&credentials.domain) {
        Domain::with_name(name)
    } else if let Some(id) = non_empty(&credentials.domain_id) {
        Domain::with_id(id)
    } else {
        Domain::with_name(protocol::DEFAULT_DOMAIN)
    }
}

fn scope(credentials: &Credentials) -> Option<protocol::Scope> {
    if let Some(trust_id) = owned(&credentials.trust_id) {
        return Some(protocol::Scope {
            trust: Some(protocol::Trust { id: trust_id }),
            ..protocol::Scope::default()
        });
    }

    let project = if let Some(tenant_id) = owned(&credentials.tenant_id) {
        protocol::Project {
            id: Some(tenant_id),
            ..protocol::Project::default()
        }
    } else if let Some(tenant) = owned(&credentials.tenant) {
        protocol::Project {
            name: Some(tenant),
            domain: Some(project_domain(credentials)),
            ..protocol::Project::default()
        }
    } else {
        return None;
    };

    Some(protocol::Scope {
        project: Some(project),
        ..protocol::Scope::default()
    })
}

fn auth_body(credentials: &Credentials) -> Result<protocol::AuthRoot> {
    let identity = identity(credentials)?;
    let scope = if identity.application_credential.is_some() {
        None
    } else {
        scope(credentials)
    };
    Ok(protocol::AuthRoot {
        auth: protocol::Auth { identity, scope },
    })
}

#[async_trait]
impl Authenticator for V3Auth {
    fn version(&self) -> AuthVersion {
        AuthVersion::V3
    }

    fn request(&mut self, credentials: &Credentials) -> Result<Request> {
        let body = auth_body(credentials)?;
        let url = join_url(&credentials.auth_url, "auth/tokens")?;
        self.region = owned(&credentials.region);

        debug!(
            "Requesting a v3 token from {} using {:?}, scope {:?}",
            url, body.auth.identity.methods, body.auth.scope
        );

        let mut request = new_request(Method::POST, url, credentials, self.timeout)?;
        set_json_body(&mut request, &body)?;
        Ok(request)
    }

    async fn response(&mut self, response: Response) -> Result<()> {
        let headers = response.headers().clone();
        let root: protocol::TokenRoot = read_json(response).await?;

        let has_token = headers
            .get(SUBJECT_TOKEN)
            .and_then(|v| v.to_str().ok())
            .map_or(false, |s| !s.is_empty());
        if !has_token {
            error!("No valid X-Subject-Token header in a v3 authentication response");
            return Err(Error::new(
                ErrorKind::InvalidResponse,
                "Missing or invalid X-Subject-Token header",
            ));
        }

        let catalog = root.token.catalog();
        info!(
            "Received a v3 token for user {:?}, expiring at {:?}",
            root.token.user.as_ref().and_then(|u| u.name.as_deref()),
            root.token.expires_at
        );
        trace!("Received catalog: {:?}", catalog);
        self.state = Some(V3State {
            headers,
            token: root.token,
            catalog,
        });
        Ok(())
    }

    fn token(&self) -> Option<&str> {
        self.headers()
            .and_then(|h| h.get(SUBJECT_TOKEN))
            .and_then(|v| v.to_str().ok())
            .filter(|s| !s.is_empty())
    }

    fn storage_url_for_endpoint(&self, interface: InterfaceType) -> Option<String> {
        self.catalog()?
            .find_url(OBJECT_STORE, interface, self.region.as_deref())
            .map(String::from)
    }

    fn expires(&self) -> Option<DateTime<FixedOffset>> {
        self.token_info()
            .and_then(|t| t.expires_at.as_deref())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use reqwest::Method;
    use serde_json::{json, Value};

    use super::V3Auth;
    use crate::auth::Authenticator;
    use crate::http::test::{response, DropCounter, MockTransport};
    use crate::{Credentials, ErrorKind, InterfaceType};

    const TIMEOUT: Duration = Duration::from_secs(10);
    const AUTH_URL: &str = "https://identity.example.com/v3";

    fn body(creds: &Credentials) -> Value {
        let mut auth = V3Auth::new(TIMEOUT);
        let req = auth.request(creds).unwrap();
        let bytes = req.body().and_then(|b| b.as_bytes()).unwrap();
        serde_json::from_slice(bytes).unwrap()
    }

    fn app_cred(id: Option<&str>, name: Option<&str>) -> Credentials {
        Credentials {
            auth_url: String::from(AUTH_URL),
            application_credential_id: id.map(String::from),
            application_credential_name: name.map(String::from),
            application_credential_secret: Some(String::from("s")),
            ..Credentials::default()
        }
    }

    fn token_body() -> String {
        json!({
            "token": {
                "methods": ["password"],
                "expires_at": "2030-01-02T03:04:05.000000Z",
                "issued_at": "2030-01-01T03:04:05.000000Z",
                "audit_ids": ["aud-1"],
                "roles": [
                    {"id": "r-1", "name": "member", "links": {"self": "https://id/roles/r-1"}}
                ],
                "project": {
                    "id": "p-1",
                    "name": "project",
                    "domain": {"id": "default", "name": "Default"}
                },
                "user": {
                    "id": "u-1",
                    "name": "user",
                    "domain": {"id": "default", "name": "Default"}
                },
                "catalog": [
                    {
                        "id": "s-1",
                        "name": "swift",
                        "type": "object-store",
                        "endpoints": [
                            {"id": "e-1", "interface": "public", "region": "A",
                             "region_id": "A", "url": "https://a.example.com/v1/AUTH_p-1"},
                            {"id": "e-2", "interface": "internal", "region": "A",
                             "region_id": "A", "url": "https://a.internal/v1/AUTH_p-1"},
                            {"id": "e-3", "interface": "public", "region": "B",
                             "region_id": "B", "url": "https://b.example.com/v1/AUTH_p-1"},
                            {"id": "e-4", "interface": "admin", "region": "B",
                             "region_id": "B", "url": "https://b.admin/v1"},
                            {"id": "e-5", "interface": "weird", "region": "B",
                             "region_id": "B", "url": "https://b.weird/v1"}
                        ]
                    }
                ]
            }
        })
        .to_string()
    }

    fn token_headers() -> Vec<(&'static str, &'static str)> {
        vec![("X-Subject-Token", "tok-v3")]
    }

    #[test]
    fn test_app_cred_with_id() {
        let mut creds = app_cred(Some("cid"), Some("ignored"));
        creds.user_name = Some(String::from("user"));
        creds.tenant = Some(String::from("project"));
        assert_eq!(
            body(&creds),
            json!({
                "auth": {
                    "identity": {
                        "methods": ["application_credential"],
                        "application_credential": {"id": "cid", "secret": "s", "user": {}}
                    }
                }
            })
        );
    }

    #[test]
    fn test_app_cred_with_user_id() {
        let mut creds = app_cred(None, Some("cred"));
        creds.user_id = Some(String::from("u-1"));
        creds.user_name = Some(String::from("user"));
        assert_eq!(
            body(&creds)["auth"]["identity"]["application_credential"],
            json!({"name": "cred", "secret": "s", "user": {"id": "u-1"}})
        );
    }

    #[test]
    fn test_app_cred_with_user_name_and_domain() {
        let mut creds = app_cred(None, Some("cred"));
        creds.user_name = Some(String::from("user"));
        creds.domain = Some(String::from("dom"));
        creds.domain_id = Some(String::from("dom-id"));
        assert_eq!(
            body(&creds)["auth"]["identity"]["application_credential"]["user"],
            json!({"name": "user", "domain": {"id": "dom-id"}})
        );

        creds.domain_id = None;
        assert_eq!(
            body(&creds)["auth"]["identity"]["application_credential"]["user"],
            json!({"name": "user", "domain": {"name": "dom"}})
        );
    }

    #[test]
    fn test_app_cred_failures() {
        let mut auth = V3Auth::new(TIMEOUT);

        let creds = app_cred(None, Some("cred"));
        let err = auth.request(&creds).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
        assert!(err.to_string().contains("user id or name required"));

        let mut creds = app_cred(None, Some("cred"));
        creds.user_name = Some(String::from("user"));
        let err = auth.request(&creds).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
        assert!(err.to_string().contains("domain id or name required"));
    }

    #[test]
    fn test_app_cred_without_secret_falls_back() {
        let mut creds = app_cred(Some("cid"), None);
        creds.application_credential_secret = None;
        creds.api_key = String::from("tok");
        assert_eq!(
            body(&creds)["auth"]["identity"],
            json!({"methods": ["token"], "token": {"id": "tok"}})
        );
    }

    #[test]
    fn test_token_method() {
        let creds = Credentials {
            auth_url: String::from(AUTH_URL),
            api_key: String::from("existing-token"),
            tenant_id: Some(String::from("p-1")),
            ..Credentials::default()
        };
        assert_eq!(
            body(&creds),
            json!({
                "auth": {
                    "identity": {"methods": ["token"], "token": {"id": "existing-token"}},
                    "scope": {"project": {"id": "p-1"}}
                }
            })
        );
    }

    #[test]
    fn test_empty_secret() {
        let mut auth = V3Auth::new(TIMEOUT);

        let creds = Credentials {
            auth_url: String::from(AUTH_URL),
            ..Credentials::default()
        };
        let err = auth.request(&creds).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
        assert!(err.to_string().contains("token required"));

        let creds = Credentials::new(AUTH_URL, "user", "");
        let err = auth.request(&creds).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
        assert!(err.to_string().contains("password required"));

        let mut creds = app_cred(Some("cid"), None);
        creds.application_credential_secret = Some(String::new());
        let err = auth.request(&creds).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn test_password_method() {
        let creds = Credentials::new(AUTH_URL, "user", "pass");
        assert_eq!(
            body(&creds),
            json!({
                "auth": {
                    "identity": {
                        "methods": ["password"],
                        "password": {"user": {"name": "user", "password": "pass"}}
                    }
                }
            })
        );

        let mut creds = creds.with_domain("dom");
        creds.domain_id = Some(String::from("dom-id"));
        creds.user_id = Some(String::from("u-1"));
        assert_eq!(
            body(&creds)["auth"]["identity"]["password"]["user"],
            json!({"name": "user", "id": "u-1", "password": "pass", "domain": {"name": "dom"}})
        );

        creds.domain = None;
        assert_eq!(
            body(&creds)["auth"]["identity"]["password"]["user"]["domain"],
            json!({"id": "dom-id"})
        );
    }

    #[test]
    fn test_trust_scope() {
        let creds = Credentials::new(AUTH_URL, "user", "pass")
            .with_tenant("project")
            .with_trust("trust-1");
        assert_eq!(
            body(&creds)["auth"]["scope"],
            json!({"OS-TRUST:trust": {"id": "trust-1"}})
        );
    }

    #[test]
    fn test_project_scope() {
        let creds = Credentials::new(AUTH_URL, "user", "pass")
            .with_tenant("project")
            .with_tenant_id("p-1");
        assert_eq!(
            body(&creds)["auth"]["scope"],
            json!({"project": {"id": "p-1"}})
        );
    }

    #[test]
    fn test_project_scope_domain_priority() {
        let mut creds = Credentials::new(AUTH_URL, "user", "pass").with_tenant("project");
        let domain = |creds: &Credentials| body(creds)["auth"]["scope"]["project"]["domain"].clone();

        assert_eq!(domain(&creds), json!({"name": "Default"}));
        creds.domain_id = Some(String::from("user-dom-id"));
        assert_eq!(domain(&creds), json!({"id": "user-dom-id"}));
        creds.domain = Some(String::from("user-dom"));
        assert_eq!(domain(&creds), json!({"name": "user-dom"}));
        creds.tenant_domain_id = Some(String::from("proj-dom-id"));
        assert_eq!(domain(&creds), json!({"id": "proj-dom-id"}));
        creds.tenant_domain = Some(String::from("proj-dom"));
        assert_eq!(domain(&creds), json!({"name": "proj-dom"}));
        assert_eq!(
            body(&creds)["auth"]["scope"]["project"]["name"],
            json!("project")
        );
    }

    #[test]
    fn test_request() {
        let mut auth = V3Auth::new(TIMEOUT);
        let mut creds = Credentials::new(AUTH_URL, "user", "pass");
        let req = auth.request(&creds).unwrap();
        assert_eq!(req.method(), &Method::POST);
        assert_eq!(
            req.url().as_str(),
            "https://identity.example.com/v3/auth/tokens"
        );
        assert_eq!(
            req.headers().get("content-type").unwrap(),
            "application/json"
        );
        assert_eq!(req.timeout(), Some(&TIMEOUT));

        creds.auth_url = String::from("https://identity.example.com/v3/");
        let req = auth.request(&creds).unwrap();
        assert_eq!(
            req.url().as_str(),
            "https://identity.example.com/v3/auth/tokens"
        );
    }

    #[tokio::test]
    async fn test_response() {
        let mut auth = V3Auth::new(TIMEOUT);
        let _ = auth.request(&Credentials::new(AUTH_URL, "user", "pass")).unwrap();
        auth.response(response(201, &token_headers(), &token_body()))
            .await
            .unwrap();

        assert_eq!(auth.token(), Some("tok-v3"));
        assert_eq!(
            auth.expires().unwrap().to_rfc3339(),
            "2030-01-02T03:04:05+00:00"
        );
        assert!(auth.issued_at().is_some());
        assert_eq!(
            auth.storage_url(false).unwrap(),
            "https://a.example.com/v1/AUTH_p-1"
        );
        assert_eq!(
            auth.storage_url(true).unwrap(),
            "https://a.internal/v1/AUTH_p-1"
        );
        assert_eq!(
            auth.storage_url_for_endpoint(InterfaceType::Admin).unwrap(),
            "https://b.admin/v1"
        );
        assert!(auth.cdn_url().is_none());
        assert_eq!(auth.methods(), &["password".to_string()]);
        assert_eq!(auth.audit_ids(), &["aud-1".to_string()]);
        assert_eq!(auth.roles(), vec!["member"]);
        assert_eq!(auth.project_id(), Some("p-1"));
        assert_eq!(auth.project_name(), Some("project"));
        assert_eq!(auth.project_domain_name(), Some("Default"));
        assert_eq!(auth.user_id(), Some("u-1"));
        assert_eq!(auth.user_name(), Some("user"));
        assert_eq!(auth.user_domain_name(), Some("Default"));
        assert_eq!(auth.project_domain_id(), Some("default"));
        assert_eq!(auth.user_domain_id(), Some("default"));
        // The endpoint with an unknown interface is skipped.
        assert_eq!(auth.catalog().unwrap().records()[0].endpoints.len(), 4);
    }

    #[tokio::test]
    async fn test_response_with_region() {
        let mut auth = V3Auth::new(TIMEOUT);
        let creds = Credentials::new(AUTH_URL, "user", "pass").with_region("B");
        let _ = auth.request(&creds).unwrap();
        auth.response(response(201, &token_headers(), &token_body()))
            .await
            .unwrap();

        assert_eq!(
            auth.storage_url(false).unwrap(),
            "https://b.example.com/v1/AUTH_p-1"
        );
        assert!(auth.storage_url(true).is_none());
    }

    #[tokio::test]
    async fn test_response_region_id_only() {
        let body = json!({
            "token": {
                "catalog": [{
                    "type": "object-store",
                    "endpoints": [
                        {"interface": "public", "region_id": "A",
                         "url": "https://a.example.com/v1/AUTH_p-1"},
                        {"interface": "public", "region": "", "region_id": "B",
                         "url": "https://b.example.com/v1/AUTH_p-1"}
                    ]
                }]
            }
        })
        .to_string();
        let mut auth = V3Auth::new(TIMEOUT);
        let creds = Credentials::new(AUTH_URL, "user", "pass").with_region("B");
        let _ = auth.request(&creds).unwrap();
        auth.response(response(201, &token_headers(), &body))
            .await
            .unwrap();
        assert_eq!(
            auth.storage_url(false).unwrap(),
            "https://b.example.com/v1/AUTH_p-1"
        );
    }

    #[tokio::test]
    async fn test_response_missing_subject_token() {
        let counter = DropCounter::default();
        let mut auth = V3Auth::new(TIMEOUT);
        let err = auth
            .response(counter.response(201, &[], &token_body()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidResponse);
        assert_eq!(counter.count(), 1);
        assert!(auth.token().is_none());
        assert!(auth.storage_url(false).is_none());
    }

    #[tokio::test]
    async fn test_response_decode_error_keeps_state() {
        let mut auth = V3Auth::new(TIMEOUT);
        auth.response(response(201, &token_headers(), &token_body()))
            .await
            .unwrap();

        let counter = DropCounter::default();
        let err = auth
            .response(counter.response(201, &[("X-Subject-Token", "tok-new")], "[1, 2"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidResponse);
        assert_eq!(counter.count(), 1);
        assert_eq!(auth.token(), Some("tok-v3"));
    }

    #[tokio::test]
    async fn test_expires_malformed() {
        let mut auth = V3Auth::new(TIMEOUT);
        let body = json!({"token": {"expires_at": "soon"}}).to_string();
        auth.response(response(201, &token_headers(), &body))
            .await
            .unwrap();
        assert_eq!(auth.token(), Some("tok-v3"));
        assert!(auth.expires().is_none());
        assert!(auth.storage_url(false).is_none());
    }

    #[tokio::test]
    async fn test_authenticate() {
        let transport = MockTransport::new(vec![
            Ok(response(401, &[], "{\"error\": {\"code\": 401}}")),
            Ok(response(201, &token_headers(), &token_body())),
        ]);
        let creds = Credentials::new(AUTH_URL, "user", "pass");
        let mut auth = V3Auth::new(TIMEOUT);

        let err = auth.authenticate(&creds, &transport).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);
        assert!(err.is_retryable());
        assert!(auth.token().is_none());

        auth.authenticate(&creds, &transport).await.unwrap();
        assert_eq!(auth.token(), Some("tok-v3"));
        assert_eq!(transport.flushes(), 2);
        assert_eq!(
            transport.requests.lock().unwrap()[1].url.as_str(),
            "https://identity.example.com/v3/auth/tokens"
        );
    }
}
