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

//! JSON structures and protocol bits for the Identity V3 API.

#![allow(missing_docs)]

use log::warn;
use serde_derive::{Deserialize, Serialize};

use crate::catalog;

pub const METHOD_PASSWORD: &str = "password";
pub const METHOD_TOKEN: &str = "token";
pub const METHOD_APPLICATION_CREDENTIAL: &str = "application_credential";

/// Name of the domain used when a project is given without one.
pub const DEFAULT_DOMAIN: &str = "Default";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Domain {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Domain {
    pub fn with_id(id: &str) -> Domain {
        Domain {
            id: Some(String::from(id)),
            name: None,
        }
    }

    pub fn with_name(name: &str) -> Domain {
        Domain {
            id: None,
            name: Some(String::from(name)),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct User {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<Domain>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PasswordAuth {
    pub user: User,
}

#[derive(Clone, Debug, Serialize)]
pub struct TokenAuth {
    pub id: String,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ApplicationCredential {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct Identity {
    pub methods: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<PasswordAuth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<TokenAuth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_credential: Option<ApplicationCredential>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct Project {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<Domain>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Trust {
    pub id: String,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct Scope {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<Project>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<Domain>,
    #[serde(rename = "OS-TRUST:trust", skip_serializing_if = "Option::is_none")]
    pub trust: Option<Trust>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Auth {
    pub identity: Identity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
}

#[derive(Clone, Debug, Serialize)]
pub struct AuthRoot {
    pub auth: Auth,
}

#[allow(dead_code)]
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Links {
    #[serde(rename = "self", default)]
    pub self_link: Option<String>,
}

#[allow(dead_code)]
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Role {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub links: Option<Links>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct DomainInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[allow(dead_code)]
    #[serde(default)]
    pub links: Option<Links>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ProjectInfo {
    #[serde(default)]
    pub domain: Option<DomainInfo>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub domain: Option<DomainInfo>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Endpoint {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub interface: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub region_id: Option<String>,
    #[serde(default)]
    pub url: String,
}

#[allow(dead_code)]
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CatalogRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub service_type: String,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Token {
    #[serde(default)]
    pub audit_ids: Vec<String>,
    #[serde(default)]
    pub catalog: Vec<CatalogRecord>,
    #[serde(default)]
    pub expires_at: Option<String>,
    #[serde(default)]
    pub issued_at: Option<String>,
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default)]
    pub project: Option<ProjectInfo>,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub user: Option<UserInfo>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TokenRoot {
    pub token: Token,
}

impl Endpoint {
    fn normalize(&self) -> Option<catalog::Endpoint> {
        match self.interface.parse() {
            Ok(interface) => Some(catalog::Endpoint {
                region: self
                    .region
                    .as_ref()
                    .filter(|r| !r.is_empty())
                    .or(self.region_id.as_ref())
                    .cloned()
                    .unwrap_or_default(),
                interface,
                url: self.url.clone(),
                tenant_id: None,
            }),
            Err(_) => {
                warn!(
                    "Skipping endpoint {:?} with unknown interface {}",
                    self.id, self.interface
                );
                None
            }
        }
    }
}

impl From<&CatalogRecord> for catalog::CatalogRecord {
    fn from(value: &CatalogRecord) -> catalog::CatalogRecord {
        catalog::CatalogRecord {
            service_type: value.service_type.clone(),
            name: value.name.clone().unwrap_or_default(),
            endpoints: value
                .endpoints
                .iter()
                .filter_map(Endpoint::normalize)
                .collect(),
        }
    }
}

impl Token {
    /// Normalized service catalog.
    pub fn catalog(&self) -> catalog::ServiceCatalog {
        catalog::ServiceCatalog::new(self.catalog.iter().map(From::from).collect())
    }
}
