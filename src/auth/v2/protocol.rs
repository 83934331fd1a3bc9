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

//! JSON structures and protocol bits for the Identity V2 API.

#![allow(missing_docs)]

use serde_derive::{Deserialize, Serialize};

use crate::catalog;
use crate::InterfaceType;

#[derive(Clone, Debug, Serialize)]
pub struct PasswordCredentials {
    pub username: String,
    pub password: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct ApiKeyCredentials {
    pub username: String,
    #[serde(rename = "apiKey")]
    pub api_key: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct Auth {
    #[serde(
        rename = "passwordCredentials",
        skip_serializing_if = "Option::is_none"
    )]
    pub password_credentials: Option<PasswordCredentials>,
    #[serde(
        rename = "RAX-KSKEY:apiKeyCredentials",
        skip_serializing_if = "Option::is_none"
    )]
    pub api_key_credentials: Option<ApiKeyCredentials>,
    #[serde(rename = "tenantName", skip_serializing_if = "Option::is_none")]
    pub tenant_name: Option<String>,
    #[serde(rename = "tenantId", skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct AuthRoot {
    pub auth: Auth,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Endpoint {
    #[serde(rename = "internalURL", default)]
    pub internal_url: Option<String>,
    #[serde(rename = "publicURL", default)]
    pub public_url: Option<String>,
    #[serde(rename = "adminURL", default)]
    pub admin_url: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(rename = "tenantId", default)]
    pub tenant_id: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct CatalogRecord {
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub service_type: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Tenant {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Token {
    #[serde(default)]
    pub expires: Option<String>,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub tenant: Option<Tenant>,
}

#[allow(dead_code)]
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Role {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "tenantId", default)]
    pub tenant_id: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct User {
    #[serde(rename = "RAX-AUTH:defaultRegion", default)]
    pub default_region: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub roles: Vec<Role>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Access {
    #[serde(rename = "serviceCatalog", default)]
    pub service_catalog: Vec<CatalogRecord>,
    #[serde(default)]
    pub token: Token,
    #[serde(default)]
    pub user: User,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AccessRoot {
    pub access: Access,
}

impl Endpoint {
    fn normalize(&self) -> impl Iterator<Item = catalog::Endpoint> + '_ {
        [
            (InterfaceType::Public, &self.public_url),
            (InterfaceType::Internal, &self.internal_url),
            (InterfaceType::Admin, &self.admin_url),
        ]
        .into_iter()
        .map(move |(interface, url)| catalog::Endpoint {
            region: self.region.clone().unwrap_or_default(),
            interface,
            url: url.clone().unwrap_or_default(),
            tenant_id: self.tenant_id.clone(),
        })
    }
}

impl From<&CatalogRecord> for catalog::CatalogRecord {
    fn from(value: &CatalogRecord) -> catalog::CatalogRecord {
        catalog::CatalogRecord {
            service_type: value.service_type.clone(),
            name: value.name.clone().unwrap_or_default(),
            endpoints: value.endpoints.iter().flat_map(Endpoint::normalize).collect(),
        }
    }
}

impl Access {
    /// Normalized service catalog.
    pub fn catalog(&self) -> catalog::ServiceCatalog {
        catalog::ServiceCatalog::new(self.service_catalog.iter().map(From::from).collect())
    }
}
