// Copyright 2021 Dmitry Tantsur <dtantsur@protonmail.com>
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

//! Abstraction over a service catalog.
//!
//! Both Identity API v2 and v3 catalogs are normalized into the same model:
//! a list of services, each with an ordered list of endpoints tagged with a
//! region and an interface type.

use log::debug;

use super::InterfaceType;

/// Service type of the object storage.
pub const OBJECT_STORE: &str = "object-store";

/// A single endpoint of a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Region of the endpoint (may be empty).
    pub region: String,
    /// Interface type.
    pub interface: InterfaceType,
    /// Endpoint URL (may be empty if the catalog did not provide one).
    pub url: String,
    /// Tenant the endpoint belongs to, if reported.
    pub tenant_id: Option<String>,
}

/// A service in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRecord {
    /// Service type, e.g. `object-store`.
    pub service_type: String,
    /// Service name.
    pub name: String,
    /// Endpoints in the order they were received.
    pub endpoints: Vec<Endpoint>,
}

/// Service catalog received with a token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceCatalog {
    inner: Vec<CatalogRecord>,
}

impl ServiceCatalog {
    /// Create a catalog from a list of records.
    pub fn new(catalog: Vec<CatalogRecord>) -> ServiceCatalog {
        ServiceCatalog { inner: catalog }
    }

    /// Catalog records.
    #[inline]
    pub fn records(&self) -> &[CatalogRecord] {
        &self.inner
    }

    /// Whether the catalog has no services at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Find an endpoint in the catalog.
    ///
    /// The first endpoint, across all services of the requested type, that
    /// has the requested interface and is in the requested region wins. With
    /// no region requested, any region matches.
    pub fn find_endpoint(
        &self,
        service_type: &str,
        interface: InterfaceType,
        region: Option<&str>,
    ) -> Option<&Endpoint> {
        let found = self
            .inner
            .iter()
            .filter(|svc| svc.service_type == service_type)
            .flat_map(|svc| svc.endpoints.iter())
            .find(|endp| {
                endp.interface == interface && region.map_or(true, |r| r == endp.region)
            });
        debug!(
            "Received {:?} for service '{}', interface '{}', region {:?}",
            found, service_type, interface, region
        );
        found
    }

    /// Find an endpoint URL in the catalog.
    ///
    /// Returns `None` if nothing is found or the matching endpoint has an
    /// empty URL.
    pub fn find_url(
        &self,
        service_type: &str,
        interface: InterfaceType,
        region: Option<&str>,
    ) -> Option<&str> {
        self.find_endpoint(service_type, interface, region)
            .map(|endp| endp.url.as_str())
            .filter(|url| !url.is_empty())
    }
}
