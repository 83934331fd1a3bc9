// Copyright 2018 Dmitry Tantsur <divius.inside@gmail.com>
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

//! Types shared between authentication protocols.

use std::fmt;
use std::str::FromStr;

use serde_derive::{Deserialize, Serialize};

use super::{Error, ErrorKind};

/// Endpoint interface type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceType {
    /// Public interface (used by default).
    #[default]
    Public,
    /// Internal interface (service network).
    Internal,
    /// Administrator interface.
    Admin,
}

impl InterfaceType {
    /// Name of the interface as used in service catalogs.
    pub fn as_str(&self) -> &'static str {
        match self {
            InterfaceType::Public => "public",
            InterfaceType::Internal => "internal",
            InterfaceType::Admin => "admin",
        }
    }
}

impl fmt::Display for InterfaceType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InterfaceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<InterfaceType, Error> {
        // Both "internal" and "internalURL" styles are seen in the wild.
        match s.trim_end_matches("URL") {
            "public" => Ok(InterfaceType::Public),
            "internal" => Ok(InterfaceType::Internal),
            "admin" => Ok(InterfaceType::Admin),
            other => Err(Error::new(
                ErrorKind::InvalidConfig,
                format!("Invalid endpoint interface {}", other),
            )),
        }
    }
}

/// Version of the authentication protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthVersion {
    /// Legacy header-based authentication.
    V1,
    /// Identity API v2 (JSON, password or API key).
    V2,
    /// Identity API v3 (JSON, scoped tokens).
    V3,
}

impl AuthVersion {
    /// Guess the protocol version from the shape of the authentication URL.
    pub fn detect(auth_url: &str) -> Result<AuthVersion, Error> {
        if auth_url.contains("v3") {
            Ok(AuthVersion::V3)
        } else if auth_url.contains("v2") {
            Ok(AuthVersion::V2)
        } else if auth_url.contains("v1") {
            Ok(AuthVersion::V1)
        } else {
            Err(Error::new(
                ErrorKind::InvalidConfig,
                "can't find auth version in the auth URL - set it explicitly",
            ))
        }
    }

    /// Resolve a version hint, where zero means "detect from the URL".
    pub fn from_hint(hint: u32, auth_url: &str) -> Result<AuthVersion, Error> {
        if hint == 0 {
            AuthVersion::detect(auth_url)
        } else {
            AuthVersion::try_from(hint)
        }
    }
}

impl TryFrom<u32> for AuthVersion {
    type Error = Error;

    fn try_from(value: u32) -> Result<AuthVersion, Error> {
        match value {
            1 => Ok(AuthVersion::V1),
            2 => Ok(AuthVersion::V2),
            3 => Ok(AuthVersion::V3),
            other => Err(Error::new(
                ErrorKind::InvalidConfig,
                format!("auth version {} not supported", other),
            )),
        }
    }
}

impl fmt::Display for AuthVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let num = match self {
            AuthVersion::V1 => 1,
            AuthVersion::V2 => 2,
            AuthVersion::V3 => 3,
        };
        write!(f, "v{}", num)
    }
}
