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

//! Support for cloud configuration file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde_derive::Deserialize;
use serde_yaml::Value;

use super::credentials::parse_version;
use super::{Credentials, Error, ErrorKind, InterfaceType, Result};

#[derive(Debug, Clone, Deserialize)]
struct Auth {
    auth_url: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default, alias = "tenant_name")]
    project_name: Option<String>,
    #[serde(default, alias = "tenant_id")]
    project_id: Option<String>,
    #[serde(default)]
    project_domain_name: Option<String>,
    #[serde(default)]
    project_domain_id: Option<String>,
    #[serde(default, alias = "domain_name")]
    user_domain_name: Option<String>,
    #[serde(default, alias = "domain_id")]
    user_domain_id: Option<String>,
    #[serde(default)]
    trust_id: Option<String>,
    #[serde(default)]
    application_credential_id: Option<String>,
    #[serde(default)]
    application_credential_name: Option<String>,
    #[serde(default)]
    application_credential_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Cloud {
    auth: Auth,
    #[serde(default)]
    region_name: Option<String>,
    #[serde(default)]
    identity_api_version: Option<Value>,
    #[serde(default)]
    interface: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Root {
    clouds: HashMap<String, Cloud>,
}

fn find_config() -> Option<PathBuf> {
    let current = Path::new("./clouds.yaml");
    if current.is_file() {
        match current.canonicalize() {
            Ok(val) => return Some(val),
            Err(e) => warn!("Cannot canonicalize {:?}: {}", current, e),
        }
    }

    if let Some(mut home) = dirs::home_dir() {
        home.push(".config/openstack/clouds.yaml");
        if home.is_file() {
            return Some(home);
        }
    } else {
        warn!("Cannot find home directory");
    }

    let abs = PathBuf::from("/etc/openstack/clouds.yaml");
    if abs.is_file() {
        Some(abs)
    } else {
        None
    }
}

fn api_version(value: &Value) -> Result<u32> {
    match value {
        Value::Number(num) => match num.as_u64() {
            Some(v) => u32::try_from(v).map_err(|_| invalid_version(value)),
            None => num
                .as_f64()
                .map(|v| v.trunc())
                .filter(|v| *v >= 0.0 && *v <= f64::from(u32::MAX))
                .map(|v| v as u32)
                .ok_or_else(|| invalid_version(value)),
        },
        Value::String(s) => parse_version(s),
        _ => Err(invalid_version(value)),
    }
}

fn invalid_version(value: &Value) -> Error {
    Error::new(
        ErrorKind::InvalidConfig,
        format!("Invalid identity_api_version {:?}", value),
    )
}

impl Cloud {
    fn into_credentials(self) -> Result<Credentials> {
        let auth_version = match self.identity_api_version {
            Some(ref value) => api_version(value)?,
            None => 0,
        };
        let endpoint_type = match self.interface {
            Some(ref value) => value.parse()?,
            None => InterfaceType::Public,
        };

        let auth = self.auth;
        Ok(Credentials {
            auth_url: auth.auth_url,
            user_name: auth.username,
            user_id: auth.user_id,
            api_key: auth.password.or(auth.token).unwrap_or_default(),
            tenant: auth.project_name,
            tenant_id: auth.project_id,
            tenant_domain: auth.project_domain_name,
            tenant_domain_id: auth.project_domain_id,
            domain: auth.user_domain_name,
            domain_id: auth.user_domain_id,
            trust_id: auth.trust_id,
            application_credential_id: auth.application_credential_id,
            application_credential_name: auth.application_credential_name,
            application_credential_secret: auth.application_credential_secret,
            region: self.region_name,
            auth_version,
            endpoint_type,
            ..Credentials::default()
        })
    }
}

fn from_str(content: &str, cloud_name: &str) -> Result<Credentials> {
    let mut root: Root = serde_yaml::from_str(content).map_err(|e| {
        Error::new(
            ErrorKind::InvalidConfig,
            format!("Cannot parse clouds.yaml: {}", e),
        )
    })?;

    let cloud = root.clouds.remove(cloud_name).ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidConfig,
            format!("No such cloud: {}", cloud_name),
        )
    })?;

    let creds = cloud.into_credentials()?;
    debug!("Loaded cloud {}: {:?}", cloud_name, creds);
    Ok(creds)
}

/// Create `Credentials` from the given configuration file.
pub fn from_file<P: AsRef<Path>, S: AsRef<str>>(path: P, cloud_name: S) -> Result<Credentials> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::new(
            ErrorKind::InvalidConfig,
            format!("Cannot read {}: {}", path.display(), e),
        )
    })?;
    from_str(&content, cloud_name.as_ref())
}

/// Create `Credentials` from the first `clouds.yaml` found.
///
/// The file is looked up in the current directory, then in
/// `~/.config/openstack` and finally in `/etc/openstack`.
pub fn from_config<S: AsRef<str>>(cloud_name: S) -> Result<Credentials> {
    let path = find_config().ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidConfig,
            "clouds.yaml was not found in any location",
        )
    })?;
    debug!("Using cloud configuration from {}", path.display());
    from_file(path, cloud_name)
}
