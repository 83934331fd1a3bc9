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

//! Authentication for Swift-compatible object storage in Rust.
//!
//! The goal of this project is to obtain a token and a storage URL from
//! whatever authentication protocol a Swift deployment speaks:
//!
//! * the legacy header-based protocol (`/auth/v1.0`),
//! * Identity API v2 with a password or an API key,
//! * Identity API v3 with password, token or application credential
//!   authentication and optional project or trust scoping.
//!
//! # Usage
//!
//! ```rust,no_run
//! # async fn example() -> swiftauth::Result<()> {
//! use swiftauth::http::HttpTransport;
//!
//! let creds = swiftauth::Credentials::new(
//!     "https://identity.example.com/v3",
//!     "demo",
//!     "password",
//! )
//! .with_tenant("demo");
//! let transport = HttpTransport::new()?;
//!
//! let mut auth = creds.authenticator()?;
//! auth.authenticate(&creds, &transport).await?;
//! println!("{:?} {:?}", auth.token(), auth.storage_url(false));
//! # Ok(()) }
//! ```
//!
//! # Features
//!
//! * [Authentication protocols](auth/index.html)
//! * [Service catalog](catalog/index.html) lookups
//! * [clouds.yaml support](config/index.html)

#![crate_name = "swiftauth"]
#![crate_type = "lib"]
// NOTE: we do not use generic deny(warnings) to avoid breakages with new
// versions of the compiler. Add more warnings here as you discover them.
// Taken from https://github.com/rust-unofficial/patterns/
#![deny(
    improper_ctypes,
    missing_debug_implementations,
    missing_docs,
    no_mangle_generic_items,
    non_shorthand_field_patterns,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    trivial_casts,
    trivial_numeric_casts,
    unconditional_recursion,
    unsafe_code,
    unused_allocation,
    unused_comparisons,
    unused_extern_crates,
    unused_import_braces,
    unused_parens,
    unused_results,
    while_true
)]

pub mod auth;
pub mod catalog;
pub mod config;
mod credentials;
mod error;
pub mod http;
mod types;

pub use crate::auth::{create, Authenticator};
pub use crate::credentials::{Credentials, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT};
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::types::{AuthVersion, InterfaceType};
