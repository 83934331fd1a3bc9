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

//! Low-level HTTP utilities.
//!
//! The [Transport](trait.Transport.html) trait is the only way the
//! authenticators reach the network, so it can be replaced in tests or
//! shared with an object storage client.

use std::fmt;

use async_trait::async_trait;
use log::{debug, error, trace, warn};
use reqwest::{Client, Request, Response};
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;

use super::{Error, Result};

/// HTTP transport used for authentication requests.
#[async_trait]
pub trait Transport: fmt::Debug + Send + Sync {
    /// Send the request and return the response, whatever its status.
    async fn execute(&self, request: Request) -> Result<Response>;

    /// Drop idle keep-alive connections.
    ///
    /// Called after every authentication round trip so that a rejected
    /// handshake does not leave a pooled connection behind.
    async fn close_idle_connections(&self);
}

type ClientFactory = Box<dyn Fn() -> reqwest::Result<Client> + Send + Sync>;

/// Transport on top of a `reqwest` client.
///
/// Closing idle connections is done by replacing the client with a freshly
/// built one, which drops the old connection pool once all requests that
/// still use it are finished.
pub struct HttpTransport {
    client: RwLock<Client>,
    factory: ClientFactory,
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("HttpTransport").finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Create a transport with a default client.
    pub fn new() -> Result<HttpTransport> {
        HttpTransport::with_factory(|| Client::builder().build())
    }

    /// Create a transport with clients produced by the provided function.
    ///
    /// Use it to configure TLS, proxies and connection timeouts.
    pub fn with_factory<F>(factory: F) -> Result<HttpTransport>
    where
        F: Fn() -> reqwest::Result<Client> + Send + Sync + 'static,
    {
        let client = factory()?;
        Ok(HttpTransport {
            client: RwLock::new(client),
            factory: Box::new(factory),
        })
    }

    /// Get the client currently in use.
    pub async fn client(&self) -> Client {
        self.client.read().await.clone()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: Request) -> Result<Response> {
        let client = self.client().await;
        client.execute(request).await.map_err(Error::from)
    }

    async fn close_idle_connections(&self) {
        match (self.factory)() {
            Ok(client) => {
                trace!("Replacing HTTP client to drop idle connections");
                *self.client.write().await = client;
            }
            Err(e) => warn!("Cannot rebuild HTTP client, keeping the old one: {}", e),
        }
    }
}

/// Send an authentication request and check its status.
///
/// Idle connections are flushed after the round trip regardless of its
/// outcome. Responses outside of the 2xx range are drained and converted into
/// an error carrying the status code. Successful responses are returned
/// unread.
pub async fn execute<T>(request: Request, transport: &T) -> Result<Response>
where
    T: Transport + ?Sized,
{
    let method = request.method().clone();
    let url = request.url().clone();
    debug!("Sending {} request to {}", method, url);

    let result = transport.execute(request).await;
    transport.close_idle_connections().await;

    let resp = result.map_err(|e| {
        error!("{} request to {} failed: {}", method, url, e);
        e
    })?;

    let status = resp.status();
    if status.is_success() {
        trace!("{} request to {} returned {}", method, url, status);
        Ok(resp)
    } else {
        error!("{} request to {} returned {}", method, url, status);
        // Read the body to the end so that the connection can be reused.
        let _ = resp.bytes().await;
        Err(Error::new_with_status(status))
    }
}

/// Read a JSON body, consuming the response.
pub async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| {
        error!("Cannot decode JSON response: {}", e);
        Error::from(e)
    })
}

#[cfg(test)]
pub(crate) mod test {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use futures::stream::{self, StreamExt};
    use reqwest::{Body, Method, Request, Response, StatusCode, Url};
    use serde_derive::Deserialize;

    use super::{execute, read_json, Transport};
    use crate::{Error, ErrorKind, Result};

    /// A request as seen by the mock transport.
    #[derive(Debug, Clone)]
    pub struct SeenRequest {
        pub method: Method,
        pub url: Url,
        pub body: Option<Vec<u8>>,
    }

    /// Transport returning prepared responses.
    #[derive(Debug, Default)]
    pub struct MockTransport {
        responses: Mutex<VecDeque<Result<Response>>>,
        pub requests: Mutex<Vec<SeenRequest>>,
        pub flushes: AtomicUsize,
    }

    impl MockTransport {
        pub fn new(responses: Vec<Result<Response>>) -> MockTransport {
            MockTransport {
                responses: Mutex::new(responses.into_iter().collect()),
                ..MockTransport::default()
            }
        }

        pub fn flushes(&self) -> usize {
            self.flushes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn execute(&self, request: Request) -> Result<Response> {
            self.requests.lock().unwrap().push(SeenRequest {
                method: request.method().clone(),
                url: request.url().clone(),
                body: request
                    .body()
                    .and_then(|b| b.as_bytes())
                    .map(|b| b.to_vec()),
            });
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected request")
        }

        async fn close_idle_connections(&self) {
            let _ = self.flushes.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Build a response with the given status, headers and body.
    pub fn response(status: u16, headers: &[(&str, &str)], body: &str) -> Response {
        let mut builder = ::http::Response::builder().status(status);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        Response::from(builder.body(body.to_string()).unwrap())
    }

    /// Counts how many times a response body has been dropped.
    #[derive(Debug, Clone, Default)]
    pub struct DropCounter(Arc<AtomicUsize>);

    struct Guard(Arc<AtomicUsize>);

    impl Guard {
        fn touch(&self) {}
    }

    impl Drop for Guard {
        fn drop(&mut self) {
            let _ = self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl DropCounter {
        pub fn count(&self) -> usize {
            self.0.load(Ordering::SeqCst)
        }

        /// Build a streaming response whose body bumps the counter when dropped.
        pub fn response(&self, status: u16, headers: &[(&str, &str)], body: &str) -> Response {
            let guard = Guard(self.0.clone());
            let chunks = vec![Ok::<_, std::io::Error>(body.as_bytes().to_vec())];
            let body_stream = stream::iter(chunks).map(move |chunk| {
                guard.touch();
                chunk
            });
            let mut builder = ::http::Response::builder().status(status);
            for (name, value) in headers {
                builder = builder.header(*name, *value);
            }
            Response::from(builder.body(Body::wrap_stream(body_stream)).unwrap())
        }
    }

    fn request() -> Request {
        Request::new(
            Method::POST,
            Url::parse("http://127.0.0.1:5000/v3/auth/tokens").unwrap(),
        )
    }

    #[derive(Debug, Deserialize)]
    struct Sample {
        value: u32,
    }

    #[tokio::test]
    async fn test_execute_success() {
        let transport = MockTransport::new(vec![Ok(response(201, &[], "{\"value\": 42}"))]);
        let resp = execute(request(), &transport).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(transport.flushes(), 1);
        let sample: Sample = read_json(resp).await.unwrap();
        assert_eq!(sample.value, 42);
    }

    #[tokio::test]
    async fn test_execute_status_error() {
        let counter = DropCounter::default();
        let transport =
            MockTransport::new(vec![Ok(counter.response(401, &[], "{\"error\": {}}"))]);
        let err = execute(request(), &transport).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert!(err.to_string().contains("401"));
        assert_eq!(transport.flushes(), 1);
        assert_eq!(counter.count(), 1);
    }

    #[tokio::test]
    async fn test_execute_transport_error() {
        let transport = MockTransport::new(vec![Err(Error::new(
            ErrorKind::ProtocolError,
            "connection refused",
        ))]);
        let err = execute(request(), &transport).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProtocolError);
        assert!(err.is_retryable());
        assert_eq!(transport.flushes(), 1);
    }

    #[tokio::test]
    async fn test_read_json_closes_body() {
        let counter = DropCounter::default();
        let sample: Sample = read_json(counter.response(200, &[], "{\"value\": 1}"))
            .await
            .unwrap();
        assert_eq!(sample.value, 1);
        assert_eq!(counter.count(), 1);

        let counter = DropCounter::default();
        let err = read_json::<Sample>(counter.response(200, &[], "not json"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidResponse);
        assert_eq!(counter.count(), 1);
    }
}
