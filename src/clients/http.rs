/*
 Copyright FMS Guardrails Orchestrator Authors

 Licensed under the Apache License, Version 2.0 (the "License");
 you may not use this file except in compliance with the License.
 You may obtain a copy of the License at

     http://www.apache.org/licenses/LICENSE-2.0

 Unless required by applicable law or agreed to in writing, software
 distributed under the License is distributed on an "AS IS" BASIS,
 WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 See the License for the specific language governing permissions and
 limitations under the License.

*/

use std::{ops::Deref, time::Duration};

use bytes::Bytes;
use http::{HeaderMap, Method, Request};
use http_body_util::Full;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use serde::de::DeserializeOwned;
use tracing::{Span, debug, instrument};
use tracing_opentelemetry::OpenTelemetrySpanExt;
use url::Url;

use super::{Error, tracer};
use crate::utils::{
    AsUriExt,
    trace::{TraceContext, with_traceparent_header},
};

/// Response body read fully into memory, or the error raised while reading it.
pub type BufferedBody = Result<Bytes, String>;

/// HTTP response type, thin wrapper for `http::Response` with a buffered body.
///
/// The body is buffered once by the tracer so logging never consumes it.
#[derive(Debug)]
pub struct Response(pub http::Response<BufferedBody>);

impl Response {
    pub fn from_parts(parts: http::response::Parts, body: BufferedBody) -> Self {
        Self(http::Response::from_parts(parts, body))
    }

    /// Returns the buffered body, or the error raised while reading it.
    pub fn bytes(&self) -> Result<&Bytes, Error> {
        self.0
            .body()
            .as_ref()
            .map_err(|error| Error::internal("client response body read failed", error))
    }

    /// Deserializes the response body as JSON into type `T`.
    ///
    /// An empty body or a JSON `null` yields `None`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<Option<T>, Error> {
        let body = self.bytes()?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        serde_json::from_slice::<Option<T>>(body)
            .map_err(|error| Error::internal("client response deserialization failed", error))
    }

    /// Turns a 4xx or 5xx response into [`Error::Http`] carrying the status
    /// and the upstream body.
    pub fn error_for_status(self) -> Result<Self, Error> {
        let code = self.status();
        if !code.is_client_error() && !code.is_server_error() {
            return Ok(self);
        }
        let message = match self.0.body() {
            Ok(body) if !body.is_empty() => {
                format!("{code}: \"{}\"", String::from_utf8_lossy(body))
            }
            _ => format!("{code}: [no body]"),
        };
        Err(Error::Http { code, message })
    }
}

impl Deref for Response {
    type Target = http::Response<BufferedBody>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

pub type HttpClientInner =
    hyper_util::client::legacy::Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

/// An HTTP client wrapping an inner `hyper` HTTP client providing a higher-level API.
///
/// Every call goes through [`tracer::trace`].
#[derive(Clone)]
pub struct HttpClient {
    base_url: Url,
    request_timeout: Duration,
    headers: HeaderMap,
    inner: HttpClientInner,
}

impl HttpClient {
    pub fn new(base_url: Url, request_timeout: Duration, inner: HttpClientInner) -> Self {
        let mut base_url = base_url;
        // Relative joins keep the base path only with a trailing slash
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            base_url,
            request_timeout,
            headers: HeaderMap::new(),
            inner,
        }
    }

    /// Sets static headers sent with every request.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves `path` against the base url.
    pub fn endpoint(&self, path: &str) -> Result<Url, Error> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|error| Error::internal("invalid client endpoint", error))
    }

    #[instrument(skip_all, fields(url = %url))]
    pub async fn get(&self, trace: &TraceContext, url: Url) -> Result<Response, Error> {
        self.send(trace, url, Method::GET, HeaderMap::new(), Bytes::new())
            .await
    }

    #[instrument(skip_all, fields(url = %url, method = %method))]
    pub async fn send(
        &self,
        trace: &TraceContext,
        url: Url,
        method: Method,
        headers: HeaderMap,
        body: Bytes,
    ) -> Result<Response, Error> {
        let mut request_headers = self.headers.clone();
        request_headers.extend(headers);
        let request_headers = with_traceparent_header(&Span::current().context(), request_headers);

        let uri = url
            .as_uri()
            .map_err(|error| Error::internal("client request creation failed", error))?;
        let mut request = Request::builder()
            .method(method)
            .uri(uri)
            .body(body)
            .map_err(|error| Error::internal("client request creation failed", error))?;
        request.headers_mut().extend(request_headers);

        // The deadline covers the response body, which the tracer reads in full.
        let traced = tracer::trace(trace, request, |request| async move {
            self.inner
                .request(request.map(Full::new))
                .await
                .map_err(|error| Error::internal("sending client request failed", error))
        });
        let response = match tokio::time::timeout(self.request_timeout, traced).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(Error::Internal {
                    message: format!(
                        "client request timed out after {}ms",
                        self.request_timeout.as_millis()
                    ),
                });
            }
        };
        debug!(status = %response.status(), "received client response");
        response.error_for_status()
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        id: i32,
    }

    fn response(status: StatusCode, body: BufferedBody) -> Response {
        let mut response = http::Response::new(body);
        *response.status_mut() = status;
        Response(response)
    }

    #[test]
    fn test_json() {
        let ok = response(StatusCode::OK, Ok(Bytes::from_static(b"{\"id\": 7}")));
        assert_eq!(ok.json::<Item>().unwrap(), Some(Item { id: 7 }));

        for body in ["", "  \n", "null"] {
            let empty = response(StatusCode::OK, Ok(Bytes::from(body)));
            assert_eq!(empty.json::<Item>().unwrap(), None);
        }

        let malformed = response(StatusCode::OK, Ok(Bytes::from_static(b"{\"id\": ")));
        let error = malformed.json::<Item>().unwrap_err();
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(
            error
                .to_string()
                .starts_with("client response deserialization failed")
        );

        let unreadable = response(StatusCode::OK, Err("connection reset".into()));
        let error = unreadable.json::<Item>().unwrap_err();
        assert_eq!(
            error.to_string(),
            "client response body read failed: connection reset"
        );
    }

    #[test]
    fn test_error_for_status() {
        let ok = response(StatusCode::OK, Ok(Bytes::new()));
        assert!(ok.error_for_status().is_ok());

        let not_found = response(StatusCode::NOT_FOUND, Ok(Bytes::from_static(b"{}")));
        assert_eq!(
            not_found.error_for_status().unwrap_err(),
            Error::Http {
                code: StatusCode::NOT_FOUND,
                message: "404 Not Found: \"{}\"".into(),
            }
        );

        let unavailable = response(StatusCode::SERVICE_UNAVAILABLE, Ok(Bytes::new()));
        assert_eq!(
            unavailable.error_for_status().unwrap_err(),
            Error::Http {
                code: StatusCode::SERVICE_UNAVAILABLE,
                message: "503 Service Unavailable: [no body]".into(),
            }
        );
    }
}
