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

use std::time::Duration;

use ::http::{HeaderMap, HeaderName, HeaderValue};
use hyper_util::{client::legacy::connect::HttpConnector, rt::TokioExecutor};
use tracing::debug;

use crate::config::ServiceConfig;

pub mod errors;
pub use errors::Error;

pub mod http;
pub use http::HttpClient;

pub mod posts;
pub use posts::PostsClient;

pub mod tracer;

const DEFAULT_CONNECT_TIMEOUT_SEC: u64 = 10;
const DEFAULT_REQUEST_TIMEOUT_SEC: u64 = 30;

/// Creates an HTTP(S) client for a service.
pub fn create_http_client(service_config: &ServiceConfig) -> Result<HttpClient, Error> {
    let base_url = service_config
        .base_url()
        .map_err(|error| Error::internal("invalid service config", error))?;
    let connect_timeout = Duration::from_secs(
        service_config
            .connect_timeout
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SEC),
    );
    let request_timeout = Duration::from_secs(
        service_config
            .request_timeout
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SEC),
    );

    let mut http_connector = HttpConnector::new();
    http_connector.enforce_http(false);
    http_connector.set_connect_timeout(Some(connect_timeout));
    let connector = hyper_rustls::HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .wrap_connector(http_connector);
    let inner = hyper_util::client::legacy::Client::builder(TokioExecutor::new()).build(connector);

    let headers = service_config
        .headers
        .iter()
        .map(|(name, value)| {
            let name = HeaderName::try_from(name.as_str())
                .map_err(|error| Error::internal("invalid service header name", error))?;
            let value = HeaderValue::try_from(value.as_str())
                .map_err(|error| Error::internal("invalid service header value", error))?;
            Ok((name, value))
        })
        .collect::<Result<HeaderMap, Error>>()?;

    debug!(%base_url, ?connect_timeout, ?request_timeout, "created http client");
    Ok(HttpClient::new(base_url, request_timeout, inner).with_headers(headers))
}
