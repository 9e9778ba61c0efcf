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

//! Request/response logging around outbound calls.

use std::{fmt::Display, future::Future};

use bytes::Bytes;
use http::{HeaderMap, Request, header::ToStrError};
use http_body::Body;
use http_body_util::BodyExt;
use tracing::{error, info};

use super::{Error, http::Response};
use crate::utils::trace::TraceContext;

#[derive(Debug, thiserror::Error)]
enum LogError {
    #[error("header `{0}` is not visible ASCII: {1}")]
    Header(String, #[source] ToStrError),
    #[error("body is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("body read failed: {0}")]
    Read(String),
}

/// Wraps a single outbound call.
///
/// Logs the request, calls `send` exactly once, stamps `X-Trace-Id` and
/// `X-Span-Id` from `trace` onto the response, buffers the body and logs the
/// response. Logging failures are reported and never change the outcome of
/// `send`.
pub async fn trace<F, Fut, B>(
    trace: &TraceContext,
    request: Request<Bytes>,
    send: F,
) -> Result<Response, Error>
where
    F: FnOnce(Request<Bytes>) -> Fut,
    Fut: Future<Output = Result<http::Response<B>, Error>>,
    B: Body<Data = Bytes>,
    B::Error: Display,
{
    log_request(trace, &request);
    let mut response = send(request).await?;
    set_tracing_headers(trace, response.headers_mut());
    Ok(log_response(trace, response).await)
}

fn log_request(trace: &TraceContext, request: &Request<Bytes>) {
    match format_parts(request.headers(), request.body()) {
        Ok((headers, body)) => info!(
            trace_id = trace.trace_id(),
            span_id = trace.span_id(),
            method = %request.method(),
            uri = %request.uri(),
            %headers,
            %body,
            "Request ==>"
        ),
        Err(error) => error!(
            trace_id = trace.trace_id(),
            span_id = trace.span_id(),
            %error,
            "Failed to log request"
        ),
    }
}

fn set_tracing_headers(trace: &TraceContext, headers: &mut HeaderMap) {
    if let Err(error) = trace.inject(headers) {
        error!(%error, "Failed to set tracing headers on client response");
    }
}

async fn log_response<B>(trace: &TraceContext, response: http::Response<B>) -> Response
where
    B: Body<Data = Bytes>,
    B::Error: Display,
{
    let (parts, body) = response.into_parts();
    let body = body
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .map_err(|error| error.to_string());
    let response = Response::from_parts(parts, body);
    let formatted = response
        .body()
        .as_ref()
        .map_err(|error| LogError::Read(error.clone()))
        .and_then(|body| format_parts(response.headers(), body));
    match formatted {
        Ok((headers, body)) => info!(
            trace_id = trace.trace_id(),
            span_id = trace.span_id(),
            status = %response.status(),
            %headers,
            %body,
            "Response <=="
        ),
        Err(error) => error!(
            trace_id = trace.trace_id(),
            span_id = trace.span_id(),
            %error,
            "Failed to log response"
        ),
    }
    response
}

/// Renders headers and body as text for a log line.
fn format_parts<'a>(headers: &HeaderMap, body: &'a Bytes) -> Result<(String, &'a str), LogError> {
    Ok((format_headers(headers)?, std::str::from_utf8(body)?))
}

fn format_headers(headers: &HeaderMap) -> Result<String, LogError> {
    let headers = headers
        .iter()
        .map(|(name, value)| {
            value
                .to_str()
                .map(|value| format!("{name}:\"{value}\""))
                .map_err(|error| LogError::Header(name.to_string(), error))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(format!("[{}]", headers.join(", ")))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::stream;
    use http::{HeaderValue, StatusCode, header::CONTENT_TYPE};
    use http_body::Frame;
    use http_body_util::{Full, StreamBody};
    use tracing_test::traced_test;

    use super::*;
    use crate::utils::trace::{SPAN_ID_HEADER, TRACE_ID_HEADER};

    fn request() -> Request<Bytes> {
        Request::get("https://jsonplaceholder.typicode.com/posts/1")
            .header("accept", "application/json")
            .body(Bytes::new())
            .unwrap()
    }

    fn ok_response(body: &'static [u8]) -> http::Response<Full<Bytes>> {
        http::Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from_static(body)))
            .unwrap()
    }

    #[traced_test]
    #[tokio::test]
    async fn test_logs_request_and_response() {
        let calls = AtomicUsize::new(0);
        let trace_ctx = TraceContext::new("4bf92f3577b34da6a3ce929d0e0e4736", "00f067aa0ba902b7");
        let response = trace(&trace_ctx, request(), |_| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(ok_response(b"{\"id\": 1}"))
        })
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(response.status(), StatusCode::OK);
        // Body is still readable after logging
        assert_eq!(response.bytes().unwrap(), &Bytes::from_static(b"{\"id\": 1}"));
        assert_eq!(
            response.headers().get(TRACE_ID_HEADER).unwrap(),
            "4bf92f3577b34da6a3ce929d0e0e4736"
        );
        assert_eq!(
            response.headers().get(SPAN_ID_HEADER).unwrap(),
            "00f067aa0ba902b7"
        );
        assert!(logs_contain("Request ==>"));
        assert!(logs_contain("uri=https://jsonplaceholder.typicode.com/posts/1"));
        assert!(logs_contain("headers=[accept:\"application/json\"]"));
        assert!(logs_contain("Response <=="));
        assert!(logs_contain("status=200 OK"));
        assert!(logs_contain("4bf92f3577b34da6a3ce929d0e0e4736"));
        assert!(!logs_contain("Failed to log"));
    }

    #[traced_test]
    #[tokio::test]
    async fn test_without_trace_context_adds_no_headers() {
        let response = trace(&TraceContext::default(), request(), |_| async {
            Ok(ok_response(b"[]"))
        })
        .await
        .unwrap();

        assert!(response.headers().get(TRACE_ID_HEADER).is_none());
        assert!(response.headers().get(SPAN_ID_HEADER).is_none());
    }

    #[traced_test]
    #[tokio::test]
    async fn test_request_log_failure_still_sends_once() {
        let calls = AtomicUsize::new(0);
        let mut request = request();
        request
            .headers_mut()
            .insert("x-opaque", HeaderValue::from_bytes(b"\xff").unwrap());

        let response = trace(&TraceContext::default(), request, |request| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                // The request reaches the wrapped call unchanged
                assert!(request.headers().contains_key("x-opaque"));
                Ok(ok_response(b"{}"))
            }
        })
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(response.status(), StatusCode::OK);
        assert!(logs_contain("Failed to log request"));
        assert!(!logs_contain("Failed to log response"));
    }

    #[traced_test]
    #[tokio::test]
    async fn test_response_body_read_failure_returns_response() {
        let response = trace(&TraceContext::default(), request(), |_| async {
            let body = StreamBody::new(stream::iter(vec![Err::<Frame<Bytes>, _>(
                std::io::Error::other("connection reset"),
            )]));
            Ok(http::Response::builder()
                .status(StatusCode::OK)
                .body(body)
                .unwrap())
        })
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.bytes().is_err());
        assert!(logs_contain("Failed to log response"));
        assert!(logs_contain("connection reset"));
    }

    #[traced_test]
    #[tokio::test]
    async fn test_non_utf8_response_body() {
        let response = trace(&TraceContext::default(), request(), |_| async {
            Ok(ok_response(b"\xff\xfe"))
        })
        .await
        .unwrap();

        assert_eq!(response.bytes().unwrap().as_ref(), b"\xff\xfe");
        assert!(logs_contain("Failed to log response"));
    }

    #[traced_test]
    #[tokio::test]
    async fn test_send_error_is_returned() {
        let result = trace(&TraceContext::default(), request(), |_| async {
            Err::<http::Response<Full<Bytes>>, _>(Error::Internal {
                message: "sending client request failed: connection refused".into(),
            })
        })
        .await;

        assert_eq!(
            result.unwrap_err().to_string(),
            "sending client request failed: connection refused"
        );
        assert!(logs_contain("Request ==>"));
        assert!(!logs_contain("Response <=="));
    }
}
