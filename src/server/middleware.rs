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

use axum::{extract::Request, middleware::Next, response::Response};
use tracing::error;

use crate::utils::trace::TraceContext;

/// Captures the trace context of the request span.
///
/// Inserts it as a request extension for handlers and writes `X-Trace-Id` and
/// `X-Span-Id` onto the response. Must run inside the request span.
pub async fn propagate_trace_context(mut request: Request, next: Next) -> Response {
    let trace = TraceContext::current();
    request.extensions_mut().insert(trace.clone());
    let mut response = next.run(request).await;
    if let Err(error) = trace.inject(response.headers_mut()) {
        error!(
            %error,
            "Failed to inject OpenTelemetry trace/span IDs into response headers"
        );
    }
    response
}
