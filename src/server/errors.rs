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

use std::net::SocketAddr;

use axum::{
    Json,
    extract::rejection::{PathRejection, QueryRejection},
    response::{IntoResponse, Response},
};
use http::{HeaderValue, header::CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::Error as GatewayError;

pub const PROBLEM_JSON: &str = "application/problem+json";

/// Errors raised while starting or running the servers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to bind to {addr}: {error}")]
    Bind {
        addr: SocketAddr,
        error: std::io::Error,
    },
    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

/// Problem body rendered for every failed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemDetail {
    #[serde(rename = "type")]
    pub r#type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

impl From<&GatewayError> for ProblemDetail {
    fn from(error: &GatewayError) -> Self {
        Self {
            r#type: "about:blank".into(),
            title: error.title().into(),
            status: error.status().as_u16(),
            detail: error.detail().into(),
            instance: None,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let problem = ProblemDetail::from(&self);
        error!(
            title = %problem.title,
            detail = %problem.detail,
            status = problem.status,
            "request failed"
        );
        let mut response = (self.status(), Json(problem)).into_response();
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(PROBLEM_JSON));
        response
    }
}

impl From<QueryRejection> for GatewayError {
    fn from(rejection: QueryRejection) -> Self {
        GatewayError::bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for GatewayError {
    fn from(rejection: PathRejection) -> Self {
        GatewayError::bad_request(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;
    use http_body_util::BodyExt;
    use tracing_test::traced_test;

    use super::*;
    use crate::errors::{DEFAULT_DETAIL, DEFAULT_TITLE, ErrorKind};

    async fn render(error: GatewayError) -> (StatusCode, Option<HeaderValue>, ProblemDetail) {
        let response = error.into_response();
        let status = response.status();
        let content_type = response.headers().get(CONTENT_TYPE).cloned();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, content_type, serde_json::from_slice(&body).unwrap())
    }

    #[traced_test]
    #[tokio::test]
    async fn test_problem_response() {
        let (status, content_type, problem) =
            render(GatewayError::resource_not_found("Cannot find a Post with id 9")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(content_type.unwrap(), PROBLEM_JSON);
        assert_eq!(
            problem,
            ProblemDetail {
                r#type: "about:blank".into(),
                title: "Resource Not Found".into(),
                status: 404,
                detail: "Cannot find a Post with id 9".into(),
                instance: None,
            }
        );
        assert!(logs_contain("request failed"));
        assert!(logs_contain("Cannot find a Post with id 9"));
    }

    #[tokio::test]
    async fn test_problem_response_fallbacks() {
        let error = GatewayError::new(ErrorKind::Internal, "", DEFAULT_TITLE, 1000);
        let (status, _, problem) = render(error).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(problem.status, 500);
        assert_eq!(problem.detail, DEFAULT_DETAIL);
        assert_eq!(problem.title, DEFAULT_TITLE);
    }

    #[tokio::test]
    async fn test_integration_problem_keeps_upstream_status() {
        let error = GatewayError::integration(
            "Error occurred while fetching posts: 429 Too Many Requests: [no body]",
            429,
        );
        let (status, _, problem) = render(error).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(problem.title, "Integration Error");
    }
}
