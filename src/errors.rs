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

use http::StatusCode;
use tracing::warn;

/// Detail used when an error is raised without a message.
pub const DEFAULT_DETAIL: &str = "API Error occurred. Please contact support or administrator.";
/// Title used for failures that do not belong to a specific category.
pub const DEFAULT_TITLE: &str = "API Error Occurred";

/// Failure categories surfaced by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller input could not be parsed.
    BadRequest,
    /// The upstream reported that the entity does not exist.
    ResourceNotFound,
    /// Any other upstream failure. The upstream status is forwarded.
    Integration,
    /// Failures with no better category.
    Internal,
}

impl ErrorKind {
    /// Short label rendered as the problem title.
    pub fn title(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "Bad Request",
            ErrorKind::ResourceNotFound => "Resource Not Found",
            ErrorKind::Integration => "Integration Error",
            ErrorKind::Internal => DEFAULT_TITLE,
        }
    }
}

/// Gateway error returned by every client and service operation.
///
/// Detail is never blank and status is always a valid HTTP status.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{title}: {detail}")]
pub struct Error {
    kind: ErrorKind,
    title: String,
    detail: String,
    status: StatusCode,
}

impl Error {
    /// Creates an error, substituting [`DEFAULT_DETAIL`] for a blank detail,
    /// the kind's title for a blank title and `500` for an invalid status.
    pub fn new(
        kind: ErrorKind,
        detail: impl Into<String>,
        title: impl Into<String>,
        status: u16,
    ) -> Self {
        let detail = detail.into();
        let detail = if detail.trim().is_empty() {
            DEFAULT_DETAIL.to_string()
        } else {
            detail
        };
        let title = title.into();
        let title = if title.trim().is_empty() {
            kind.title().to_string()
        } else {
            title
        };
        let status = match StatusCode::from_u16(status) {
            Ok(code) if (100..600).contains(&status) => code,
            _ => {
                warn!(status, "invalid error status code, using 500");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            kind,
            title,
            detail,
            status,
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        let kind = ErrorKind::BadRequest;
        Self::new(kind, detail, kind.title(), 400)
    }

    pub fn resource_not_found(detail: impl Into<String>) -> Self {
        let kind = ErrorKind::ResourceNotFound;
        Self::new(kind, detail, kind.title(), 404)
    }

    pub fn integration(detail: impl Into<String>, status: u16) -> Self {
        let kind = ErrorKind::Integration;
        Self::new(kind, detail, kind.title(), status)
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        let kind = ErrorKind::Internal;
        Self::new(kind, detail, kind.title(), 500)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_detail_uses_fallback() {
        for detail in ["", "   ", "\n\t"] {
            let error = Error::internal(detail);
            assert_eq!(error.detail(), DEFAULT_DETAIL);
        }
        let error = Error::new(ErrorKind::Integration, "", "Integration Error", 502);
        assert_eq!(error.detail(), DEFAULT_DETAIL);
        assert_eq!(error.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_invalid_status_falls_back_to_500() {
        let error = Error::new(ErrorKind::Integration, "bad status", "Bad", 1000);
        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.detail(), "bad status");
        assert_eq!(error.title(), "Bad");

        for status in [0, 42, 600, 999] {
            let error = Error::integration("upstream failed", status);
            assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    #[test]
    fn test_constructors() {
        let error = Error::bad_request("Invalid userId parameter abc");
        assert_eq!(error.kind(), ErrorKind::BadRequest);
        assert_eq!(error.title(), "Bad Request");
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);

        let error = Error::resource_not_found("Cannot find a Post with id 7");
        assert_eq!(error.kind(), ErrorKind::ResourceNotFound);
        assert_eq!(error.title(), "Resource Not Found");
        assert_eq!(error.status(), StatusCode::NOT_FOUND);

        let error = Error::integration("rate limited", 429);
        assert_eq!(error.kind(), ErrorKind::Integration);
        assert_eq!(error.title(), "Integration Error");
        assert_eq!(error.status(), StatusCode::TOO_MANY_REQUESTS);

        let error = Error::internal("boom");
        assert_eq!(error.title(), DEFAULT_TITLE);
        assert_eq!(error.to_string(), "API Error Occurred: boom");
    }

    #[test]
    fn test_blank_title_uses_kind_title() {
        let error = Error::new(ErrorKind::ResourceNotFound, "gone", " ", 404);
        assert_eq!(error.title(), "Resource Not Found");
    }
}
