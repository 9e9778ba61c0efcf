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

use std::fmt::Display;

use http::StatusCode;

/// Client errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// The upstream answered with a client or server error status.
    #[error("{}", .message)]
    Http { code: StatusCode, message: String },
    /// The request could not be built, sent or decoded.
    #[error("{}", .message)]
    Internal { message: String },
}

impl Error {
    /// Returns status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            // Return http status code for error responses
            Error::Http { code, .. } => *code,
            // Return 500 for other errors
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Creates an internal error from a context message and its cause.
    pub fn internal(message: &str, error: impl Display) -> Self {
        Self::Internal {
            message: format!("{message}: {error}"),
        }
    }
}
