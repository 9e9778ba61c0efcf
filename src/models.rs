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

use serde::{Deserialize, Serialize};

use crate::Error;

/// A post as returned by the upstream API.
///
/// `comments` is only filled by the composite post-with-comments fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Post {
    pub user_id: i32,
    pub id: i32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub body: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<Comment>,
}

/// A comment on a post.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Comment {
    pub post_id: i32,
    pub id: i32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub body: String,
}

/// Query parameters of the list posts endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostsQuery {
    /// Raw value, parsed by [`PostsQuery::user_id`].
    pub user_id: Option<String>,
}

impl PostsQuery {
    /// Parses the `userId` filter. Absent or empty means no filter.
    pub fn user_id(&self) -> Result<Option<i32>, Error> {
        match self.user_id.as_deref() {
            None | Some("") => Ok(None),
            Some(value) => value
                .parse::<i32>()
                .map(Some)
                .map_err(|_| Error::bad_request(format!("Invalid userId parameter {value}"))),
        }
    }
}

/// Query parameters of the get post endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostQuery {
    #[serde(default)]
    pub include_comments: bool,
}

/// Parses a post id path segment.
pub fn parse_post_id(value: &str) -> Result<i32, Error> {
    value
        .parse::<i32>()
        .map_err(|_| Error::bad_request(format!("Invalid postId parameter {value}")))
}

/// Keeps posts owned by `user_id`, preserving upstream order.
/// No filter returns every post.
pub fn filter_by_user_id(posts: Vec<Post>, user_id: Option<i32>) -> Vec<Post> {
    match user_id {
        Some(user_id) => posts
            .into_iter()
            .filter(|post| post.user_id == user_id)
            .collect(),
        None => posts,
    }
}

/// Response of the info endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfoResponse {
    pub name: String,
    pub version: String,
    pub upstream: String,
}

/// Invalid command line or configuration input.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0}")]
    Invalid(String),
}
