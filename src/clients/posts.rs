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
use serde::de::DeserializeOwned;
use tracing::{error, instrument};

use super::{Error as ClientError, HttpClient};
use crate::{
    Error,
    models::{Comment, Post},
    utils::trace::TraceContext,
};

const POSTS_ENDPOINT: &str = "posts";

fn post_endpoint(id: i32) -> String {
    format!("{POSTS_ENDPOINT}/{id}")
}

fn comments_endpoint(post_id: i32) -> String {
    format!("{POSTS_ENDPOINT}/{post_id}/comments")
}

/// Client for the upstream posts API.
///
/// Translates every upstream failure into the gateway [`Error`] once, at the
/// point of detection. Never retries.
#[derive(Clone)]
pub struct PostsClient {
    client: HttpClient,
}

impl PostsClient {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    pub fn base_url(&self) -> &url::Url {
        self.client.base_url()
    }

    /// Lists all posts. An empty or `null` payload yields no posts.
    #[instrument(skip_all)]
    pub async fn list_posts(&self, trace: &TraceContext) -> Result<Vec<Post>, Error> {
        self.fetch::<Vec<Post>>(trace, POSTS_ENDPOINT)
            .await
            .map(Option::unwrap_or_default)
            .map_err(|error| {
                let error = translate(
                    error,
                    |message| format!("Error occurred while fetching posts: {message}"),
                    None,
                );
                error!(%error, "failed to fetch posts");
                error
            })
    }

    /// Gets a single post. An empty or `null` payload yields a default post.
    #[instrument(skip_all, fields(id = id))]
    pub async fn get_post(&self, trace: &TraceContext, id: i32) -> Result<Post, Error> {
        self.fetch::<Post>(trace, &post_endpoint(id))
            .await
            .map(Option::unwrap_or_default)
            .map_err(|error| {
                let error = translate(
                    error,
                    |message| format!("Error occurred while fetching post with id {id}: {message}"),
                    Some(id),
                );
                error!(id, %error, "failed to fetch post");
                error
            })
    }

    /// Lists the comments of a post. An empty or `null` payload yields no comments.
    #[instrument(skip_all, fields(post_id = post_id))]
    pub async fn list_comments(
        &self,
        trace: &TraceContext,
        post_id: i32,
    ) -> Result<Vec<Comment>, Error> {
        self.fetch::<Vec<Comment>>(trace, &comments_endpoint(post_id))
            .await
            .map(Option::unwrap_or_default)
            .map_err(|error| {
                let error = translate(
                    error,
                    |message| {
                        format!(
                            "Error occurred while fetching comments for post with id {post_id}: {message}"
                        )
                    },
                    Some(post_id),
                );
                error!(post_id, %error, "failed to fetch comments");
                error
            })
    }

    /// Gets a post with its comments attached.
    ///
    /// The post is fetched first; its failure is returned before comments are
    /// requested.
    #[instrument(skip_all, fields(post_id = post_id))]
    pub async fn get_post_with_comments(
        &self,
        trace: &TraceContext,
        post_id: i32,
    ) -> Result<Post, Error> {
        let mut post = self.get_post(trace, post_id).await?;
        post.comments = self.list_comments(trace, post_id).await?;
        Ok(post)
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        trace: &TraceContext,
        path: &str,
    ) -> Result<Option<T>, ClientError> {
        let url = self.client.endpoint(path)?;
        let response = self.client.get(trace, url).await?;
        response.json::<T>()
    }
}

/// Maps a client error into the gateway error.
///
/// A 404 becomes `ResourceNotFound` when `not_found_id` is set. Other upstream
/// statuses become `IntegrationError` carrying that status. Transport and
/// decoding failures become `InternalError`.
fn translate(
    error: ClientError,
    detail: impl FnOnce(&str) -> String,
    not_found_id: Option<i32>,
) -> Error {
    match (error, not_found_id) {
        (ClientError::Http { code, .. }, Some(id)) if code == StatusCode::NOT_FOUND => {
            Error::resource_not_found(format!("Cannot find a Post with id {id}"))
        }
        (ClientError::Http { code, message }, _) => {
            Error::integration(detail(&message), code.as_u16())
        }
        (ClientError::Internal { message }, _) => Error::internal(detail(&message)),
    }
}
