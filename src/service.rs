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

use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    Error,
    clients::{self, PostsClient, create_http_client},
    config::GatewayConfig,
    models::{Comment, Post, filter_by_user_id},
    utils::trace::TraceContext,
};

struct Context {
    posts_client: PostsClient,
}

/// Handles post and comment lookups.
///
/// Cheap to clone; clones share the same client.
#[derive(Clone)]
pub struct PostService {
    ctx: Arc<Context>,
}

impl PostService {
    pub fn new(config: GatewayConfig) -> Result<Self, clients::Error> {
        let posts_client = PostsClient::new(create_http_client(&config.upstream)?);
        info!(upstream = %posts_client.base_url(), "created posts client");
        let ctx = Arc::new(Context { posts_client });
        Ok(Self { ctx })
    }

    /// Base url of the upstream API.
    pub fn upstream_url(&self) -> &url::Url {
        self.ctx.posts_client.base_url()
    }

    /// Lists posts, keeping only those of `user_id` when set.
    pub async fn posts(
        &self,
        trace: &TraceContext,
        user_id: Option<i32>,
    ) -> Result<Vec<Post>, Error> {
        info!(?user_id, "handling list posts");
        let posts = self.ctx.posts_client.list_posts(trace).await?;
        let posts = filter_by_user_id(posts, user_id);
        debug!(count = posts.len(), "returning posts");
        Ok(posts)
    }

    pub async fn post(&self, trace: &TraceContext, id: i32) -> Result<Post, Error> {
        info!(id, "handling get post");
        self.ctx.posts_client.get_post(trace, id).await
    }

    pub async fn post_with_comments(&self, trace: &TraceContext, id: i32) -> Result<Post, Error> {
        info!(id, "handling get post with comments");
        self.ctx.posts_client.get_post_with_comments(trace, id).await
    }

    pub async fn comments(&self, trace: &TraceContext, post_id: i32) -> Result<Vec<Comment>, Error> {
        info!(post_id, "handling list comments");
        self.ctx.posts_client.list_comments(trace, post_id).await
    }
}
