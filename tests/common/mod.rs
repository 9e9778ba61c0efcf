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

use mocktail::prelude::*;
use posts_gateway::{
    config::GatewayConfig,
    models::{Comment, Post},
    server::ServerState,
    service::PostService,
};
use rustls::crypto::ring;

/// Gateway configuration file for integration tests.
pub const CONFIG_FILE_PATH: &str = "tests/test_config.yaml";

// Upstream endpoints
pub const POSTS_ENDPOINT: &str = "/posts";

pub fn post_endpoint(id: i32) -> String {
    format!("/posts/{id}")
}

pub fn comments_endpoint(post_id: i32) -> String {
    format!("/posts/{post_id}/comments")
}

pub fn ensure_global_rustls_state() {
    let _ = ring::default_provider().install_default();
}

/// Starts the mock upstream and creates a post service pointing at it.
pub async fn create_post_service(upstream: &MockServer) -> Result<PostService, anyhow::Error> {
    ensure_global_rustls_state();
    let mut config = GatewayConfig::load(CONFIG_FILE_PATH).await?;
    upstream.start().await?;
    config.upstream.port = upstream.addr().map(|addr| addr.port());
    Ok(PostService::new(config)?)
}

/// Starts the mock upstream and creates shared server state pointing at it.
pub async fn create_server_state(upstream: &MockServer) -> Result<Arc<ServerState>, anyhow::Error> {
    let service = create_post_service(upstream).await?;
    Ok(Arc::new(ServerState::new(service)))
}

pub fn post(user_id: i32, id: i32) -> Post {
    Post {
        user_id,
        id,
        title: format!("post {id} title"),
        body: format!("post {id} body"),
        comments: vec![],
    }
}

pub fn posts() -> Vec<Post> {
    vec![post(1, 1), post(1, 2), post(2, 3), post(3, 4)]
}

pub fn comments(post_id: i32) -> Vec<Comment> {
    (1..=2)
        .map(|n| Comment {
            post_id,
            id: post_id * 10 + n,
            name: format!("comment {n}"),
            email: format!("user{n}@example.com"),
            body: format!("comment {n} on post {post_id}"),
        })
        .collect()
}
