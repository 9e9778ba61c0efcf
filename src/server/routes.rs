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

use std::{collections::HashMap, sync::Arc};

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::{Method, Uri},
    response::IntoResponse,
    routing::get,
};
use axum_extra::extract::WithRejection;

use super::ServerState;
use crate::{
    Error, ErrorKind,
    errors::DEFAULT_TITLE,
    models::{Comment, InfoResponse, Post, PostQuery, PostsQuery, parse_post_id},
    utils::trace::TraceContext,
};

const PACKAGE_VERSION: &str = env!("CARGO_PKG_VERSION");
const PACKAGE_NAME: &str = env!("CARGO_PKG_NAME");

/// Creates health router.
pub fn health_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/info", get(info))
        .with_state(state)
}

/// Creates posts router.
///
/// Handlers expect a [`TraceContext`] request extension.
pub fn posts_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/posts", get(list_posts))
        .route("/posts/{id}", get(get_post))
        .route("/posts/{id}/comments", get(list_comments))
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(HashMap::from([(PACKAGE_NAME, PACKAGE_VERSION)]))
}

async fn info(State(state): State<Arc<ServerState>>) -> Json<InfoResponse> {
    Json(InfoResponse {
        name: PACKAGE_NAME.into(),
        version: PACKAGE_VERSION.into(),
        upstream: state.service().upstream_url().to_string(),
    })
}

async fn list_posts(
    State(state): State<Arc<ServerState>>,
    Extension(trace): Extension<TraceContext>,
    WithRejection(Query(query), _): WithRejection<Query<PostsQuery>, Error>,
) -> Result<Json<Vec<Post>>, Error> {
    let user_id = query.user_id()?;
    let posts = state.service().posts(&trace, user_id).await?;
    Ok(Json(posts))
}

async fn get_post(
    State(state): State<Arc<ServerState>>,
    Extension(trace): Extension<TraceContext>,
    WithRejection(Path(id), _): WithRejection<Path<String>, Error>,
    WithRejection(Query(query), _): WithRejection<Query<PostQuery>, Error>,
) -> Result<Json<Post>, Error> {
    let id = parse_post_id(&id)?;
    let post = if query.include_comments {
        state.service().post_with_comments(&trace, id).await?
    } else {
        state.service().post(&trace, id).await?
    };
    Ok(Json(post))
}

async fn list_comments(
    State(state): State<Arc<ServerState>>,
    Extension(trace): Extension<TraceContext>,
    WithRejection(Path(id), _): WithRejection<Path<String>, Error>,
) -> Result<Json<Vec<Comment>>, Error> {
    let post_id = parse_post_id(&id)?;
    let comments = state.service().comments(&trace, post_id).await?;
    Ok(Json(comments))
}

async fn not_found(method: Method, uri: Uri) -> Error {
    Error::resource_not_found(format!("No endpoint {method} {}.", uri.path()))
}

async fn method_not_allowed(method: Method) -> Error {
    Error::new(
        ErrorKind::BadRequest,
        format!("Request method '{method}' is not supported"),
        DEFAULT_TITLE,
        405,
    )
}
