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

use std::{future::IntoFuture, net::SocketAddr, sync::Arc};

use axum::{Router, middleware::from_fn};
use tokio::{net::TcpListener, signal, task::JoinHandle};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::{service::PostService, utils};

mod errors;
pub use errors::{Error, PROBLEM_JSON, ProblemDetail};
mod middleware;
mod routes;

/// Server shared state
pub struct ServerState {
    service: PostService,
}

impl ServerState {
    pub fn new(service: PostService) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &PostService {
        &self.service
    }
}

/// Creates the gateway app: posts routes with trace propagation and request tracing.
pub fn get_app(state: Arc<ServerState>) -> Router {
    with_tracing(routes::posts_router(state))
}

/// Creates the health app served on the separate health port.
pub fn get_health_app(state: Arc<ServerState>) -> Router {
    with_tracing(routes::health_router(state))
}

/// Wraps `router` in a request span and propagates its trace context.
fn with_tracing(router: Router) -> Router {
    router
        .layer(from_fn(middleware::propagate_trace_context))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(utils::trace::incoming_request_span)
                .on_request(utils::trace::on_incoming_request)
                .on_response(utils::trace::on_outgoing_response),
        )
}

/// Binds the gateway and health listeners and serves both until a shutdown
/// signal is received.
///
/// Returns once both listeners are bound. The handle completes when both
/// servers have shut down.
pub async fn run(
    http_addr: SocketAddr,
    health_http_addr: SocketAddr,
    service: PostService,
) -> Result<JoinHandle<Result<(), Error>>, Error> {
    let state = Arc::new(ServerState::new(service));

    let health_listener = bind(health_http_addr).await?;
    let health_server = axum::serve(health_listener, get_health_app(state.clone()))
        .with_graceful_shutdown(shutdown_signal());
    info!("HTTP health server started on port {}", health_http_addr.port());

    let listener = bind(http_addr).await?;
    let http_server =
        axum::serve(listener, get_app(state)).with_graceful_shutdown(shutdown_signal());
    info!("HTTP server started on port {}", http_addr.port());

    Ok(tokio::spawn(async move {
        let (health_res, res) = tokio::join!(health_server.into_future(), http_server.into_future());
        if let Err(error) = &health_res {
            error!(%error, "HTTP health server failed");
        }
        if let Err(error) = &res {
            error!(%error, "HTTP server failed");
        }
        health_res?;
        res?;
        info!("Shutdown complete for servers");
        Ok::<(), Error>(())
    }))
}

async fn bind(addr: SocketAddr) -> Result<TcpListener, Error> {
    TcpListener::bind(addr)
        .await
        .map_err(|error| Error::Bind { addr, error })
}

/// Shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            error!(%error, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                error!(%error, "failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("signal received, starting graceful shutdown");
}
