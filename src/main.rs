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

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use anyhow::Context;
use clap::Parser;
use posts_gateway::{
    args::{Args, TracingConfig},
    config::GatewayConfig,
    server,
    service::PostService,
    utils,
};
use tracing::info;

fn main() -> Result<(), anyhow::Error> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    let args = Args::parse();
    let http_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), args.http_port);
    let health_http_addr =
        SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), args.health_http_port);
    let config_path = args.config_path.clone();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(async {
            let tracing_config = TracingConfig::try_from(args)?;
            let trace_shutdown = utils::trace::init_tracing(tracing_config)?;
            info!(config_path = %config_path.display(), "starting posts gateway");

            let config = GatewayConfig::load(&config_path).await?;
            let service = PostService::new(config)?;
            let handle = server::run(http_addr, health_http_addr, service).await?;
            handle.await??;

            trace_shutdown()?;
            Ok(())
        })
}
