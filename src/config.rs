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

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use tracing::{debug, error};

/// Default upstream API.
pub const DEFAULT_UPSTREAM_HOSTNAME: &str = "https://jsonplaceholder.typicode.com";

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read config from `{path}`: {error}")]
    FailedToReadConfigFile {
        path: PathBuf,
        error: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    InvalidConfigFile(#[from] serde_yml::Error),
    #[error("invalid upstream hostname `{hostname}`: {error}")]
    InvalidHostname {
        hostname: String,
        error: url::ParseError,
    },
}

/// Connection settings of the upstream service.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Scheme and host, optionally with a base path.
    #[serde(default = "default_hostname")]
    pub hostname: String,
    /// Overrides the port of `hostname`.
    pub port: Option<u16>,
    /// Connect timeout in seconds.
    pub connect_timeout: Option<u64>,
    /// Request timeout in seconds.
    pub request_timeout: Option<u64>,
    /// Static headers added to every upstream request.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

fn default_hostname() -> String {
    DEFAULT_UPSTREAM_HOSTNAME.into()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
            port: None,
            connect_timeout: None,
            request_timeout: None,
            headers: HashMap::new(),
        }
    }
}

impl ServiceConfig {
    /// Base url of the service with the port override applied.
    pub fn base_url(&self) -> Result<url::Url, Error> {
        let invalid = |error| Error::InvalidHostname {
            hostname: self.hostname.clone(),
            error,
        };
        let mut url = url::Url::parse(&self.hostname).map_err(invalid)?;
        if let Some(port) = self.port {
            url.set_port(Some(port))
                .map_err(|_| invalid(url::ParseError::InvalidPort))?;
        }
        Ok(url)
    }
}

/// Gateway configuration.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Upstream posts API.
    #[serde(default)]
    pub upstream: ServiceConfig,
}

impl GatewayConfig {
    /// Loads the gateway configuration from a YAML file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let s = tokio::fs::read_to_string(path).await.map_err(|error| {
            Error::FailedToReadConfigFile {
                path: path.into(),
                error,
            }
        })?;
        let config: GatewayConfig = serde_yml::from_str(&s)?;
        config.validate()?;
        debug!(?config, "loaded gateway config");
        Ok(config)
    }

    fn validate(&self) -> Result<(), Error> {
        if let Err(error) = self.upstream.base_url() {
            error!(%error, "invalid upstream config");
            return Err(error);
        }
        Ok(())
    }
}
