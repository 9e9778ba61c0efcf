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

use std::{fmt::Display, path::PathBuf, str::FromStr};

use clap::Parser;
use tracing::warn;
use url::Url;

use crate::{
    models::ValidationError,
    utils::trace::{DEFAULT_GRPC_OTLP_ENDPOINT, DEFAULT_HTTP_OTLP_ENDPOINT},
};

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    #[clap(default_value = "8080", long, env)]
    pub http_port: u16,
    #[clap(default_value = "8081", long, env)]
    pub health_http_port: u16,
    #[clap(default_value = "config/config.yaml", long, env = "GATEWAY_CONFIG")]
    pub config_path: PathBuf,
    #[clap(long, env, value_delimiter = ',')]
    pub otlp_export: Vec<OtlpExport>,
    #[clap(default_value_t = LogFormat::default(), long, env)]
    pub log_format: LogFormat,
    #[clap(default_value_t = false, long, short, env)]
    pub quiet: bool,
    #[clap(default_value = "posts-gateway", long, env)]
    pub otlp_service_name: String,
    #[clap(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<Url>,
    #[clap(long, env = "OTEL_EXPORTER_OTLP_TRACES_ENDPOINT")]
    pub otlp_traces_endpoint: Option<Url>,
    #[clap(long, env = "OTEL_EXPORTER_OTLP_METRICS_ENDPOINT")]
    pub otlp_metrics_endpoint: Option<Url>,
    #[clap(
        default_value_t = OtlpProtocol::Grpc,
        long,
        env = "OTEL_EXPORTER_OTLP_PROTOCOL"
    )]
    pub otlp_protocol: OtlpProtocol,
    #[clap(long, env = "OTEL_EXPORTER_OTLP_TRACES_PROTOCOL")]
    pub otlp_traces_protocol: Option<OtlpProtocol>,
    #[clap(long, env = "OTEL_EXPORTER_OTLP_METRICS_PROTOCOL")]
    pub otlp_metrics_protocol: Option<OtlpProtocol>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OtlpExport {
    Traces,
    Metrics,
}

impl Display for OtlpExport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OtlpExport::Traces => write!(f, "traces"),
            OtlpExport::Metrics => write!(f, "metrics"),
        }
    }
}

impl FromStr for OtlpExport {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "traces" => Ok(OtlpExport::Traces),
            "metrics" => Ok(OtlpExport::Metrics),
            _ => Err(ValidationError::Invalid(format!(
                "invalid OTLP export type {s}, only traces and metrics are supported"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum OtlpProtocol {
    #[default]
    Grpc,
    Http,
}

impl Display for OtlpProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OtlpProtocol::Grpc => write!(f, "grpc"),
            OtlpProtocol::Http => write!(f, "http"),
        }
    }
}

impl From<String> for OtlpProtocol {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "grpc" => OtlpProtocol::Grpc,
            "http" => OtlpProtocol::Http,
            _ => {
                warn!(
                    "Invalid OTLP protocol {}, defaulting to {}",
                    s,
                    OtlpProtocol::default()
                );
                OtlpProtocol::default()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum LogFormat {
    Compact,
    #[default]
    Full,
    Pretty,
    JSON,
}

impl Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Full => write!(f, "full"),
            LogFormat::Compact => write!(f, "compact"),
            LogFormat::Pretty => write!(f, "pretty"),
            LogFormat::JSON => write!(f, "json"),
        }
    }
}

impl From<String> for LogFormat {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "full" => LogFormat::Full,
            "compact" => LogFormat::Compact,
            "pretty" => LogFormat::Pretty,
            "json" => LogFormat::JSON,
            _ => {
                warn!(
                    "Invalid log format {}, defaulting to {}",
                    s,
                    LogFormat::default()
                );
                LogFormat::default()
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct TracingConfig {
    pub service_name: String,
    pub traces: Option<(OtlpProtocol, String)>,
    pub metrics: Option<(OtlpProtocol, String)>,
    pub log_format: LogFormat,
    pub quiet: bool,
}

/// Checks a per-signal endpoint against the path its protocol expects.
fn validate_signal_endpoint(
    name: &str,
    endpoint: &Url,
    protocol: OtlpProtocol,
    http_path: &str,
) -> Result<(), ValidationError> {
    let expected = match protocol {
        OtlpProtocol::Grpc => "/",
        OtlpProtocol::Http => http_path,
    };
    if endpoint.path() != expected {
        return Err(ValidationError::Invalid(format!(
            "invalid {name} for {protocol} protocol: path should be {expected}"
        )));
    }
    Ok(())
}

/// Resolves a per-signal endpoint from the shared endpoint.
fn signal_endpoint(
    endpoint: &Url,
    protocol: OtlpProtocol,
    http_path: &str,
) -> Result<Url, ValidationError> {
    match protocol {
        OtlpProtocol::Grpc => Ok(endpoint.clone()),
        OtlpProtocol::Http => endpoint
            .join(http_path.trim_start_matches('/'))
            .map_err(|error| ValidationError::Invalid(format!("invalid otlp_endpoint: {error}"))),
    }
}

impl TryFrom<Args> for TracingConfig {
    type Error = ValidationError;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        let otlp_protocol = args.otlp_protocol;
        let otlp_traces_protocol = args.otlp_traces_protocol.unwrap_or(otlp_protocol);
        let otlp_metrics_protocol = args.otlp_metrics_protocol.unwrap_or(otlp_protocol);

        if let Some(endpoint) = &args.otlp_endpoint
            && endpoint.path() != "/"
        {
            return Err(ValidationError::Invalid("invalid otlp_endpoint".into()));
        }
        if let Some(endpoint) = &args.otlp_traces_endpoint {
            validate_signal_endpoint(
                "otlp_traces_endpoint",
                endpoint,
                otlp_traces_protocol,
                "/v1/traces",
            )?;
        }
        if let Some(endpoint) = &args.otlp_metrics_endpoint {
            validate_signal_endpoint(
                "otlp_metrics_endpoint",
                endpoint,
                otlp_metrics_protocol,
                "/v1/metrics",
            )?;
        }

        let otlp_endpoint = match args.otlp_endpoint {
            Some(endpoint) => endpoint,
            None => {
                let default = match otlp_protocol {
                    OtlpProtocol::Grpc => DEFAULT_GRPC_OTLP_ENDPOINT,
                    OtlpProtocol::Http => DEFAULT_HTTP_OTLP_ENDPOINT,
                };
                Url::parse(default).map_err(|error| {
                    ValidationError::Invalid(format!("invalid default otlp endpoint: {error}"))
                })?
            }
        };
        let otlp_traces_endpoint = match args.otlp_traces_endpoint {
            Some(endpoint) => endpoint,
            None => signal_endpoint(&otlp_endpoint, otlp_traces_protocol, "/v1/traces")?,
        };
        let otlp_metrics_endpoint = match args.otlp_metrics_endpoint {
            Some(endpoint) => endpoint,
            None => signal_endpoint(&otlp_endpoint, otlp_metrics_protocol, "/v1/metrics")?,
        };

        Ok(TracingConfig {
            service_name: args.otlp_service_name,
            traces: args
                .otlp_export
                .contains(&OtlpExport::Traces)
                .then(|| (otlp_traces_protocol, otlp_traces_endpoint.into())),
            metrics: args
                .otlp_export
                .contains(&OtlpExport::Metrics)
                .then(|| (otlp_metrics_protocol, otlp_metrics_endpoint.into())),
            log_format: args.log_format,
            quiet: args.quiet,
        })
    }
}
