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

use std::time::Duration;

use anyhow::Context;
use axum::{extract::Request, response::Response};
use http::{HeaderMap, HeaderValue, header::InvalidHeaderValue};
use opentelemetry::{
    global,
    trace::{TraceContextExt, TracerProvider},
};
use opentelemetry_http::{HeaderExtractor, HeaderInjector};
use opentelemetry_otlp::{MetricExporter, SpanExporter, WithExportConfig};
use opentelemetry_sdk::{
    Resource,
    metrics::{PeriodicReader, SdkMeterProvider},
    propagation::TraceContextPropagator,
    trace::{Sampler, SdkTracerProvider},
};
use tracing::{Span, error, info, info_span};
use tracing_opentelemetry::{MetricsLayer, OpenTelemetrySpanExt};
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt};

use crate::args::{LogFormat, OtlpProtocol, TracingConfig};

pub const DEFAULT_GRPC_OTLP_ENDPOINT: &str = "http://localhost:4317";
pub const DEFAULT_HTTP_OTLP_ENDPOINT: &str = "http://localhost:4318";

/// Response header carrying the trace id of the request.
pub const TRACE_ID_HEADER: &str = "x-trace-id";
/// Response header carrying the span id of the request.
pub const SPAN_ID_HEADER: &str = "x-span-id";

/// Crates whose logs are limited to errors.
const QUIET_CRATES: [&str; 5] = ["hyper", "hyper_util", "h2", "tower", "rustls"];

/// Trace correlation ids of a single inbound request.
///
/// Created by the inbound middleware and passed by reference through
/// handler, service, client and tracer. Never stored beyond the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceContext {
    trace_id: Option<String>,
    span_id: Option<String>,
}

impl TraceContext {
    pub fn new(trace_id: impl Into<String>, span_id: impl Into<String>) -> Self {
        Self {
            trace_id: Some(trace_id.into()),
            span_id: Some(span_id.into()),
        }
    }

    /// Reads the OpenTelemetry span context of `span`.
    /// An invalid (unsampled or missing) span context yields an empty value.
    pub fn from_span(span: &Span) -> Self {
        let context = span.context();
        let otel_span = context.span();
        let span_context = otel_span.span_context();
        if span_context.is_valid() {
            Self::new(
                span_context.trace_id().to_string(),
                span_context.span_id().to_string(),
            )
        } else {
            Self::default()
        }
    }

    /// Reads the span context of the current span.
    pub fn current() -> Self {
        Self::from_span(&Span::current())
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    pub fn span_id(&self) -> Option<&str> {
        self.span_id.as_deref()
    }

    /// Writes `X-Trace-Id` and `X-Span-Id` for the ids that are present.
    pub fn inject(&self, headers: &mut HeaderMap) -> Result<(), InvalidHeaderValue> {
        if let Some(trace_id) = &self.trace_id {
            headers.insert(TRACE_ID_HEADER, HeaderValue::from_str(trace_id)?);
        }
        if let Some(span_id) = &self.span_id {
            headers.insert(SPAN_ID_HEADER, HeaderValue::from_str(span_id)?);
        }
        Ok(())
    }
}

fn resource(tracing_config: &TracingConfig) -> Resource {
    Resource::builder()
        .with_service_name(tracing_config.service_name.clone())
        .build()
}

fn span_exporter(
    protocol: OtlpProtocol,
    endpoint: String,
    timeout: Duration,
) -> Result<SpanExporter, anyhow::Error> {
    match protocol {
        OtlpProtocol::Grpc => SpanExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .with_timeout(timeout)
            .build()
            .context("Failed to build gRPC span exporter"),
        OtlpProtocol::Http => SpanExporter::builder()
            .with_http()
            .with_endpoint(endpoint)
            .with_timeout(timeout)
            .build()
            .context("Failed to build HTTP span exporter"),
    }
}

fn metric_exporter(
    protocol: OtlpProtocol,
    endpoint: String,
    timeout: Duration,
) -> Result<MetricExporter, anyhow::Error> {
    match protocol {
        OtlpProtocol::Grpc => MetricExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .with_timeout(timeout)
            .build()
            .context("Failed to build gRPC metric exporter"),
        OtlpProtocol::Http => MetricExporter::builder()
            .with_http()
            .with_endpoint(endpoint)
            .with_timeout(timeout)
            .build()
            .context("Failed to build HTTP metric exporter"),
    }
}

/// Builds the tracer provider. A provider without exporter is still installed
/// while logging so that every request span has valid trace and span ids.
fn init_tracer_provider(
    tracing_config: &TracingConfig,
) -> Result<Option<SdkTracerProvider>, anyhow::Error> {
    let builder = SdkTracerProvider::builder()
        .with_resource(resource(tracing_config))
        .with_sampler(Sampler::AlwaysOn);
    match &tracing_config.traces {
        Some((protocol, endpoint)) => {
            let exporter = span_exporter(*protocol, endpoint.clone(), Duration::from_secs(3))?;
            Ok(Some(builder.with_batch_exporter(exporter).build()))
        }
        None if !tracing_config.quiet => Ok(Some(builder.build())),
        None => Ok(None),
    }
}

fn init_meter_provider(
    tracing_config: &TracingConfig,
) -> Result<Option<SdkMeterProvider>, anyhow::Error> {
    let Some((protocol, endpoint)) = &tracing_config.metrics else {
        return Ok(None);
    };
    let exporter = metric_exporter(*protocol, endpoint.clone(), Duration::from_secs(10))?;
    let reader = PeriodicReader::builder(exporter)
        .with_interval(Duration::from_secs(3))
        .build();
    Ok(Some(
        SdkMeterProvider::builder()
            .with_resource(resource(tracing_config))
            .with_reader(reader)
            .build(),
    ))
}

fn env_filter() -> Result<EnvFilter, anyhow::Error> {
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("INFO"));
    for name in QUIET_CRATES {
        let directive = format!("{name}=error")
            .parse()
            .with_context(|| format!("Invalid log directive for {name}"))?;
        filter = filter.add_directive(directive);
    }
    Ok(filter)
}

/// Initializes logging and OpenTelemetry for the gateway.
///
/// Returns a closure flushing and shutting down the providers.
pub fn init_tracing(
    tracing_config: TracingConfig,
) -> Result<impl FnOnce() -> Result<(), anyhow::Error>, anyhow::Error> {
    let mut layers = Vec::new();
    global::set_text_map_propagator(TraceContextPropagator::new());

    let trace_provider =
        init_tracer_provider(&tracing_config).context("Failed to initialize tracer provider")?;
    if let Some(trace_provider) = &trace_provider {
        global::set_tracer_provider(trace_provider.clone());
        layers.push(
            tracing_opentelemetry::layer()
                .with_tracer(trace_provider.tracer(tracing_config.service_name.clone()))
                .boxed(),
        );
    }

    let meter_provider =
        init_meter_provider(&tracing_config).context("Failed to initialize meter provider")?;
    if let Some(meter_provider) = &meter_provider {
        global::set_meter_provider(meter_provider.clone());
        layers.push(MetricsLayer::new(meter_provider.clone()).boxed());
    }

    if !tracing_config.quiet {
        let layer = tracing_subscriber::fmt::layer();
        layers.push(match tracing_config.log_format {
            LogFormat::Full => layer.boxed(),
            LogFormat::Compact => layer.compact().boxed(),
            LogFormat::Pretty => layer.pretty().boxed(),
            LogFormat::JSON => layer.json().flatten_event(true).boxed(),
        });
    }

    let subscriber = tracing_subscriber::registry()
        .with(env_filter()?)
        .with(layers);
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set global tracing subscriber")?;

    match &tracing_config.traces {
        Some((protocol, endpoint)) => info!(%protocol, %endpoint, "OTLP traces enabled"),
        None => info!("OTLP traces disabled"),
    }
    match &tracing_config.metrics {
        Some((protocol, endpoint)) => info!(%protocol, %endpoint, "OTLP metrics enabled"),
        None => info!("OTLP metrics disabled"),
    }
    if tracing_config.quiet {
        info!("stdout logging disabled");
    } else {
        info!(format = %tracing_config.log_format, "stdout logging enabled");
    }

    Ok(move || {
        if let Some(trace_provider) = trace_provider {
            trace_provider
                .shutdown()
                .context("Failed to shutdown tracer provider")?;
        }
        if let Some(meter_provider) = meter_provider {
            meter_provider
                .shutdown()
                .context("Failed to shutdown meter provider")?;
        }
        Ok(())
    })
}

/// Creates the span of an inbound request, continuing the caller's trace
/// when a `traceparent` header is present.
pub fn incoming_request_span(request: &Request) -> Span {
    let parent = global::get_text_map_propagator(|propagator| {
        propagator.extract(&HeaderExtractor(request.headers()))
    });
    let span = info_span!(
        "request",
        request_method = %request.method(),
        request_path = request.uri().path(),
        response_status_code = tracing::field::Empty,
        request_duration_ms = tracing::field::Empty,
    );
    span.set_parent(parent);
    span
}

pub fn on_incoming_request(request: &Request, span: &Span) {
    let _guard = span.enter();
    let ctx = TraceContext::from_span(span);
    info!(
        trace_id = ctx.trace_id(),
        method = %request.method(),
        path = %request.uri().path(),
        monotonic_counter.incoming_request_count = 1,
        "started processing request",
    );
}

pub fn on_outgoing_response(response: &Response, latency: Duration, span: &Span) {
    let _guard = span.enter();
    let status = response.status();
    span.record("response_status_code", status.as_u16());
    span.record("request_duration_ms", latency.as_millis());

    let ctx = TraceContext::from_span(span);
    info!(
        trace_id = ctx.trace_id(),
        %status,
        duration_ms = %latency.as_millis(),
        monotonic_counter.handled_request_count = 1,
        histogram.service_request_duration = latency.as_millis() as u64,
        "finished processing request"
    );

    if status.is_server_error() {
        info!(monotonic_counter.server_error_response_count = 1);
    } else if status.is_client_error() {
        info!(monotonic_counter.client_error_response_count = 1);
    } else if status.is_success() {
        info!(monotonic_counter.success_response_count = 1);
    } else {
        error!("unexpected response status code: {}", status.as_u16());
    }
}

/// Injects the W3C `traceparent` header of `ctx` into `headers`.
/// See https://www.w3.org/TR/trace-context/#trace-context-http-headers-format.
pub fn with_traceparent_header(ctx: &opentelemetry::Context, mut headers: HeaderMap) -> HeaderMap {
    global::get_text_map_propagator(|propagator| {
        propagator.inject_context(ctx, &mut HeaderInjector(&mut headers));
    });
    headers
}

#[cfg(test)]
mod tests {
    use opentelemetry::trace::TracerProvider as _;
    use tracing_subscriber::layer::SubscriberExt;

    use super::*;

    #[test]
    fn test_trace_context_inject() {
        let ctx = TraceContext::new("4bf92f3577b34da6a3ce929d0e0e4736", "00f067aa0ba902b7");
        let mut headers = HeaderMap::new();
        ctx.inject(&mut headers).unwrap();
        assert_eq!(
            headers.get(TRACE_ID_HEADER).unwrap(),
            "4bf92f3577b34da6a3ce929d0e0e4736"
        );
        assert_eq!(headers.get(SPAN_ID_HEADER).unwrap(), "00f067aa0ba902b7");

        // Nothing to inject
        let mut headers = HeaderMap::new();
        TraceContext::default().inject(&mut headers).unwrap();
        assert!(headers.is_empty());

        let ctx = TraceContext::new("bad\nid", "00f067aa0ba902b7");
        assert!(ctx.inject(&mut HeaderMap::new()).is_err());
    }

    #[test]
    fn test_trace_context_without_otel_layer_is_empty() {
        let span = info_span!("no_otel");
        let ctx = TraceContext::from_span(&span);
        assert_eq!(ctx, TraceContext::default());
        assert_eq!(ctx.trace_id(), None);
    }

    #[test]
    fn test_trace_context_from_otel_span() {
        let provider = SdkTracerProvider::builder().build();
        let subscriber = tracing_subscriber::registry()
            .with(tracing_opentelemetry::layer().with_tracer(provider.tracer("test")));
        let _default = tracing::subscriber::set_default(subscriber);

        let span = info_span!("request");
        let _guard = span.enter();
        let ctx = TraceContext::current();
        assert_eq!(ctx.trace_id().map(str::len), Some(32));
        assert_eq!(ctx.span_id().map(str::len), Some(16));
    }

    #[test]
    fn test_with_traceparent_header() {
        global::set_text_map_propagator(TraceContextPropagator::new());
        let provider = SdkTracerProvider::builder().build();
        let subscriber = tracing_subscriber::registry()
            .with(tracing_opentelemetry::layer().with_tracer(provider.tracer("test")));
        let _default = tracing::subscriber::set_default(subscriber);

        let span = info_span!("outbound");
        let headers = with_traceparent_header(&span.context(), HeaderMap::new());
        let ctx = TraceContext::from_span(&span);
        let traceparent = headers.get("traceparent").unwrap().to_str().unwrap();
        assert!(traceparent.contains(ctx.trace_id().unwrap()));
    }
}
