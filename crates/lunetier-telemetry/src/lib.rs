//! Telemetry primitives shared across the Lunetier workspace.
//!
//! This crate centralises logging, metrics, and request-tracing helpers so the
//! API surface and the application shell report through one observability story.

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use once_cell::sync::OnceCell;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use serde::Serialize;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::{Span, span::Entered};
use tracing_subscriber::{EnvFilter, fmt};

/// Filter applied when `RUST_LOG` is absent.
const DEFAULT_LOG_LEVEL: &str = "info";

static BUILD_SHA: OnceCell<String> = OnceCell::new();

/// Install the process-wide tracing subscriber.
///
/// # Errors
///
/// Returns an error when another subscriber has already claimed the global
/// default.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    BUILD_SHA
        .set(config.build_sha.to_string())
        .ok()
        .or(Some(()));

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level));

    let install = |format: LogFormat| {
        let builder = fmt::fmt()
            .with_env_filter(env_filter.clone())
            .with_target(false)
            .with_thread_ids(false);

        match format {
            LogFormat::Json => builder.json().try_init(),
            LogFormat::Pretty => builder.pretty().try_init(),
        }
    };

    install(config.format).map_err(|err| anyhow!("could not install tracing subscriber: {err}"))?;

    Ok(())
}

/// Settings consumed by [`init_logging`].
#[derive(Debug, Clone)]
pub struct LoggingConfig<'a> {
    pub level: &'a str,
    pub format: LogFormat,
    pub build_sha: &'a str,
}

impl Default for LoggingConfig<'_> {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL,
            format: LogFormat::infer(),
            build_sha: build_sha(),
        }
    }
}

/// Output encodings the logger can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    /// Pick the format matching the build profile.
    #[must_use]
    pub const fn infer() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }

    /// Parse an explicit format name, typically sourced from the environment.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "pretty" => Some(Self::Pretty),
            _ => None,
        }
    }
}

/// Keeps the top-level application span entered until the process exits.
pub struct GlobalContextGuard {
    _guard: Entered<'static>,
}

impl GlobalContextGuard {
    #[must_use]
    pub fn new(phase: impl Into<String>) -> Self {
        let phase = phase.into();
        let span: &'static Span = Box::leak(Box::new(
            tracing::info_span!("app", phase = %phase, build_sha = %build_sha()),
        ));
        let guard = span.enter();
        Self { _guard: guard }
    }
}

/// Build identifier recorded by [`init_logging`], `"dev"` until then.
#[must_use]
pub fn build_sha() -> &'static str {
    BUILD_SHA.get().map_or("dev", String::as_str)
}

/// Record the request id and matched route on a span for downstream logs.
pub fn set_request_context(span: &Span, request_id: impl Into<String>, route: impl Into<String>) {
    let request_id = request_id.into();
    let route = route.into();
    span.record("request_id", tracing::field::display(&request_id));
    span.record("route", tracing::field::display(&route));
}

/// Request id of the in-flight request, when inside [`with_request_context`].
#[must_use]
pub fn current_request_id() -> Option<String> {
    ACTIVE_REQUEST_CONTEXT
        .try_with(|ctx| ctx.request_id.as_ref().to_string())
        .ok()
}

/// Matched route of the in-flight request, when inside [`with_request_context`].
#[must_use]
pub fn current_route() -> Option<String> {
    ACTIVE_REQUEST_CONTEXT
        .try_with(|ctx| ctx.route.as_ref().to_string())
        .ok()
}

/// Run a future with the given request id and route visible to the accessors
/// above.
pub async fn with_request_context<Fut, T>(
    request_id: impl Into<String>,
    route: impl Into<String>,
    fut: Fut,
) -> T
where
    Fut: Future<Output = T>,
{
    let context = RequestContext {
        request_id: Arc::from(request_id.into()),
        route: Arc::from(route.into()),
    };
    ACTIVE_REQUEST_CONTEXT.scope(context, fut).await
}

#[derive(Clone)]
struct RequestContext {
    request_id: Arc<str>,
    route: Arc<str>,
}

tokio::task_local! {
    static ACTIVE_REQUEST_CONTEXT: RequestContext;
}

/// Layer that stamps a fresh UUID into `x-request-id` when none arrived.
#[must_use]
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::x_request_id(MakeRequestUuid)
}

/// Layer that echoes `x-request-id` back on the response.
#[must_use]
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::x_request_id()
}

/// Cheap-to-clone handle over the Prometheus registry and its counters.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    http_requests_total: IntCounterVec,
    suggestions_total: IntCounterVec,
    designs_saved_total: IntCounter,
    design_name_retries_total: IntCounter,
    design_save_failures_total: IntCounter,
    materials_fallbacks_total: IntCounter,
}

/// Snapshot of the business counters for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub designs_saved_total: u64,
    pub design_name_retries_total: u64,
    pub design_save_failures_total: u64,
    pub materials_fallbacks_total: u64,
}

impl Metrics {
    /// Build a registry with every configurator counter registered.
    ///
    /// # Errors
    ///
    /// Returns an error when a collector fails to register, such as on a
    /// duplicate name.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new(
                "http_requests_total",
                "HTTP requests handled by the configurator API",
            ),
            &["route", "code"],
        )?;
        let suggestions_total = IntCounterVec::new(
            Opts::new(
                "suggestions_total",
                "AI palette suggestion requests by outcome",
            ),
            &["outcome"],
        )?;
        let designs_saved_total = IntCounter::with_opts(Opts::new(
            "designs_saved_total",
            "Eyewear designs persisted successfully",
        ))?;
        let design_name_retries_total = IntCounter::with_opts(Opts::new(
            "design_name_retries_total",
            "Design saves retried without a name after a rejection",
        ))?;
        let design_save_failures_total = IntCounter::with_opts(Opts::new(
            "design_save_failures_total",
            "Design saves that failed after all attempts",
        ))?;
        let materials_fallbacks_total = IntCounter::with_opts(Opts::new(
            "materials_fallbacks_total",
            "Material catalogue reads served by the fallback entry",
        ))?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(suggestions_total.clone()))?;
        registry.register(Box::new(designs_saved_total.clone()))?;
        registry.register(Box::new(design_name_retries_total.clone()))?;
        registry.register(Box::new(design_save_failures_total.clone()))?;
        registry.register(Box::new(materials_fallbacks_total.clone()))?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                http_requests_total,
                suggestions_total,
                designs_saved_total,
                design_name_retries_total,
                design_save_failures_total,
                materials_fallbacks_total,
            }),
        })
    }

    /// Count one HTTP request against its route and status code.
    pub fn inc_http_request(&self, route: &str, status: u16) {
        self.inner
            .http_requests_total
            .with_label_values(&[route, &status.to_string()])
            .inc();
    }

    /// Increment the suggestion counter for the given outcome label.
    pub fn inc_suggestion(&self, outcome: &str) {
        self.inner
            .suggestions_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Increment the saved design counter.
    pub fn inc_design_saved(&self) {
        self.inner.designs_saved_total.inc();
    }

    /// Increment the counter tracking nameless retries of rejected saves.
    pub fn inc_design_name_retry(&self) {
        self.inner.design_name_retries_total.inc();
    }

    /// Increment the counter tracking saves that ultimately failed.
    pub fn inc_design_save_failure(&self) {
        self.inner.design_save_failures_total.inc();
    }

    /// Increment the counter tracking material catalogue fallbacks.
    pub fn inc_materials_fallback(&self) {
        self.inner.materials_fallbacks_total.inc();
    }

    /// Write every registered metric in the text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error when encoding fails or the encoder produced bytes
    /// that are not UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .context("could not encode metrics")?;
        String::from_utf8(buffer).context("metrics buffer is not UTF-8")
    }

    /// Take a point-in-time snapshot of the business counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            designs_saved_total: self.inner.designs_saved_total.get(),
            design_name_retries_total: self.inner.design_name_retries_total.get(),
            design_save_failures_total: self.inner.design_save_failures_total.get(),
            materials_fallbacks_total: self.inner.materials_fallbacks_total.get(),
        }
    }
}
