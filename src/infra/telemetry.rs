use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

pub const METRIC_REVALIDATE_REQUESTS: &str = "escriba_revalidate_requests_total";
pub const METRIC_REVALIDATE_RATE_LIMITED: &str = "escriba_revalidate_rate_limited_total";
pub const METRIC_REVALIDATE_UNAUTHORIZED: &str = "escriba_revalidate_unauthorized_total";
pub const METRIC_MARKDOWN_FALLBACK: &str = "escriba_markdown_fallback_total";

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_REVALIDATE_REQUESTS,
            Unit::Count,
            "Total number of revalidation webhook requests received."
        );
        describe_counter!(
            METRIC_REVALIDATE_RATE_LIMITED,
            Unit::Count,
            "Total number of revalidation requests denied by the rate limiter."
        );
        describe_counter!(
            METRIC_REVALIDATE_UNAUTHORIZED,
            Unit::Count,
            "Total number of revalidation requests rejected for a bad secret."
        );
        describe_counter!(
            METRIC_MARKDOWN_FALLBACK,
            Unit::Count,
            "Total number of Markdown conversions that fell back to the raw input."
        );
    });
}
