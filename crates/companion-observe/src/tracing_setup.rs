//! Tracing subscriber initialization with structured logging and optional
//! OpenTelemetry trace export.
//!
//! ```no_run
//! use companion_observe::tracing_setup::{LogTarget, init_tracing};
//!
//! // Human-readable logs on stderr.
//! let _guard = init_tracing("warn", LogTarget::Stderr, false).unwrap();
//! ```

use std::path::PathBuf;
use std::sync::OnceLock;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

/// Where formatted log lines go.
#[derive(Debug, Clone)]
pub enum LogTarget {
    Stderr,
    /// Append JSON lines to a file. Used while a full-screen view owns the
    /// terminal.
    File(PathBuf),
}

/// Keeps the background log writer alive. Drop it on exit to flush.
#[derive(Default)]
pub struct TracingGuard {
    _writer: Option<WorkerGuard>,
}

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` wins over `default_filter` when set. With `enable_otel`,
/// spans are also bridged to OpenTelemetry and exported to stdout, except
/// with a [`LogTarget::File`] target, where stdout belongs to the screen.
pub fn init_tracing(
    default_filter: &str,
    target: LogTarget,
    enable_otel: bool,
) -> Result<TracingGuard, Box<dyn std::error::Error>> {
    let otel_dropped = enable_otel && !otel_allowed(&target);
    let enable_otel = enable_otel && !otel_dropped;

    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_filter))?;

    let (stderr_layer, file_layer, guard) = match target {
        LogTarget::Stderr => {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_span_events(FmtSpan::CLOSE);
            (Some(layer), None, TracingGuard::default())
        }
        LogTarget::File(path) => {
            let dir = path
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from("."));
            let file_name = path
                .file_name()
                .ok_or("log path has no file name")?
                .to_owned();
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, worker) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_ansi(false)
                .with_span_events(FmtSpan::CLOSE);
            (
                None,
                Some(layer),
                TracingGuard {
                    _writer: Some(worker),
                },
            )
        }
    };

    let otel_layer = if enable_otel {
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
            .build();
        let tracer = provider.tracer("companion");
        let _ = TRACER_PROVIDER.set(provider.clone());
        opentelemetry::global::set_tracer_provider(provider);
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .with(otel_layer)
        .try_init()?;

    if otel_dropped {
        tracing::warn!("OpenTelemetry stdout export is disabled while logging to a file");
    }

    Ok(guard)
}

/// Whether spans may be exported to stdout alongside `target`.
fn otel_allowed(target: &LogTarget) -> bool {
    matches!(target, LogTarget::Stderr)
}

/// Map CLI verbosity flags to a default filter directive.
pub fn filter_for_verbosity(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "warn",
        1 => "info,companion=debug",
        2 => "debug",
        _ => "trace",
    }
}

/// Flush pending spans and shut the OpenTelemetry provider down.
///
/// No-op when OTel was not enabled.
pub fn shutdown_tracing() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        if let Err(e) = provider.shutdown() {
            eprintln!("Warning: OTel tracer provider shutdown error: {e}");
        }
    }
}
