//! Telemetry initialization.
//!
//! Controlled by `ARBOR_LOG`:
//! - unset → no subscriber (tracing disabled, zero overhead)
//! - `"stderr"` (or any other value) → JSON spans/events to stderr
//! - `"pretty"` → human-readable events to stderr
//!
//! The level filter comes from `RUST_LOG` and defaults to `info`, e.g.
//! `RUST_LOG=arbor_core=debug` shows per-conflict events and matching spans.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// Environment variable selecting the output format.
pub const LOG_ENV: &str = "ARBOR_LOG";

/// Output format picked from [`LOG_ENV`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    /// No subscriber installed.
    Off,
    /// One JSON object per event on stderr.
    Json,
    /// Human-readable lines on stderr.
    Pretty,
}

impl LogFormat {
    /// Interpret a `ARBOR_LOG` value. Unknown values fall back to JSON so a
    /// typo still produces output.
    #[must_use]
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value {
            None | Some("") => Self::Off,
            Some("pretty") => Self::Pretty,
            Some(_) => Self::Json,
        }
    }
}

/// Initialize telemetry based on `ARBOR_LOG`.
///
/// Returns the format that was installed. If another subscriber is already
/// set (tests, an embedding application), this leaves it alone.
pub fn init() -> LogFormat {
    let format = LogFormat::from_env_value(std::env::var(LOG_ENV).ok().as_deref());
    match format {
        LogFormat::Off => {}
        LogFormat::Json => init_json(),
        LogFormat::Pretty => init_pretty(),
    }
    format
}

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// JSON spans/events to stderr via tracing-subscriber's JSON formatter.
fn init_json() {
    let _ = tracing_subscriber::registry()
        .with(filter())
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE),
        )
        .try_init();
}

fn init_pretty() {
    let _ = tracing_subscriber::registry()
        .with(filter())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_env_value() {
        assert_eq!(LogFormat::from_env_value(None), LogFormat::Off);
        assert_eq!(LogFormat::from_env_value(Some("")), LogFormat::Off);
        assert_eq!(LogFormat::from_env_value(Some("stderr")), LogFormat::Json);
        assert_eq!(LogFormat::from_env_value(Some("pretty")), LogFormat::Pretty);
        assert_eq!(LogFormat::from_env_value(Some("jsno")), LogFormat::Json);
    }
}
