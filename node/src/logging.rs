//! Tracing setup for the devnet binary.
//!
//! Ledger activity (deposits, settlements, compliance actions) is emitted by
//! `yieldvault_contracts` at `info`/`warn`; the node adds request traces via
//! `tower_http`. Everything is written to stderr: `simulate` prints its
//! report on stdout and that stream must stay parseable.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    /// Newline-delimited JSON, event fields at the top level.
    Json,
}

impl LogFormat {
    /// Maps the `--log-format` flag. Unknown values fall back to `Pretty`
    /// rather than failing startup.
    pub fn from_str_lossy(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

/// Directives in effect: `RUST_LOG` if it parses, else `fallback`.
fn directives(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Installs the process-wide subscriber. A second call panics, so only the
/// subcommand entry points in `main` call this.
///
/// Turning up ledger detail while keeping HTTP quiet:
///
/// ```text
/// RUST_LOG=yieldvault_contracts=debug,tower_http=warn yieldvault-node run
/// ```
pub fn init_logging(fallback: &str, format: LogFormat) {
    let registry = tracing_subscriber::registry().with(directives(fallback));

    match format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_file(true)
                    .with_line_number(true),
            )
            .init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }

    tracing::debug!(?format, filter = fallback, "subscriber installed");
}
