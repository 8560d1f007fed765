//! Tracing subscriber setup shared by the distkit binaries.

use std::env::{self, VarError};

use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable holding an `EnvFilter` directive, e.g. `distkit_io_fs=debug`.
pub const C_ENV_LOG: &str = "DISTKIT_LOG";

struct LoggerConfig {
    filter: Result<String, VarError>,
}

impl LoggerConfig {
    fn from_env() -> Self {
        let filter = env::var(C_ENV_LOG);
        Self { filter }
    }
}

/// Map `-v`/`-q` counts onto a level. Default is `warn`.
pub fn level_from_verbosity(n_verbose: u8, n_quiet: u8) -> LevelFilter {
    if n_quiet > 0 {
        return LevelFilter::ERROR;
    }
    match n_verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

fn build_filter(filter_env: Result<String, VarError>, level_default: LevelFilter) -> EnvFilter {
    match filter_env {
        Ok(directive) if !directive.trim().is_empty() => EnvFilter::builder()
            .with_default_directive(level_default.into())
            .parse_lossy(directive),
        _ => EnvFilter::default().add_directive(level_default.into()),
    }
}

/// Install a stderr `fmt` subscriber.
///
/// `DISTKIT_LOG` wins over `level_default` when set. Calling this twice is a
/// no-op for the second call.
pub fn init_tracing(level_default: LevelFilter) {
    let cfg = LoggerConfig::from_env();
    let filter = build_filter(cfg.filter, level_default);
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);
    let _ = tracing_subscriber::Registry::default()
        .with(filter)
        .with(layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use std::env::VarError;

    use tracing_subscriber::filter::LevelFilter;

    use super::{build_filter, level_from_verbosity};

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(level_from_verbosity(0, 0), LevelFilter::WARN);
        assert_eq!(level_from_verbosity(1, 0), LevelFilter::INFO);
        assert_eq!(level_from_verbosity(2, 0), LevelFilter::DEBUG);
        assert_eq!(level_from_verbosity(5, 0), LevelFilter::TRACE);
        assert_eq!(level_from_verbosity(3, 1), LevelFilter::ERROR);
    }

    #[test]
    fn env_directive_overrides_default_level() {
        let filter = build_filter(Ok("distkit_io_fs=trace".to_string()), LevelFilter::WARN);
        assert!(filter.to_string().contains("distkit_io_fs=trace"));

        let filter = build_filter(Err(VarError::NotPresent), LevelFilter::DEBUG);
        assert!(filter.to_string().contains("debug"));
    }
}
