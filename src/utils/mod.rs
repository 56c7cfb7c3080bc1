//! Utilities: logging setup on top of `tracing`.
//!
//! Key items:
//!   init_logging / derive_level
//!
//! All diagnostics go to stderr; stdout carries nothing but relayed server
//! output.

/// Logging helpers.
pub mod logging {
    use std::io::IsTerminal;

    use tracing::level_filters::LevelFilter;
    use tracing_subscriber::EnvFilter;

    /// Overrides the verbosity flags with a full filter directive.
    pub const LOG_ENV: &str = "SABACAN_LOG";

    pub fn derive_level(verbose: u8, quiet: bool) -> LevelFilter {
        if quiet {
            return LevelFilter::ERROR;
        }
        match verbose {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }

    fn env_filter(level: LevelFilter) -> EnvFilter {
        EnvFilter::builder()
            .with_default_directive(level.into())
            .with_env_var(LOG_ENV)
            .from_env_lossy()
    }

    /// Install the global subscriber. A second call is a no-op.
    pub fn init_logging(level: LevelFilter) {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter(level))
            .with_writer(std::io::stderr)
            .with_ansi(std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none())
            .with_target(false)
            .without_time()
            .try_init();
    }

}

pub use logging::{derive_level, init_logging};
