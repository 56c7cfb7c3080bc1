//! Error taxonomy for one invocation.
//!
//! Every variant is terminal: nothing is retried or recovered locally. The
//! top level prints the message once to stderr and exits with `exit_code()`.

use thiserror::Error;

/// Exit codes (BSD sysexits.h compatible where one applies).
pub mod exitcode {
    /// Successful relay of a 2xx response.
    pub const OK: i32 = 0;
    /// Relayed server failure status, or RedPen error limit exceeded.
    pub const FAILURE: i32 = 1;
    /// Cannot open input.
    pub const NOINPUT: i32 = 66;
    /// Server unreachable or unusable reply.
    pub const UNAVAILABLE: i32 = 69;
    /// Configuration error.
    pub const CONFIG: i32 = 78;
}

#[derive(Error, Debug)]
pub enum SabacanError {
    /// No usable server URL (or other setting) could be resolved.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The local input (file, stdin, config file) could not be read.
    #[error("input error: {0}")]
    Input(String),

    /// Connection/DNS failure, timeout, malformed reply, or a failure
    /// status that came back without a body.
    #[error("transport error: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, SabacanError>;

impl SabacanError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        SabacanError::Configuration(msg.into())
    }

    pub fn input(msg: impl Into<String>) -> Self {
        SabacanError::Input(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        SabacanError::Transport(msg.into())
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            SabacanError::Configuration(_) => exitcode::CONFIG,
            SabacanError::Input(_) => exitcode::NOINPUT,
            SabacanError::Transport(_) => exitcode::UNAVAILABLE,
        }
    }
}

/// Pick the exit code for an error surfacing at the top level.
///
/// Typed errors keep their own code; anything else (e.g. a failed write of
/// the output file) is a plain failure.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<SabacanError>())
        .map_or(exitcode::FAILURE, SabacanError::exit_code)
}

/// One-line hint for the error categories that have a usual fix.
pub fn hint_for(err: &anyhow::Error) -> Option<&'static str> {
    match err.chain().find_map(|cause| cause.downcast_ref::<SabacanError>())? {
        SabacanError::Configuration(_) => {
            Some("pass -u URL or set SABACAN_PLANTUML_URL / SABACAN_REDPEN_URL")
        }
        SabacanError::Transport(_) => Some("check that the server is running and reachable"),
        SabacanError::Input(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn hints_only_for_fixable_categories() {
        let config = anyhow::Error::new(SabacanError::configuration("no URL"));
        let input = anyhow::Error::new(SabacanError::input("a.uml"));
        assert!(hint_for(&config).is_some());
        assert!(hint_for(&input).is_none());
        assert!(hint_for(&anyhow::anyhow!("other")).is_none());
    }

    #[test]
    fn exit_codes_are_distinct_and_nonzero() {
        let codes = [
            SabacanError::configuration("x").exit_code(),
            SabacanError::input("x").exit_code(),
            SabacanError::transport("x").exit_code(),
        ];
        assert!(codes.iter().all(|c| *c != exitcode::OK));
        assert_eq!(codes, [exitcode::CONFIG, exitcode::NOINPUT, exitcode::UNAVAILABLE]);
    }

    #[test]
    fn exit_code_survives_context() {
        let err: anyhow::Result<()> = Err(SabacanError::input("missing.uml"))
            .context("while rendering");
        assert_eq!(exit_code_for(&err.unwrap_err()), exitcode::NOINPUT);
    }

    #[test]
    fn untyped_error_is_plain_failure() {
        let err = anyhow::anyhow!("disk full");
        assert_eq!(exit_code_for(&err), exitcode::FAILURE);
    }

    #[test]
    fn message_names_category() {
        let msg = SabacanError::transport("connection refused").to_string();
        assert_eq!(msg, "transport error: connection refused");
    }
}
