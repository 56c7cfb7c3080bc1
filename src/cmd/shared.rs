/*!
shared.rs - helpers used by both subcommands.

Focus:
  - Globals: top-level flags + environment snapshot handed to subcommands
  - read_input / read_stream: request bodies from local files or stdin
  - resolve / run_request: server target, then the one HTTP exchange
  - relay / write_output_file: hand the response body back to the caller
*/

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::error::SabacanError;
use crate::server::{self, Environment, RequestSpec, ResponseOutcome, ServerTarget, Service};

/* ---- Invocation Context ---- */

/// Top-level settings shared by every subcommand of one invocation.
#[derive(Debug, Clone, Default)]
pub struct Globals {
    /// `-u/--url` override for the invoked subcommand.
    pub url: Option<String>,
    /// `-t/--timeout` in seconds.
    pub timeout: Option<u64>,
    pub env: Environment,
}

/* ---- Input ---- */

/// Read a local file in full. The handle is closed when this returns,
/// on success and on error alike.
pub fn read_input(path: &Path) -> std::result::Result<Vec<u8>, SabacanError> {
    let describe = |e: io::Error| SabacanError::input(format!("{}: {e}", path.display()));
    let mut file = File::open(path).map_err(describe)?;
    if file.metadata().map_err(describe)?.is_dir() {
        return Err(SabacanError::input(format!("{}: is a directory", path.display())));
    }
    let mut buf = Vec::new();
    file.read_to_end(&mut buf).map_err(describe)?;
    tracing::debug!(path = %path.display(), bytes = buf.len(), "read input");
    Ok(buf)
}

/// Read a local file that must be UTF-8 text.
pub fn read_text_input(path: &Path) -> std::result::Result<String, SabacanError> {
    String::from_utf8(read_input(path)?)
        .map_err(|_| SabacanError::input(format!("{}: not valid UTF-8 text", path.display())))
}

/// Read a whole stream (stdin in pipe mode).
pub fn read_stream<R: Read + ?Sized>(reader: &mut R, label: &str) -> std::result::Result<Vec<u8>, SabacanError> {
    let mut buf = Vec::new();
    reader
        .read_to_end(&mut buf)
        .map_err(|e| SabacanError::input(format!("{label}: {e}")))?;
    Ok(buf)
}

/* ---- Execution ---- */

/// Resolve the server for `service` from flags and the environment snapshot.
pub fn resolve(service: Service, globals: &Globals) -> Result<ServerTarget> {
    Ok(server::resolve_target(
        service,
        globals.url.as_deref(),
        globals.timeout,
        &globals.env,
    )?)
}

/// Issue the one request of this invocation.
pub fn run_request(spec: &RequestSpec, target: &ServerTarget) -> Result<ResponseOutcome> {
    let outcome = server::execute(spec, target)?;
    if !outcome.is_success() {
        tracing::error!(
            "{} server replied with status {} ({})",
            target.service,
            outcome.status,
            outcome.content_type.as_deref().unwrap_or("no content type")
        );
    }
    Ok(outcome)
}

/* ---- Output ---- */

/// Write the response body verbatim to `sink` and return the exit code for
/// the outcome.
pub fn relay<W: Write>(outcome: &ResponseOutcome, sink: &mut W) -> Result<i32> {
    sink.write_all(&outcome.body)
        .and_then(|_| sink.flush())
        .context("Failed to write response to stdout")?;
    Ok(outcome.exit_code())
}

/// Relay to the process stdout.
pub fn relay_stdout(outcome: &ResponseOutcome) -> Result<i32> {
    let stdout = io::stdout();
    let mut lock = stdout.lock();
    relay(outcome, &mut lock)
}

/// Write the response body to a file instead of stdout.
pub fn write_output_file(outcome: &ResponseOutcome, path: &Path) -> Result<i32> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {}", parent.display()))?;
    }
    std::fs::write(path, &outcome.body)
        .with_context(|| format!("Failed to write output file: {}", path.display()))?;
    tracing::info!("wrote {} bytes to {}", outcome.body.len(), path.display());
    Ok(outcome.exit_code())
}

/* ---- Tests ---- */
