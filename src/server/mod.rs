//! Server target resolution.
//!
//! resolve_target -> ServerTarget { service, url, timeout }
//! URL precedence: -u/--url > SABACAN_<SERVICE>_URL > SABACAN_URL > default.
//! Timeout precedence: -t/--timeout > SABACAN_<SERVICE>_TIMEOUT > SABACAN_TIMEOUT.
//!
use std::collections::HashMap;
use std::ffi::OsString;
use std::fmt;
use std::time::Duration;

use url::Url;

use crate::error::{Result, SabacanError};

pub mod request;

pub use request::{RequestSpec, ResponseOutcome, execute};

/// Environment variables are looked up under this prefix.
pub const ENV_PREFIX: &str = "SABACAN";

/// Remote application servers sabacan knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    PlantUml,
    RedPen,
}

impl Service {
    pub fn name(&self) -> &'static str {
        match self {
            Service::PlantUml => "plantuml",
            Service::RedPen => "redpen",
        }
    }

    /// Built-in server URL used when neither flag nor environment names one.
    pub fn default_url(&self) -> Option<&'static str> {
        match self {
            Service::PlantUml => Some("http://127.0.0.1:8080/plantuml"),
            Service::RedPen => Some("http://127.0.0.1:8080"),
        }
    }

    /// e.g. `SABACAN_REDPEN_URL`
    pub fn url_var(&self) -> String {
        format!("{ENV_PREFIX}_{}_URL", self.name().to_ascii_uppercase())
    }

    /// e.g. `SABACAN_PLANTUML_TIMEOUT`
    pub fn timeout_var(&self) -> String {
        format!("{ENV_PREFIX}_{}_TIMEOUT", self.name().to_ascii_uppercase())
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Snapshot of the process environment, taken once at startup.
///
/// Only the variables sabacan reads are captured. Blank values are dropped
/// so that `FOO=` behaves like an unset variable.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    pub fn capture() -> Self {
        Self::from_os_pairs(std::env::vars_os())
    }

    /// Keep the relevant variables of a raw environment. Unrelated entries
    /// may hold any bytes; a relevant one that is not UTF-8 counts as unset.
    pub fn from_os_pairs(pairs: impl IntoIterator<Item = (OsString, OsString)>) -> Self {
        Self::from_pairs(pairs.into_iter().filter_map(|(k, v)| {
            let key = k.to_str().filter(|k| k.starts_with(ENV_PREFIX) || *k == "REDPEN_HOME")?;
            match v.into_string() {
                Ok(value) => Some((key.to_string(), value)),
                Err(_) => {
                    tracing::warn!("ignoring {key}: value is not valid UTF-8");
                    None
                }
            }
        }))
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let vars = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(_, v)| !v.trim().is_empty())
            .collect();
        Self { vars }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(|v| v.trim())
    }
}

/// Where one invocation sends its request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerTarget {
    pub service: Service,
    pub url: Url,
    pub timeout: Option<Duration>,
}

impl fmt::Display for ServerTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.service, self.url)
    }
}

/// Resolve the server target for `service` using the built-in default.
pub fn resolve_target(
    service: Service,
    cli_url: Option<&str>,
    cli_timeout: Option<u64>,
    env: &Environment,
) -> Result<ServerTarget> {
    resolve_target_with_default(service, cli_url, cli_timeout, env, service.default_url())
}

/// Resolve the server target with an explicit fallback URL.
///
/// Fails with a configuration error when flag, environment and default all
/// come up empty, or when the chosen URL is not an absolute http(s) URL.
pub fn resolve_target_with_default(
    service: Service,
    cli_url: Option<&str>,
    cli_timeout: Option<u64>,
    env: &Environment,
    default: Option<&str>,
) -> Result<ServerTarget> {
    let url_var = service.url_var();
    let generic_var = format!("{ENV_PREFIX}_URL");

    let (raw, origin) = if let Some(u) = cli_url.map(str::trim).filter(|u| !u.is_empty()) {
        (u, "--url".to_string())
    } else if let Some(u) = env.get(&url_var) {
        (u, url_var.clone())
    } else if let Some(u) = env.get(&generic_var) {
        (u, generic_var)
    } else if let Some(u) = default {
        (u, "built-in default".to_string())
    } else {
        return Err(SabacanError::configuration(format!(
            "no server URL for {service}; use -u/--url or set {url_var}"
        )));
    };

    let url = parse_server_url(raw).map_err(|e| {
        SabacanError::configuration(format!("invalid {service} server URL '{raw}' (from {origin}): {e}"))
    })?;
    tracing::debug!(%service, %url, %origin, "resolved server URL");

    Ok(ServerTarget {
        service,
        url,
        timeout: resolve_timeout(service, cli_timeout, env),
    })
}

fn parse_server_url(raw: &str) -> std::result::Result<Url, String> {
    let url = Url::parse(raw).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(format!("unsupported scheme '{other}' (expected http or https)")),
    }
}

fn resolve_timeout(service: Service, cli_timeout: Option<u64>, env: &Environment) -> Option<Duration> {
    if let Some(secs) = cli_timeout {
        return Some(Duration::from_secs(secs));
    }
    let generic_var = format!("{ENV_PREFIX}_TIMEOUT");
    let (var, raw) = [service.timeout_var(), generic_var]
        .into_iter()
        .find_map(|var| env.get(&var).map(|v| (var.clone(), v.to_string())))?;
    match raw.parse::<u64>() {
        Ok(secs) => Some(Duration::from_secs(secs)),
        Err(_) => {
            tracing::warn!("ignoring {var}={raw}: not a number of seconds");
            None
        }
    }
}
