//! One HTTP exchange: the request description, its outcome, and `execute`.

use std::fmt;
use std::time::Instant;

use url::Url;

use super::ServerTarget;
use crate::error::{Result, SabacanError, exitcode};

/// Content type for diagram sources and documents sent as request bodies.
pub const TEXT_PLAIN_UTF8: &str = "text/plain; charset=utf-8";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    fn as_reqwest(self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Post => "POST",
        })
    }
}

/// A fully translated request, relative to the server base URL.
///
/// Built once per invocation and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    pub method: Method,
    /// Path below the base URL, without a leading slash.
    pub path: String,
    /// Ordered query pairs; keys may repeat.
    pub query: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub content_type: Option<&'static str>,
}

impl RequestSpec {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            query: Vec::new(),
            body: Vec::new(),
            content_type: None,
        }
    }

    pub fn post_text(path: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            query: Vec::new(),
            body,
            content_type: Some(TEXT_PLAIN_UTF8),
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Join the path and query onto `base`.
    ///
    /// `base` is treated as a directory: `http://h/plantuml` + `png/`
    /// gives `http://h/plantuml/png/`.
    pub fn url(&self, base: &Url) -> Url {
        let mut url = base.clone();
        let joined = format!(
            "{}/{}",
            base.path().trim_end_matches('/'),
            self.path.trim_start_matches('/')
        );
        url.set_path(&joined);
        url.set_fragment(None);
        if !self.query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(self.query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        url
    }
}

/// Status and body of the single response. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseOutcome {
    pub status: u16,
    pub body: Vec<u8>,
    pub content_type: Option<String>,
}

impl ResponseOutcome {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 2xx maps to success; every other status to a single failure code.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            exitcode::OK
        } else {
            exitcode::FAILURE
        }
    }
}

/// Issue `spec` against `target` and collect the reply.
///
/// Creates a current-thread Tokio runtime for the one exchange; the caller
/// stays synchronous. A failure status without a body is a transport error,
/// with a body it is returned so the body can be relayed.
pub fn execute(spec: &RequestSpec, target: &ServerTarget) -> Result<ResponseOutcome> {
    let url = spec.url(&target.url);
    tracing::info!("{} {}", spec.method, url);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| SabacanError::transport(format!("failed to start I/O runtime: {e}")))?;

    let started = Instant::now();
    let outcome = rt.block_on(execute_async(spec, url.clone(), target))?;
    tracing::debug!(
        status = outcome.status,
        bytes = outcome.body.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "response received"
    );

    if !outcome.is_success() && outcome.body.is_empty() {
        return Err(SabacanError::transport(format!(
            "{} {url} returned status {} with no body",
            spec.method, outcome.status
        )));
    }
    Ok(outcome)
}

async fn execute_async(spec: &RequestSpec, url: Url, target: &ServerTarget) -> Result<ResponseOutcome> {
    let mut builder = reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")));
    if let Some(timeout) = target.timeout {
        builder = builder.timeout(timeout);
    }
    let client = builder
        .build()
        .map_err(|e| SabacanError::transport(format!("failed to create HTTP client: {e}")))?;

    let mut request = client.request(spec.method.as_reqwest(), url.clone());
    if let Some(ct) = spec.content_type {
        request = request.header(reqwest::header::CONTENT_TYPE, ct);
    }
    if spec.method == Method::Post {
        request = request.body(spec.body.clone());
    }

    let response = request
        .send()
        .await
        .map_err(|e| SabacanError::transport(describe_request_error(&e, target)))?;

    let status = response.status().as_u16();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response
        .bytes()
        .await
        .map_err(|e| SabacanError::transport(format!("failed to read response from {url}: {e}")))?
        .to_vec();

    Ok(ResponseOutcome {
        status,
        body,
        content_type,
    })
}

fn describe_request_error(err: &reqwest::Error, target: &ServerTarget) -> String {
    if err.is_timeout() {
        format!("request to {target} timed out")
    } else if err.is_connect() {
        format!("cannot connect to {target}: {err}")
    } else {
        format!("request to {target} failed: {err}")
    }
}
