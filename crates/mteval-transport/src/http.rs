//! HTTP delivery via ureq.
//!
//! `POST {host}/api/v1/namespaces/{namespace}/translations-runs/` with a bearer
//! token and the run as JSON body.

use mteval_types::env_utils::env_var_or;
use mteval_types::Run;
use serde_json::Value;
use std::time::Duration;

use crate::{Outcome, Rejection, UploadTransport};

/// Longest server message kept in a rejection reason.
const MAX_REASON_CHARS: usize = 512;

/// How a response status code affects delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Delivered,
    Transient,
    Permanent,
}

/// Classify an HTTP status code.
///
/// 408 (request timeout), 425 (too early), 429 (rate limited) and every 5xx are
/// worth retrying; the remaining 4xx describe the request itself. Anything
/// outside 2xx/4xx/5xx (an unfollowed redirect, say) will not change on retry.
pub fn classify_status(status: u16) -> StatusClass {
    match status {
        200..=299 => StatusClass::Delivered,
        408 | 425 | 429 => StatusClass::Transient,
        500..=599 => StatusClass::Transient,
        _ => StatusClass::Permanent,
    }
}

/// Ingestion endpoint for a namespace.
pub fn runs_url(host: &str, namespace: &str) -> String {
    format!(
        "{}/api/v1/namespaces/{}/translations-runs/",
        host.trim_end_matches('/'),
        urlencoding::encode(namespace)
    )
}

/// Blocking HTTP transport.
#[derive(Clone)]
pub struct HttpTransport {
    agent: ureq::Agent,
}

impl HttpTransport {
    /// Default request timeout in seconds (can be overridden by env).
    const DEFAULT_TIMEOUT_SECS: u64 = 120;
    /// Default connect timeout in seconds (can be overridden by env).
    const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

    fn default_timeouts() -> (Duration, Duration) {
        let timeout_secs = env_var_or("MTEVAL_HTTP_TIMEOUT_SECS", Self::DEFAULT_TIMEOUT_SECS);
        let connect_secs = env_var_or(
            "MTEVAL_HTTP_CONNECT_TIMEOUT_SECS",
            Self::DEFAULT_CONNECT_TIMEOUT_SECS,
        );
        (
            Duration::from_secs(timeout_secs),
            Duration::from_secs(connect_secs),
        )
    }

    fn build_agent(timeout: Duration, connect_timeout: Duration) -> ureq::Agent {
        ureq::AgentBuilder::new()
            .timeout(timeout)
            .timeout_connect(connect_timeout)
            .user_agent(concat!("mteval-upload/", env!("CARGO_PKG_VERSION")))
            .build()
    }

    /// Create a transport with timeouts from the environment.
    pub fn new() -> Self {
        let (timeout, connect_timeout) = Self::default_timeouts();
        Self::with_timeouts(timeout, connect_timeout)
    }

    /// Create a transport with explicit timeouts.
    pub fn with_timeouts(timeout: Duration, connect_timeout: Duration) -> Self {
        Self {
            agent: Self::build_agent(timeout, connect_timeout),
        }
    }

    fn classify_response_error(status: u16, response: ureq::Response) -> Outcome {
        let retry_after = response
            .header("Retry-After")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = response.into_string().unwrap_or_default();
        let reason = if body.trim().is_empty() {
            format!("server responded with status {}", status)
        } else {
            truncate(body.trim(), MAX_REASON_CHARS)
        };
        let rejection = Rejection {
            status: Some(status),
            reason,
            retry_after,
        };
        match classify_status(status) {
            StatusClass::Transient => Outcome::RejectedTransient(rejection),
            StatusClass::Permanent | StatusClass::Delivered => {
                Outcome::RejectedPermanent(rejection)
            }
        }
    }

    fn classify_transport_error(error: &ureq::Transport) -> Outcome {
        use ureq::ErrorKind;

        let rejection = Rejection::new(None, error.to_string());
        match error.kind() {
            // A malformed host or forbidden scheme is a configuration error.
            ErrorKind::InvalidUrl
            | ErrorKind::UnknownScheme
            | ErrorKind::InsecureRequestHttpsOnly
            | ErrorKind::InvalidProxyUrl
            | ErrorKind::ProxyUnauthorized => Outcome::RejectedPermanent(rejection),
            _ => Outcome::RejectedTransient(rejection),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadTransport for HttpTransport {
    fn attempt(&self, host: &str, run: &Run, api_key: &str) -> Outcome {
        if run.namespace_name.trim().is_empty() {
            return Outcome::RejectedPermanent(Rejection::new(None, "run has no namespace_name"));
        }
        let url = runs_url(host, &run.namespace_name);
        tracing::debug!(%url, dataset = %run.dataset_name, "posting run");

        let result = self
            .agent
            .post(&url)
            .set("Authorization", &format!("Bearer {}", api_key))
            .set("Accept", "application/json")
            .send_json(run);

        match result {
            Ok(response) => {
                let status = response.status();
                if classify_status(status) != StatusClass::Delivered {
                    return Self::classify_response_error(status, response);
                }
                let remote_id = response
                    .into_json::<Value>()
                    .ok()
                    .and_then(|body| body.get("id").and_then(Value::as_i64));
                Outcome::Delivered { status, remote_id }
            }
            Err(ureq::Error::Status(status, response)) => {
                Self::classify_response_error(status, response)
            }
            Err(ureq::Error::Transport(transport)) => Self::classify_transport_error(&transport),
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
