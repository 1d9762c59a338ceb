//! Reachability checks for registry mirrors and proxies.
//!
//! Probes never touch the configuration; they only report whether a value
//! the user is about to save looks usable.

use std::time::{Duration, Instant};

use serde::Serialize;

const MIRROR_TIMEOUT: Duration = Duration::from_secs(5);
const PROXY_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = "Docker-Client/1.0";

const HTTP_PROXY_TARGET: &str = "http://www.google.com";
const HTTPS_PROXY_TARGET: &str = "https://www.google.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeOutcome {
    Ok,
    Error,
    Timeout,
}

/// Result of a single probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    pub success: bool,
    pub outcome: ProbeOutcome,
    pub message: String,
    pub latency_ms: Option<u64>,
}

impl ProbeResult {
    fn ok(message: impl Into<String>, latency: Duration) -> Self {
        Self {
            success: true,
            outcome: ProbeOutcome::Ok,
            message: message.into(),
            latency_ms: Some(latency.as_millis() as u64),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            outcome: ProbeOutcome::Error,
            message: message.into(),
            latency_ms: None,
        }
    }

    fn from_request_error(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            Self {
                success: false,
                outcome: ProbeOutcome::Timeout,
                message: "request timed out".to_string(),
                latency_ms: None,
            }
        } else {
            Self::error(format!("connection failed: {}", e))
        }
    }
}

/// Probe a registry mirror via its `/v2/` endpoint. 200 and 401 both mean
/// a registry answered.
pub async fn probe_mirror(mirror: &str) -> ProbeResult {
    let mirror = mirror.trim().trim_end_matches('/');
    if mirror.is_empty() {
        return ProbeResult::error("mirror address is empty");
    }
    if let Err(e) = url::Url::parse(mirror) {
        return ProbeResult::error(format!("invalid URL: {}", e));
    }

    let client = match reqwest::Client::builder()
        .timeout(MIRROR_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
    {
        Ok(c) => c,
        Err(e) => return ProbeResult::error(e.to_string()),
    };

    let started = Instant::now();
    match client.get(format!("{}/v2/", mirror)).send().await {
        Ok(resp) => {
            let status = resp.status();
            let latency = started.elapsed();
            if status == reqwest::StatusCode::OK || status == reqwest::StatusCode::UNAUTHORIZED {
                ProbeResult::ok("registry reachable", latency)
            } else {
                ProbeResult {
                    latency_ms: Some(latency.as_millis() as u64),
                    ..ProbeResult::error(format!("HTTP {}", status.as_u16()))
                }
            }
        }
        Err(e) => {
            tracing::debug!(mirror = %mirror, error = %e, "Mirror probe failed");
            ProbeResult::from_request_error(&e)
        }
    }
}

/// Probe a proxy by sending a HEAD request through it. `https` picks the
/// target scheme so both proxy kinds can be exercised.
pub async fn probe_proxy(proxy: &str, https: bool) -> ProbeResult {
    let proxy = proxy.trim();
    if proxy.is_empty() {
        return ProbeResult::error("proxy address is empty");
    }
    let proxy = if proxy.contains("://") {
        proxy.to_string()
    } else {
        format!("http://{}", proxy)
    };

    let client = match reqwest::Proxy::all(proxy.as_str()).and_then(|p| {
        reqwest::Client::builder()
            .proxy(p)
            .timeout(PROXY_TIMEOUT)
            .build()
    }) {
        Ok(c) => c,
        Err(e) => return ProbeResult::error(format!("invalid proxy: {}", e)),
    };

    let target = if https {
        HTTPS_PROXY_TARGET
    } else {
        HTTP_PROXY_TARGET
    };

    let started = Instant::now();
    match client.head(target).send().await {
        Ok(resp) => {
            let latency = started.elapsed();
            ProbeResult::ok(format!("HTTP {}", resp.status().as_u16()), latency)
        }
        Err(e) => {
            tracing::debug!(proxy = %proxy, error = %e, "Proxy probe failed");
            ProbeResult::from_request_error(&e)
        }
    }
}
