//! Shared HTTP client for adapters, with SSRF checks and resource limits.

use std::net::IpAddr;
use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::config::FetchConfig;
use crate::{Result, TrendError};

/// HTTP fetcher used by every adapter.
///
/// Cloning shares the underlying connection pool.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    max_body_bytes: u64,
}

impl HttpFetcher {
    /// Create a fetcher from fetch settings.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| TrendError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_body_bytes: config.max_body_bytes,
        })
    }

    /// GET `url` and return the body bytes.
    ///
    /// Non-2xx responses become [`TrendError::Http`] so callers can tell
    /// permanent from transient failures.
    pub async fn get_bytes(&self, url: &str, bearer: Option<&str>, accept: &str) -> Result<Vec<u8>> {
        let mut request = self.client.get(url).header(ACCEPT, accept);
        if let Some(token) = bearer {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = request.send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TrendError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        if let Some(content_length) = response.content_length() {
            if content_length > self.max_body_bytes {
                return Err(TrendError::Parse(format!(
                    "response too large: {} bytes (max {} bytes)",
                    content_length, self.max_body_bytes
                )));
            }
        }

        let bytes = response.bytes().await.map_err(map_reqwest_error)?;

        if bytes.len() as u64 > self.max_body_bytes {
            return Err(TrendError::Parse(format!(
                "response too large: {} bytes (max {} bytes)",
                bytes.len(),
                self.max_body_bytes
            )));
        }

        Ok(bytes.to_vec())
    }

    /// GET `url` as text.
    pub async fn get_text(&self, url: &str, bearer: Option<&str>) -> Result<String> {
        let bytes = self.get_bytes(url, bearer, "*/*").await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// GET `url` and deserialize a JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, bearer: Option<&str>) -> Result<T> {
        let bytes = self.get_bytes(url, bearer, "application/json").await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| TrendError::Parse(format!("invalid JSON from {}: {}", url, e)))
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TrendError {
    if e.is_timeout() {
        TrendError::Timeout(e.to_string())
    } else if let Some(status) = e.status() {
        TrendError::Http {
            status: status.as_u16(),
            url: e.url().map(|u| u.to_string()).unwrap_or_default(),
        }
    } else {
        TrendError::Network(e.to_string())
    }
}

/// Validate a user-supplied URL against SSRF.
///
/// Checks that:
/// - the scheme is http or https
/// - the host is not a private, loopback or link-local address
/// - the host is not a local-only hostname
pub fn validate_url(url: &str) -> Result<()> {
    let parsed =
        url::Url::parse(url).map_err(|e| TrendError::Validation(format!("invalid URL: {}", e)))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(TrendError::Validation(format!(
                "unsupported URL scheme: {}",
                scheme
            )));
        }
    }

    let host = parsed
        .host()
        .ok_or_else(|| TrendError::Validation("URL has no host".to_string()))?;

    let ip = match host {
        url::Host::Domain(domain) => {
            if is_forbidden_hostname(domain) {
                return Err(TrendError::Validation(format!("forbidden host: {}", domain)));
            }
            None
        }
        url::Host::Ipv4(ipv4) => Some(IpAddr::V4(ipv4)),
        url::Host::Ipv6(ipv6) => Some(IpAddr::V6(ipv6)),
    };

    if let Some(ip) = ip.filter(is_private_ip) {
        return Err(TrendError::Validation(format!(
            "private IP address not allowed: {}",
            ip
        )));
    }

    Ok(())
}

fn is_forbidden_hostname(host: &str) -> bool {
    let host = host.to_lowercase();
    if host == "localhost" {
        return true;
    }
    [".local", ".localhost", ".internal", ".intranet", ".corp", ".home", ".lan"]
        .iter()
        .any(|suffix| host.ends_with(suffix))
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let o = v4.octets();
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // shared address space 100.64.0.0/10
                || (o[0] == 100 && (64..=127).contains(&o[1]))
        }
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                // unique local fc00::/7
                || (first & 0xfe00) == 0xfc00
                // link-local fe80::/10
                || (first & 0xffc0) == 0xfe80
                || v6.to_ipv4_mapped().is_some_and(|v4| is_private_ip(&IpAddr::V4(v4)))
        }
    }
}
