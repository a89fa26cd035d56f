//! Shared HTTP plumbing for panel adapters.
//!
//! Each adapter owns a [`PanelClient`] carrying its panel-specific headers
//! and an isolated cookie store; cookies captured from responses are
//! re-sent on subsequent requests.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, RequestBuilder};
use rustls::{ClientConfig, crypto::aws_lc_rs};
use rustls_platform_verifier::BuilderVerifierExt;
use tracing::debug;

pub(crate) const DEFAULT_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the shared reqwest client with platform-verified rustls TLS.
pub fn default_client() -> Client {
    let provider = Arc::new(aws_lc_rs::default_provider());
    let tls_config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .expect("Failed to configure default TLS protocol versions")
        .with_platform_verifier()
        .expect("Failed to initialize platform certificate verifier")
        .with_no_client_auth();

    Client::builder()
        .use_preconfigured_tls(tls_config)
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .expect("Failed to create HTTP client")
}

/// Per-adapter request helper: panel headers + cookie store.
#[derive(Debug, Clone)]
pub struct PanelClient {
    pub client: Client,
    headers: HeaderMap,
    cookies: HashMap<String, String>,
}

impl PanelClient {
    pub fn new(client: Client) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(reqwest::header::USER_AGENT, HeaderValue::from_static(DEFAULT_UA));
        headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );
        Self {
            client,
            headers,
            cookies: HashMap::new(),
        }
    }

    /// Insert a panel header; invalid names/values are skipped with a log.
    pub fn set_header(&mut self, key: &str, value: &str) {
        match (HeaderName::from_str(key), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => debug!(key, "Invalid header; skipping"),
        }
    }

    pub fn set_origin_and_referer(&mut self, origin: &str, referer: &str) {
        self.set_header("Origin", origin);
        self.set_header("Referer", referer);
    }

    pub fn set_cookie(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.cookies.insert(name.into(), value.into());
    }

    /// Import cookies from raw `set-cookie` header values, keeping only the
    /// leading `name=value` pair of each.
    pub fn import_set_cookies<'a>(&mut self, raw: impl IntoIterator<Item = &'a str>) {
        for cookie in raw {
            let Some(pair) = cookie.split(';').next() else {
                continue;
            };
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            let (name, value) = (name.trim(), value.trim());
            if !name.is_empty() && !value.is_empty() {
                self.cookies.insert(name.to_owned(), value.to_owned());
            }
        }
    }

    pub fn clear_cookies(&mut self) {
        self.cookies.clear();
    }

    fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let mut out = String::new();
        for (name, value) in &self.cookies {
            if !out.is_empty() {
                out.push_str("; ");
            }
            out.push_str(name);
            out.push('=');
            out.push_str(value);
        }
        Some(out)
    }

    /// Build a request with panel headers and the current cookie jar.
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut headers = self.headers.clone();
        if let Some(cookie) = self.cookie_header() {
            match HeaderValue::from_str(&cookie) {
                Ok(value) => {
                    headers.insert(reqwest::header::COOKIE, value);
                }
                Err(e) => debug!(error = %e, "Failed to build Cookie header"),
            }
        }
        self.client.request(method, url).headers(headers)
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    pub fn delete(&self, url: &str) -> RequestBuilder {
        self.request(Method::DELETE, url)
    }

    /// Extract raw `set-cookie` values from a response header map.
    pub fn set_cookie_values(headers: &HeaderMap) -> Vec<String> {
        headers
            .get_all(reqwest::header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_owned)
            .collect()
    }
}
