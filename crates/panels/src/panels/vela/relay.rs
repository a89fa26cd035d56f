//! HTTP-forwarding relay client.
//!
//! The Vela panel is not directly reachable from this process; every request
//! is wrapped into a JSON envelope and posted to a generic forwarding relay,
//! which performs the real call and echoes back status, headers, and body.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::VelaConfig;
use crate::error::PanelError;

/// Forwarding seam: [`RelayClient`] is the HTTP implementation, tests use
/// scripted transports.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    async fn forward(&self, request: RelayRequest) -> Result<RelayResponse, PanelError>;
}

#[derive(Debug, Clone, Serialize)]
pub struct RelayRequest {
    pub url: String,
    pub method: String,
    pub headers: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelayResponse {
    pub status: u16,
    #[serde(default)]
    pub headers: HashMap<String, Value>,
    #[serde(default)]
    pub body: String,
}

impl RelayResponse {
    /// `set-cookie` values from the forwarded response; the relay encodes
    /// multiples either as an array or a single string.
    pub fn set_cookies(&self) -> Vec<String> {
        let Some(value) = self
            .headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("set-cookie"))
            .map(|(_, v)| v)
        else {
            return Vec::new();
        };
        match value {
            Value::String(s) => vec![s.clone()],
            Value::Array(items) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_owned))
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelayClient {
    client: Client,
    relay_url: String,
    timeout: std::time::Duration,
}

impl RelayClient {
    pub fn new(client: Client, config: &VelaConfig) -> Self {
        Self {
            client,
            relay_url: config.relay_url.clone(),
            timeout: config.relay_timeout(),
        }
    }
}

#[async_trait]
impl RelayTransport for RelayClient {
    async fn forward(&self, request: RelayRequest) -> Result<RelayResponse, PanelError> {
        if self.relay_url.is_empty() {
            return Err(PanelError::Unavailable("relay endpoint not configured".into()));
        }
        let response = self
            .client
            .post(&self.relay_url)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(PanelError::from_transport)?;

        if !response.status().is_success() {
            return Err(PanelError::Unavailable(format!(
                "relay answered {}",
                response.status()
            )));
        }
        response
            .json::<RelayResponse>()
            .await
            .map_err(|e| PanelError::MalformedResponse(format!("relay envelope: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response_with_cookie_header(value: Value) -> RelayResponse {
        let mut headers = HashMap::new();
        headers.insert("set-cookie".to_string(), value);
        RelayResponse {
            status: 302,
            headers,
            body: String::new(),
        }
    }

    #[test]
    fn set_cookies_handles_string_and_array_encodings() {
        let single = response_with_cookie_header(json!("sid=a; Path=/"));
        assert_eq!(single.set_cookies(), vec!["sid=a; Path=/".to_string()]);

        let multi = response_with_cookie_header(json!(["sid=a", "lang=en"]));
        assert_eq!(multi.set_cookies().len(), 2);
    }

    #[test]
    fn set_cookie_header_name_is_case_insensitive() {
        let mut headers = HashMap::new();
        headers.insert("Set-Cookie".to_string(), json!("sid=x"));
        let response = RelayResponse {
            status: 200,
            headers,
            body: String::new(),
        };
        assert_eq!(response.set_cookies(), vec!["sid=x".to_string()]);
    }

    #[test]
    fn missing_cookie_header_yields_empty() {
        let response = RelayResponse {
            status: 200,
            headers: HashMap::new(),
            body: String::new(),
        };
        assert!(response.set_cookies().is_empty());
    }
}
