//! Orbit panel adapter (captcha-gated cookie sessions).

mod auth;

pub use auth::{CaptchaChallenge, CaptchaGate, OrbitSession, login_with_captcha};

use std::sync::Arc;

use async_trait::async_trait;
use panel_types::{Account, AuthArtifact, EntryDraft, EntryId, PanelKind, PlaylistEntry};
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::adapter::{PanelAdapter, expect_kind};
use crate::captcha::{CaptchaOcr, CaptchaSolver};
use crate::client::PanelClient;
use crate::config::{OrbitConfig, SolverConfig};
use crate::error::PanelError;

// The panel's list endpoint reports success with this misspelling.
const LIST_OK: &str = "Sucess";
const SAVE_OK: &str = "success";
const DEVICE_REJECTED: &str = "device information is incorrect";
const CAPTCHA_REJECTED: &str = "Captcha is incorrect or expired";

pub struct OrbitAdapter {
    client: Client,
    config: OrbitConfig,
    ocr: Arc<dyn CaptchaOcr>,
    solver: Arc<dyn CaptchaSolver>,
    solver_config: SolverConfig,
}

impl OrbitAdapter {
    pub fn new(
        client: Client,
        config: OrbitConfig,
        ocr: Arc<dyn CaptchaOcr>,
        solver: Arc<dyn CaptchaSolver>,
        solver_config: SolverConfig,
    ) -> Self {
        Self {
            client,
            config,
            ocr,
            solver,
            solver_config,
        }
    }

    /// Panel domain for an account: its own domain when set, otherwise the
    /// compacted MAC as a subdomain of the configured base.
    fn domain_for(&self, account: &Account) -> String {
        match account.domain.as_deref() {
            Some(domain) if !domain.trim().is_empty() => normalize_domain(domain),
            _ => format!("{}.{}", account.mac_compact(), self.config.base_domain),
        }
    }

    /// Request helper bound to a live session's domain and cookies.
    fn session_client(&self, domain: &str, cookies: &[String]) -> PanelClient {
        let mut http = PanelClient::new(self.client.clone());
        http.set_origin_and_referer(
            &format!("https://{domain}"),
            &format!("https://{domain}/dashboard"),
        );
        http.import_set_cookies(cookies.iter().map(String::as_str));
        http
    }

    fn artifact_parts<'a>(
        artifact: &'a AuthArtifact,
    ) -> Result<(&'a str, &'a [String]), PanelError> {
        match artifact {
            AuthArtifact::Orbit { domain, cookies, .. } => Ok((domain, cookies)),
            _ => Err(PanelError::MalformedResponse(
                "orbit adapter received a foreign artifact".into(),
            )),
        }
    }

    async fn save_entry(
        &self,
        domain: &str,
        cookies: &[String],
        current_id: Value,
        draft: &EntryDraft,
    ) -> Result<Value, PanelError> {
        let http = self.session_client(domain, cookies);
        let payload = json!({
            "current_playlist_url_id": current_id,
            "password": "",
            "pin": draft.pin,
            "playlist_name": draft.name,
            "playlist_type": draft.kind,
            "playlist_url": draft.url,
            "protect": if draft.protected { 1 } else { 0 },
            "username": "",
            "xml_url": "",
        });

        let response = http
            .post(&format!("https://{domain}/frontend/device/savePlaylist"))
            .json(&payload)
            .send()
            .await
            .map_err(PanelError::from_transport)?;
        let body: Value = response.json().await.map_err(PanelError::from_transport)?;

        if body["status"].as_str() != Some(SAVE_OK) {
            return Err(PanelError::MalformedResponse(format!(
                "savePlaylist rejected: {}",
                body["message"].as_str().unwrap_or("no message")
            )));
        }
        Ok(body["data"].clone())
    }
}

/// Strip a leading scheme and trailing slash from a user-supplied domain.
pub fn normalize_domain(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    without_scheme.trim_end_matches('/').to_ascii_lowercase()
}

fn entry_from_json(p: &Value) -> Option<PlaylistEntry> {
    let id = p["_id"]
        .as_str()
        .or_else(|| p["id"].as_str())
        .map(EntryId::text)
        .or_else(|| p["id"].as_i64().map(EntryId::Numeric))?;
    Some(PlaylistEntry {
        id,
        name: p["playlist_name"]
            .as_str()
            .or_else(|| p["name"].as_str())
            .unwrap_or("unnamed")
            .to_string(),
        url: p["playlist_url"]
            .as_str()
            .or_else(|| p["url"].as_str())
            .unwrap_or("")
            .to_string(),
        kind: p["playlist_type"]
            .as_str()
            .or_else(|| p["type"].as_str())
            .unwrap_or("general")
            .to_string(),
        protected: p["protect"] == json!(1) || p["protect"] == json!("1"),
        pin: p["pin"].as_str().unwrap_or("").to_string(),
    })
}

/// HTTP-backed login exchange for one (domain, account) pair.
struct HttpCaptchaGate {
    http: PanelClient,
    domain: String,
    mac_address: String,
    device_key: String,
}

impl HttpCaptchaGate {
    fn new(client: Client, domain: String, account: &Account) -> Self {
        let mut http = PanelClient::new(client);
        http.set_origin_and_referer(
            &format!("https://{domain}"),
            &format!("https://{domain}/frontend/device/login"),
        );
        Self {
            http,
            domain,
            mac_address: account.mac_address.clone(),
            device_key: account.device_key.clone(),
        }
    }
}

#[async_trait]
impl CaptchaGate for HttpCaptchaGate {
    async fn fetch_captcha(&self) -> Result<CaptchaChallenge, PanelError> {
        let url = format!("https://{}/frontend/captcha/generate", self.domain);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(PanelError::from_transport)?;
        let body: Value = response.json().await.map_err(PanelError::from_transport)?;

        let svg = body["svg"].as_str();
        let token = body["token"].as_str();
        match (svg, token) {
            (Some(svg), Some(token)) => Ok(CaptchaChallenge {
                image: svg.as_bytes().to_vec(),
                token: token.to_string(),
            }),
            _ => Err(PanelError::MalformedResponse(
                "captcha response missing svg or token".into(),
            )),
        }
    }

    async fn submit(&self, code: &str, token: &str) -> Result<OrbitSession, PanelError> {
        let url = format!("https://{}/frontend/device/login", self.domain);
        let payload = json!({
            "mac_address": self.mac_address,
            "device_key": self.device_key,
            "captcha": code,
            "token": token,
        });

        let response = self
            .http
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(PanelError::from_transport)?;

        let cookies = PanelClient::set_cookie_values(response.headers());
        let status = response.status();
        let body: Value = response.json().await.map_err(PanelError::from_transport)?;
        let message = body["message"].as_str().unwrap_or("");

        // The panel reports login failures both as 200+fail and as HTTP 400
        // with the same message strings.
        if message.contains(DEVICE_REJECTED) {
            return Err(PanelError::InvalidCredentials(message.to_string()));
        }
        if message == CAPTCHA_REJECTED {
            return Err(PanelError::TransientAuth(message.to_string()));
        }

        if body["status"].as_str() == Some(SAVE_OK) {
            return Ok(OrbitSession {
                cookies,
                device_id: body["device"]["_id"].as_str().map(str::to_owned),
            });
        }

        if status.is_server_error() {
            return Err(PanelError::Unavailable(format!("login returned {status}")));
        }
        Err(PanelError::TransientAuth(if message.is_empty() {
            format!("login rejected with status {status}")
        } else {
            message.to_string()
        }))
    }
}

#[async_trait]
impl PanelAdapter for OrbitAdapter {
    fn kind(&self) -> PanelKind {
        PanelKind::Orbit
    }

    #[instrument(skip(self, account), fields(account = %account.id))]
    async fn authenticate(&self, account: &Account) -> Result<AuthArtifact, PanelError> {
        let domain = self.domain_for(account);
        debug!(%domain, "Starting captcha-gated login");
        let gate = HttpCaptchaGate::new(self.client.clone(), domain.clone(), account);
        let session = login_with_captcha(
            &gate,
            self.ocr.as_ref(),
            self.solver.as_ref(),
            &self.solver_config,
            &self.config,
        )
        .await?;

        Ok(AuthArtifact::Orbit {
            domain,
            cookies: session.cookies,
            device_id: session.device_id,
        })
    }

    async fn probe(
        &self,
        _account: &Account,
        artifact: &AuthArtifact,
    ) -> Result<bool, PanelError> {
        let (domain, cookies) = Self::artifact_parts(artifact)?;
        let http = self.session_client(domain, cookies);
        let response = match http
            .get(&format!("https://{domain}/frontend/device/playlists"))
            .send()
            .await
        {
            Ok(r) => r,
            Err(_) => return Ok(false),
        };
        let Ok(body) = response.json::<Value>().await else {
            return Ok(false);
        };
        Ok(body["status"].as_str() == Some(LIST_OK))
    }

    async fn list_entries(
        &self,
        _account: &Account,
        artifact: &AuthArtifact,
    ) -> Result<Vec<PlaylistEntry>, PanelError> {
        expect_kind(artifact, PanelKind::Orbit)?;
        let (domain, cookies) = Self::artifact_parts(artifact)?;
        let http = self.session_client(domain, cookies);

        let response = http
            .get(&format!("https://{domain}/frontend/device/playlists"))
            .send()
            .await
            .map_err(PanelError::from_transport)?;
        let body: Value = response.json().await.map_err(PanelError::from_transport)?;

        if body["status"].as_str() != Some(LIST_OK) {
            return Err(PanelError::TransientAuth(
                "playlist listing rejected; session likely expired".into(),
            ));
        }
        let playlists = body["playlists"].as_array().ok_or_else(|| {
            PanelError::MalformedResponse("playlists array missing from listing".into())
        })?;
        Ok(playlists.iter().filter_map(entry_from_json).collect())
    }

    async fn add_entry(
        &self,
        _account: &Account,
        artifact: &AuthArtifact,
        draft: &EntryDraft,
    ) -> Result<EntryId, PanelError> {
        let (domain, cookies) = Self::artifact_parts(artifact)?;
        let data = self.save_entry(domain, cookies, json!(-1), draft).await?;
        data["_id"]
            .as_str()
            .or_else(|| data["id"].as_str())
            .map(EntryId::text)
            .or_else(|| data["id"].as_i64().map(EntryId::Numeric))
            .ok_or_else(|| {
                PanelError::MalformedResponse("savePlaylist response carried no entry id".into())
            })
    }

    async fn edit_entry(
        &self,
        _account: &Account,
        artifact: &AuthArtifact,
        id: &EntryId,
        draft: &EntryDraft,
    ) -> Result<(), PanelError> {
        let (domain, cookies) = Self::artifact_parts(artifact)?;
        let current_id = match id {
            EntryId::Text(s) => json!(s),
            EntryId::Numeric(n) => json!(n),
        };
        self.save_entry(domain, cookies, current_id, draft).await?;
        Ok(())
    }

    async fn delete_entry(
        &self,
        _account: &Account,
        artifact: &AuthArtifact,
        id: &EntryId,
    ) -> Result<(), PanelError> {
        let (domain, cookies) = Self::artifact_parts(artifact)?;
        let http = self.session_client(domain, cookies);

        let response = http
            .delete(&format!(
                "https://{domain}/frontend/device/deletePlayListUrl/{id}"
            ))
            .send()
            .await
            .map_err(PanelError::from_transport)?;
        let body: Value = response.json().await.map_err(PanelError::from_transport)?;
        if body["status"].as_str() != Some(SAVE_OK) {
            return Err(PanelError::MalformedResponse(format!(
                "deletePlayListUrl rejected: {}",
                body["message"].as_str().unwrap_or("no message")
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_domain_strips_scheme_and_slash() {
        assert_eq!(normalize_domain("https://Panel.Example.com/"), "panel.example.com");
        assert_eq!(normalize_domain("http://panel.example.com"), "panel.example.com");
        assert_eq!(normalize_domain("panel.example.com"), "panel.example.com");
    }

    #[test]
    fn entry_mapping_defaults_missing_fields() {
        let entry = entry_from_json(&json!({
            "_id": "64f",
            "playlist_url": "http://cdn.example.com/a",
        }))
        .unwrap();
        assert_eq!(entry.name, "unnamed");
        assert_eq!(entry.kind, "general");
        assert!(!entry.protected);
        assert_eq!(entry.pin, "");
    }

    #[test]
    fn entry_mapping_reads_protection_in_both_shapes() {
        let numeric = entry_from_json(&json!({"_id": "a", "protect": 1})).unwrap();
        let stringy = entry_from_json(&json!({"_id": "b", "protect": "1"})).unwrap();
        assert!(numeric.protected);
        assert!(stringy.protected);
    }

    #[test]
    fn entry_without_id_is_dropped() {
        assert!(entry_from_json(&json!({"playlist_name": "x"})).is_none());
    }
}
