//! Vela panel adapter (relay-proxied form login, single-cookie sessions).

mod html;
mod relay;

pub use html::{AUTH_MARKER, is_authenticated_page, parse_entries};
pub use relay::{RelayClient, RelayRequest, RelayResponse, RelayTransport};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use panel_types::{Account, AuthArtifact, EntryDraft, EntryId, PanelKind, PlaylistEntry};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::adapter::{PanelAdapter, expect_kind};
use crate::config::VelaConfig;
use crate::error::PanelError;

const MOBILE_UA: &str =
    "Mozilla/5.0 (Linux; Android 6.0; Nexus 5 Build/MRA58N) AppleWebKit/537.36";

pub struct VelaAdapter {
    relay: Arc<dyn RelayTransport>,
    config: VelaConfig,
}

/// Percent-encode form pairs in insertion order.
fn form_encode(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

impl VelaAdapter {
    pub fn new(relay: Arc<dyn RelayTransport>, config: VelaConfig) -> Self {
        Self { relay, config }
    }

    fn panel_url(&self, path: &str) -> String {
        format!("https://{}{path}", self.config.domain)
    }

    fn cookie<'a>(artifact: &'a AuthArtifact) -> Result<&'a str, PanelError> {
        match artifact {
            AuthArtifact::Vela { cookie } => Ok(cookie),
            _ => Err(PanelError::MalformedResponse(
                "vela adapter received a foreign artifact".into(),
            )),
        }
    }

    fn base_headers(&self, cookie: Option<&str>) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert("User-Agent".into(), MOBILE_UA.into());
        headers.insert(
            "Accept".into(),
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".into(),
        );
        headers.insert("Referer".into(), self.panel_url("/mylist"));
        if let Some(cookie) = cookie {
            headers.insert("Cookie".into(), cookie.to_string());
        }
        headers
    }

    async fn panel_get(&self, path: &str, cookie: &str) -> Result<RelayResponse, PanelError> {
        self.relay
            .forward(RelayRequest {
                url: self.panel_url(path),
                method: "GET".into(),
                headers: self.base_headers(Some(cookie)),
                body: None,
            })
            .await
    }

    async fn panel_form(
        &self,
        method: &str,
        path: &str,
        cookie: &str,
        pairs: &[(&str, &str)],
    ) -> Result<Value, PanelError> {
        let mut headers = self.base_headers(Some(cookie));
        headers.insert("Accept".into(), "application/json, text/plain, */*".into());
        headers.insert(
            "Content-Type".into(),
            "application/x-www-form-urlencoded".into(),
        );
        headers.insert("Origin".into(), self.panel_url(""));

        let response = self
            .relay
            .forward(RelayRequest {
                url: self.panel_url(path),
                method: method.into(),
                headers,
                body: Some(form_encode(pairs)),
            })
            .await?;

        if response.status != 200 {
            return Err(PanelError::Unavailable(format!(
                "panel answered {} via relay",
                response.status
            )));
        }
        let body: Value = serde_json::from_str(&response.body).map_err(|_| {
            PanelError::MalformedResponse(format!(
                "expected JSON from {path}, got: {}",
                &response.body.chars().take(120).collect::<String>()
            ))
        })?;
        if body["status"].as_str() != Some("success") {
            let msg = body["msg"]
                .as_str()
                .or_else(|| body["message"].as_str())
                .unwrap_or("unspecified failure");
            return Err(PanelError::TransientAuth(format!("{path} rejected: {msg}")));
        }
        Ok(body)
    }

    fn draft_pairs<'a>(id: &'a str, draft: &'a EntryDraft) -> Vec<(&'a str, &'a str)> {
        vec![
            ("current_playlist_url_id", id),
            ("playlist_name", draft.name.as_str()),
            ("playlist_url", draft.url.as_str()),
            ("protect", if draft.protected { "1" } else { "0" }),
            ("pin", if draft.protected { draft.pin.as_str() } else { "" }),
            ("playlist_type", draft.kind.as_str()),
            ("user_name", ""),
            ("password", ""),
        ]
    }
}

#[async_trait]
impl PanelAdapter for VelaAdapter {
    fn kind(&self) -> PanelKind {
        PanelKind::Vela
    }

    #[instrument(skip(self, account), fields(account = %account.id))]
    async fn authenticate(&self, account: &Account) -> Result<AuthArtifact, PanelError> {
        let mut headers = self.base_headers(None);
        headers.insert(
            "Content-Type".into(),
            "application/x-www-form-urlencoded".into(),
        );
        headers.insert("Referer".into(), self.panel_url("/login"));
        headers.insert("Origin".into(), self.panel_url(""));

        let login = self
            .relay
            .forward(RelayRequest {
                url: self.panel_url("/login"),
                method: "POST".into(),
                headers,
                body: Some(form_encode(&[
                    ("mac_address", account.mac_address.as_str()),
                    ("device_key", account.device_key.as_str()),
                    ("submit", ""),
                ])),
            })
            .await?;

        let cookies = login.set_cookies();
        let accepted = matches!(login.status, 200 | 302) && !cookies.is_empty();
        if !accepted {
            debug!(status = login.status, cookies = cookies.len(), "Login rejected");
            return Err(PanelError::TransientAuth(format!(
                "login answered {} with {} cookie(s)",
                login.status,
                cookies.len()
            )));
        }

        // Keep only the leading name=value pair of the first cookie.
        let cookie = cookies[0]
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        if cookie.is_empty() {
            return Err(PanelError::MalformedResponse("empty set-cookie on login".into()));
        }

        // The relay can hand back a 200 for a silently-failed login, so the
        // cookie must be proven against the authenticated page before it is
        // accepted as a session.
        let verify = self.panel_get("/mylist", &cookie).await?;
        if verify.status != 200 || !is_authenticated_page(&verify.body) {
            warn!(status = verify.status, "Cookie failed authenticated-page verification");
            return Err(PanelError::InvalidCredentials(
                "login cookie does not grant access to the device page".into(),
            ));
        }

        Ok(AuthArtifact::Vela { cookie })
    }

    async fn probe(
        &self,
        _account: &Account,
        artifact: &AuthArtifact,
    ) -> Result<bool, PanelError> {
        let cookie = Self::cookie(artifact)?;
        match self.panel_get("/mylist", cookie).await {
            Ok(response) => Ok(response.status == 200 && is_authenticated_page(&response.body)),
            Err(_) => Ok(false),
        }
    }

    async fn list_entries(
        &self,
        _account: &Account,
        artifact: &AuthArtifact,
    ) -> Result<Vec<PlaylistEntry>, PanelError> {
        expect_kind(artifact, PanelKind::Vela)?;
        let cookie = Self::cookie(artifact)?;
        let response = self.panel_get("/mylist", cookie).await?;
        if response.status != 200 {
            return Err(PanelError::Unavailable(format!(
                "device page answered {}",
                response.status
            )));
        }
        parse_entries(&response.body)
    }

    async fn add_entry(
        &self,
        _account: &Account,
        artifact: &AuthArtifact,
        draft: &EntryDraft,
    ) -> Result<EntryId, PanelError> {
        let cookie = Self::cookie(artifact)?;
        let pairs = Self::draft_pairs("-1", draft);
        let body = self.panel_form("POST", "/savePlaylist", cookie, &pairs).await?;

        body["data"]["id"]
            .as_str()
            .map(EntryId::text)
            .or_else(|| body["data"]["id"].as_i64().map(EntryId::Numeric))
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
        let cookie = Self::cookie(artifact)?;
        let id = id.to_string();
        let pairs = Self::draft_pairs(&id, draft);
        self.panel_form("POST", "/savePlaylist", cookie, &pairs).await?;
        Ok(())
    }

    async fn delete_entry(
        &self,
        _account: &Account,
        artifact: &AuthArtifact,
        id: &EntryId,
    ) -> Result<(), PanelError> {
        let cookie = Self::cookie(artifact)?;
        let id = id.to_string();
        self.panel_form(
            "DELETE",
            "/deletePlayListUrl",
            cookie,
            &[("playlist_url_id", id.as_str())],
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panel_types::AccountId;
    use parking_lot::Mutex;
    use serde_json::json;

    fn account() -> Account {
        Account {
            id: AccountId::new("v1"),
            name: "vela device".into(),
            panel: PanelKind::Vela,
            mac_address: "00:1A:79:AA:BB:CC".into(),
            device_key: "654321".into(),
            password: None,
            domain: None,
            group: None,
            has_session: false,
            session_expires_at: None,
            last_used_at: None,
        }
    }

    /// Relay double: answers requests from a scripted (path, response) list.
    struct ScriptedRelay {
        responses: Mutex<Vec<(String, RelayResponse)>>,
    }

    impl ScriptedRelay {
        fn new(responses: Vec<(&str, RelayResponse)>) -> Self {
            Self {
                responses: Mutex::new(
                    responses
                        .into_iter()
                        .map(|(path, r)| (path.to_string(), r))
                        .collect(),
                ),
            }
        }
    }

    #[async_trait]
    impl RelayTransport for ScriptedRelay {
        async fn forward(&self, request: RelayRequest) -> Result<RelayResponse, PanelError> {
            let mut responses = self.responses.lock();
            let position = responses
                .iter()
                .position(|(path, _)| request.url.ends_with(path.as_str()))
                .unwrap_or_else(|| panic!("unscripted relay request: {}", request.url));
            Ok(responses.remove(position).1)
        }
    }

    fn relay_response(status: u16, body: &str, cookie: Option<&str>) -> RelayResponse {
        let mut headers = HashMap::new();
        if let Some(cookie) = cookie {
            headers.insert("set-cookie".to_string(), json!(cookie));
        }
        RelayResponse {
            status,
            headers,
            body: body.to_string(),
        }
    }

    fn adapter(relay: ScriptedRelay) -> VelaAdapter {
        VelaAdapter::new(Arc::new(relay), VelaConfig::default())
    }

    const AUTH_PAGE: &str =
        "<html>Mac Address : 00:1a:79:aa:bb:cc Device Key : 654321 Expiry date : x</html>";

    #[tokio::test]
    async fn login_verifies_cookie_against_device_page() {
        let relay = ScriptedRelay::new(vec![
            ("/login", relay_response(302, "", Some("sid=abc; Path=/; HttpOnly"))),
            ("/mylist", relay_response(200, AUTH_PAGE, None)),
        ]);
        let artifact = adapter(relay).authenticate(&account()).await.unwrap();
        assert_eq!(artifact, AuthArtifact::Vela { cookie: "sid=abc".into() });
    }

    #[tokio::test]
    async fn accepted_login_without_working_cookie_is_an_auth_failure() {
        // The relay reports 200 + cookie even though the panel silently
        // rejected the login; the missing page marker must fail the auth.
        let relay = ScriptedRelay::new(vec![
            ("/login", relay_response(200, "", Some("sid=dead"))),
            ("/mylist", relay_response(200, "<html>Manage Your playlist</html>", None)),
        ]);
        let err = adapter(relay).authenticate(&account()).await.unwrap_err();
        assert!(matches!(err, PanelError::InvalidCredentials(_)));
    }

    #[tokio::test]
    async fn login_without_cookie_is_transient() {
        let relay = ScriptedRelay::new(vec![("/login", relay_response(200, "", None))]);
        let err = adapter(relay).authenticate(&account()).await.unwrap_err();
        assert!(matches!(err, PanelError::TransientAuth(_)));
    }

    #[test]
    fn form_encode_escapes_reserved_characters() {
        let encoded = form_encode(&[("playlist_url", "http://h/get.php?u=1&p=2"), ("pin", "")]);
        assert_eq!(encoded, "playlist_url=http%3A%2F%2Fh%2Fget.php%3Fu%3D1%26p%3D2&pin=");
    }

    #[test]
    fn draft_pairs_blank_pin_when_unprotected() {
        let mut draft = EntryDraft::new("n", "http://u");
        draft.pin = "1234".into();
        let pairs = VelaAdapter::draft_pairs("-1", &draft);
        let pin = pairs.iter().find(|(k, _)| *k == "pin").unwrap().1;
        assert_eq!(pin, "");

        draft.protected = true;
        let pairs = VelaAdapter::draft_pairs("-1", &draft);
        let pin = pairs.iter().find(|(k, _)| *k == "pin").unwrap().1;
        assert_eq!(pin, "1234");
    }
}
