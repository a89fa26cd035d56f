//! Astra panel adapter (derived-token headers, bearer sessions).

mod tokens;

pub use tokens::{TokenFamily, armor, seal, weave};

use async_trait::async_trait;
use chrono::Utc;
use panel_types::{Account, AuthArtifact, EntryDraft, EntryId, PanelKind, PlaylistEntry};
use reqwest::{Client, Method, RequestBuilder};
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::adapter::{PanelAdapter, expect_kind};
use crate::client::DEFAULT_UA;
use crate::config::AstraConfig;
use crate::error::PanelError;

pub struct AstraAdapter {
    client: Client,
    config: AstraConfig,
}

impl AstraAdapter {
    pub fn new(client: Client, config: AstraConfig) -> Self {
        Self { client, config }
    }

    fn bearer<'a>(artifact: &'a AuthArtifact) -> Result<&'a str, PanelError> {
        match artifact {
            AuthArtifact::Astra { token } => Ok(token),
            _ => Err(PanelError::MalformedResponse(
                "astra adapter received a foreign artifact".into(),
            )),
        }
    }

    /// Build a request carrying a freshly derived token family. Sealed
    /// tokens embed the current timestamp, so this must run per request.
    fn request(&self, method: Method, path: &str, account: &Account, bearer: Option<&str>) -> RequestBuilder {
        let family = TokenFamily::derive(
            &account.mac_address,
            account.password.as_deref().unwrap_or(""),
            Utc::now().timestamp_millis(),
        );

        let mut builder = self
            .client
            .request(method, format!("https://{}{path}", self.config.api_base))
            .header(reqwest::header::USER_AGENT, DEFAULT_UA)
            .header(reqwest::header::ACCEPT, "application/json, text/plain, */*")
            .header(reqwest::header::ORIGIN, &self.config.web_origin)
            .header(reqwest::header::REFERER, format!("{}/", self.config.web_origin))
            .header(
                reqwest::header::AUTHORIZATION,
                match bearer {
                    Some(token) => format!("Bearer {token}"),
                    None => "Bearer".to_string(),
                },
            );
        for (name, value) in family.headers() {
            builder = builder.header(name, value);
        }
        builder
    }

    fn entry_from_json(p: &Value) -> Option<PlaylistEntry> {
        let id = p["id"]
            .as_i64()
            .map(EntryId::Numeric)
            .or_else(|| p["id"].as_str().map(EntryId::text))
            .or_else(|| p["_id"].as_str().map(EntryId::text))?;
        Some(PlaylistEntry {
            id,
            name: p["name"]
                .as_str()
                .or_else(|| p["playlist_name"].as_str())
                .unwrap_or("unnamed")
                .to_string(),
            url: p["url"]
                .as_str()
                .or_else(|| p["playlist_url"].as_str())
                .unwrap_or("")
                .to_string(),
            kind: p["type"]
                .as_str()
                .or_else(|| p["playlist_type"].as_str())
                .unwrap_or("URL")
                .to_string(),
            protected: p["is_protected"] == json!(true) || p["is_protected"] == json!(1),
            pin: p["pin"].as_str().unwrap_or("").to_string(),
        })
    }

    fn mutation_payload(
        account: &Account,
        id: Option<&EntryId>,
        draft: &EntryDraft,
    ) -> Value {
        json!({
            "mac_address": account.mac_address,
            "playlist_id": match id {
                Some(EntryId::Numeric(n)) => json!(n),
                Some(EntryId::Text(s)) => json!(s),
                None => Value::Null,
            },
            "playlist_name": draft.name,
            "playlist_url": draft.url,
            "playlist_type": draft.kind,
            "type": draft.kind,
            "is_protected": draft.protected,
            "pin": draft.pin,
            "playlist_host": "",
            "playlist_username": "",
            "playlist_password": "",
        })
    }

    async fn expect_ok(response: reqwest::Response) -> Result<Value, PanelError> {
        let status = response.status();
        if status.is_server_error() {
            return Err(PanelError::Unavailable(format!("panel returned {status}")));
        }
        if !status.is_success() {
            return Err(PanelError::TransientAuth(format!(
                "panel rejected request with {status}"
            )));
        }
        response.json().await.map_err(PanelError::from_transport)
    }
}

#[async_trait]
impl PanelAdapter for AstraAdapter {
    fn kind(&self) -> PanelKind {
        PanelKind::Astra
    }

    #[instrument(skip(self, account), fields(account = %account.id))]
    async fn authenticate(&self, account: &Account) -> Result<AuthArtifact, PanelError> {
        let payload = json!({
            "mac": account.mac_address,
            "password": account.password.as_deref().unwrap_or(""),
        });

        let response = self
            .request(Method::POST, "/auth/login", account, None)
            .json(&payload)
            .send()
            .await
            .map_err(PanelError::from_transport)?;

        // The login body carries only the credentials, so a definitive
        // rejection here is a credentials problem, not a transient one.
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(PanelError::InvalidCredentials(format!(
                "login rejected with {status}"
            )));
        }
        let body = Self::expect_ok(response).await?;

        // Success requires both a truthy status and a token.
        let status_ok = body["status"].as_bool().unwrap_or(false)
            || body["status"].as_i64().unwrap_or(0) != 0;
        match body["token"].as_str() {
            Some(token) if status_ok => {
                debug!("Derived-token login accepted");
                Ok(AuthArtifact::Astra {
                    token: token.to_string(),
                })
            }
            _ => Err(PanelError::InvalidCredentials(
                body["message"]
                    .as_str()
                    .unwrap_or("login rejected without message")
                    .to_string(),
            )),
        }
    }

    async fn probe(
        &self,
        account: &Account,
        artifact: &AuthArtifact,
    ) -> Result<bool, PanelError> {
        let token = Self::bearer(artifact)?;
        let response = match self
            .request(Method::GET, "/playlistw", account, Some(token))
            .send()
            .await
        {
            Ok(r) => r,
            Err(_) => return Ok(false),
        };
        Ok(response.status().is_success())
    }

    async fn list_entries(
        &self,
        account: &Account,
        artifact: &AuthArtifact,
    ) -> Result<Vec<PlaylistEntry>, PanelError> {
        expect_kind(artifact, PanelKind::Astra)?;
        let token = Self::bearer(artifact)?;
        let response = self
            .request(Method::GET, "/playlistw", account, Some(token))
            .send()
            .await
            .map_err(PanelError::from_transport)?;
        let body = Self::expect_ok(response).await?;

        // The listing is a bare array; anything else is a malformed page.
        let items = body.as_array().ok_or_else(|| {
            PanelError::MalformedResponse("playlist listing is not an array".into())
        })?;
        Ok(items.iter().filter_map(Self::entry_from_json).collect())
    }

    async fn add_entry(
        &self,
        account: &Account,
        artifact: &AuthArtifact,
        draft: &EntryDraft,
    ) -> Result<EntryId, PanelError> {
        let token = Self::bearer(artifact)?;
        let payload = Self::mutation_payload(account, None, draft);
        let response = self
            .request(Method::POST, "/playlistw", account, Some(token))
            .json(&payload)
            .send()
            .await
            .map_err(PanelError::from_transport)?;
        let body = Self::expect_ok(response).await?;

        body["id"]
            .as_i64()
            .map(EntryId::Numeric)
            .or_else(|| body["id"].as_str().map(EntryId::text))
            .or_else(|| body["data"]["id"].as_i64().map(EntryId::Numeric))
            .ok_or_else(|| {
                PanelError::MalformedResponse("add response carried no entry id".into())
            })
    }

    async fn edit_entry(
        &self,
        account: &Account,
        artifact: &AuthArtifact,
        id: &EntryId,
        draft: &EntryDraft,
    ) -> Result<(), PanelError> {
        let token = Self::bearer(artifact)?;
        let payload = Self::mutation_payload(account, Some(id), draft);
        let response = self
            .request(Method::POST, "/playlistw", account, Some(token))
            .json(&payload)
            .send()
            .await
            .map_err(PanelError::from_transport)?;
        Self::expect_ok(response).await?;
        Ok(())
    }

    async fn delete_entry(
        &self,
        account: &Account,
        artifact: &AuthArtifact,
        id: &EntryId,
    ) -> Result<(), PanelError> {
        let token = Self::bearer(artifact)?;
        let payload = json!({
            "mac_address": account.mac_address,
            "playlist_id": match id {
                EntryId::Numeric(n) => json!(n),
                EntryId::Text(s) => json!(s),
            },
        });
        let response = self
            .request(Method::DELETE, "/playlistw", account, Some(token))
            .json(&payload)
            .send()
            .await
            .map_err(PanelError::from_transport)?;
        Self::expect_ok(response).await?;
        Ok(())
    }
}
