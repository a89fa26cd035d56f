//! The panel capability interface and the closed adapter set.

use std::sync::Arc;

use async_trait::async_trait;
use panel_types::{Account, AuthArtifact, EntryDraft, EntryId, PanelKind, PlaylistEntry};
use reqwest::Client;

use crate::captcha::{CaptchaOcr, CaptchaSolver, OcrHttpClient, SolverHttpClient};
use crate::config::PanelsConfig;
use crate::error::PanelError;
use crate::panels::astra::AstraAdapter;
use crate::panels::orbit::OrbitAdapter;
use crate::panels::vela::{RelayClient, RelayTransport, VelaAdapter};

/// Operations every panel supports, polymorphic over panel kind.
///
/// `authenticate` owns the variant-specific retry budget; callers never
/// retry it. `probe` is the lightweight liveness check the session cache
/// runs before reusing a cached artifact.
#[async_trait]
pub trait PanelAdapter: Send + Sync {
    fn kind(&self) -> PanelKind;

    async fn authenticate(&self, account: &Account) -> Result<AuthArtifact, PanelError>;

    /// `Ok(false)` means the artifact is no longer accepted; errors mean the
    /// probe itself could not run.
    async fn probe(&self, account: &Account, artifact: &AuthArtifact)
    -> Result<bool, PanelError>;

    async fn list_entries(
        &self,
        account: &Account,
        artifact: &AuthArtifact,
    ) -> Result<Vec<PlaylistEntry>, PanelError>;

    async fn add_entry(
        &self,
        account: &Account,
        artifact: &AuthArtifact,
        draft: &EntryDraft,
    ) -> Result<EntryId, PanelError>;

    async fn edit_entry(
        &self,
        account: &Account,
        artifact: &AuthArtifact,
        id: &EntryId,
        draft: &EntryDraft,
    ) -> Result<(), PanelError>;

    async fn delete_entry(
        &self,
        account: &Account,
        artifact: &AuthArtifact,
        id: &EntryId,
    ) -> Result<(), PanelError>;
}

/// Shared, pre-built adapter per panel kind.
///
/// The set is closed on purpose: the panels are a fixed population with
/// bespoke protocols, so there is no open registration surface.
pub struct AdapterSet {
    orbit: Arc<dyn PanelAdapter>,
    astra: Arc<dyn PanelAdapter>,
    vela: Arc<dyn PanelAdapter>,
}

impl AdapterSet {
    pub fn new(client: Client, config: &PanelsConfig) -> Self {
        let ocr: Arc<dyn CaptchaOcr> = Arc::new(OcrHttpClient::new(client.clone(), &config.ocr));
        let solver: Arc<dyn CaptchaSolver> =
            Arc::new(SolverHttpClient::new(client.clone(), &config.solver));
        let relay: Arc<dyn RelayTransport> =
            Arc::new(RelayClient::new(client.clone(), &config.vela));

        Self {
            orbit: Arc::new(OrbitAdapter::new(
                client.clone(),
                config.orbit.clone(),
                ocr,
                solver,
                config.solver.clone(),
            )),
            astra: Arc::new(AstraAdapter::new(client, config.astra.clone())),
            vela: Arc::new(VelaAdapter::new(relay, config.vela.clone())),
        }
    }

    pub fn adapter_for(&self, kind: PanelKind) -> Arc<dyn PanelAdapter> {
        match kind {
            PanelKind::Orbit => Arc::clone(&self.orbit),
            PanelKind::Astra => Arc::clone(&self.astra),
            PanelKind::Vela => Arc::clone(&self.vela),
        }
    }
}

/// Adapter lookup seam used by the migration runner; [`AdapterSet`] is the
/// production implementation, tests substitute fakes.
pub trait AdapterProvider: Send + Sync {
    fn adapter_for(&self, kind: PanelKind) -> Arc<dyn PanelAdapter>;
}

impl AdapterProvider for AdapterSet {
    fn adapter_for(&self, kind: PanelKind) -> Arc<dyn PanelAdapter> {
        AdapterSet::adapter_for(self, kind)
    }
}

/// Guard that the artifact handed to an adapter actually belongs to it.
pub(crate) fn expect_kind(artifact: &AuthArtifact, kind: PanelKind) -> Result<(), PanelError> {
    if artifact.kind() == kind {
        Ok(())
    } else {
        Err(PanelError::MalformedResponse(format!(
            "artifact of kind {} handed to {} adapter",
            artifact.kind(),
            kind
        )))
    }
}
