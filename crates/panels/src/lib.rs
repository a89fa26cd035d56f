//! Panel adapters.
//!
//! One capability trait ([`adapter::PanelAdapter`]) over three closed panel
//! protocols: Orbit (captcha-gated cookie login), Astra (derived-token
//! headers), Vela (relay-proxied form login). The [`adapter::AdapterSet`]
//! hands out a shared adapter per [`panel_types::PanelKind`].

pub mod adapter;
pub mod captcha;
pub mod client;
pub mod config;
pub mod error;
pub mod panels;
pub mod retry;

pub use adapter::{AdapterProvider, AdapterSet, PanelAdapter};
pub use client::{PanelClient, default_client};
pub use config::PanelsConfig;
pub use error::PanelError;
pub use retry::RetryPolicy;
