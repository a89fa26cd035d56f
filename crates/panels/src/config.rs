//! Panel and solver configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for every panel adapter plus the captcha services.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelsConfig {
    pub orbit: OrbitConfig,
    pub astra: AstraConfig,
    pub vela: VelaConfig,
    pub ocr: OcrConfig,
    pub solver: SolverConfig,
}

/// Orbit: captcha-gated panel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitConfig {
    /// Fallback base domain when an account has no domain of its own; the
    /// compacted MAC is prefixed as a subdomain.
    pub base_domain: String,
    /// Phase 1 budget: free OCR attempts, each against a fresh captcha.
    pub ocr_attempts: u32,
    /// Fixed delay between phase 1 attempts, milliseconds.
    pub ocr_retry_delay_ms: u64,
    /// Phase 2 budget: paid solver attempts.
    pub paid_attempts: u32,
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            base_domain: "orbitview.net".into(),
            ocr_attempts: 10,
            ocr_retry_delay_ms: 500,
            paid_attempts: 3,
        }
    }
}

/// Astra: derived-token panel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AstraConfig {
    /// API host, no scheme.
    pub api_base: String,
    /// Origin/Referer the panel expects alongside the token family.
    pub web_origin: String,
}

impl Default for AstraConfig {
    fn default() -> Self {
        Self {
            api_base: "api.astraview.app".into(),
            web_origin: "https://astraview.app".into(),
        }
    }
}

/// Vela: relay-proxied panel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VelaConfig {
    /// Panel domain, no scheme.
    pub domain: String,
    /// HTTP-forwarding relay endpoint; all Vela traffic goes through it.
    pub relay_url: String,
    /// Per-request relay timeout, seconds.
    pub relay_timeout_secs: u64,
}

impl Default for VelaConfig {
    fn default() -> Self {
        Self {
            domain: "velaplayer.org".into(),
            relay_url: String::new(),
            relay_timeout_secs: 10,
        }
    }
}

/// Free OCR service (phase 1 captcha reads).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub endpoint: String,
    pub api_key: String,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.ocr.space/parse/image".into(),
            api_key: String::new(),
        }
    }
}

/// Paid captcha-solving service (phase 2).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub submit_endpoint: String,
    pub result_endpoint: String,
    pub api_key: String,
    /// Poll interval while a job is pending, seconds.
    pub poll_interval_secs: u64,
    /// Give up on a submitted job after this many polls.
    pub max_polls: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            submit_endpoint: "https://solver.example.com/in.php".into(),
            result_endpoint: "https://solver.example.com/res.php".into(),
            api_key: String::new(),
            poll_interval_secs: 3,
            max_polls: 30,
        }
    }
}

impl OrbitConfig {
    #[inline]
    pub fn ocr_retry_delay(&self) -> Duration {
        Duration::from_millis(self.ocr_retry_delay_ms)
    }
}

impl SolverConfig {
    #[inline]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl VelaConfig {
    #[inline]
    pub fn relay_timeout(&self) -> Duration {
        Duration::from_secs(self.relay_timeout_secs)
    }
}
