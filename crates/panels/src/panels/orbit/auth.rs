//! Orbit login: captcha-gated, two solving phases.
//!
//! Captcha tokens are single-use and short-lived, so every attempt fetches a
//! fresh challenge. Phase 1 burns the free OCR budget; phase 2 falls back to
//! the paid solver. A "device information is incorrect" response is a
//! credentials problem and aborts both phases immediately.

use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::captcha::{CaptchaOcr, CaptchaSolver, numeric_code, solve_with_polling};
use crate::config::{OrbitConfig, SolverConfig};
use crate::error::PanelError;
use crate::retry::RetryPolicy;

/// A fresh captcha challenge: the image to solve plus its one-shot token.
#[derive(Debug, Clone)]
pub struct CaptchaChallenge {
    pub image: Vec<u8>,
    pub token: String,
}

/// Session material captured from a successful login response.
#[derive(Debug, Clone)]
pub struct OrbitSession {
    pub cookies: Vec<String>,
    pub device_id: Option<String>,
}

/// One round of the panel's login exchange.
///
/// The HTTP implementation lives in the adapter; tests drive the phase
/// ladder with scripted gates and zero delays.
#[async_trait]
pub trait CaptchaGate: Send + Sync {
    async fn fetch_captcha(&self) -> Result<CaptchaChallenge, PanelError>;

    /// Submit a solved code. `TransientAuth` means the captcha was rejected
    /// (retry with a fresh challenge); `InvalidCredentials` is fatal.
    async fn submit(&self, code: &str, token: &str) -> Result<OrbitSession, PanelError>;
}

/// Run the two-phase login ladder to completion.
///
/// Both phases are bounded [`RetryPolicy`] runs: transient failures (captcha
/// rejected, unreadable OCR, solver hiccups) consume attempts, a fatal
/// credentials rejection aborts everything at once.
pub async fn login_with_captcha(
    gate: &dyn CaptchaGate,
    ocr: &dyn CaptchaOcr,
    solver: &dyn CaptchaSolver,
    solver_config: &SolverConfig,
    config: &OrbitConfig,
) -> Result<OrbitSession, PanelError> {
    // Phase 1: free OCR reads. Each attempt uses a fresh single-use token,
    // so failed attempts do not count against panel lockout.
    let phase1 = RetryPolicy::new(config.ocr_attempts, config.ocr_retry_delay());
    let phase1_failure = match phase1
        .run("orbit-login-ocr", move |attempt| attempt_once(gate, ocr, attempt))
        .await
    {
        Ok(session) => return Ok(session),
        Err(err) if err.is_fatal() => return Err(err),
        Err(err) => err,
    };

    warn!(
        attempts = config.ocr_attempts,
        error = %phase1_failure,
        "Free OCR budget exhausted, switching to paid solver"
    );

    // Phase 2: paid solver, its own poll-until-ready cycle per attempt.
    let phase2 = RetryPolicy::new(config.paid_attempts, Duration::ZERO);
    match phase2
        .run("orbit-login-paid", move |_| {
            paid_attempt_once(gate, solver, solver_config)
        })
        .await
    {
        Ok(session) => Ok(session),
        Err(err) if err.is_fatal() => Err(err),
        Err(err) => Err(PanelError::CaptchaUnsolved(format!(
            "both solving phases exhausted ({} OCR + {} paid attempts); last failure: {err}",
            config.ocr_attempts, config.paid_attempts
        ))),
    }
}

async fn attempt_once(
    gate: &dyn CaptchaGate,
    ocr: &dyn CaptchaOcr,
    attempt: u32,
) -> Result<OrbitSession, PanelError> {
    let challenge = gate.fetch_captcha().await?;
    let text = ocr.extract_text(&challenge.image).await?;
    let code = numeric_code(&text).ok_or_else(|| {
        PanelError::TransientAuth(format!(
            "OCR produced no usable numeric code on attempt {attempt}"
        ))
    })?;
    gate.submit(&code, &challenge.token).await
}

async fn paid_attempt_once(
    gate: &dyn CaptchaGate,
    solver: &dyn CaptchaSolver,
    solver_config: &SolverConfig,
) -> Result<OrbitSession, PanelError> {
    let challenge = gate.fetch_captcha().await?;
    let solved = solve_with_polling(solver, solver_config, &challenge.image).await?;
    let code = solved.trim();
    if code.is_empty() {
        return Err(PanelError::TransientAuth("paid solver returned empty code".into()));
    }
    gate.submit(code, &challenge.token).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::captcha::SolveStatus;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct ScriptedGate {
        /// Outcomes popped per submit; empty means captcha-rejected forever.
        outcomes: Mutex<Vec<Result<OrbitSession, PanelError>>>,
        fetches: AtomicU32,
        submits: AtomicU32,
    }

    impl ScriptedGate {
        fn rejecting() -> Self {
            Self {
                outcomes: Mutex::new(vec![]),
                fetches: AtomicU32::new(0),
                submits: AtomicU32::new(0),
            }
        }

        fn with_outcomes(outcomes: Vec<Result<OrbitSession, PanelError>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes),
                fetches: AtomicU32::new(0),
                submits: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl CaptchaGate for ScriptedGate {
        async fn fetch_captcha(&self) -> Result<CaptchaChallenge, PanelError> {
            let n = self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(CaptchaChallenge {
                image: b"svg".to_vec(),
                token: format!("token-{n}"),
            })
        }

        async fn submit(&self, _code: &str, _token: &str) -> Result<OrbitSession, PanelError> {
            self.submits.fetch_add(1, Ordering::SeqCst);
            let mut outcomes = self.outcomes.lock();
            if outcomes.is_empty() {
                Err(PanelError::TransientAuth("Captcha is incorrect or expired".into()))
            } else {
                outcomes.remove(0)
            }
        }
    }

    struct FixedOcr(&'static str);

    #[async_trait]
    impl CaptchaOcr for FixedOcr {
        async fn extract_text(&self, _image: &[u8]) -> Result<String, PanelError> {
            Ok(self.0.to_string())
        }
    }

    struct ReadySolver;

    #[async_trait]
    impl CaptchaSolver for ReadySolver {
        async fn submit(&self, _image: &[u8]) -> Result<String, PanelError> {
            Ok("job".into())
        }

        async fn poll(&self, _job_id: &str) -> Result<SolveStatus, PanelError> {
            Ok(SolveStatus::Ready("77".into()))
        }
    }

    fn quick_configs() -> (OrbitConfig, SolverConfig) {
        (
            OrbitConfig {
                ocr_attempts: 10,
                ocr_retry_delay_ms: 0,
                paid_attempts: 3,
                ..OrbitConfig::default()
            },
            SolverConfig {
                poll_interval_secs: 0,
                max_polls: 3,
                ..SolverConfig::default()
            },
        )
    }

    #[tokio::test]
    async fn phase1_success_never_reaches_paid_solver() {
        let gate = ScriptedGate::with_outcomes(vec![Ok(OrbitSession {
            cookies: vec!["sid=1".into()],
            device_id: None,
        })]);
        let (orbit, solver_cfg) = quick_configs();
        let session = login_with_captcha(&gate, &FixedOcr("42"), &ReadySolver, &solver_cfg, &orbit)
            .await
            .unwrap();
        assert_eq!(session.cookies, vec!["sid=1".to_string()]);
        assert_eq!(gate.submits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_phases_escalate_as_captcha_unsolved() {
        let gate = ScriptedGate::rejecting();
        let (orbit, solver_cfg) = quick_configs();
        let err = login_with_captcha(&gate, &FixedOcr("42"), &ReadySolver, &solver_cfg, &orbit)
            .await
            .unwrap_err();
        assert!(matches!(err, PanelError::CaptchaUnsolved(_)));
        assert!(!err.is_fatal());
        // 10 OCR submits + 3 paid submits, each with its own fresh captcha.
        assert_eq!(gate.submits.load(Ordering::SeqCst), 13);
        assert_eq!(gate.fetches.load(Ordering::SeqCst), 13);
    }

    #[tokio::test]
    async fn device_rejection_aborts_both_phases() {
        let gate = ScriptedGate::with_outcomes(vec![
            Err(PanelError::TransientAuth("Captcha is incorrect or expired".into())),
            Err(PanelError::InvalidCredentials("device information is incorrect".into())),
        ]);
        let (orbit, solver_cfg) = quick_configs();
        let err = login_with_captcha(&gate, &FixedOcr("42"), &ReadySolver, &solver_cfg, &orbit)
            .await
            .unwrap_err();
        assert!(matches!(err, PanelError::InvalidCredentials(_)));
        assert_eq!(gate.submits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unreadable_ocr_falls_through_to_paid_phase() {
        let gate = ScriptedGate::with_outcomes(vec![Ok(OrbitSession {
            cookies: vec!["sid=2".into()],
            device_id: Some("d1".into()),
        })]);
        let (orbit, solver_cfg) = quick_configs();
        // OCR never yields digits, so the only submit comes from the solver.
        let session = login_with_captcha(&gate, &FixedOcr("???"), &ReadySolver, &solver_cfg, &orbit)
            .await
            .unwrap();
        assert_eq!(session.device_id.as_deref(), Some("d1"));
        assert_eq!(gate.submits.load(Ordering::SeqCst), 1);
        // 10 fetches wasted on phase 1, one used by the paid phase.
        assert_eq!(gate.fetches.load(Ordering::SeqCst), 11);
    }
}
