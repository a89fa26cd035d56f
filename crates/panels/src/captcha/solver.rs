//! Paid captcha-solving boundary (phase 2).
//!
//! The service is asynchronous: an image submit returns a job id, and
//! results are polled until ready. "Not ready" is a poll-again signal, not a
//! failure.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::debug;

use crate::config::SolverConfig;
use crate::error::PanelError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveStatus {
    Ready(String),
    NotReady,
}

#[async_trait]
pub trait CaptchaSolver: Send + Sync {
    async fn submit(&self, image: &[u8]) -> Result<String, PanelError>;
    async fn poll(&self, job_id: &str) -> Result<SolveStatus, PanelError>;
}

/// Drive a submit + poll cycle to completion under the configured budget.
pub async fn solve_with_polling(
    solver: &dyn CaptchaSolver,
    config: &SolverConfig,
    image: &[u8],
) -> Result<String, PanelError> {
    let job_id = solver.submit(image).await?;
    debug!(%job_id, "Captcha submitted to paid solver");

    for _ in 0..config.max_polls {
        sleep(config.poll_interval()).await;
        match solver.poll(&job_id).await? {
            SolveStatus::Ready(text) => return Ok(text),
            SolveStatus::NotReady => continue,
        }
    }
    Err(PanelError::Unavailable(format!(
        "paid solver timed out after {} polls",
        config.max_polls
    )))
}

#[derive(Debug, Deserialize)]
struct SolverResponse {
    status: u8,
    request: String,
}

const NOT_READY_MARKER: &str = "CAPCHA_NOT_READY";

/// HTTP client for the paid solving service.
pub struct SolverHttpClient {
    client: Client,
    submit_endpoint: String,
    result_endpoint: String,
    api_key: String,
}

impl SolverHttpClient {
    pub fn new(client: Client, config: &SolverConfig) -> Self {
        Self {
            client,
            submit_endpoint: config.submit_endpoint.clone(),
            result_endpoint: config.result_endpoint.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl CaptchaSolver for SolverHttpClient {
    async fn submit(&self, image: &[u8]) -> Result<String, PanelError> {
        let body = BASE64.encode(image);
        let form = [
            ("key", self.api_key.as_str()),
            ("method", "base64"),
            ("body", body.as_str()),
            // The codes are strictly two-digit numerics.
            ("numeric", "1"),
            ("min_len", "2"),
            ("max_len", "2"),
            ("json", "1"),
        ];

        let response = self
            .client
            .post(&self.submit_endpoint)
            .form(&form)
            .send()
            .await
            .map_err(PanelError::from_transport)?;
        let body: SolverResponse = response.json().await.map_err(PanelError::from_transport)?;

        if body.status != 1 {
            return Err(PanelError::Unavailable(format!(
                "solver rejected submission: {}",
                body.request
            )));
        }
        Ok(body.request)
    }

    async fn poll(&self, job_id: &str) -> Result<SolveStatus, PanelError> {
        let response = self
            .client
            .get(&self.result_endpoint)
            .query(&[
                ("key", self.api_key.as_str()),
                ("action", "get"),
                ("id", job_id),
                ("json", "1"),
            ])
            .send()
            .await
            .map_err(PanelError::from_transport)?;
        let body: SolverResponse = response.json().await.map_err(PanelError::from_transport)?;

        if body.status == 1 {
            return Ok(SolveStatus::Ready(body.request));
        }
        if body.request == NOT_READY_MARKER {
            return Ok(SolveStatus::NotReady);
        }
        Err(PanelError::Unavailable(format!(
            "solver failed job {job_id}: {}",
            body.request
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SolverConfig;
    use parking_lot::Mutex;

    struct ScriptedSolver {
        polls: Mutex<Vec<SolveStatus>>,
    }

    #[async_trait]
    impl CaptchaSolver for ScriptedSolver {
        async fn submit(&self, _image: &[u8]) -> Result<String, PanelError> {
            Ok("job-1".into())
        }

        async fn poll(&self, _job_id: &str) -> Result<SolveStatus, PanelError> {
            let mut polls = self.polls.lock();
            if polls.is_empty() {
                Ok(SolveStatus::NotReady)
            } else {
                Ok(polls.remove(0))
            }
        }
    }

    fn quick_config(max_polls: u32) -> SolverConfig {
        SolverConfig {
            poll_interval_secs: 0,
            max_polls,
            ..SolverConfig::default()
        }
    }

    #[tokio::test]
    async fn polls_until_ready() {
        let solver = ScriptedSolver {
            polls: Mutex::new(vec![
                SolveStatus::NotReady,
                SolveStatus::NotReady,
                SolveStatus::Ready("42".into()),
            ]),
        };
        let code = solve_with_polling(&solver, &quick_config(10), b"img")
            .await
            .unwrap();
        assert_eq!(code, "42");
    }

    #[tokio::test]
    async fn gives_up_after_poll_budget() {
        let solver = ScriptedSolver {
            polls: Mutex::new(vec![]),
        };
        let err = solve_with_polling(&solver, &quick_config(3), b"img")
            .await
            .unwrap_err();
        assert!(matches!(err, PanelError::Unavailable(_)));
    }
}
