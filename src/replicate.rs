use std::time::Duration;

use color_eyre::{Result, eyre::bail};
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::Value;
use tokio::time::sleep;

mod error;
pub use error::ReplicateError;

pub const API_BASE: &str = "https://api.replicate.com/v1";
pub const DEFAULT_MODEL: &str = "google/nano-banana-pro";
pub const FALLBACK_MODEL: &str = "black-forest-labs/flux-1.1-pro";

pub const DEFAULT_POLL_SECONDS: u64 = 3;
pub const POLL_SECONDS_VAR: &str = "HEADER_IMAGE_POLL_SECONDS";

#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    token: String,
}

/// One prediction as reported by the status endpoint. The status vocabulary
/// belongs to Replicate, so it stays an opaque string until [`classify`]
/// turns it into an outcome.
#[derive(Debug, Deserialize)]
pub struct Prediction {
    pub status: String,
    pub output: Option<Value>,
    pub error: Option<Value>,
}

/// Terminal result of a poll loop: exactly one success shape and one
/// failure shape, regardless of how many status strings the remote knows.
#[derive(Debug)]
pub enum Outcome {
    Succeeded(Prediction),
    Failed(String),
}

#[derive(Debug)]
enum PollState {
    Terminal(Outcome),
    Pending(String),
}

impl Client {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: token.into(),
        }
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Starts a prediction for `model` and returns its id.
    pub async fn submit(&self, model: &str, payload: &Value) -> Result<String> {
        let url = format!("{API_BASE}/models/{model}/predictions");
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(payload)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(ReplicateError::api(status, body).into());
        }
        debug!("Create response: {body}");

        let created: Value = serde_json::from_str(&body)?;
        match created["id"].as_str() {
            Some(id) if !id.is_empty() => Ok(id.to_string()),
            _ => Err(ReplicateError::missing_id(body).into()),
        }
    }

    pub async fn fetch(&self, id: &str) -> Result<Prediction> {
        let resp = self
            .http
            .get(format!("{API_BASE}/predictions/{id}"))
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(ReplicateError::api(status, body).into());
        }

        Ok(serde_json::from_str(&body)?)
    }

    /// Polls the prediction until it reaches a terminal state. There is no
    /// upper bound on attempts or elapsed time.
    pub async fn wait(&self, id: &str) -> Result<Prediction> {
        let interval = poll_interval();
        loop {
            match classify(self.fetch(id).await?) {
                PollState::Terminal(Outcome::Succeeded(prediction)) => return Ok(prediction),
                PollState::Terminal(Outcome::Failed(message)) => bail!(message),
                PollState::Pending(status) => {
                    info!(
                        "Image not ready yet (status={status}). Checking again in {}s...",
                        interval.as_secs()
                    );
                    sleep(interval).await;
                }
            }
        }
    }
}

fn classify(prediction: Prediction) -> PollState {
    match prediction.status.as_str() {
        "succeeded" => PollState::Terminal(Outcome::Succeeded(prediction)),
        "failed" | "canceled" => {
            let message = prediction
                .error
                .as_ref()
                .and_then(error_text)
                .unwrap_or_else(|| "Prediction did not succeed.".to_string());
            PollState::Terminal(Outcome::Failed(format!(
                "Prediction {}: {message}",
                prediction.status
            )))
        }
        other => PollState::Pending(other.to_string()),
    }
}

fn error_text(error: &Value) -> Option<String> {
    match error {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

pub fn poll_interval() -> Duration {
    let raw = std::env::var(POLL_SECONDS_VAR).ok();
    Duration::from_secs(poll_seconds(raw.as_deref()))
}

fn poll_seconds(raw: Option<&str>) -> u64 {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return DEFAULT_POLL_SECONDS;
    };
    match raw.parse::<u64>() {
        Ok(value) if value >= 1 => value,
        Ok(_) => {
            warn!("{POLL_SECONDS_VAR} must be >= 1 (using {DEFAULT_POLL_SECONDS})");
            DEFAULT_POLL_SECONDS
        }
        Err(_) => {
            warn!("Invalid {POLL_SECONDS_VAR}: {raw} (using {DEFAULT_POLL_SECONDS})");
            DEFAULT_POLL_SECONDS
        }
    }
}
