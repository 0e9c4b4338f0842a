//! Client side of the hosted VEO-3 model on Replicate.
//!
//! Handlers talk to [`VideoProvider`] only, so the HTTP client can be swapped
//! for a scripted fake in tests.

mod client;
mod poll;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use client::ReplicateClient;
pub use poll::{wait_for_output, PollPolicy};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider rejected request with status {status}")]
    Rejected { status: u16, body: String },
    #[error("prediction failed: {0}")]
    Failed(String),
    #[error("prediction did not finish after {attempts} status checks")]
    TimedOut { attempts: u32 },
    #[error("prediction response carried no id")]
    MissingId,
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
}

impl PredictionStatus {
    pub fn is_terminal_failure(self) -> bool {
        matches!(self, Self::Failed | Self::Canceled)
    }
}

/// Body of `input` sent to the predictions endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionInput {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub duration: u32,
    pub aspect_ratio: String,
    pub quality: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Prediction {
    #[serde(default)]
    pub id: Option<String>,
    pub status: PredictionStatus,
    #[serde(default)]
    pub output: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

impl Prediction {
    /// Media URL of a finished prediction: the output string, or the first
    /// element when the model returns a list.
    pub fn output_url(&self) -> Option<String> {
        match self.output.as_ref()? {
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            serde_json::Value::Array(items) => items
                .first()
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            _ => None,
        }
    }

    pub fn error_text(&self) -> String {
        match &self.error {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) if !other.is_null() => other.to_string(),
            _ => "Video generation failed".into(),
        }
    }
}

#[async_trait]
pub trait VideoProvider: Send + Sync {
    async fn create_prediction(
        &self,
        api_key: &str,
        input: &PredictionInput,
    ) -> Result<Prediction, ProviderError>;

    async fn get_prediction(&self, api_key: &str, id: &str) -> Result<Prediction, ProviderError>;
}
