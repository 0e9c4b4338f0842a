use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, error};

use super::{Prediction, PredictionInput, ProviderError, VideoProvider};
use crate::config::ReplicateConfig;

#[derive(Serialize)]
struct CreateBody<'a> {
    input: &'a PredictionInput,
}

/// reqwest-backed Replicate predictions client. The API key is supplied per
/// call since every user brings their own.
#[derive(Clone)]
pub struct ReplicateClient {
    client: Client,
    base_url: String,
    model: String,
}

impl ReplicateClient {
    pub fn new(cfg: &ReplicateConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
        })
    }

    fn create_url(&self) -> String {
        format!("{}/models/{}/predictions", self.base_url, self.model)
    }

    fn prediction_url(&self, id: &str) -> String {
        format!("{}/predictions/{}", self.base_url, id)
    }

    async fn read_prediction(res: reqwest::Response) -> Result<Prediction, ProviderError> {
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            error!(status = status.as_u16(), body = %body, "replicate api error");
            return Err(ProviderError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(res.json::<Prediction>().await?)
    }
}

#[async_trait]
impl VideoProvider for ReplicateClient {
    async fn create_prediction(
        &self,
        api_key: &str,
        input: &PredictionInput,
    ) -> Result<Prediction, ProviderError> {
        let res = self
            .client
            .post(self.create_url())
            .bearer_auth(api_key)
            .json(&CreateBody { input })
            .send()
            .await?;
        let prediction = Self::read_prediction(res).await?;
        debug!(id = ?prediction.id, status = ?prediction.status, "prediction created");
        Ok(prediction)
    }

    async fn get_prediction(&self, api_key: &str, id: &str) -> Result<Prediction, ProviderError> {
        let res = self
            .client
            .get(self.prediction_url(id))
            .bearer_auth(api_key)
            .send()
            .await?;
        Self::read_prediction(res).await
    }
}
