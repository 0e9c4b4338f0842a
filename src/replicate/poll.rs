use std::time::Duration;

use tracing::{debug, info, warn};

use super::{Prediction, PredictionStatus, ProviderError, VideoProvider};
use crate::config::ReplicateConfig;

/// Fixed-interval polling bounds. No backoff.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl From<&ReplicateConfig> for PollPolicy {
    fn from(cfg: &ReplicateConfig) -> Self {
        Self {
            interval: cfg.poll_interval(),
            max_attempts: cfg.max_poll_attempts,
        }
    }
}

/// Resolve a freshly created prediction to its media URL.
///
/// A prediction that already succeeded is returned directly. Otherwise the
/// status endpoint is polled up to `max_attempts` times, sleeping before each
/// check. Failed status checks are logged and count as an attempt.
pub async fn wait_for_output(
    provider: &dyn VideoProvider,
    api_key: &str,
    first: &Prediction,
    policy: PollPolicy,
) -> Result<String, ProviderError> {
    if first.status == PredictionStatus::Succeeded {
        if let Some(url) = first.output_url() {
            return Ok(url);
        }
    }
    if first.status.is_terminal_failure() {
        return Err(ProviderError::Failed(first.error_text()));
    }
    let id = first.id.as_deref().ok_or(ProviderError::MissingId)?;

    for attempt in 1..=policy.max_attempts {
        tokio::time::sleep(policy.interval).await;

        let current = match provider.get_prediction(api_key, id).await {
            Ok(p) => p,
            Err(e) => {
                warn!(prediction_id = %id, attempt, error = %e, "status check failed");
                continue;
            }
        };
        debug!(prediction_id = %id, attempt, status = ?current.status, "polled prediction");

        match current.status {
            PredictionStatus::Succeeded => {
                if let Some(url) = current.output_url() {
                    info!(prediction_id = %id, attempt, "prediction succeeded");
                    return Ok(url);
                }
            }
            s if s.is_terminal_failure() => {
                return Err(ProviderError::Failed(current.error_text()));
            }
            _ => {}
        }
    }

    Err(ProviderError::TimedOut {
        attempts: policy.max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replicate::fake::{prediction, ScriptedProvider};
    use serde_json::json;

    fn policy(max_attempts: u32) -> PollPolicy {
        PollPolicy {
            interval: Duration::ZERO,
            max_attempts,
        }
    }

    #[tokio::test]
    async fn immediate_success_skips_polling() {
        let provider = ScriptedProvider::default();
        let first = prediction(PredictionStatus::Succeeded, Some(json!(["https://cdn/v.mp4"])));
        let url = wait_for_output(&provider, "key", &first, policy(3)).await.unwrap();
        assert_eq!(url, "https://cdn/v.mp4");
        assert_eq!(provider.polls_made(), 0);
    }

    #[tokio::test]
    async fn polls_until_succeeded() {
        let provider = ScriptedProvider::new(
            Ok(prediction(PredictionStatus::Starting, None)),
            vec![
                Ok(prediction(PredictionStatus::Processing, None)),
                Ok(prediction(PredictionStatus::Processing, None)),
                Ok(prediction(PredictionStatus::Succeeded, Some(json!("https://cdn/x.mp4")))),
            ],
        );
        let first = prediction(PredictionStatus::Starting, None);
        let url = wait_for_output(&provider, "key", &first, policy(10)).await.unwrap();
        assert_eq!(url, "https://cdn/x.mp4");
        assert_eq!(provider.polls_made(), 3);
    }

    #[tokio::test]
    async fn failed_prediction_stops_polling() {
        let mut failed = prediction(PredictionStatus::Failed, None);
        failed.error = Some(json!("content policy"));
        let provider = ScriptedProvider::new(
            Ok(prediction(PredictionStatus::Starting, None)),
            vec![Ok(prediction(PredictionStatus::Processing, None)), Ok(failed)],
        );
        let first = prediction(PredictionStatus::Starting, None);
        let err = wait_for_output(&provider, "key", &first, policy(10)).await.unwrap_err();
        assert!(matches!(err, ProviderError::Failed(ref m) if m == "content policy"));
        assert_eq!(provider.polls_made(), 2);
    }

    #[tokio::test]
    async fn exhausting_attempts_times_out() {
        let provider = ScriptedProvider::default();
        let first = prediction(PredictionStatus::Starting, None);
        let err = wait_for_output(&provider, "key", &first, policy(4)).await.unwrap_err();
        assert!(matches!(err, ProviderError::TimedOut { attempts: 4 }));
        assert_eq!(provider.polls_made(), 4);
    }

    #[tokio::test]
    async fn poll_errors_count_as_attempts() {
        let provider = ScriptedProvider::new(
            Ok(prediction(PredictionStatus::Starting, None)),
            vec![
                Err(ProviderError::Rejected {
                    status: 500,
                    body: "oops".into(),
                }),
                Ok(prediction(PredictionStatus::Succeeded, Some(json!("https://cdn/y.mp4")))),
            ],
        );
        let first = prediction(PredictionStatus::Starting, None);
        let url = wait_for_output(&provider, "key", &first, policy(2)).await.unwrap();
        assert_eq!(url, "https://cdn/y.mp4");
    }

    #[tokio::test]
    async fn missing_id_is_an_error() {
        let provider = ScriptedProvider::default();
        let mut first = prediction(PredictionStatus::Starting, None);
        first.id = None;
        let err = wait_for_output(&provider, "key", &first, policy(2)).await.unwrap_err();
        assert!(matches!(err, ProviderError::MissingId));
    }
}
