use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use super::params::GenerationParams;
use super::prompt::prediction_input;
use super::repo;
use super::repo_types::GeneratedVideo;
use crate::error::ApiError;
use crate::replicate::{wait_for_output, PollPolicy, ProviderError};
use crate::state::AppState;
use crate::storage::{source_image_key, UploadedImage};
use crate::subscriptions::{
    self,
    services::{check_plan_limits, generation_gate},
    GateBlock,
};

pub struct GenerationJob {
    pub params: GenerationParams,
    pub api_key: Option<String>,
    pub image: Option<UploadedImage>,
}

/// Run one generation end to end: quota check, slot reservation, provider
/// submit and bounded poll, then record the outcome. The reserved slot is
/// given back when the generation does not produce a video.
pub async fn generate(
    state: &AppState,
    user_id: Uuid,
    job: GenerationJob,
) -> Result<GeneratedVideo, ApiError> {
    let ledger = state.ledger.as_ref();
    let account = ledger
        .account(user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("User not found"))?;
    let sub = &account.subscription;

    let api_key = job.api_key.clone().or(account.api_key);
    if let Err(block) = generation_gate(sub, api_key.is_some(), OffsetDateTime::now_utc()) {
        warn!(%user_id, reason = ?block, "generation refused");
        return Err(match block {
            GateBlock::MissingApiKey => ApiError::bad_request(block.message()),
            _ => ApiError::forbidden(block.message()),
        });
    }
    let api_key = api_key.unwrap_or_default();
    check_plan_limits(
        subscriptions::plan(sub.plan),
        job.params.duration,
        job.params.quality,
    )
    .map_err(ApiError::Forbidden)?;

    if !ledger.reserve_slot(user_id).await? {
        warn!(%user_id, "quota used up by a concurrent generation");
        return Err(ApiError::forbidden(GateBlock::QuotaExhausted.message()));
    }

    let outcome = generate_reserved(state, user_id, &api_key, job).await;
    if outcome.is_err() {
        if let Err(e) = ledger.release_slot(user_id).await {
            warn!(%user_id, error = %e, "generation slot not released");
        }
    }
    outcome
}

async fn generate_reserved(
    state: &AppState,
    user_id: Uuid,
    api_key: &str,
    job: GenerationJob,
) -> Result<GeneratedVideo, ApiError> {
    let ledger = state.ledger.as_ref();
    let video = ledger
        .insert_generating(Uuid::new_v4(), user_id, &job.params)
        .await?;
    info!(video_id = %video.id, %user_id, mode = %job.params.mode, "generation started");

    if let Some(image) = &job.image {
        let key = source_image_key(user_id, video.id, image.ext());
        let stored = state
            .storage
            .put_object(&key, image.body.clone(), &image.content_type)
            .await;
        match stored {
            Ok(()) => ledger.set_source_image(video.id, &key).await?,
            Err(e) => warn!(video_id = %video.id, error = %e, "source image not stored"),
        }
    }

    let input = prediction_input(&job.params, job.image.as_ref());
    let url = match run_prediction(state, video.id, api_key, &input).await {
        Ok(url) => url,
        Err(e) => {
            warn!(video_id = %video.id, error = %e, "generation failed");
            ledger.mark_failed(video.id, &e.to_string()).await?;
            return Err(e.into());
        }
    };

    let video = ledger.mark_completed(video.id, &url).await?;
    info!(video_id = %video.id, %user_id, "generation completed");
    Ok(video)
}

async fn run_prediction(
    state: &AppState,
    video_id: Uuid,
    api_key: &str,
    input: &crate::replicate::PredictionInput,
) -> Result<String, ProviderError> {
    let first = state.provider.create_prediction(api_key, input).await?;
    if let Some(id) = first.id.as_deref() {
        if let Err(e) = state.ledger.set_prediction_id(video_id, id).await {
            warn!(%video_id, error = %e, "prediction id not recorded");
        }
    }
    let policy = PollPolicy::from(&state.config.replicate);
    wait_for_output(state.provider.as_ref(), api_key, &first, policy).await
}

/// Delete the caller's videos and their stored source images.
pub async fn delete_videos(state: &AppState, user_id: Uuid, ids: &[Uuid]) -> anyhow::Result<usize> {
    let keys = repo::delete_for_user(&state.db, user_id, ids).await?;
    for key in keys.iter().flatten() {
        if let Err(e) = state.storage.delete_object(key).await {
            warn!(%user_id, key = %key, error = %e, "source image not deleted");
        }
    }
    Ok(keys.len())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;
    use serde_json::json;

    use super::*;
    use crate::replicate::fake::{prediction, ScriptedProvider};
    use crate::replicate::PredictionStatus;
    use crate::videos::ledger::fake::MemoryLedger;
    use crate::videos::params::{AspectRatio, Mode, Quality, Style};
    use crate::videos::repo_types::VideoStatus;

    fn params(mode: Mode, duration: u32) -> GenerationParams {
        GenerationParams {
            prompt: "sunrise over Bromo".into(),
            duration,
            aspect_ratio: AspectRatio::Portrait,
            quality: Quality::Hd,
            style: Style::Cinematic,
            mode,
        }
    }

    fn job(mode: Mode, duration: u32) -> GenerationJob {
        GenerationJob {
            params: params(mode, duration),
            api_key: None,
            image: None,
        }
    }

    fn succeeding() -> ScriptedProvider {
        ScriptedProvider {
            create_default: Some(prediction(
                PredictionStatus::Succeeded,
                Some(json!("https://cdn/out.mp4")),
            )),
            ..Default::default()
        }
    }

    fn setup(
        provider: ScriptedProvider,
        used: i32,
    ) -> (AppState, Arc<ScriptedProvider>, Arc<MemoryLedger>, Uuid) {
        let user_id = Uuid::new_v4();
        let provider = Arc::new(provider);
        let ledger = Arc::new(MemoryLedger::with_trial_user(user_id, Some("r8_user"), used));
        let state = AppState::fake_with(provider.clone(), ledger.clone());
        (state, provider, ledger, user_id)
    }

    #[tokio::test]
    async fn success_consumes_one_slot() {
        let (state, provider, ledger, user_id) = setup(succeeding(), 0);

        let video = generate(&state, user_id, job(Mode::TextToVideo, 5)).await.unwrap();
        assert_eq!(video.status, VideoStatus::Completed);
        assert_eq!(video.url.as_deref(), Some("https://cdn/out.mp4"));
        assert_eq!(video.prediction_id.as_deref(), Some("pred-1"));
        assert_eq!(ledger.used(user_id), 1);

        let created = provider.created.lock().unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].0, "r8_user");
        assert_eq!(created[0].1.aspect_ratio, "9_16");
        assert_eq!(created[0].1.image, None);
    }

    #[tokio::test]
    async fn supplied_key_wins_over_stored_key() {
        let (state, provider, _, user_id) = setup(succeeding(), 0);
        let mut j = job(Mode::TextToVideo, 5);
        j.api_key = Some("r8_request".into());

        generate(&state, user_id, j).await.unwrap();
        assert_eq!(provider.created.lock().unwrap()[0].0, "r8_request");
    }

    #[tokio::test]
    async fn failed_prediction_records_error_and_refunds_slot() {
        let mut failed = prediction(PredictionStatus::Failed, None);
        failed.error = Some(json!("NSFW content detected"));
        let provider = ScriptedProvider::new(
            Ok(prediction(PredictionStatus::Starting, None)),
            vec![Ok(failed)],
        );
        let (state, _, ledger, user_id) = setup(provider, 1);

        let err = generate(&state, user_id, job(Mode::TextToVideo, 5)).await.unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_GATEWAY);

        let rows = ledger.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, VideoStatus::Failed);
        assert_eq!(
            rows[0].error.as_deref(),
            Some("prediction failed: NSFW content detected")
        );
        assert_eq!(ledger.used(user_id), 1);
    }

    #[tokio::test]
    async fn poll_timeout_refunds_slot() {
        let (state, provider, ledger, user_id) = setup(ScriptedProvider::default(), 0);

        let err = generate(&state, user_id, job(Mode::TextToVideo, 5)).await.unwrap_err();
        assert!(matches!(err, ApiError::Timeout(_)));
        assert_eq!(provider.polls_made(), 3);
        assert_eq!(ledger.rows()[0].status, VideoStatus::Failed);
        assert_eq!(ledger.used(user_id), 0);
    }

    #[tokio::test]
    async fn image_to_video_sends_upload_as_data_url() {
        let (state, provider, ledger, user_id) = setup(succeeding(), 0);
        let mut j = job(Mode::ImageToVideo, 5);
        j.image = Some(UploadedImage {
            body: Bytes::from_static(b"png-bytes"),
            content_type: "image/png".into(),
        });

        let video = generate(&state, user_id, j).await.unwrap();

        let created = provider.created.lock().unwrap();
        assert_eq!(
            created[0].1.image.as_deref(),
            Some("data:image/png;base64,cG5nLWJ5dGVz")
        );
        assert!(created[0].1.prompt.starts_with("Transform this image"));
        let stored = ledger.rows()[0].source_image_key.clone().unwrap();
        assert_eq!(stored, source_image_key(user_id, video.id, "png"));
    }

    #[tokio::test]
    async fn free_plan_limits_are_forbidden_before_submitting() {
        let (state, provider, ledger, user_id) = setup(succeeding(), 0);

        let err = generate(&state, user_id, job(Mode::TextToVideo, 8)).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(ref m) if m.contains("up to 5 seconds")));

        let mut uhd = job(Mode::TextToVideo, 5);
        uhd.params.quality = Quality::Uhd4k;
        let err = generate(&state, user_id, uhd).await.unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::FORBIDDEN);

        assert!(provider.created.lock().unwrap().is_empty());
        assert!(ledger.rows().is_empty());
        assert_eq!(ledger.used(user_id), 0);
    }

    #[tokio::test]
    async fn missing_key_is_bad_request() {
        let user_id = Uuid::new_v4();
        let ledger = Arc::new(MemoryLedger::with_trial_user(user_id, None, 0));
        let state = AppState::fake_with(Arc::new(succeeding()), ledger.clone());

        let err = generate(&state, user_id, job(Mode::TextToVideo, 5)).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
        assert_eq!(ledger.used(user_id), 0);
    }

    #[tokio::test]
    async fn last_slot_goes_to_exactly_one_concurrent_request() {
        let (state, _, ledger, user_id) = setup(succeeding(), 2);

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..5 {
            let state = state.clone();
            tasks.spawn(async move { generate(&state, user_id, job(Mode::TextToVideo, 5)).await });
        }
        let mut succeeded = 0;
        let mut forbidden = 0;
        while let Some(res) = tasks.join_next().await {
            match res.unwrap() {
                Ok(_) => succeeded += 1,
                Err(ApiError::Forbidden(_)) => forbidden += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!((succeeded, forbidden), (1, 4));
        assert_eq!(ledger.used(user_id), 3);
        assert_eq!(ledger.rows().len(), 1);
    }
}
