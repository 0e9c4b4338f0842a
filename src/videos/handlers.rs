use axum::{
    extract::{DefaultBodyLimit, FromRequest, Multipart, Path, Query, Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    routing::{get, post},
    Json, Router,
};
use anyhow::Context;
use time::OffsetDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::{
    BulkDeleteRequest, BulkDeleteResponse, GenerateVideoResponse, ListQuery, VideoDetails,
    VideoItem,
};
use super::params::GenerateVideoRequest;
use super::repo;
use super::services::{delete_videos, generate, GenerationJob};
use crate::{auth::AuthUser, error::ApiError, state::AppState, storage::UploadedImage};

pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
const MAX_BODY_BYTES: usize = 12 * 1024 * 1024;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/videos/generate",
            post(generate_video)
                .get(generate_wrong_method)
                .layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .route("/videos", get(list_videos))
        .route("/videos/bulk-delete", post(bulk_delete))
        .route("/videos/:id", get(get_video).delete(delete_video))
}

pub async fn generate_wrong_method() -> ApiError {
    ApiError::MethodNotAllowed("Method not allowed. Use POST to generate videos.".into())
}

fn bad_multipart(e: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::bad_request(format!("invalid multipart body: {}", e))
}

/// Reads the multipart form: text fields map onto the JSON request, `image`
/// is the optional source picture.
async fn read_multipart(
    mut mp: Multipart,
) -> Result<(GenerateVideoRequest, Option<UploadedImage>), ApiError> {
    let mut req = GenerateVideoRequest::default();
    let mut image = None;

    while let Some(field) = mp.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" {
            let content_type = field.content_type().unwrap_or_default().to_string();
            let body = field.bytes().await.map_err(bad_multipart)?;
            if body.is_empty() {
                continue;
            }
            if !content_type.starts_with("image/") {
                return Err(ApiError::bad_request("Please select a valid image file"));
            }
            if body.len() > MAX_IMAGE_BYTES {
                return Err(ApiError::PayloadTooLarge(
                    "File size must be less than 10MB".into(),
                ));
            }
            image = Some(UploadedImage { body, content_type });
            continue;
        }

        let value = field.text().await.map_err(bad_multipart)?;
        let invalid = |e: String| ApiError::bad_request(e);
        match name.as_str() {
            "prompt" => req.prompt = Some(value),
            "duration" => {
                req.duration = Some(
                    value
                        .trim()
                        .parse()
                        .map_err(|_| ApiError::bad_request("Duration must be a number"))?,
                )
            }
            "aspectRatio" => req.aspect_ratio = Some(value.parse().map_err(invalid)?),
            "quality" => req.quality = Some(value.parse().map_err(invalid)?),
            "style" => req.style = Some(value.parse().map_err(invalid)?),
            "mode" => req.mode = Some(value.parse().map_err(invalid)?),
            "apiKey" => req.api_key = Some(value),
            _ => {}
        }
    }
    Ok((req, image))
}

#[instrument(skip(state, request))]
pub async fn generate_video(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    request: Request,
) -> Result<Json<GenerateVideoResponse>, ApiError> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    let (req, image) = if is_multipart {
        let mp = Multipart::from_request(request, &state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        read_multipart(mp).await?
    } else {
        let Json(req) = Json::<GenerateVideoRequest>::from_request(request, &state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        (req, None)
    };

    let params = req
        .validate(image.is_some())
        .map_err(ApiError::BadRequest)?;
    let job = GenerationJob {
        params,
        api_key: req.supplied_api_key().map(str::to_string),
        image,
    };

    // Detached so a client disconnect does not abandon the poll or leave the
    // row stuck in `generating`.
    let task = tokio::spawn(async move { generate(&state, user_id, job).await });
    let video = task.await.context("generation task")??;
    Ok(Json(GenerateVideoResponse {
        success: true,
        url: video.url.clone().unwrap_or_default(),
        message: "Video generated successfully",
        video_id: video.id,
        parameters: video.params(),
    }))
}

#[instrument(skip(state))]
pub async fn list_videos(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<ListQuery>,
) -> Result<Json<Vec<VideoItem>>, ApiError> {
    let (limit, offset) = q.bounded();
    let rows = repo::list_by_user(&state.db, user_id, q.search(), limit, offset).await?;
    Ok(Json(rows.into_iter().map(VideoItem::from).collect()))
}

#[instrument(skip(state))]
pub async fn get_video(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<VideoDetails>, ApiError> {
    let video = repo::find_for_user(&state.db, user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;
    Ok(Json(VideoDetails::new(video, OffsetDateTime::now_utc())))
}

#[instrument(skip(state))]
pub async fn delete_video(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if delete_videos(&state, user_id, &[id]).await? == 0 {
        return Err(ApiError::not_found("Video not found"));
    }
    info!(%user_id, video_id = %id, "video deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, body))]
pub async fn bulk_delete(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<BulkDeleteRequest>,
) -> Result<Json<BulkDeleteResponse>, ApiError> {
    if body.ids.is_empty() {
        return Ok(Json(BulkDeleteResponse { deleted: 0 }));
    }
    let deleted = delete_videos(&state, user_id, &body.ids).await?;
    info!(%user_id, requested = body.ids.len(), deleted, "videos deleted");
    Ok(Json(BulkDeleteResponse { deleted }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::build_app;
    use crate::auth::JwtKeys;
    use axum::body::Body;
    use axum::extract::FromRef;
    use axum::http::Request as HttpRequest;
    use http_body_util::BodyExt;
    use serde_json::json;
    use tower::ServiceExt;

    fn bearer(state: &AppState) -> String {
        let token = JwtKeys::from_ref(state).sign_access(Uuid::new_v4()).unwrap();
        format!("Bearer {}", token)
    }

    async fn send(req: HttpRequest<Body>) -> (StatusCode, serde_json::Value) {
        let res = build_app(AppState::fake()).oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(json!({})))
    }

    #[tokio::test]
    async fn get_on_generate_is_method_not_allowed() {
        let (status, body) = send(
            HttpRequest::get("/api/v1/videos/generate")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body["error"], "Method not allowed. Use POST to generate videos.");
    }

    #[tokio::test]
    async fn generate_requires_auth() {
        let (status, _) = send(
            HttpRequest::post("/api/v1/videos/generate")
                .header("content-type", "application/json")
                .body(Body::from(json!({ "prompt": "x" }).to_string()))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn missing_prompt_is_bad_request() {
        let state = AppState::fake();
        let (status, body) = send(
            HttpRequest::post("/api/v1/videos/generate")
                .header("authorization", bearer(&state))
                .header("content-type", "application/json")
                .body(Body::from(json!({ "duration": 5 }).to_string()))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Prompt is required and must be a string");
    }

    fn multipart_body(boundary: &str, parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
        let mut out = Vec::new();
        for (name, content_type, data) in parts {
            out.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
            match content_type {
                Some(ct) => out.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"f\"\r\nContent-Type: {}\r\n\r\n",
                        name, ct
                    )
                    .as_bytes(),
                ),
                None => out.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                        .as_bytes(),
                ),
            }
            out.extend_from_slice(data);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
        out
    }

    async fn send_multipart(parts: &[(&str, Option<&str>, &[u8])]) -> (StatusCode, serde_json::Value) {
        let state = AppState::fake();
        let boundary = "veogen-test-boundary";
        send(
            HttpRequest::post("/api/v1/videos/generate")
                .header("authorization", bearer(&state))
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={}", boundary),
                )
                .body(Body::from(multipart_body(boundary, parts)))
                .unwrap(),
        )
        .await
    }

    #[tokio::test]
    async fn image_mode_without_image_is_bad_request() {
        let (status, body) = send_multipart(&[
            ("prompt", None, b"wave the flag"),
            ("mode", None, b"image-to-video"),
        ])
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "An image is required for image-to-video");
    }

    #[tokio::test]
    async fn non_image_upload_is_rejected() {
        let (status, body) = send_multipart(&[
            ("prompt", None, b"wave the flag"),
            ("mode", None, b"image-to-video"),
            ("image", Some("application/pdf"), b"%PDF-1.4"),
        ])
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Please select a valid image file");
    }

    #[tokio::test]
    async fn unknown_multipart_label_is_rejected() {
        let (status, body) = send_multipart(&[
            ("prompt", None, b"x"),
            ("quality", None, b"8K"),
        ])
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("8K"));
    }

    fn json_generate(state: &AppState, user_id: Uuid, body: serde_json::Value) -> HttpRequest<Body> {
        let token = JwtKeys::from_ref(state).sign_access(user_id).unwrap();
        HttpRequest::post("/api/v1/videos/generate")
            .header("authorization", format!("Bearer {}", token))
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn generate_returns_url_and_parameters() {
        use crate::replicate::fake::{prediction, ScriptedProvider};
        use crate::replicate::PredictionStatus;
        use crate::videos::ledger::fake::MemoryLedger;
        use std::sync::Arc;

        let user_id = Uuid::new_v4();
        let provider = Arc::new(ScriptedProvider::new(
            Ok(prediction(PredictionStatus::Starting, None)),
            vec![Ok(prediction(
                PredictionStatus::Succeeded,
                Some(json!(["https://cdn/a.mp4"])),
            ))],
        ));
        let ledger = Arc::new(MemoryLedger::with_trial_user(user_id, Some("r8_user"), 0));
        let state = AppState::fake_with(provider.clone(), ledger.clone());

        let req = json_generate(
            &state,
            user_id,
            json!({ "prompt": "kites at dusk", "aspectRatio": "1:1", "style": "animated" }),
        );
        let res = build_app(state).oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["url"], "https://cdn/a.mp4");
        assert_eq!(body["parameters"]["aspectRatio"], "1:1");
        assert_eq!(body["parameters"]["style"], "animated");
        assert_eq!(provider.created.lock().unwrap()[0].1.aspect_ratio, "1_1");
        assert_eq!(ledger.used(user_id), 1);
    }

    #[tokio::test]
    async fn generation_finishes_after_client_disconnects() {
        use crate::replicate::fake::{prediction, ScriptedProvider};
        use crate::replicate::PredictionStatus;
        use crate::videos::ledger::fake::MemoryLedger;
        use crate::videos::repo_types::VideoStatus;
        use std::sync::Arc;
        use std::time::Duration;

        let user_id = Uuid::new_v4();
        let provider = Arc::new(ScriptedProvider {
            polls: std::sync::Mutex::new(
                vec![Ok(prediction(
                    PredictionStatus::Succeeded,
                    Some(json!("https://cdn/late.mp4")),
                ))]
                .into(),
            ),
            poll_delay: Duration::from_millis(100),
            ..Default::default()
        });
        let ledger = Arc::new(MemoryLedger::with_trial_user(user_id, Some("r8_user"), 0));
        let state = AppState::fake_with(provider, ledger.clone());

        let req = json_generate(&state, user_id, json!({ "prompt": "slow render" }));
        let dropped =
            tokio::time::timeout(Duration::from_millis(20), build_app(state).oneshot(req)).await;
        assert!(dropped.is_err());

        tokio::time::sleep(Duration::from_millis(400)).await;
        let rows = ledger.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, VideoStatus::Completed);
        assert_eq!(rows[0].url.as_deref(), Some("https://cdn/late.mp4"));
        assert_eq!(ledger.used(user_id), 1);
    }
}
