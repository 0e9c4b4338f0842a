use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::params::GenerationParams;
use super::progress::{estimate, Progress};
use super::repo_types::{GeneratedVideo, VideoStatus};

#[derive(Debug, Serialize)]
pub struct GenerateVideoResponse {
    pub success: bool,
    pub url: String,
    pub message: &'static str,
    pub video_id: Uuid,
    pub parameters: GenerationParams,
}

#[derive(Debug, Serialize)]
pub struct VideoItem {
    pub id: Uuid,
    pub url: Option<String>,
    pub params: GenerationParams,
    pub status: VideoStatus,
    pub error: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
}

#[derive(Debug, Serialize)]
pub struct VideoDetails {
    #[serde(flatten)]
    pub video: VideoItem,
    pub has_source_image: bool,
    pub progress: Progress,
}

impl From<GeneratedVideo> for VideoItem {
    fn from(v: GeneratedVideo) -> Self {
        Self {
            id: v.id,
            params: v.params(),
            url: v.url,
            status: v.status,
            error: v.error,
            created_at: v.created_at,
            completed_at: v.completed_at,
        }
    }
}

impl VideoDetails {
    pub fn new(v: GeneratedVideo, now: OffsetDateTime) -> Self {
        let progress = estimate(v.status, v.created_at, v.completed_at, now);
        let has_source_image = v.source_image_key.is_some();
        Self {
            video: v.into(),
            has_source_image,
            progress,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

impl ListQuery {
    pub const MAX_LIMIT: i64 = 100;

    pub fn search(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }

    pub fn bounded(&self) -> (i64, i64) {
        (self.limit.clamp(1, Self::MAX_LIMIT), self.offset.max(0))
    }
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct BulkDeleteResponse {
    pub deleted: usize,
}
