use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use super::params::{AspectRatio, GenerationParams, Mode, Quality, Style};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum VideoStatus {
    Generating,
    Completed,
    Failed,
}

#[derive(Debug, Clone, FromRow)]
pub struct GeneratedVideo {
    pub id: Uuid,
    pub user_id: Uuid,
    pub prompt: String,
    pub duration: i32,
    pub aspect_ratio: AspectRatio,
    pub quality: Quality,
    pub style: Style,
    pub mode: Mode,
    pub source_image_key: Option<String>,
    pub prediction_id: Option<String>,
    pub url: Option<String>,
    pub status: VideoStatus,
    pub error: Option<String>,
    pub created_at: OffsetDateTime,
    pub completed_at: Option<OffsetDateTime>,
}

impl GeneratedVideo {
    pub fn params(&self) -> GenerationParams {
        GenerationParams {
            prompt: self.prompt.clone(),
            duration: self.duration.max(0) as u32,
            aspect_ratio: self.aspect_ratio,
            quality: self.quality,
            style: self.style,
            mode: self.mode,
        }
    }
}
