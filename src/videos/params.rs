use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const DEFAULT_DURATION: u32 = 5;
pub const MAX_DURATION: u32 = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text")]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "16:9")]
    #[sqlx(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    #[sqlx(rename = "9:16")]
    Portrait,
    #[serde(rename = "1:1")]
    #[sqlx(rename = "1:1")]
    Square,
}

impl AspectRatio {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Landscape => "16:9",
            Self::Portrait => "9:16",
            Self::Square => "1:1",
        }
    }

    /// Form the provider expects, `16_9`.
    pub fn provider_value(self) -> String {
        self.as_str().replace(':', "_")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text")]
pub enum Quality {
    #[default]
    #[serde(rename = "HD")]
    #[sqlx(rename = "HD")]
    Hd,
    #[serde(rename = "4K")]
    #[sqlx(rename = "4K")]
    Uhd4k,
}

impl Quality {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hd => "HD",
            Self::Uhd4k => "4K",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum Style {
    #[default]
    Realistic,
    Cinematic,
    Animated,
    Artistic,
}

impl Style {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Realistic => "realistic",
            Self::Cinematic => "cinematic",
            Self::Animated => "animated",
            Self::Artistic => "artistic",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "kebab-case")]
#[sqlx(type_name = "text", rename_all = "kebab-case")]
pub enum Mode {
    #[default]
    TextToVideo,
    ImageToVideo,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TextToVideo => "text-to-video",
            Self::ImageToVideo => "image-to-video",
        }
    }
}

macro_rules! labelled {
    ($ty:ty, [$($variant:expr),+]) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.trim();
                [$($variant),+]
                    .into_iter()
                    .find(|v: &$ty| v.as_str().eq_ignore_ascii_case(s))
                    .ok_or_else(|| format!("invalid {} '{}'", stringify!($ty), s))
            }
        }
    };
}

labelled!(AspectRatio, [AspectRatio::Landscape, AspectRatio::Portrait, AspectRatio::Square]);
labelled!(Quality, [Quality::Hd, Quality::Uhd4k]);
labelled!(Style, [Style::Realistic, Style::Cinematic, Style::Animated, Style::Artistic]);
labelled!(Mode, [Mode::TextToVideo, Mode::ImageToVideo]);

/// Raw generation request as sent by the client, either as JSON or as
/// multipart text fields.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateVideoRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub aspect_ratio: Option<AspectRatio>,
    #[serde(default)]
    pub quality: Option<Quality>,
    #[serde(default)]
    pub style: Option<Style>,
    #[serde(default)]
    pub mode: Option<Mode>,
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Validated generation parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParams {
    pub prompt: String,
    pub duration: u32,
    pub aspect_ratio: AspectRatio,
    pub quality: Quality,
    pub style: Style,
    pub mode: Mode,
}

impl GenerateVideoRequest {
    pub fn validate(&self, has_image: bool) -> Result<GenerationParams, String> {
        let prompt = self.prompt.as_deref().map(str::trim).unwrap_or_default();
        if prompt.is_empty() {
            return Err("Prompt is required and must be a string".into());
        }
        let duration = self.duration.unwrap_or(DEFAULT_DURATION);
        if !(1..=MAX_DURATION).contains(&duration) {
            return Err(format!("Duration must be between 1 and {} seconds", MAX_DURATION));
        }
        let mode = self.mode.unwrap_or_default();
        if mode == Mode::ImageToVideo && !has_image {
            return Err("An image is required for image-to-video".into());
        }
        Ok(GenerationParams {
            prompt: prompt.to_string(),
            duration,
            aspect_ratio: self.aspect_ratio.unwrap_or_default(),
            quality: self.quality.unwrap_or_default(),
            style: self.style.unwrap_or_default(),
            mode,
        })
    }

    /// The caller-supplied key, if it is not blank.
    pub fn supplied_api_key(&self) -> Option<&str> {
        self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }
}
