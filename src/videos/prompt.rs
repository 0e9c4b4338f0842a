use base64::{engine::general_purpose::STANDARD, Engine as _};

use super::params::{GenerationParams, Mode};
use crate::replicate::PredictionInput;
use crate::storage::UploadedImage;

/// Prompt sent to the model: the user's text wrapped with the chosen
/// duration, framing, quality and style.
pub fn enhanced_prompt(p: &GenerationParams) -> String {
    match p.mode {
        Mode::TextToVideo => format!(
            "Create a {}-second video in {} aspect ratio with {} quality in a {} style: {}",
            p.duration, p.aspect_ratio, p.quality, p.style, p.prompt
        ),
        Mode::ImageToVideo => format!(
            "Transform this image into a {}-second video in {} aspect ratio with {} quality \
             in a {} style. Animation description: {}",
            p.duration, p.aspect_ratio, p.quality, p.style, p.prompt
        ),
    }
}

pub fn data_url(image: &UploadedImage) -> String {
    format!("data:{};base64,{}", image.content_type, STANDARD.encode(&image.body))
}

pub fn prediction_input(p: &GenerationParams, image: Option<&UploadedImage>) -> PredictionInput {
    let image = match p.mode {
        Mode::ImageToVideo => image.map(data_url),
        Mode::TextToVideo => None,
    };
    PredictionInput {
        prompt: enhanced_prompt(p),
        image,
        duration: p.duration,
        aspect_ratio: p.aspect_ratio.provider_value(),
        quality: p.quality.as_str().to_lowercase(),
    }
}
