use super::types::{ImagenParameters, PredictRequest, PredictResponse, PromptInstance};
use super::{decode_base64, ApiClient, MediaData};
use crate::core::{ErgonError, ImageEngine, ImageParams};

/// Imagen 4 text-to-image through the `:predict` endpoint
pub struct ImagenClient {
    api: ApiClient,
}

impl ImagenClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn generate(&self, prompt: &str, params: &ImageParams) -> Result<MediaData, ErgonError> {
        if params.engine.is_nano_banana() {
            return Err(ErgonError::invalid("image engine", params.engine.as_str(), "imagen4, imagen4-fast, imagen4-ultra"));
        }

        let request = build_request(prompt, params);
        let response: PredictResponse = self.api.call_model(params.engine.model_id(), "predict", &request).await?;
        extract_image(response, params)
    }
}

fn build_request(prompt: &str, params: &ImageParams) -> PredictRequest {
    let sample_image_size = match params.engine {
        ImageEngine::Imagen4 | ImageEngine::Imagen4Ultra => Some(params.size.imagen_sample_size().to_string()),
        _ => None,
    };

    PredictRequest {
        instances: vec![PromptInstance {
            prompt: prompt.to_string(),
            image: None,
        }],
        parameters: ImagenParameters {
            sample_count: 1,
            aspect_ratio: params.aspect_ratio.as_str().to_string(),
            output_mime_type: params.format.mime_type().to_string(),
            sample_image_size,
        },
    }
}

fn extract_image(response: PredictResponse, params: &ImageParams) -> Result<MediaData, ErgonError> {
    let prediction = response
        .predictions
        .into_iter()
        .next()
        .ok_or_else(|| ErgonError::GenerationFailed("No images in response (the prompt may have been filtered)".to_string()))?;

    if let Some(reason) = prediction.rai_filtered_reason {
        return Err(ErgonError::GenerationFailed(reason));
    }

    let data = prediction
        .bytes_base64_encoded
        .ok_or_else(|| ErgonError::InvalidResponse("Prediction has no image bytes".to_string()))?;

    Ok(MediaData {
        bytes: decode_base64(&data)?,
        mime_type: prediction.mime_type.unwrap_or_else(|| params.format.mime_type().to_string()),
    })
}
