use super::types::{ContentPart, GenerateRequest, GenerateResponse, GenerationConfig, ImageConfig, InlineData};
use super::{ApiClient, MediaData};
use crate::core::{AspectRatio, ErgonError, ImageEngine};

/// Gemini-native image generation and editing
pub struct NanoBananaClient {
    api: ApiClient,
    engine: ImageEngine,
}

impl NanoBananaClient {
    pub fn new(api: ApiClient, engine: ImageEngine) -> Result<Self, ErgonError> {
        if !engine.is_nano_banana() {
            return Err(ErgonError::invalid("image engine", engine.as_str(), "nano-banana, nano-banana-pro"));
        }
        Ok(Self { api, engine })
    }

    pub async fn generate(&self, prompt: &str, aspect_ratio: AspectRatio) -> Result<MediaData, ErgonError> {
        let request = image_request(vec![ContentPart::text(prompt)], Some(aspect_ratio));
        self.send(&request).await
    }

    /// Applies `instruction` to `image`; without an aspect ratio the model keeps the input's
    pub async fn edit(
        &self,
        image: &InlineData,
        instruction: &str,
        aspect_ratio: Option<AspectRatio>,
    ) -> Result<MediaData, ErgonError> {
        let request = image_request(
            vec![
                ContentPart::inline(image.mime_type.clone(), image.data.clone()),
                ContentPart::text(instruction),
            ],
            aspect_ratio,
        );
        self.send(&request).await
    }

    async fn send(&self, request: &GenerateRequest) -> Result<MediaData, ErgonError> {
        let response: GenerateResponse = self.api.call_model(self.engine.model_id(), "generateContent", request).await?;
        first_image(&response)
    }
}

fn image_request(parts: Vec<ContentPart>, aspect_ratio: Option<AspectRatio>) -> GenerateRequest {
    GenerateRequest::user(parts).with_config(GenerationConfig {
        response_modalities: Some(vec!["IMAGE".to_string(), "TEXT".to_string()]),
        image_config: aspect_ratio.map(|ar| ImageConfig {
            aspect_ratio: Some(ar.as_str().to_string()),
        }),
        ..GenerationConfig::default()
    })
}

fn first_image(response: &GenerateResponse) -> Result<MediaData, ErgonError> {
    response.check_refusal()?;
    match response.inline_data("image/") {
        Some(inline) => MediaData::from_inline(inline),
        None => {
            if let Some(text) = response.text() {
                tracing::debug!("Response text without image: {}", text);
            }
            Err(ErgonError::GenerationFailed("No image in response".to_string()))
        }
    }
}
