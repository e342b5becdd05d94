use std::time::Duration;

use super::types::{EncodedImage, InlineData, Operation, PromptInstance, VideoParameters, VideoRequest};
use super::{ApiClient, MediaData};
use crate::core::{ErgonError, VideoParams};

pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Veo video generation (long-running operation)
pub struct VideoClient {
    api: ApiClient,
    poll_interval: Duration,
}

impl VideoClient {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            poll_interval: POLL_INTERVAL,
        }
    }

    /// Starts generation, waits for the operation to finish, and downloads the first sample
    pub async fn generate(
        &self,
        prompt: &str,
        params: &VideoParams,
        first_frame: Option<&InlineData>,
    ) -> Result<MediaData, ErgonError> {
        let request = build_request(prompt, params, first_frame);
        let mut operation: Operation = self
            .api
            .call_model(params.engine.model_id(), "predictLongRunning", &request)
            .await?;
        tracing::info!("Started video operation {}", operation.name);

        let mut polls = 0u32;
        while !operation.done {
            tokio::time::sleep(self.poll_interval).await;
            polls += 1;
            operation = self.api.get_json(&operation.name).await?;
            tracing::debug!("Operation {} poll {}: done={}", operation.name, polls, operation.done);
        }

        let uri = video_uri(operation)?;
        let bytes = self.api.download(&uri).await?;
        Ok(MediaData {
            bytes,
            mime_type: "video/mp4".to_string(),
        })
    }
}

fn build_request(prompt: &str, params: &VideoParams, first_frame: Option<&InlineData>) -> VideoRequest {
    VideoRequest {
        instances: vec![PromptInstance {
            prompt: prompt.to_string(),
            image: first_frame.map(|image| EncodedImage {
                bytes_base64_encoded: image.data.clone(),
                mime_type: image.mime_type.clone(),
            }),
        }],
        parameters: VideoParameters {
            aspect_ratio: params.aspect_ratio.as_str().to_string(),
            resolution: params.resolution.as_str().to_string(),
            duration_seconds: params.duration.seconds(),
        },
    }
}

/// URI of the first generated sample of a finished operation
fn video_uri(operation: Operation) -> Result<String, ErgonError> {
    if let Some(error) = operation.error {
        return Err(ErgonError::GenerationFailed(format!("{} (code {})", error.message, error.code)));
    }

    let response = operation
        .response
        .and_then(|r| r.generate_video_response)
        .ok_or_else(|| ErgonError::InvalidResponse("Finished operation has no video response".to_string()))?;

    if response.generated_samples.is_empty() {
        if let Some(reason) = response.rai_media_filtered_reasons.into_iter().next() {
            return Err(ErgonError::GenerationFailed(reason));
        }
        return Err(ErgonError::GenerationFailed("No video in response".to_string()));
    }

    response
        .generated_samples
        .into_iter()
        .next()
        .and_then(|sample| sample.video)
        .and_then(|video| video.uri)
        .ok_or_else(|| ErgonError::InvalidResponse("Generated video has no URI".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{VideoAspectRatio, VideoDuration, VideoResolution};
    use serde_json::json;

    fn operation(value: serde_json::Value) -> Operation {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn request_parameters() {
        let params = VideoParams {
            duration: VideoDuration::parse("6").unwrap(),
            resolution: VideoResolution::P720,
            aspect_ratio: VideoAspectRatio::Portrait,
            ..VideoParams::default()
        };
        let frame = InlineData {
            mime_type: "image/png".to_string(),
            data: "AAAA".to_string(),
        };

        let value = serde_json::to_value(build_request("waves", &params, Some(&frame))).unwrap();
        assert_eq!(
            value,
            json!({
                "instances": [{
                    "prompt": "waves",
                    "image": { "bytesBase64Encoded": "AAAA", "mimeType": "image/png" }
                }],
                "parameters": { "aspectRatio": "9:16", "resolution": "720p", "durationSeconds": 6 }
            })
        );

        let value = serde_json::to_value(build_request("waves", &VideoParams::default(), None)).unwrap();
        assert!(value["instances"][0].get("image").is_none());
        assert_eq!(value["parameters"]["durationSeconds"], 8);
    }

    #[test]
    fn finished_operation_yields_uri() {
        let op = operation(json!({
            "name": "op", "done": true,
            "response": { "generateVideoResponse": { "generatedSamples": [{ "video": { "uri": "https://x/v" } }] } }
        }));
        assert_eq!(video_uri(op).unwrap(), "https://x/v");
    }

    #[test]
    fn operation_errors_surface() {
        let failed = operation(json!({ "name": "op", "done": true, "error": { "code": 3, "message": "bad prompt" } }));
        match video_uri(failed) {
            Err(ErgonError::GenerationFailed(msg)) => assert!(msg.contains("bad prompt")),
            other => panic!("unexpected {:?}", other),
        }

        let filtered = operation(json!({
            "name": "op", "done": true,
            "response": { "generateVideoResponse": { "raiMediaFilteredReasons": ["unsafe"] } }
        }));
        assert!(matches!(video_uri(filtered), Err(ErgonError::GenerationFailed(m)) if m == "unsafe"));

        let empty = operation(json!({ "name": "op", "done": true, "response": {} }));
        assert!(matches!(video_uri(empty), Err(ErgonError::InvalidResponse(_))));
    }
}
