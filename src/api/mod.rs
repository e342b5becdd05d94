mod gemini;
mod imagen;
mod nano_banana;
mod tts;
mod types;
mod video;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use tokio::fs;

pub use gemini::GeminiClient;
pub use imagen::ImagenClient;
pub use nano_banana::NanoBananaClient;
pub use tts::TtsClient;
pub use types::*;
pub use video::VideoClient;

use crate::core::ErgonError;
use crate::http_client::HTTP_CLIENT;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Decoded media returned by a generation call
#[derive(Debug, Clone)]
pub struct MediaData {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl MediaData {
    pub fn from_inline(inline: &InlineData) -> Result<Self, ErgonError> {
        Ok(Self {
            bytes: decode_base64(&inline.data)?,
            mime_type: inline.mime_type.clone(),
        })
    }
}

/// Authenticated access to the Generative Language REST API, shared by all model clients
#[derive(Debug, Clone)]
pub struct ApiClient {
    api_key: String,
    base_url: String,
}

impl ApiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// POST `{base}/models/{model}:{method}` and parse the JSON reply
    pub async fn call_model<Req, Resp>(&self, model: &str, method: &str, body: &Req) -> Result<Resp, ErgonError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}/models/{}:{}", self.base_url, model, method);

        tracing::debug!("Sending request to: {}", url);
        if tracing::enabled!(tracing::Level::TRACE) {
            tracing::trace!("Request body: {}", serde_json::to_string(body)?);
        }

        let response = HTTP_CLIENT
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await?;

        self.parse(response).await
    }

    /// GET `{base}/{path}` and parse the JSON reply
    pub async fn get_json<Resp: DeserializeOwned>(&self, path: &str) -> Result<Resp, ErgonError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        tracing::debug!("Fetching: {}", url);

        let response = HTTP_CLIENT.get(&url).header("x-goog-api-key", &self.api_key).send().await?;
        self.parse(response).await
    }

    /// Download raw bytes from an absolute URI handed out by the API
    pub async fn download(&self, uri: &str) -> Result<Vec<u8>, ErgonError> {
        tracing::debug!("Downloading: {}", uri);
        let response = HTTP_CLIENT.get(uri).header("x-goog-api-key", &self.api_key).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status, &body));
        }
        Ok(response.bytes().await?.to_vec())
    }

    async fn parse<Resp: DeserializeOwned>(&self, response: reqwest::Response) -> Result<Resp, ErgonError> {
        let status = response.status();
        let body = response.text().await?;

        tracing::debug!("Response status: {}", status);
        tracing::trace!("Response body: {}", body);

        if !status.is_success() {
            return Err(api_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| ErgonError::InvalidResponse(format!("Failed to parse API response: {}", e)))
    }
}

/// Maps a non-2xx reply to an API error, preferring the Google error envelope's message
pub fn api_error(status: reqwest::StatusCode, body: &str) -> ErgonError {
    let message = match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(parsed) => format!("{} ({})", parsed.error.message, status.as_u16()),
        Err(_) if body.trim().is_empty() => format!("HTTP {}", status),
        Err(_) => format!("HTTP {}: {}", status, body.trim()),
    };
    ErgonError::Api { message, source: None }
}

pub fn decode_base64(data: &str) -> Result<Vec<u8>, ErgonError> {
    BASE64
        .decode(data.trim())
        .map_err(|e| ErgonError::InvalidResponse(format!("Invalid base64 payload: {}", e)))
}

pub fn mime_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("heic") => "image/heic",
        Some("heif") => "image/heif",
        _ => "application/octet-stream",
    }
}

/// Load an image file as an inline part payload
pub async fn load_image(path: &Path) -> Result<InlineData, ErgonError> {
    let mime_type = mime_type_for_path(path);
    if !mime_type.starts_with("image/") {
        return Err(ErgonError::invalid(
            "image file",
            path.display().to_string(),
            "png, jpg, jpeg, webp, gif, heic, heif",
        ));
    }
    let data = fs::read(path).await?;
    Ok(InlineData {
        mime_type: mime_type.to_string(),
        data: BASE64.encode(&data),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use tempfile::tempdir;

    #[test]
    fn api_error_prefers_envelope_message() {
        let body = r#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#;
        let err = api_error(StatusCode::BAD_REQUEST, body);
        assert!(err.to_string().contains("API key not valid"));
        assert_eq!(err.code(), "API_ERROR");

        let err = api_error(StatusCode::BAD_GATEWAY, "upstream down");
        assert!(err.to_string().contains("upstream down"));
        assert!(err.to_string().contains("502"));
    }

    #[test]
    fn mime_types_follow_extension() {
        assert_eq!(mime_type_for_path(Path::new("a/B.JPG")), "image/jpeg");
        assert_eq!(mime_type_for_path(Path::new("x.heic")), "image/heic");
        assert_eq!(mime_type_for_path(Path::new("notes.txt")), "application/octet-stream");
    }

    #[tokio::test]
    async fn load_image_encodes_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dot.png");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();

        let inline = load_image(&path).await.unwrap();
        assert_eq!(inline.mime_type, "image/png");
        assert_eq!(decode_base64(&inline.data).unwrap(), vec![1, 2, 3]);

        let text = dir.path().join("a.txt");
        std::fs::write(&text, "x").unwrap();
        assert!(matches!(load_image(&text).await, Err(ErgonError::InvalidParameter { .. })));
    }

    #[test]
    fn base_url_is_normalised() {
        let client = ApiClient::with_base_url("k", "http://localhost:9/v1beta/");
        assert_eq!(client.base_url, "http://localhost:9/v1beta");
    }
}
