use super::types::{
    ContentPart, GenerateRequest, GenerateResponse, GenerationConfig, PrebuiltVoiceConfig, SpeechConfig, VoiceConfig,
};
use super::{ApiClient, MediaData};
use crate::audio::sample_rate_from_mime;
use crate::core::{ErgonError, SpeechParams};

/// Raw speech returned by the TTS model
#[derive(Debug, Clone)]
pub struct SpeechAudio {
    pub pcm: Vec<u8>,
    pub mime_type: String,
    pub sample_rate: u32,
}

/// Gemini text-to-speech
pub struct TtsClient {
    api: ApiClient,
}

impl TtsClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Synthesizes `text`; the result is 16-bit mono PCM at the rate named in its MIME type
    pub async fn synthesize(&self, text: &str, params: &SpeechParams) -> Result<SpeechAudio, ErgonError> {
        if text.trim().is_empty() {
            return Err(ErgonError::invalid("text", text, "non-empty text to speak"));
        }

        tracing::debug!(
            "TTS model={} voice={} language={} speed={}",
            params.model.model_id(),
            params.voice,
            params.language,
            params.speed.get()
        );

        let request = build_request(text, params);
        let response: GenerateResponse = self.api.call_model(params.model.model_id(), "generateContent", &request).await?;
        extract_audio(&response)
    }
}

/// Prefixes stage directions when a character or delivery is requested
pub fn script_text(text: &str, character: Option<&str>, direction: Option<&str>) -> String {
    let character = character.map(str::trim).filter(|s| !s.is_empty());
    let direction = direction.map(str::trim).filter(|s| !s.is_empty());
    match (character, direction) {
        (Some(character), Some(direction)) => format!("(In the voice of {}, {}) {}", character, direction, text),
        (Some(character), None) => format!("(In the voice of {}) {}", character, text),
        (None, Some(direction)) => format!("({}) {}", direction, text),
        (None, None) => text.to_string(),
    }
}

fn build_request(text: &str, params: &SpeechParams) -> GenerateRequest {
    let prompt = script_text(text, params.character.as_deref(), params.direction.as_deref());
    GenerateRequest::user(vec![ContentPart::text(prompt)]).with_config(GenerationConfig {
        response_modalities: Some(vec!["AUDIO".to_string()]),
        speech_config: Some(SpeechConfig {
            voice_config: VoiceConfig {
                prebuilt_voice_config: PrebuiltVoiceConfig {
                    voice_name: params.voice.as_str().to_string(),
                },
            },
        }),
        ..GenerationConfig::default()
    })
}

fn extract_audio(response: &GenerateResponse) -> Result<SpeechAudio, ErgonError> {
    response.check_refusal()?;
    let inline = response
        .inline_data("audio/")
        .ok_or_else(|| ErgonError::GenerationFailed("No audio in response".to_string()))?;

    let MediaData { bytes, mime_type } = MediaData::from_inline(inline)?;
    let sample_rate = sample_rate_from_mime(&mime_type);
    tracing::debug!("Received {} PCM bytes ({}, {} Hz)", bytes.len(), mime_type, sample_rate);

    Ok(SpeechAudio {
        pcm: bytes,
        mime_type,
        sample_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Voice;
    use serde_json::json;

    #[test]
    fn stage_directions() {
        assert_eq!(script_text("Hi", None, None), "Hi");
        assert_eq!(script_text("Hi", Some("a pirate"), None), "(In the voice of a pirate) Hi");
        assert_eq!(script_text("Hi", None, Some("whispering")), "(whispering) Hi");
        assert_eq!(
            script_text("Hi", Some("a pirate"), Some("shouting")),
            "(In the voice of a pirate, shouting) Hi"
        );
        assert_eq!(script_text("Hi", Some(" "), None), "Hi");
    }

    #[test]
    fn request_selects_voice_and_audio_modality() {
        let params = SpeechParams {
            voice: Voice::Puck,
            ..SpeechParams::default()
        };
        let value = serde_json::to_value(build_request("hello", &params)).unwrap();
        assert_eq!(value["generationConfig"]["responseModalities"], json!(["AUDIO"]));
        assert_eq!(
            value["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]["voiceName"],
            "Puck"
        );
    }

    #[test]
    fn audio_rate_comes_from_mime() {
        let response: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [
                { "inlineData": { "mimeType": "audio/L16;codec=pcm;rate=16000", "data": "AAABAA==" } }
            ]}}]
        }))
        .unwrap();
        let audio = extract_audio(&response).unwrap();
        assert_eq!(audio.sample_rate, 16000);
        assert_eq!(audio.pcm, vec![0, 0, 1, 0]);

        let silent: GenerateResponse = serde_json::from_value(json!({ "candidates": [] })).unwrap();
        assert!(matches!(extract_audio(&silent), Err(ErgonError::GenerationFailed(_))));
    }
}
