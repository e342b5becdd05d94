use super::types::{ContentPart, GenerateRequest, GenerateResponse, GenerationConfig, InlineData};
use super::ApiClient;
use crate::core::{ErgonError, ImageType, Language};

pub const TEXT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_FILE_NAME: &str = "untitled";

const MAX_OUTPUT_TOKENS: u32 = 2048;

/// Gemini text and vision calls: captions, explanations, prompts, file names
pub struct GeminiClient {
    api: ApiClient,
    model: String,
}

impl GeminiClient {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            model: TEXT_MODEL.to_string(),
        }
    }

    /// Short description of an image in `language`
    pub async fn generate_caption(
        &self,
        image: &InlineData,
        language: Language,
        context: Option<&str>,
    ) -> Result<String, ErgonError> {
        let mut system = String::from(
            "Describe the image in two or three concise sentences covering its key elements, actions and atmosphere. \
             Start with the description itself, with no introductory phrase.",
        );
        push_context(&mut system, context);
        push_language(&mut system, language);

        let request = GenerateRequest::user(vec![
            ContentPart::inline(image.mime_type.clone(), image.data.clone()),
            ContentPart::text("Describe this image."),
        ])
        .with_system(system);

        self.complete(request).await
    }

    /// Longer, structured explanation of an image in `language`, as markdown
    pub async fn explain_image(
        &self,
        image: &InlineData,
        language: Language,
        context: Option<&str>,
    ) -> Result<String, ErgonError> {
        let mut system = String::from(
            "Explain the image in detail as markdown. Cover what it shows, any visible text, \
             the layout or composition, and what the image is likely used for.",
        );
        push_context(&mut system, context);
        push_language(&mut system, language);

        let request = GenerateRequest::user(vec![
            ContentPart::inline(image.mime_type.clone(), image.data.clone()),
            ContentPart::text("Explain this image."),
        ])
        .with_system(system);

        self.complete(request).await
    }

    /// Turns a theme into an English image-generation prompt in the given style
    pub async fn generate_prompt(
        &self,
        theme: &str,
        context: Option<&str>,
        image_type: ImageType,
    ) -> Result<String, ErgonError> {
        if theme.trim().is_empty() {
            return Err(ErgonError::invalid("theme", theme, "a non-empty description"));
        }

        let mut system = format!(
            "You write prompts for an image generation model. {} \
             Reply with the prompt only, in English, as a single paragraph.",
            image_type.style_prompt()
        );
        push_context(&mut system, context);

        let request = GenerateRequest::user(vec![ContentPart::text(format!("Theme: {}", theme.trim()))]).with_system(system);
        self.complete(request).await
    }

    /// Short kebab-case file name (without extension) describing `text`
    pub async fn generate_file_name(&self, text: &str, max_len: usize) -> Result<String, ErgonError> {
        let system = format!(
            "Suggest a file name for content described by the user. Use lowercase English words joined by hyphens, \
             at most {} characters, no extension. Reply with the name only.",
            max_len
        );
        let request = GenerateRequest::user(vec![ContentPart::text(text)]).with_system(system);
        let raw = self.complete(request).await?;
        Ok(sanitize_file_name(&raw, max_len))
    }

    async fn complete(&self, request: GenerateRequest) -> Result<String, ErgonError> {
        let request = request.with_config(GenerationConfig {
            max_output_tokens: Some(MAX_OUTPUT_TOKENS),
            ..GenerationConfig::default()
        });
        let response: GenerateResponse = self.api.call_model(&self.model, "generateContent", &request).await?;
        response.check_refusal()?;
        response
            .text()
            .ok_or_else(|| ErgonError::InvalidResponse("No text in response".to_string()))
    }
}

fn push_context(system: &mut String, context: Option<&str>) {
    if let Some(context) = context.map(str::trim).filter(|c| !c.is_empty()) {
        system.push_str("\n\nTake this context into account:\n");
        system.push_str(context);
    }
}

fn push_language(system: &mut String, language: Language) {
    system.push_str(&format!(
        "\n\nWrite the answer in {} ({}), naturally and fluently.",
        language.english_name(),
        language.as_str()
    ));
}

/// Lowercases, keeps `[a-z0-9]`, joins runs of anything else with a single `-`, and
/// truncates to `max_len`. Falls back to `untitled` when nothing usable remains.
pub fn sanitize_file_name(raw: &str, max_len: usize) -> String {
    let mut name = String::with_capacity(raw.len());
    let mut pending_dash = false;

    for c in raw.trim().chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !name.is_empty() {
                name.push('-');
            }
            pending_dash = false;
            name.push(c);
        } else {
            pending_dash = true;
        }
    }

    name.truncate(max_len);
    let name = name.trim_end_matches('-');

    if name.is_empty() {
        DEFAULT_FILE_NAME.to_string()
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_clean(name: &str) -> bool {
        name.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
            && !name.starts_with('-')
            && !name.ends_with('-')
            && !name.contains("--")
    }

    #[test]
    fn sanitizes_model_output() {
        assert_eq!(sanitize_file_name("  Sunset Over Tokyo.png\n", 40), "sunset-over-tokyo-png");
        assert_eq!(sanitize_file_name("`cat_on__a_mat`", 40), "cat-on-a-mat");
        assert_eq!(sanitize_file_name("-Hello--World-", 40), "hello-world");
    }

    #[test]
    fn truncates_without_trailing_dash() {
        let name = sanitize_file_name("alpha beta gamma delta", 11);
        assert_eq!(name, "alpha-beta");
        assert!(name.len() <= 11);
    }

    #[test]
    fn falls_back_when_nothing_usable() {
        assert_eq!(sanitize_file_name("猫の写真", 40), DEFAULT_FILE_NAME);
        assert_eq!(sanitize_file_name("", 40), DEFAULT_FILE_NAME);
        assert_eq!(sanitize_file_name("---", 40), DEFAULT_FILE_NAME);
    }

    #[test]
    fn output_is_always_clean() {
        for raw in ["A/B\\C", "émigré café 2024", "UPPER lower 123", "...", "x"] {
            let name = sanitize_file_name(raw, 40);
            assert!(is_clean(&name), "{:?} -> {:?}", raw, name);
            assert!(name.len() <= 40);
        }
    }

    #[test]
    fn context_and_language_are_appended() {
        let mut system = String::from("base");
        push_context(&mut system, Some("  "));
        assert_eq!(system, "base");
        push_context(&mut system, Some("pets"));
        push_language(&mut system, Language::En);
        assert!(system.contains("pets"));
        assert!(system.contains("English (en)"));
    }
}
