use serde::{Serialize, Serializer};

use super::error::ErgonError;

/// Declares a closed set of string-valued options with case-insensitive parsing.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident ($label:literal) default $default:ident {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            pub fn variants() -> &'static [&'static str] {
                &[$($text),+]
            }

            pub fn parse(value: &str) -> Result<Self, ErgonError> {
                let value = value.trim();
                $(
                    if value.eq_ignore_ascii_case($text) {
                        return Ok($name::$variant);
                    }
                )+
                Err(ErgonError::invalid($label, value, Self::variants().join(", ")))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }
    };
}

string_enum! {
    /// Image generation backend
    ImageEngine("image engine") default Imagen4 {
        Imagen4 => "imagen4",
        Imagen4Fast => "imagen4-fast",
        Imagen4Ultra => "imagen4-ultra",
        NanoBanana => "nano-banana",
        NanoBananaPro => "nano-banana-pro",
    }
}

impl ImageEngine {
    pub fn model_id(&self) -> &'static str {
        match self {
            ImageEngine::Imagen4 => "imagen-4.0-generate-001",
            ImageEngine::Imagen4Fast => "imagen-4.0-fast-generate-001",
            ImageEngine::Imagen4Ultra => "imagen-4.0-ultra-generate-001",
            ImageEngine::NanoBanana => "gemini-2.5-flash-image",
            ImageEngine::NanoBananaPro => "gemini-3-pro-image-preview",
        }
    }

    /// Gemini-native engines take the prompt as-is and support editing
    pub fn is_nano_banana(&self) -> bool {
        matches!(self, ImageEngine::NanoBanana | ImageEngine::NanoBananaPro)
    }
}

string_enum! {
    ImageFormat("image format") default Png {
        Png => "png",
        Jpg => "jpg",
        Jpeg => "jpeg",
        Webp => "webp",
    }
}

impl ImageFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpg | ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Webp => "image/webp",
        }
    }

    pub fn extension(&self) -> &'static str {
        self.as_str()
    }
}

string_enum! {
    AspectRatio("aspect ratio") default Square {
        Square => "1:1",
        Portrait3x4 => "3:4",
        Landscape4x3 => "4:3",
        Portrait9x16 => "9:16",
        Landscape16x9 => "16:9",
    }
}

string_enum! {
    /// Output size preset
    SizePreset("size") default FullHd {
        Tiny => "tiny",
        Hd => "hd",
        FullHd => "fullhd",
        TwoK => "2k",
        FourK => "4k",
    }
}

impl SizePreset {
    /// Nominal landscape dimensions of the preset
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            SizePreset::Tiny => (160, 90),
            SizePreset::Hd => (1280, 720),
            SizePreset::FullHd => (1920, 1080),
            SizePreset::TwoK => (2560, 1440),
            SizePreset::FourK => (3840, 2160),
        }
    }

    /// Imagen `sampleImageSize` parameter; Imagen only renders 1K or 2K
    pub fn imagen_sample_size(&self) -> &'static str {
        match self {
            SizePreset::TwoK | SizePreset::FourK => "2K",
            _ => "1K",
        }
    }
}

string_enum! {
    /// Visual style used when generating the image prompt
    ImageType("image type") default Flat {
        Realistic => "realistic",
        Illustration => "illustration",
        Flat => "flat",
        Anime => "anime",
        Watercolor => "watercolor",
        OilPainting => "oil-painting",
        PixelArt => "pixel-art",
        Sketch => "sketch",
        Render3d => "3d-render",
        Corporate => "corporate",
        Minimal => "minimal",
        PopArt => "pop-art",
    }
}

impl ImageType {
    pub fn style_prompt(&self) -> &'static str {
        match self {
            ImageType::Realistic => "Create a hyper-realistic photograph with exceptional detail and clarity.",
            ImageType::Illustration => "Create a hand-drawn illustration with warm, inviting atmosphere and artistic charm.",
            ImageType::Flat => "Create a simple, minimal but slightly pop illustration on a white background, using soft pastel colors and rounded lines.",
            ImageType::Anime => "Create an image in Japanese anime style with vibrant colors and distinctive eye designs.",
            ImageType::Watercolor => "Create a watercolor painting with soft, flowing colors and artistic blending effects.",
            ImageType::OilPainting => "Create an oil painting with rich textures, deep colors, and impasto effects.",
            ImageType::PixelArt => "Create a pixel art image with retro gaming aesthetics and digital precision.",
            ImageType::Sketch => "Create a pencil or pen sketch with dynamic line variations and artistic expression.",
            ImageType::Render3d => "Create a 3D rendered image with realistic lighting, materials, and depth.",
            ImageType::Corporate => "Create a professional business image with clean, modern aesthetics and corporate appeal.",
            ImageType::Minimal => "Create a minimal design with clean lines, essential elements, and refined simplicity.",
            ImageType::PopArt => "Create a pop art image with bold colors, dot patterns, and contemporary style.",
        }
    }
}

string_enum! {
    /// Language for captions, explanations and narration
    Language("language") default Ja {
        Ja => "ja",
        En => "en",
        Zh => "zh",
        Ko => "ko",
        Es => "es",
        Fr => "fr",
        De => "de",
        It => "it",
        Pt => "pt",
        Ru => "ru",
        Vi => "vi",
    }
}

impl Language {
    pub fn english_name(&self) -> &'static str {
        match self {
            Language::Ja => "Japanese",
            Language::En => "English",
            Language::Zh => "Chinese",
            Language::Ko => "Korean",
            Language::Es => "Spanish",
            Language::Fr => "French",
            Language::De => "German",
            Language::It => "Italian",
            Language::Pt => "Portuguese",
            Language::Ru => "Russian",
            Language::Vi => "Vietnamese",
        }
    }
}

string_enum! {
    /// Prebuilt TTS voice
    Voice("voice") default Kore {
        Aoede => "Aoede",
        Charon => "Charon",
        Fenrir => "Fenrir",
        Kore => "Kore",
        Puck => "Puck",
    }
}

string_enum! {
    TtsModel("TTS model") default Pro {
        Flash => "flash",
        Pro => "pro",
    }
}

impl TtsModel {
    pub fn model_id(&self) -> &'static str {
        match self {
            TtsModel::Flash => "gemini-2.5-flash-preview-tts",
            TtsModel::Pro => "gemini-2.5-pro-preview-tts",
        }
    }
}

string_enum! {
    /// Container for synthesized speech
    AudioFormat("audio format") default Mp3 {
        Wav => "wav",
        Mp3 => "mp3",
    }
}

impl AudioFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Mp3 => "audio/mp3",
        }
    }
}

string_enum! {
    VideoEngine("video engine") default Veo31 {
        Veo31 => "veo-3.1",
        Veo31Fast => "veo-3.1-fast",
    }
}

impl VideoEngine {
    pub fn model_id(&self) -> &'static str {
        match self {
            VideoEngine::Veo31 => "veo-3.1-generate-preview",
            VideoEngine::Veo31Fast => "veo-3.1-fast-generate-preview",
        }
    }
}

string_enum! {
    VideoResolution("resolution") default P1080 {
        P720 => "720p",
        P1080 => "1080p",
    }
}

string_enum! {
    VideoAspectRatio("video aspect ratio") default Landscape {
        Landscape => "16:9",
        Portrait => "9:16",
    }
}

string_enum! {
    /// Rendering of caption and catalog results
    TextFormat("output format") default Markdown {
        Markdown => "markdown",
        Json => "json",
    }
}

/// JPEG quality (1-100)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Quality(u8);

impl Quality {
    pub const DEFAULT: Quality = Quality(90);

    pub fn new(value: i64) -> Result<Self, ErgonError> {
        if (1..=100).contains(&value) {
            Ok(Quality(value as u8))
        } else {
            Err(ErgonError::invalid("quality", value.to_string(), "1-100"))
        }
    }

    pub fn parse(value: &str) -> Result<Self, ErgonError> {
        let parsed: i64 = value
            .trim()
            .parse()
            .map_err(|_| ErgonError::invalid("quality", value, "1-100"))?;
        Self::new(parsed)
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Speaking rate multiplier (0.25-4.0)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Speed(f32);

impl Speed {
    pub const MIN: f32 = 0.25;
    pub const MAX: f32 = 4.0;

    pub fn parse(value: &str) -> Result<Self, ErgonError> {
        let parsed: f32 = value
            .trim()
            .parse()
            .map_err(|_| ErgonError::invalid("speed", value, "0.25-4.0"))?;
        if parsed.is_finite() && (Self::MIN..=Self::MAX).contains(&parsed) {
            Ok(Speed(parsed))
        } else {
            Err(ErgonError::invalid("speed", value, "0.25-4.0"))
        }
    }

    pub fn get(&self) -> f32 {
        self.0
    }
}

impl Default for Speed {
    fn default() -> Self {
        Speed(1.0)
    }
}

/// Video length in seconds (5-8)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct VideoDuration(u8);

impl VideoDuration {
    pub fn parse(value: &str) -> Result<Self, ErgonError> {
        match value.trim().parse::<u8>() {
            Ok(secs) if (5..=8).contains(&secs) => Ok(VideoDuration(secs)),
            _ => Err(ErgonError::invalid("duration", value, "5-8 seconds")),
        }
    }

    pub fn seconds(&self) -> u8 {
        self.0
    }
}

impl Default for VideoDuration {
    fn default() -> Self {
        VideoDuration(8)
    }
}

/// Parameters for a single image generation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageParams {
    pub engine: ImageEngine,
    pub format: ImageFormat,
    pub aspect_ratio: AspectRatio,
    pub image_type: ImageType,
    pub size: SizePreset,
    pub quality: Quality,
}

impl Default for ImageParams {
    fn default() -> Self {
        Self {
            engine: ImageEngine::default(),
            format: ImageFormat::default(),
            aspect_ratio: AspectRatio::default(),
            image_type: ImageType::default(),
            size: SizePreset::default(),
            quality: Quality::default(),
        }
    }
}

impl ImageParams {
    pub fn with_engine(mut self, engine: ImageEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_format(mut self, format: ImageFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_aspect_ratio(mut self, ar: AspectRatio) -> Self {
        self.aspect_ratio = ar;
        self
    }

    pub fn with_type(mut self, image_type: ImageType) -> Self {
        self.image_type = image_type;
        self
    }

    pub fn with_size(mut self, size: SizePreset) -> Self {
        self.size = size;
        self
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }
}

/// Parameters for speech synthesis
#[derive(Debug, Clone, Default)]
pub struct SpeechParams {
    pub model: TtsModel,
    pub voice: Voice,
    pub language: Language,
    pub format: AudioFormat,
    pub speed: Speed,
    pub character: Option<String>,
    pub direction: Option<String>,
}

/// Parameters for video generation
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoParams {
    pub engine: VideoEngine,
    pub duration: VideoDuration,
    pub resolution: VideoResolution,
    pub aspect_ratio: VideoAspectRatio,
}
