use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::core::{
    resolve, AspectRatio, AudioFormat, ErgonError, ImageEngine, ImageFormat, Language, OptionSource, Voice,
};
use crate::logging::LogDestination;

pub const HOME_ENV: &str = "ERGON_HOME";
pub const API_KEY_ENVS: [&str; 2] = ["GOOGLE_API_KEY", "GEMINI_API_KEY"];

const MIN_API_KEY_LEN: usize = 20;

/// Persistent settings stored in `~/.ergon/config.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_image_engine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_image_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_aspect_ratio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_audio_voice: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_audio_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_destination: Option<String>,

    #[serde(skip)]
    pub config_path: PathBuf,
}

/// Base directory for config, presets and logs
pub fn ergon_home() -> Result<PathBuf, ErgonError> {
    if let Some(dir) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let dirs = BaseDirs::new().ok_or_else(|| ErgonError::Config("Failed to determine home directory".to_string()))?;
    Ok(dirs.home_dir().join(".ergon"))
}

impl Config {
    /// A missing file loads as defaults; an unreadable or malformed one is an error
    pub fn load_from(path: &Path) -> Result<Self, ErgonError> {
        let mut config = match fs::read_to_string(path) {
            Ok(content) => serde_json::from_str::<Config>(&content)
                .map_err(|e| ErgonError::Config(format!("Failed to parse {}: {}", path.display(), e)))?,
            Err(e) if e.kind() == ErrorKind::NotFound => Config::default(),
            Err(e) => return Err(e.into()),
        };
        config.config_path = path.to_path_buf();
        Ok(config)
    }

    pub fn save(&self) -> Result<(), ErgonError> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ErgonError::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(&self.config_path, content)?;
        tracing::debug!("Wrote config to {}", self.config_path.display());
        Ok(())
    }

    /// Resolves the API key: GOOGLE_API_KEY, then GEMINI_API_KEY, then the config file
    pub fn resolve_api_key(&self, lookup: &impl Fn(&str) -> Option<String>) -> Result<String, ErgonError> {
        let sources = API_KEY_ENVS
            .into_iter()
            .map(|name| OptionSource::env(name, lookup))
            .chain(std::iter::once(OptionSource::config(
                self.google_api_key.clone().filter(|k| !k.trim().is_empty()),
            )));

        let key = resolve(sources).ok_or(ErgonError::MissingApiKey)?;
        tracing::debug!("Using API key from {}", key.origin);
        validate_api_key_format(&key.value)?;
        Ok(key.value)
    }

    pub fn log_destination(&self) -> Result<LogDestination, ErgonError> {
        match self.log_destination.as_deref() {
            Some(value) => LogDestination::parse(value),
            None => Ok(LogDestination::default()),
        }
    }

    /// Set a config value by key, validating it with the same parser the commands use
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ErgonError> {
        let value = value.trim();
        let normalized = match key {
            "googleApiKey" => {
                validate_api_key_format(value)?;
                value.to_string()
            }
            "defaultImageEngine" => ImageEngine::parse(value)?.as_str().to_string(),
            "defaultImageFormat" => ImageFormat::parse(value)?.as_str().to_string(),
            "defaultAspectRatio" => AspectRatio::parse(value)?.as_str().to_string(),
            "defaultLanguage" => Language::parse(value)?.as_str().to_string(),
            "defaultAudioVoice" => Voice::parse(value)?.as_str().to_string(),
            "defaultAudioFormat" => AudioFormat::parse(value)?.as_str().to_string(),
            "logDestination" => LogDestination::parse(value)?.as_str().to_string(),
            _ => return Err(Self::unknown_key(key)),
        };
        *self.slot_mut(key)? = Some(normalized);
        Ok(())
    }

    /// Removes a value so the built-in default applies again
    pub fn unset(&mut self, key: &str) -> Result<bool, ErgonError> {
        Ok(self.slot_mut(key)?.take().is_some())
    }

    /// Get a config value by key; the API key is masked
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "googleApiKey" => self.google_api_key.as_deref().map(mask_key),
            "defaultImageEngine" => self.default_image_engine.clone(),
            "defaultImageFormat" => self.default_image_format.clone(),
            "defaultAspectRatio" => self.default_aspect_ratio.clone(),
            "defaultLanguage" => self.default_language.clone(),
            "defaultAudioVoice" => self.default_audio_voice.clone(),
            "defaultAudioFormat" => self.default_audio_format.clone(),
            "logDestination" => self.log_destination.clone(),
            _ => None,
        }
    }

    /// Value shown when a key is unset
    pub fn default_for(key: &str) -> Option<&'static str> {
        match key {
            "defaultImageEngine" => Some(ImageEngine::default().as_str()),
            "defaultImageFormat" => Some(ImageFormat::default().as_str()),
            "defaultAspectRatio" => Some(AspectRatio::default().as_str()),
            "defaultLanguage" => Some(Language::default().as_str()),
            "defaultAudioVoice" => Some(Voice::default().as_str()),
            "defaultAudioFormat" => Some(AudioFormat::default().as_str()),
            "logDestination" => Some(LogDestination::default().as_str()),
            _ => None,
        }
    }

    pub fn keys() -> &'static [&'static str] {
        &[
            "googleApiKey",
            "defaultImageEngine",
            "defaultImageFormat",
            "defaultAspectRatio",
            "defaultLanguage",
            "defaultAudioVoice",
            "defaultAudioFormat",
            "logDestination",
        ]
    }

    fn slot_mut(&mut self, key: &str) -> Result<&mut Option<String>, ErgonError> {
        match key {
            "googleApiKey" => Ok(&mut self.google_api_key),
            "defaultImageEngine" => Ok(&mut self.default_image_engine),
            "defaultImageFormat" => Ok(&mut self.default_image_format),
            "defaultAspectRatio" => Ok(&mut self.default_aspect_ratio),
            "defaultLanguage" => Ok(&mut self.default_language),
            "defaultAudioVoice" => Ok(&mut self.default_audio_voice),
            "defaultAudioFormat" => Ok(&mut self.default_audio_format),
            "logDestination" => Ok(&mut self.log_destination),
            _ => Err(Self::unknown_key(key)),
        }
    }

    fn unknown_key(key: &str) -> ErgonError {
        ErgonError::invalid("config key", key, Self::keys().join(", "))
    }
}

/// Rejects keys that are empty, too short, or contain characters Google keys never use
pub fn validate_api_key_format(key: &str) -> Result<(), ErgonError> {
    if key.trim().is_empty() {
        return Err(ErgonError::InvalidApiKey("key is empty".to_string()));
    }
    if key.len() < MIN_API_KEY_LEN {
        return Err(ErgonError::InvalidApiKey(format!(
            "key is too short ({} characters, expected at least {})",
            key.len(),
            MIN_API_KEY_LEN
        )));
    }
    if !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(ErgonError::InvalidApiKey("key contains invalid characters".to_string()));
    }
    Ok(())
}

fn mask_key(key: &str) -> String {
    let tail: String = key.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
    format!("****{}", tail)
}
