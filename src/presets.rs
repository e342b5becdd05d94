//! Named image presets.
//!
//! User presets live in `~/.ergon/presets.json` as a flat `name -> preset`
//! map. Names under the `builtin:` prefix are served from code and can never
//! be written or removed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::core::{AspectRatio, ErgonError, ImageEngine, ImageFormat, ImageType, Quality, SizePreset};

pub const BUILTIN_PREFIX: &str = "builtin:";

/// Stored image settings; every field is optional and only overrides what it sets
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePreset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub image_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,
}

impl ImagePreset {
    pub fn is_empty(&self) -> bool {
        *self == ImagePreset::default()
    }

    /// Checks every set field against the option parsers
    pub fn validate(&self) -> Result<(), ErgonError> {
        self.aspect_ratio()?;
        self.image_type()?;
        self.engine()?;
        self.format()?;
        self.size()?;
        self.quality()?;
        Ok(())
    }

    pub fn aspect_ratio(&self) -> Result<Option<AspectRatio>, ErgonError> {
        self.aspect_ratio.as_deref().map(AspectRatio::parse).transpose()
    }

    pub fn image_type(&self) -> Result<Option<ImageType>, ErgonError> {
        self.image_type.as_deref().map(ImageType::parse).transpose()
    }

    pub fn engine(&self) -> Result<Option<ImageEngine>, ErgonError> {
        self.engine.as_deref().map(ImageEngine::parse).transpose()
    }

    pub fn format(&self) -> Result<Option<ImageFormat>, ErgonError> {
        self.format.as_deref().map(ImageFormat::parse).transpose()
    }

    pub fn size(&self) -> Result<Option<SizePreset>, ErgonError> {
        self.size.as_deref().map(SizePreset::parse).transpose()
    }

    pub fn quality(&self) -> Result<Option<Quality>, ErgonError> {
        self.quality.map(|q| Quality::new(q as i64)).transpose()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresetEntry {
    pub name: String,
    pub builtin: bool,
    pub preset: ImagePreset,
}

pub fn is_builtin_name(name: &str) -> bool {
    name.starts_with(BUILTIN_PREFIX)
}

fn preset(aspect_ratio: &str, format: Option<&str>, size: Option<&str>) -> ImagePreset {
    ImagePreset {
        aspect_ratio: Some(aspect_ratio.to_string()),
        format: format.map(str::to_string),
        size: size.map(str::to_string),
        ..ImagePreset::default()
    }
}

pub fn builtin_presets() -> Vec<(String, ImagePreset)> {
    vec![
        ("builtin:square".to_string(), preset("1:1", None, None)),
        ("builtin:landscape".to_string(), preset("16:9", None, None)),
        ("builtin:portrait".to_string(), preset("9:16", None, None)),
        ("builtin:social".to_string(), preset("1:1", Some("webp"), Some("hd"))),
        ("builtin:presentation".to_string(), preset("16:9", Some("png"), Some("fullhd"))),
    ]
}

pub struct PresetStore {
    path: PathBuf,
}

impl PresetStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// User presets only; a missing file is an empty map
    pub fn load(&self) -> Result<BTreeMap<String, ImagePreset>, ErgonError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| ErgonError::Config(format!("Failed to parse {}: {}", self.path.display(), e))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, presets: &BTreeMap<String, ImagePreset>) -> Result<(), ErgonError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(presets)
            .map_err(|e| ErgonError::Config(format!("Failed to serialize presets: {}", e)))?;
        fs::write(&self.path, content)?;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Option<ImagePreset>, ErgonError> {
        if is_builtin_name(name) {
            return Ok(builtin_presets().into_iter().find(|(n, _)| n == name).map(|(_, p)| p));
        }
        Ok(self.load()?.remove(name))
    }

    /// Like [`get`](Self::get) but a missing preset is an error
    pub fn require(&self, name: &str) -> Result<ImagePreset, ErgonError> {
        self.get(name)?.ok_or_else(|| ErgonError::PresetNotFound(name.to_string()))
    }

    pub fn save(&self, name: &str, preset: ImagePreset) -> Result<(), ErgonError> {
        if is_builtin_name(name) {
            return Err(ErgonError::PresetReadOnly(name.to_string()));
        }
        if name.trim().is_empty() {
            return Err(ErgonError::invalid("preset name", name, "a non-empty name"));
        }
        if preset.is_empty() {
            return Err(ErgonError::invalid("preset", name, "at least one of aspect ratio, type, engine, format, size, quality"));
        }
        preset.validate()?;

        let mut presets = self.load()?;
        presets.insert(name.to_string(), preset);
        self.write(&presets)?;
        tracing::debug!("Saved preset {} to {}", name, self.path.display());
        Ok(())
    }

    /// Returns whether a preset was removed
    pub fn delete(&self, name: &str) -> Result<bool, ErgonError> {
        if is_builtin_name(name) {
            return Err(ErgonError::PresetReadOnly(name.to_string()));
        }
        let mut presets = self.load()?;
        if presets.remove(name).is_none() {
            return Ok(false);
        }
        self.write(&presets)?;
        Ok(true)
    }

    /// Built-ins first, then user presets in name order
    pub fn list_all(&self) -> Result<Vec<PresetEntry>, ErgonError> {
        let builtins = builtin_presets().into_iter().map(|(name, preset)| PresetEntry {
            name,
            builtin: true,
            preset,
        });
        let user = self.load()?.into_iter().map(|(name, preset)| PresetEntry {
            name,
            builtin: false,
            preset,
        });
        Ok(builtins.chain(user).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store(dir: &Path) -> PresetStore {
        PresetStore::new(dir.join("presets.json"))
    }

    fn wide() -> ImagePreset {
        ImagePreset {
            aspect_ratio: Some("16:9".to_string()),
            image_type: Some("anime".to_string()),
            ..ImagePreset::default()
        }
    }

    #[test]
    fn builtins_resolve_without_a_file() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let social = store.get("builtin:social").unwrap().unwrap();
        assert_eq!(social.format().unwrap(), Some(ImageFormat::Webp));
        assert_eq!(social.size().unwrap(), Some(SizePreset::Hd));
        assert!(store.get("builtin:nope").unwrap().is_none());
        assert!(!store.path().exists());
    }

    #[test]
    fn builtins_are_read_only() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        store.save("mine", wide()).unwrap();
        let before = std::fs::read(store.path()).unwrap();

        assert!(matches!(store.save("builtin:square", wide()), Err(ErgonError::PresetReadOnly(_))));
        assert!(matches!(store.delete("builtin:square"), Err(ErgonError::PresetReadOnly(_))));
        assert!(matches!(store.save("builtin:custom", wide()), Err(ErgonError::PresetReadOnly(_))));

        assert_eq!(std::fs::read(store.path()).unwrap(), before);
    }

    #[test]
    fn save_get_delete() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());

        store.save("wide", wide()).unwrap();
        assert_eq!(store.get("wide").unwrap(), Some(wide()));

        let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["wide"]["type"], "anime");
        assert_eq!(raw["wide"]["aspectRatio"], "16:9");

        assert!(store.delete("wide").unwrap());
        assert!(!store.delete("wide").unwrap());
        assert!(matches!(store.require("wide"), Err(ErgonError::PresetNotFound(_))));
    }

    #[test]
    fn rejects_empty_and_invalid_presets() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        assert!(store.save("blank", ImagePreset::default()).is_err());

        let bad = ImagePreset {
            format: Some("bmp".to_string()),
            ..ImagePreset::default()
        };
        assert!(matches!(store.save("bad", bad), Err(ErgonError::InvalidParameter { .. })));
        assert!(!store.path().exists());
    }

    #[test]
    fn list_puts_builtins_first() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        store.save("b", wide()).unwrap();
        store.save("a", wide()).unwrap();

        let names: Vec<String> = store.list_all().unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(
            names,
            vec![
                "builtin:square",
                "builtin:landscape",
                "builtin:portrait",
                "builtin:social",
                "builtin:presentation",
                "a",
                "b",
            ]
        );
    }

    #[test]
    fn malformed_file_is_reported() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        std::fs::write(store.path(), "[1,2").unwrap();
        assert!(matches!(store.load(), Err(ErgonError::Config(_))));
    }
}
