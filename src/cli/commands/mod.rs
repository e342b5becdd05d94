pub mod caption;
pub mod catalog;
pub mod config;
pub mod image;
pub mod log;
pub mod narration;
pub mod preset;
pub mod video;

use anyhow::{Context, Result};
use std::path::Path;

use crate::config::Config;
use crate::core::{resolve_parsed, ErgonError, Language, OptionSource, Resolved};

/// Max length of generated file names
pub const FILE_NAME_MAX_LEN: usize = 40;

/// `--context`: a `.md` path is read as a file, anything else is used literally
pub async fn load_context(value: Option<&str>) -> Result<Option<String>> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };

    let is_markdown = Path::new(value)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("md"));

    if is_markdown {
        let text = tokio::fs::read_to_string(value)
            .await
            .with_context(|| format!("Failed to read context file {}", value))?;
        return Ok(Some(text));
    }
    Ok(Some(value.to_string()))
}

/// Language: flag, then config, then the built-in default
pub fn resolve_language(flag: Option<&str>, config: &Config) -> Result<Resolved<Language>, ErgonError> {
    resolve_parsed(
        [
            OptionSource::flag(flag.map(str::to_string)),
            OptionSource::config(config.default_language.clone()),
        ],
        Language::default(),
        Language::parse,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Origin;
    use tempfile::tempdir;

    #[tokio::test]
    async fn context_reads_markdown_files_only() {
        let dir = tempdir().unwrap();
        let md = dir.path().join("brief.MD");
        std::fs::write(&md, "# Brief\nCats only").unwrap();

        let loaded = load_context(Some(md.to_str().unwrap())).await.unwrap();
        assert_eq!(loaded.as_deref(), Some("# Brief\nCats only"));

        let literal = load_context(Some("office photos for the team page")).await.unwrap();
        assert_eq!(literal.as_deref(), Some("office photos for the team page"));

        assert!(load_context(None).await.unwrap().is_none());
        assert!(load_context(Some("  ")).await.unwrap().is_none());
        assert!(load_context(Some("missing.md")).await.is_err());
    }

    #[test]
    fn language_precedence() {
        let config = Config {
            default_language: Some("en".to_string()),
            ..Config::default()
        };
        let flag = resolve_language(Some("ko"), &config).unwrap();
        assert_eq!((flag.value, flag.origin), (Language::Ko, Origin::Flag));

        let from_config = resolve_language(None, &config).unwrap();
        assert_eq!((from_config.value, from_config.origin), (Language::En, Origin::Config));

        let default = resolve_language(None, &Config::default()).unwrap();
        assert_eq!((default.value, default.origin), (Language::Ja, Origin::Default));

        assert!(resolve_language(Some("xx"), &config).is_err());
    }
}
