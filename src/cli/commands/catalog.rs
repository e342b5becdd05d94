use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use futures_util::stream::{self, StreamExt};
use serde_json::json;
use std::future::Future;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use super::caption::Caption;
use super::{load_context, resolve_language};
use crate::api::{load_image, GeminiClient, InlineData};
use crate::cli::{finish_ok, AppContext};
use crate::core::{ErgonError, Language, TextFormat};
use crate::logging::Logger;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "heic", "heif"];
pub const DEFAULT_CONCURRENCY: usize = 8;

#[derive(Args)]
pub struct CatalogArgs {
    /// Directory to scan recursively
    pub dir: PathBuf,

    /// Write the catalog to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Caption language (ja, en, zh, ko, es, fr, de, it, pt, ru, vi)
    #[arg(short, long)]
    pub lang: Option<String>,

    /// Context text, or a path to a .md file
    #[arg(short, long)]
    pub context: Option<String>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown")]
    pub format: String,

    /// Max caption requests in flight
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,
}

pub fn is_catalog_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

/// Every image file under `dir`, sorted by path
pub fn collect_images(dir: &Path) -> Vec<PathBuf> {
    let mut images: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_catalog_image(e.path()))
        .map(|e| e.into_path())
        .collect();
    images.sort();
    images
}

/// `target` relative to `base`, with `..` where the paths diverge
pub fn relative_path(target: &Path, base: &Path) -> PathBuf {
    let target: Vec<Component> = target.components().filter(|c| *c != Component::CurDir).collect();
    let base: Vec<Component> = base.components().filter(|c| *c != Component::CurDir).collect();
    let common = target.iter().zip(&base).take_while(|(a, b)| a == b).count();

    let mut relative = PathBuf::new();
    for _ in common..base.len() {
        relative.push("..");
    }
    for component in &target[common..] {
        relative.push(component.as_os_str());
    }
    relative
}

/// Markdown link target for an image, relative to the catalog's directory
pub fn link_path(image: &Path, output_dir: &Path) -> String {
    relative_path(image, output_dir).to_string_lossy().replace('\\', "/")
}

pub fn markdown_entry(caption: &Caption, link: &str) -> String {
    format!("---\n\n# {}\n\n{}\n![]({})\n\n", caption.file, caption.caption, link)
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("Failed to resolve {}", path.display()))
}

async fn caption_image(
    gemini: &GeminiClient,
    path: PathBuf,
    language: Language,
    context: Option<&str>,
) -> Result<String, ErgonError> {
    let image: InlineData = load_image(&path).await?;
    gemini.generate_caption(&image, language, context).await
}

/// Captions `images` with at most `concurrency` in flight. Failed images are
/// logged and dropped; the rest come back sorted by path.
pub async fn caption_all<F, Fut>(images: Vec<PathBuf>, concurrency: usize, logger: &Logger, caption: F) -> Vec<Caption>
where
    F: Fn(PathBuf) -> Fut,
    Fut: Future<Output = Result<String, ErgonError>>,
{
    let mut captions: Vec<Caption> = stream::iter(images)
        .map(|path| {
            let pending = caption(path.clone());
            async move { (path, pending.await) }
        })
        .buffer_unordered(concurrency)
        .filter_map(|(path, result)| async move {
            match result {
                Ok(text) => {
                    logger.debug("Captioned image", Some(json!({ "file": path })));
                    Some(Caption {
                        file: path.display().to_string(),
                        caption: text,
                    })
                }
                Err(e) => {
                    logger.error("Failed to caption image", Some(json!({ "file": path, "error": e.to_string() })));
                    None
                }
            }
        })
        .collect()
        .await;
    captions.sort_by(|a, b| a.file.cmp(&b.file));
    captions
}

pub async fn run(args: CatalogArgs, ctx: &AppContext) -> Result<()> {
    let logger = ctx.logger("catalog");
    let format = TextFormat::parse(&args.format)?;
    let language = resolve_language(args.lang.as_deref(), &ctx.config)?;
    if args.concurrency == 0 {
        return Err(ErgonError::invalid("concurrency", "0", "1 or more").into());
    }
    if !args.dir.is_dir() {
        return Err(ErgonError::invalid("directory", args.dir.display().to_string(), "an existing directory").into());
    }

    let api = ctx.api()?;
    let context = load_context(args.context.as_deref()).await?;
    let images = collect_images(&args.dir);
    logger.info(
        "Cataloging directory",
        Some(json!({ "dir": args.dir, "images": images.len(), "concurrency": args.concurrency })),
    );

    let total = images.len();
    let pb = ctx.spinner(format!("Captioning {} images...", total));
    let gemini = GeminiClient::new(api);
    let captions = caption_all(images, args.concurrency, &logger, |path| {
        caption_image(&gemini, path, language.value, context.as_deref())
    })
    .await;
    finish_ok(pb, format!("Captioned {} of {} images", captions.len(), total));

    let rendered = match format {
        TextFormat::Json => serde_json::to_string_pretty(&captions)?,
        TextFormat::Markdown => {
            let output_dir = match args.output.as_deref().and_then(Path::parent) {
                Some(parent) => absolute(parent)?,
                None => absolute(Path::new("."))?,
            };
            let mut markdown = String::new();
            for caption in &captions {
                let link = link_path(&absolute(Path::new(&caption.file))?, &output_dir);
                markdown.push_str(&markdown_entry(caption, &link));
            }
            markdown
        }
    };

    match &args.output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(path, &rendered)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            let result = json!({
                "output": path.display().to_string(),
                "images": total,
                "captioned": captions.len(),
            });
            logger.info("Wrote catalog", Some(result.clone()));
            ctx.emit("catalog", &result, || {
                println!("{}: {}", "Saved".cyan().bold(), path.display());
                println!("{}: {} of {}", "Captioned".cyan().bold(), captions.len(), total);
            });
        }
        None => ctx.emit("catalog", &captions, || print!("{}", rendered)),
    }
    Ok(())
}
