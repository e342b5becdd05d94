use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};

use super::{load_context, resolve_language, FILE_NAME_MAX_LEN};
use crate::api::{load_image, GeminiClient, ImagenClient, MediaData, NanoBananaClient};
use crate::cli::{finish_err, finish_ok, AppContext};
use crate::config::Config;
use crate::core::{
    resolve_parsed, AspectRatio, ErgonError, ImageEngine, ImageFormat, ImageParams, ImageType, OptionSource, Origin,
    Quality, SizePreset, TextFormat,
};
use crate::files::{resolve_output_file, save_unique, OutputTarget, DEFAULT_MAX_RETRIES};
use crate::media::transcode;
use crate::presets::ImagePreset;

#[derive(Args)]
pub struct ImageArgs {
    #[command(subcommand)]
    pub command: ImageCommand,
}

#[derive(Subcommand)]
pub enum ImageCommand {
    /// Generate an image from a theme
    ///
    /// The theme is expanded into a full prompt in the chosen style, then
    /// rendered by the selected engine.
    #[command(after_help = r#"EXAMPLES:
    ergon image gen "a lighthouse at night"
    ergon image gen "team offsite" -t corporate -a 16:9 -f jpg -q 85
    ergon image gen "app icon" -e nano-banana-pro -o icons/
    ergon image gen "banner" -p builtin:presentation --dry-run"#)]
    Gen(ImageGenArgs),

    /// Edit an existing image with an instruction
    #[command(after_help = r#"EXAMPLES:
    ergon image edit photo.png "remove the chair in the corner"
    ergon image edit logo.png "make it monochrome" -e nano-banana-pro -o logo-mono.png"#)]
    Edit(ImageEditArgs),

    /// Explain the contents of an image
    Explain(ImageExplainArgs),
}

impl ImageCommand {
    pub fn name(&self) -> &'static str {
        match self {
            ImageCommand::Gen(_) => "image gen",
            ImageCommand::Edit(_) => "image edit",
            ImageCommand::Explain(_) => "image explain",
        }
    }
}

/// Image options that can also come from a preset or the config file
#[derive(Args, Debug, Default, Clone)]
pub struct ImageOptionFlags {
    /// Engine (imagen4, imagen4-fast, imagen4-ultra, nano-banana, nano-banana-pro)
    #[arg(short, long)]
    pub engine: Option<String>,

    /// Output format (png, jpg, jpeg, webp)
    #[arg(short, long)]
    pub format: Option<String>,

    /// Aspect ratio (1:1, 3:4, 4:3, 9:16, 16:9)
    #[arg(short, long)]
    pub aspect_ratio: Option<String>,

    /// Style (realistic, illustration, flat, anime, watercolor, oil-painting, pixel-art, sketch, 3d-render, corporate, minimal, pop-art)
    #[arg(short = 't', long = "type")]
    pub image_type: Option<String>,

    /// Size preset (tiny, hd, fullhd, 2k, 4k)
    #[arg(short, long)]
    pub size: Option<String>,

    /// JPEG quality (1-100)
    #[arg(short, long)]
    pub quality: Option<String>,
}

#[derive(Args)]
pub struct ImageGenArgs {
    /// What the image should show
    pub theme: String,

    #[command(flatten)]
    pub options: ImageOptionFlags,

    /// Preset name (see `ergon preset list`)
    #[arg(short, long)]
    pub preset: Option<String>,

    /// Context text, or a path to a .md file
    #[arg(short, long)]
    pub context: Option<String>,

    /// Output file or directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print the resolved settings without calling any API
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct ImageEditArgs {
    /// Image to edit
    pub image: PathBuf,

    /// What to change
    pub instruction: String,

    /// Engine (nano-banana, nano-banana-pro)
    #[arg(short, long)]
    pub engine: Option<String>,

    /// Output format (png, jpg, jpeg, webp)
    #[arg(short, long)]
    pub format: Option<String>,

    /// Aspect ratio of the result (defaults to the input's)
    #[arg(short, long)]
    pub aspect_ratio: Option<String>,

    /// Output file or directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print the resolved settings without calling any API
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct ImageExplainArgs {
    /// Image to explain
    pub image: PathBuf,

    /// Answer language (ja, en, zh, ko, es, fr, de, it, pt, ru, vi)
    #[arg(short, long)]
    pub lang: Option<String>,

    /// Context text, or a path to a .md file
    #[arg(short, long)]
    pub context: Option<String>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown")]
    pub format: String,
}

pub async fn run(args: ImageArgs, ctx: &AppContext) -> Result<()> {
    match args.command {
        ImageCommand::Gen(args) => generate(args, ctx).await,
        ImageCommand::Edit(args) => edit(args, ctx).await,
        ImageCommand::Explain(args) => explain(args, ctx).await,
    }
}

/// Resolved image settings plus whether the format was given explicitly
#[derive(Debug)]
pub struct ResolvedImageOptions {
    pub params: ImageParams,
    pub format_origin: Origin,
}

/// flag > preset > config > default for engine, format and aspect ratio;
/// flag > preset > default for type, size and quality
pub fn resolve_image_options(
    flags: &ImageOptionFlags,
    preset: Option<&ImagePreset>,
    config: &Config,
) -> Result<ResolvedImageOptions, ErgonError> {
    let from_preset = |pick: fn(&ImagePreset) -> Option<String>| OptionSource::preset(preset.and_then(pick));

    let engine = resolve_parsed(
        [
            OptionSource::flag(flags.engine.clone()),
            from_preset(|p| p.engine.clone()),
            OptionSource::config(config.default_image_engine.clone()),
        ],
        ImageEngine::default(),
        ImageEngine::parse,
    )?;
    let format = resolve_parsed(
        [
            OptionSource::flag(flags.format.clone()),
            from_preset(|p| p.format.clone()),
            OptionSource::config(config.default_image_format.clone()),
        ],
        ImageFormat::default(),
        ImageFormat::parse,
    )?;
    let aspect_ratio = resolve_parsed(
        [
            OptionSource::flag(flags.aspect_ratio.clone()),
            from_preset(|p| p.aspect_ratio.clone()),
            OptionSource::config(config.default_aspect_ratio.clone()),
        ],
        AspectRatio::default(),
        AspectRatio::parse,
    )?;
    let image_type = resolve_parsed(
        [
            OptionSource::flag(flags.image_type.clone()),
            from_preset(|p| p.image_type.clone()),
        ],
        ImageType::default(),
        ImageType::parse,
    )?;
    let size = resolve_parsed(
        [OptionSource::flag(flags.size.clone()), from_preset(|p| p.size.clone())],
        SizePreset::default(),
        SizePreset::parse,
    )?;
    let quality = resolve_parsed(
        [
            OptionSource::flag(flags.quality.clone()),
            from_preset(|p| p.quality.map(|q| q.to_string())),
        ],
        Quality::default(),
        Quality::parse,
    )?;

    tracing::debug!(
        "Image options: engine={} ({}), format={} ({}), aspect={} ({})",
        engine.value,
        engine.origin,
        format.value,
        format.origin,
        aspect_ratio.value,
        aspect_ratio.origin
    );

    Ok(ResolvedImageOptions {
        params: ImageParams::default()
            .with_engine(engine.value)
            .with_format(format.value)
            .with_aspect_ratio(aspect_ratio.value)
            .with_type(image_type.value)
            .with_size(size.value)
            .with_quality(quality.value),
        format_origin: format.origin,
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedImage {
    path: String,
    #[serde(flatten)]
    params: ImageParams,
    #[serde(skip_serializing_if = "Option::is_none")]
    preset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    prompt: Option<String>,
}

async fn generate(args: ImageGenArgs, ctx: &AppContext) -> Result<()> {
    let logger = ctx.logger("image-gen");

    let preset = match &args.preset {
        Some(name) => Some(ctx.presets().require(name)?),
        None => None,
    };
    let ResolvedImageOptions { mut params, format_origin } =
        resolve_image_options(&args.options, preset.as_ref(), &ctx.config)?;
    let explicit_format = format_origin == Origin::Flag;

    let target = OutputTarget::from_arg(args.output.as_deref()).await?;
    let fixed_output = match target.needs_name() {
        true => None,
        false => Some(resolve_output_file(&target, "", params.format, explicit_format)?),
    };

    if args.dry_run {
        let output = output_preview(&fixed_output, params.format);
        let (width, height) = params.size.dimensions();
        let info = json!({
            "dryRun": true,
            "theme": args.theme,
            "engine": params.engine,
            "model": params.engine.model_id(),
            "format": params.format,
            "aspectRatio": params.aspect_ratio,
            "imageType": params.image_type,
            "size": params.size,
            "targetSize": format!("{}x{}", width, height),
            "quality": params.quality,
            "output": output,
            "preset": args.preset,
            "context": args.context,
        });
        ctx.emit("image gen", &info, || {
            println!("{}", "[DRY-RUN] image gen".yellow().bold());
            println!("  {}: {}", "Theme".cyan().bold(), args.theme);
            if let Some(preset) = &args.preset {
                println!("  {}: {}", "Preset".cyan().bold(), preset);
            }
            println!("  {}: {} ({})", "Engine".cyan().bold(), params.engine, params.engine.model_id());
            println!("  {}: {}", "Format".cyan().bold(), params.format);
            println!("  {}: {}", "Aspect Ratio".cyan().bold(), params.aspect_ratio);
            println!("  {}: {}", "Type".cyan().bold(), params.image_type);
            println!("  {}: {} ({}x{})", "Size".cyan().bold(), params.size, width, height);
            if let Some(context) = &args.context {
                println!("  {}: {}", "Context".cyan().bold(), context);
            }
            println!("  {}: {}", "Output".cyan().bold(), output);
            println!();
            println!("{}", "No API was called. Remove --dry-run to generate.".dimmed());
        });
        return Ok(());
    }

    let api = ctx.api()?;
    let gemini = GeminiClient::new(api.clone());
    let context = load_context(args.context.as_deref()).await?;

    let pb = ctx.spinner("Writing prompt...");
    let result: Result<(MediaData, String)> = async {
        let prompt = gemini
            .generate_prompt(&args.theme, context.as_deref(), params.image_type)
            .await
            .context("Failed to generate prompt")?;
        logger.debug("Generated prompt", Some(json!({ "theme": args.theme, "prompt": prompt })));

        if let Some(pb) = &pb {
            pb.set_message(format!("Generating image with {}...", params.engine));
        }
        let image = if params.engine.is_nano_banana() {
            NanoBananaClient::new(api.clone(), params.engine)?
                .generate(&prompt, params.aspect_ratio)
                .await?
        } else {
            ImagenClient::new(api.clone()).generate(&prompt, &params).await?
        };
        Ok((image, prompt))
    }
    .await;

    let (image, prompt) = match result {
        Ok(done) => done,
        Err(e) => {
            finish_err(pb, "Generation failed");
            return Err(e);
        }
    };

    let (path, format) = match fixed_output {
        Some(resolved) => resolved,
        None => {
            let name = gemini.generate_file_name(&args.theme, FILE_NAME_MAX_LEN).await?;
            resolve_output_file(&target, &name, params.format, explicit_format)?
        }
    };
    params.format = format;

    let bytes = transcode(image.bytes, &image.mime_type, format, params.quality)?;
    let saved = save_unique(&path, &bytes, DEFAULT_MAX_RETRIES).await?;
    finish_ok(pb, "Image generated");

    let result = GeneratedImage {
        path: saved.display().to_string(),
        params,
        preset: args.preset.clone(),
        prompt: Some(prompt),
    };
    logger.info("Generated image", serde_json::to_value(&result).ok());

    ctx.emit("image gen", &result, || {
        println!("{}: {}", "Saved".cyan().bold(), result.path);
        println!("{}: {}", "Engine".cyan().bold(), result.params.engine);
        println!("{}: {}", "Aspect Ratio".cyan().bold(), result.params.aspect_ratio);
        println!("{}: {}", "Type".cyan().bold(), result.params.image_type);
    });
    Ok(())
}

fn output_preview(fixed: &Option<(PathBuf, ImageFormat)>, format: ImageFormat) -> String {
    match fixed {
        Some((path, _)) => path.display().to_string(),
        None => format!("(generated name).{}", format.extension()),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EditedImage {
    path: String,
    source: String,
    engine: ImageEngine,
    format: ImageFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    aspect_ratio: Option<AspectRatio>,
}

/// A missing input is a parameter error; other I/O failures pass through
async fn require_input_image(path: &Path) -> Result<(), ErgonError> {
    if tokio::fs::try_exists(path).await? {
        return Ok(());
    }
    Err(ErgonError::invalid("input image", path.display().to_string(), "an existing image file"))
}

async fn edit(args: ImageEditArgs, ctx: &AppContext) -> Result<()> {
    let logger = ctx.logger("image-edit");

    let engine = match &args.engine {
        Some(value) => ImageEngine::parse(value)?,
        None => ImageEngine::NanoBanana,
    };
    if !engine.is_nano_banana() {
        return Err(ErgonError::invalid("image engine", engine.as_str(), "nano-banana, nano-banana-pro").into());
    }
    let format = resolve_parsed(
        [
            OptionSource::flag(args.format.clone()),
            OptionSource::config(ctx.config.default_image_format.clone()),
        ],
        ImageFormat::default(),
        ImageFormat::parse,
    )?;
    let aspect_ratio = args.aspect_ratio.as_deref().map(AspectRatio::parse).transpose()?;
    let explicit_format = format.origin == Origin::Flag;

    require_input_image(&args.image).await?;

    let target = OutputTarget::from_arg(args.output.as_deref()).await?;
    let fixed_output = match target.needs_name() {
        true => None,
        false => Some(resolve_output_file(&target, "", format.value, explicit_format)?),
    };

    if args.dry_run {
        let output = output_preview(&fixed_output, format.value);
        let info = json!({
            "dryRun": true,
            "input": args.image.display().to_string(),
            "instruction": args.instruction,
            "engine": engine,
            "format": format.value,
            "aspectRatio": aspect_ratio,
            "output": output,
        });
        ctx.emit("image edit", &info, || {
            println!("{}", "[DRY-RUN] image edit".yellow().bold());
            println!("  {}: {}", "Input".cyan().bold(), args.image.display());
            println!("  {}: {}", "Instruction".cyan().bold(), args.instruction);
            println!("  {}: {}", "Engine".cyan().bold(), engine);
            println!("  {}: {}", "Format".cyan().bold(), format.value);
            if let Some(ar) = aspect_ratio {
                println!("  {}: {}", "Aspect Ratio".cyan().bold(), ar);
            }
            println!("  {}: {}", "Output".cyan().bold(), output);
            println!();
            println!("{}", "No API was called. Remove --dry-run to edit.".dimmed());
        });
        return Ok(());
    }

    let api = ctx.api()?;
    let input = load_image(&args.image).await?;

    let pb = ctx.spinner(format!("Editing image with {}...", engine));
    let edited = match NanoBananaClient::new(api.clone(), engine)?
        .edit(&input, &args.instruction, aspect_ratio)
        .await
    {
        Ok(image) => image,
        Err(e) => {
            finish_err(pb, "Edit failed");
            return Err(e.into());
        }
    };

    let (path, format) = match fixed_output {
        Some(resolved) => resolved,
        None => {
            let name = GeminiClient::new(api)
                .generate_file_name(&args.instruction, FILE_NAME_MAX_LEN)
                .await?;
            resolve_output_file(&target, &name, format.value, explicit_format)?
        }
    };

    let bytes = transcode(edited.bytes, &edited.mime_type, format, Quality::default())?;
    let saved = save_unique(&path, &bytes, DEFAULT_MAX_RETRIES).await?;
    finish_ok(pb, "Image edited");

    let result = EditedImage {
        path: saved.display().to_string(),
        source: args.image.display().to_string(),
        engine,
        format,
        aspect_ratio,
    };
    logger.info("Edited image", serde_json::to_value(&result).ok());

    ctx.emit("image edit", &result, || {
        println!("{}: {}", "Saved".cyan().bold(), result.path);
        println!("{}: {}", "Source".cyan().bold(), result.source);
        println!("{}: {}", "Engine".cyan().bold(), result.engine);
    });
    Ok(())
}

#[derive(Serialize)]
struct Explanation {
    file: String,
    explanation: String,
}

async fn explain(args: ImageExplainArgs, ctx: &AppContext) -> Result<()> {
    let logger = ctx.logger("image-explain");
    let format = TextFormat::parse(&args.format)?;
    let language = resolve_language(args.lang.as_deref(), &ctx.config)?;

    let api = ctx.api()?;
    let context = load_context(args.context.as_deref()).await?;
    let image = load_image(&args.image).await?;

    let pb = ctx.spinner("Analyzing image...");
    let explanation = match GeminiClient::new(api)
        .explain_image(&image, language.value, context.as_deref())
        .await
    {
        Ok(text) => text,
        Err(e) => {
            finish_err(pb, "Explanation failed");
            return Err(e.into());
        }
    };
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let result = Explanation {
        file: args.image.display().to_string(),
        explanation,
    };
    logger.info("Explained image", Some(json!({ "file": result.file, "language": language.value })));

    ctx.emit("image explain", &result, || match format {
        TextFormat::Markdown => println!("# {}\n\n{}", result.file, result.explanation),
        TextFormat::Json => println!("{}", serde_json::to_string_pretty(&result).unwrap_or_default()),
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags() -> ImageOptionFlags {
        ImageOptionFlags::default()
    }

    #[test]
    fn defaults_without_any_source() {
        let resolved = resolve_image_options(&flags(), None, &Config::default()).unwrap();
        assert_eq!(resolved.params.engine, ImageEngine::Imagen4);
        assert_eq!(resolved.params.format, ImageFormat::Png);
        assert_eq!(resolved.params.aspect_ratio, AspectRatio::Square);
        assert_eq!(resolved.params.size, SizePreset::FullHd);
        assert_eq!(resolved.format_origin, Origin::Default);
    }

    #[test]
    fn flag_beats_preset_beats_config() {
        let config = Config {
            default_image_format: Some("jpg".to_string()),
            default_aspect_ratio: Some("4:3".to_string()),
            default_image_engine: Some("imagen4-fast".to_string()),
            ..Config::default()
        };
        let preset = ImagePreset {
            aspect_ratio: Some("9:16".to_string()),
            format: Some("webp".to_string()),
            quality: Some(70),
            ..ImagePreset::default()
        };
        let mut flags = flags();
        flags.format = Some("png".to_string());

        let resolved = resolve_image_options(&flags, Some(&preset), &config).unwrap();
        assert_eq!(resolved.params.format, ImageFormat::Png);
        assert_eq!(resolved.format_origin, Origin::Flag);
        assert_eq!(resolved.params.aspect_ratio, AspectRatio::Portrait9x16);
        assert_eq!(resolved.params.engine, ImageEngine::Imagen4Fast);
        assert_eq!(resolved.params.quality.get(), 70);

        let without_preset = resolve_image_options(&flags, None, &config).unwrap();
        assert_eq!(without_preset.params.aspect_ratio, AspectRatio::Landscape4x3);
    }

    #[test]
    fn invalid_flag_fails_before_anything_else() {
        let mut flags = flags();
        flags.aspect_ratio = Some("2:1".to_string());
        let err = resolve_image_options(&flags, None, &Config::default()).unwrap_err();
        assert!(err.to_string().contains("2:1"));

        let mut flags = ImageOptionFlags::default();
        flags.quality = Some("0".to_string());
        assert!(resolve_image_options(&flags, None, &Config::default()).is_err());
    }

    #[test]
    fn dry_run_preview_names_output() {
        assert_eq!(output_preview(&None, ImageFormat::Webp), "(generated name).webp");
        let fixed = Some((PathBuf::from("a/b.png"), ImageFormat::Png));
        assert_eq!(output_preview(&fixed, ImageFormat::Png), "a/b.png");
    }

    #[tokio::test]
    async fn input_image_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let photo = dir.path().join("photo.png");
        std::fs::write(&photo, b"png").unwrap();
        require_input_image(&photo).await.unwrap();

        let missing = require_input_image(&dir.path().join("missing.png")).await.unwrap_err();
        assert!(matches!(missing, ErgonError::InvalidParameter { .. }));

        let under_a_file = require_input_image(&photo.join("nested.png")).await.unwrap_err();
        assert!(matches!(under_a_file, ErgonError::Io(_)));
    }
}
