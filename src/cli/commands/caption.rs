use anyhow::Result;
use clap::Args;
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;

use super::{load_context, resolve_language};
use crate::api::{load_image, GeminiClient};
use crate::cli::{finish_err, AppContext};
use crate::core::TextFormat;

#[derive(Args)]
pub struct CaptionArgs {
    /// Image to caption
    pub image: PathBuf,

    /// Caption language (ja, en, zh, ko, es, fr, de, it, pt, ru, vi)
    #[arg(short, long)]
    pub lang: Option<String>,

    /// Context text, or a path to a .md file
    #[arg(short, long)]
    pub context: Option<String>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown")]
    pub format: String,
}

#[derive(Debug, Serialize)]
pub struct Caption {
    pub file: String,
    pub caption: String,
}

impl Caption {
    pub fn to_markdown(&self) -> String {
        format!("# {}\n\n{}", self.file, self.caption)
    }
}

pub async fn run(args: CaptionArgs, ctx: &AppContext) -> Result<()> {
    let logger = ctx.logger("caption");
    let format = TextFormat::parse(&args.format)?;
    let language = resolve_language(args.lang.as_deref(), &ctx.config)?;

    let api = ctx.api()?;
    let context = load_context(args.context.as_deref()).await?;
    let image = load_image(&args.image).await?;

    let pb = ctx.spinner("Captioning image...");
    let caption = match GeminiClient::new(api)
        .generate_caption(&image, language.value, context.as_deref())
        .await
    {
        Ok(text) => text,
        Err(e) => {
            finish_err(pb, "Caption failed");
            logger.error("Caption failed", Some(json!({ "file": args.image, "error": e.to_string() })));
            return Err(e.into());
        }
    };
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let result = Caption {
        file: args.image.display().to_string(),
        caption,
    };
    logger.info("Captioned image", Some(json!({ "file": result.file, "language": language.value })));

    ctx.emit("caption", &result, || match format {
        TextFormat::Markdown => println!("{}", result.to_markdown()),
        TextFormat::Json => println!("{}", serde_json::to_string_pretty(&result).unwrap_or_default()),
    });
    Ok(())
}
