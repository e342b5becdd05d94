use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;

use super::FILE_NAME_MAX_LEN;
use crate::api::{load_image, GeminiClient, VideoClient};
use crate::cli::{finish_err, finish_ok, AppContext};
use crate::core::{ErgonError, VideoAspectRatio, VideoDuration, VideoEngine, VideoParams, VideoResolution};
use crate::files::{resolve_output_file, save_unique, Mp4, OutputTarget, DEFAULT_MAX_RETRIES};

#[derive(Args)]
pub struct VideoArgs {
    /// What the video should show
    pub prompt: String,

    /// Engine (veo-3.1, veo-3.1-fast)
    #[arg(short, long)]
    pub engine: Option<String>,

    /// Shorthand for --engine veo-3.1-fast
    #[arg(long, conflicts_with = "engine")]
    pub fast: bool,

    /// Length in seconds (5-8)
    #[arg(short, long)]
    pub duration: Option<String>,

    /// Resolution (720p, 1080p)
    #[arg(short, long)]
    pub resolution: Option<String>,

    /// Aspect ratio (16:9, 9:16)
    #[arg(short, long)]
    pub aspect_ratio: Option<String>,

    /// Image to use as the first frame
    #[arg(short, long)]
    pub image: Option<PathBuf>,

    /// Output file or directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn resolve_video_params(args: &VideoArgs) -> Result<VideoParams, ErgonError> {
    let engine = match (&args.engine, args.fast) {
        (_, true) => VideoEngine::Veo31Fast,
        (Some(value), false) => VideoEngine::parse(value)?,
        (None, false) => VideoEngine::default(),
    };
    Ok(VideoParams {
        engine,
        duration: args.duration.as_deref().map(VideoDuration::parse).transpose()?.unwrap_or_default(),
        resolution: args.resolution.as_deref().map(VideoResolution::parse).transpose()?.unwrap_or_default(),
        aspect_ratio: args.aspect_ratio.as_deref().map(VideoAspectRatio::parse).transpose()?.unwrap_or_default(),
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedVideo {
    path: String,
    #[serde(flatten)]
    params: VideoParams,
    #[serde(skip_serializing_if = "Option::is_none")]
    first_frame: Option<String>,
    bytes: usize,
}

pub async fn run(args: VideoArgs, ctx: &AppContext) -> Result<()> {
    let logger = ctx.logger("video");
    if args.prompt.trim().is_empty() {
        return Err(ErgonError::invalid("prompt", &args.prompt, "a non-empty description").into());
    }
    let params = resolve_video_params(&args)?;

    let target = OutputTarget::from_arg(args.output.as_deref()).await?;
    let fixed_output = match target.needs_name() {
        true => None,
        false => Some(resolve_output_file(&target, "", Mp4, true)?.0),
    };

    let api = ctx.api()?;
    let first_frame = match &args.image {
        Some(path) => Some(load_image(path).await?),
        None => None,
    };

    logger.debug("Starting video generation", serde_json::to_value(&params).ok());
    let pb = ctx.spinner(format!(
        "Generating {}s video with {} (this can take a few minutes)...",
        params.duration.seconds(),
        params.engine
    ));
    let video = match VideoClient::new(api.clone())
        .generate(&args.prompt, &params, first_frame.as_ref())
        .await
    {
        Ok(video) => video,
        Err(e) => {
            finish_err(pb, "Video generation failed");
            logger.error("Video generation failed", Some(json!({ "error": e.to_string() })));
            return Err(e.into());
        }
    };

    let path = match fixed_output {
        Some(path) => path,
        None => {
            let name = GeminiClient::new(api)
                .generate_file_name(&args.prompt, FILE_NAME_MAX_LEN)
                .await?;
            resolve_output_file(&target, &name, Mp4, true)?.0
        }
    };
    let saved = save_unique(&path, &video.bytes, DEFAULT_MAX_RETRIES).await?;
    finish_ok(pb, "Video generated");

    let result = GeneratedVideo {
        path: saved.display().to_string(),
        params,
        first_frame: args.image.as_ref().map(|p| p.display().to_string()),
        bytes: video.bytes.len(),
    };
    logger.info("Generated video", serde_json::to_value(&result).ok());

    ctx.emit("video", &result, || {
        println!("{}: {}", "Saved".cyan().bold(), result.path);
        println!("{}: {}", "Engine".cyan().bold(), result.params.engine);
        println!(
            "{}: {}s, {}, {}",
            "Video".cyan().bold(),
            result.params.duration.seconds(),
            result.params.resolution,
            result.params.aspect_ratio
        );
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: VideoArgs,
    }

    fn parse(argv: &[&str]) -> VideoArgs {
        let mut full = vec!["video"];
        full.extend_from_slice(argv);
        Harness::try_parse_from(full).unwrap().args
    }

    #[test]
    fn defaults() {
        let params = resolve_video_params(&parse(&["waves"])).unwrap();
        assert_eq!(params.engine, VideoEngine::Veo31);
        assert_eq!(params.duration.seconds(), 8);
        assert_eq!(params.resolution, VideoResolution::P1080);
        assert_eq!(params.aspect_ratio, VideoAspectRatio::Landscape);
    }

    #[test]
    fn fast_selects_fast_engine() {
        let params = resolve_video_params(&parse(&["waves", "--fast", "-d", "5", "-a", "9:16"])).unwrap();
        assert_eq!(params.engine, VideoEngine::Veo31Fast);
        assert_eq!(params.duration.seconds(), 5);
        assert_eq!(params.aspect_ratio, VideoAspectRatio::Portrait);
    }

    #[test]
    fn fast_conflicts_with_engine() {
        let result = Harness::try_parse_from(["video", "waves", "--fast", "-e", "veo-3.1"]);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(resolve_video_params(&parse(&["waves", "-d", "10"])).is_err());
        assert!(resolve_video_params(&parse(&["waves", "-r", "4k"])).is_err());
        assert!(resolve_video_params(&parse(&["waves", "-a", "1:1"])).is_err());
    }
}
