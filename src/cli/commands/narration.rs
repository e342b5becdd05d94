use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;

use super::{resolve_language, FILE_NAME_MAX_LEN};
use crate::api::{GeminiClient, TtsClient};
use crate::audio::encode_pcm;
use crate::cli::{finish_err, finish_ok, AppContext};
use crate::config::Config;
use crate::core::{resolve_parsed, AudioFormat, ErgonError, OptionSource, Origin, Speed, SpeechParams, TtsModel, Voice};
use crate::files::{resolve_output_file, save_unique, OutputTarget, DEFAULT_MAX_RETRIES};

#[derive(Args)]
pub struct NarrationArgs {
    #[command(subcommand)]
    pub command: NarrationCommand,
}

#[derive(Subcommand)]
pub enum NarrationCommand {
    /// Synthesize speech from text
    #[command(after_help = r#"EXAMPLES:
    ergon narration gen "Welcome to the show"
    ergon narration gen "Once upon a time" -v Charon -l en -f wav -o story.wav
    ergon narration gen "Hooray!" --character "a cheerful child" --direction "shouting with joy""#)]
    Gen(NarrationGenArgs),
}

#[derive(Args)]
pub struct NarrationGenArgs {
    /// Text to speak
    pub text: String,

    /// TTS model (flash, pro)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Voice (Aoede, Charon, Fenrir, Kore, Puck)
    #[arg(short, long)]
    pub voice: Option<String>,

    /// Language (ja, en, zh, ko, es, fr, de, it, pt, ru, vi)
    #[arg(short, long)]
    pub lang: Option<String>,

    /// Audio format (wav, mp3)
    #[arg(short, long)]
    pub format: Option<String>,

    /// Speaking rate (0.25-4.0)
    #[arg(short, long)]
    pub speed: Option<String>,

    /// Who is speaking, e.g. "an old sailor"
    #[arg(long)]
    pub character: Option<String>,

    /// How it is delivered, e.g. "whispering"
    #[arg(long)]
    pub direction: Option<String>,

    /// Output file or directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print the resolved settings without calling any API
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn run(args: NarrationArgs, ctx: &AppContext) -> Result<()> {
    match args.command {
        NarrationCommand::Gen(args) => generate(args, ctx).await,
    }
}

/// Validated speech settings and whether the format came from a flag
pub fn resolve_speech_params(args: &NarrationGenArgs, config: &Config) -> Result<(SpeechParams, Origin), ErgonError> {
    let voice = resolve_parsed(
        [
            OptionSource::flag(args.voice.clone()),
            OptionSource::config(config.default_audio_voice.clone()),
        ],
        Voice::default(),
        Voice::parse,
    )?;
    let format = resolve_parsed(
        [
            OptionSource::flag(args.format.clone()),
            OptionSource::config(config.default_audio_format.clone()),
        ],
        AudioFormat::default(),
        AudioFormat::parse,
    )?;
    let language = resolve_language(args.lang.as_deref(), config)?;
    let model = args.model.as_deref().map(TtsModel::parse).transpose()?.unwrap_or_default();
    let speed = args.speed.as_deref().map(Speed::parse).transpose()?.unwrap_or_default();

    let params = SpeechParams {
        model,
        voice: voice.value,
        language: language.value,
        format: format.value,
        speed,
        character: args.character.clone().filter(|s| !s.trim().is_empty()),
        direction: args.direction.clone().filter(|s| !s.trim().is_empty()),
    };
    Ok((params, format.origin))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Narration {
    path: String,
    model: TtsModel,
    voice: Voice,
    language: String,
    format: AudioFormat,
    mime_type: &'static str,
    sample_rate: u32,
    bytes: usize,
}

async fn generate(args: NarrationGenArgs, ctx: &AppContext) -> Result<()> {
    let logger = ctx.logger("tts");
    if args.text.trim().is_empty() {
        return Err(ErgonError::invalid("text", &args.text, "non-empty text to speak").into());
    }

    let (mut params, format_origin) = resolve_speech_params(&args, &ctx.config)?;
    let explicit_format = format_origin == Origin::Flag;

    let target = OutputTarget::from_arg(args.output.as_deref()).await?;
    let fixed_output = match target.needs_name() {
        true => None,
        false => Some(resolve_output_file(&target, "", params.format, explicit_format)?),
    };

    if args.dry_run {
        let output = match &fixed_output {
            Some((path, _)) => path.display().to_string(),
            None => format!("(generated name).{}", params.format),
        };
        let info = json!({
            "dryRun": true,
            "text": args.text,
            "model": params.model,
            "modelId": params.model.model_id(),
            "voice": params.voice,
            "language": params.language,
            "format": params.format,
            "speed": params.speed.get(),
            "character": params.character,
            "direction": params.direction,
            "output": output,
        });
        ctx.emit("narration gen", &info, || {
            println!("{}", "[DRY-RUN] narration gen".yellow().bold());
            println!("  {}: {}", "Text".cyan().bold(), args.text);
            println!("  {}: {} ({})", "Model".cyan().bold(), params.model, params.model.model_id());
            println!("  {}: {}", "Voice".cyan().bold(), params.voice);
            println!("  {}: {}", "Language".cyan().bold(), params.language);
            println!("  {}: {}", "Format".cyan().bold(), params.format);
            println!("  {}: {}", "Speed".cyan().bold(), params.speed.get());
            if let Some(character) = &params.character {
                println!("  {}: {}", "Character".cyan().bold(), character);
            }
            if let Some(direction) = &params.direction {
                println!("  {}: {}", "Direction".cyan().bold(), direction);
            }
            println!("  {}: {}", "Output".cyan().bold(), output);
            println!();
            println!("{}", "No API was called. Remove --dry-run to synthesize.".dimmed());
        });
        return Ok(());
    }

    let api = ctx.api()?;
    let pb = ctx.spinner(format!("Synthesizing speech with {}...", params.voice));
    let speech = match TtsClient::new(api.clone()).synthesize(&args.text, &params).await {
        Ok(speech) => speech,
        Err(e) => {
            finish_err(pb, "Synthesis failed");
            logger.error("Speech synthesis failed", Some(json!({ "error": e.to_string() })));
            return Err(e.into());
        }
    };
    logger.debug(
        "Received speech",
        Some(json!({ "mimeType": speech.mime_type, "sampleRate": speech.sample_rate, "bytes": speech.pcm.len() })),
    );

    let (path, format) = match fixed_output {
        Some(resolved) => resolved,
        None => {
            let name = GeminiClient::new(api)
                .generate_file_name(&args.text, FILE_NAME_MAX_LEN)
                .await?;
            resolve_output_file(&target, &name, params.format, explicit_format)?
        }
    };
    params.format = format;

    let (audio, mime_type) = encode_pcm(format, &speech.pcm, speech.sample_rate)?;
    let saved = save_unique(&path, &audio, DEFAULT_MAX_RETRIES).await?;
    finish_ok(pb, "Speech generated");

    let result = Narration {
        path: saved.display().to_string(),
        model: params.model,
        voice: params.voice,
        language: params.language.to_string(),
        format,
        mime_type,
        sample_rate: speech.sample_rate,
        bytes: audio.len(),
    };
    logger.info("Generated speech", serde_json::to_value(&result).ok());

    ctx.emit("narration gen", &result, || {
        println!("{}: {}", "Saved".cyan().bold(), result.path);
        println!("{}: {}", "Voice".cyan().bold(), result.voice);
        println!("{}: {} ({} Hz)", "Format".cyan().bold(), result.format, result.sample_rate);
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Language;

    fn args(text: &str) -> NarrationGenArgs {
        NarrationGenArgs {
            text: text.to_string(),
            model: None,
            voice: None,
            lang: None,
            format: None,
            speed: None,
            character: None,
            direction: None,
            output: None,
            dry_run: false,
        }
    }

    #[test]
    fn defaults() {
        let (params, origin) = resolve_speech_params(&args("hi"), &Config::default()).unwrap();
        assert_eq!(params.model, TtsModel::Pro);
        assert_eq!(params.voice, Voice::Kore);
        assert_eq!(params.language, Language::Ja);
        assert_eq!(params.format, AudioFormat::Mp3);
        assert_eq!(params.speed.get(), 1.0);
        assert_eq!(origin, Origin::Default);
    }

    #[test]
    fn flags_then_config() {
        let config = Config {
            default_audio_voice: Some("Charon".to_string()),
            default_audio_format: Some("wav".to_string()),
            ..Config::default()
        };
        let mut a = args("hi");
        a.voice = Some("puck".to_string());
        let (params, origin) = resolve_speech_params(&a, &config).unwrap();
        assert_eq!(params.voice, Voice::Puck);
        assert_eq!(params.format, AudioFormat::Wav);
        assert_eq!(origin, Origin::Config);
    }

    #[test]
    fn rejects_bad_values() {
        let mut a = args("hi");
        a.voice = Some("Bob".to_string());
        let err = resolve_speech_params(&a, &Config::default()).unwrap_err();
        assert!(err.to_string().contains("Aoede, Charon, Fenrir, Kore, Puck"));

        let mut a = args("hi");
        a.speed = Some("5".to_string());
        assert!(resolve_speech_params(&a, &Config::default()).is_err());

        let mut a = args("hi");
        a.model = Some("ultra".to_string());
        assert!(resolve_speech_params(&a, &Config::default()).is_err());
    }

    #[test]
    fn blank_stage_directions_are_dropped() {
        let mut a = args("hi");
        a.character = Some("  ".to_string());
        a.direction = Some("calm".to_string());
        let (params, _) = resolve_speech_params(&a, &Config::default()).unwrap();
        assert!(params.character.is_none());
        assert_eq!(params.direction.as_deref(), Some("calm"));
    }
}
