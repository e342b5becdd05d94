pub mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::api::ApiClient;
use crate::config::{ergon_home, Config};
use crate::core::options::process_env;
use crate::core::{ErgonError, JsonOutput};
use crate::logging::{LogDestination, LogLevel, LogRegistry, Logger, LoggerConfig};
use crate::presets::PresetStore;

#[derive(Parser)]
#[command(
    name = "ergon",
    version,
    about = "Generate images, video, narration and captions with Google Gemini",
    long_about = r#"Generate images, video, narration and captions with Google Gemini

SETUP:
  Set your API key via environment variable or config:
    export GOOGLE_API_KEY=your-key-here
    ergon config set googleApiKey your-key-here

EXAMPLES:
  Images:
    ergon image gen "a fox in the snow" -t watercolor -a 16:9
    ergon image gen "product shot" -p builtin:social -o shots/
    ergon image edit photo.png "make the sky purple"
    ergon image explain screenshot.png -l en

  Video:
    ergon video "waves on a beach at dusk" --fast -d 6

  Narration:
    ergon narration gen "Welcome aboard" -v Puck -f wav

  Captions:
    ergon caption photo.jpg
    ergon catalog ./photos -o catalog.md

OUTPUT:
  --json   Print a {success, command, result} envelope for scripts and agents
  --debug  Verbose diagnostics and console logging"#,
    after_help = r#"FILES:
  Config:  ~/.ergon/config.json
  Presets: ~/.ergon/presets.json
  Logs:    ~/.ergon/logs/<component>-<date>.log
  Set ERGON_HOME to use another directory."#
)]
pub struct Cli {
    /// Print results as a JSON envelope
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug output and log to the console as well as files
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate, edit, or explain images
    #[command(alias = "img")]
    Image(commands::image::ImageArgs),

    /// Generate a video from a text prompt
    #[command(after_help = r#"EXAMPLES:
    ergon video "a paper boat drifting down a stream"
    ergon video "dancing robot" --fast -a 9:16 -r 720p
    ergon video "the character waves" -i character.png -o clips/"#)]
    Video(commands::video::VideoArgs),

    /// Synthesize speech
    Narration(commands::narration::NarrationArgs),

    /// Caption a single image
    Caption(commands::caption::CaptionArgs),

    /// Caption every image in a directory tree
    #[command(after_help = r#"EXAMPLES:
    ergon catalog ./photos
    ergon catalog ./photos -o photos.md -l en
    ergon catalog ./photos --format json --concurrency 4"#)]
    Catalog(commands::catalog::CatalogArgs),

    /// Manage image presets
    Preset(commands::preset::PresetArgs),

    /// View or modify configuration
    #[command(after_help = r#"AVAILABLE SETTINGS:
  googleApiKey         - Google AI API key
  defaultImageEngine   - imagen4, imagen4-fast, imagen4-ultra, nano-banana, nano-banana-pro
  defaultImageFormat   - png, jpg, jpeg, webp
  defaultAspectRatio   - 1:1, 3:4, 4:3, 9:16, 16:9
  defaultLanguage      - ja, en, zh, ko, es, fr, de, it, pt, ru, vi
  defaultAudioVoice    - Aoede, Charon, Fenrir, Kore, Puck
  defaultAudioFormat   - wav, mp3
  logDestination       - file, console, both"#)]
    Config(commands::config::ConfigArgs),

    /// Show recent log entries
    Log(commands::log::LogArgs),
}

impl Commands {
    /// Name used in JSON envelopes and logs
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Image(args) => args.command.name(),
            Commands::Video(_) => "video",
            Commands::Narration(_) => "narration gen",
            Commands::Caption(_) => "caption",
            Commands::Catalog(_) => "catalog",
            Commands::Preset(_) => "preset",
            Commands::Config(_) => "config",
            Commands::Log(_) => "log",
        }
    }
}

/// Everything a command handler needs from the process
pub struct AppContext {
    pub config: Config,
    pub logs: LogRegistry,
    pub home: PathBuf,
    pub json: bool,
}

impl AppContext {
    pub fn load(json: bool, debug: bool) -> Result<Self, ErgonError> {
        Self::load_from(ergon_home()?, json, debug)
    }

    /// Context rooted at `home` (config.json, presets.json, logs/)
    pub fn load_from(home: PathBuf, json: bool, debug: bool) -> Result<Self, ErgonError> {
        let config = Config::load_from(&home.join("config.json"))?;
        let logs = LogRegistry::new(home.join("logs"), logger_config(&config, debug));
        Ok(Self {
            config,
            logs,
            home,
            json,
        })
    }

    pub fn logger(&self, name: &str) -> Arc<Logger> {
        self.logs.get(name)
    }

    pub fn presets(&self) -> PresetStore {
        PresetStore::new(self.home.join("presets.json"))
    }

    /// Authenticated API access; fails before any network call if no usable key is set
    pub fn api(&self) -> Result<ApiClient, ErgonError> {
        let key = self.config.resolve_api_key(&process_env)?;
        Ok(ApiClient::new(key))
    }

    /// Spinner on stderr in text mode; nothing in JSON mode
    pub fn spinner(&self, message: impl Into<String>) -> Option<ProgressBar> {
        if self.json {
            return None;
        }
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.yellow} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner());
        pb.set_style(style);
        pb.set_message(message.into());
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    }

    /// Prints `result` as a JSON envelope, or runs `text` in text mode
    pub fn emit<T: Serialize>(&self, command: &str, result: &T, text: impl FnOnce()) {
        if self.json {
            JsonOutput::success(command, result).print();
        } else {
            text();
        }
    }
}

/// `--debug` forces console output and DEBUG level; an unusable `logDestination`
/// warns and falls back to file logging
pub fn logger_config(config: &Config, debug: bool) -> LoggerConfig {
    if debug {
        return LoggerConfig {
            destination: LogDestination::Both,
            min_level: LogLevel::Debug,
        };
    }
    let destination = config.log_destination().unwrap_or_else(|e| {
        eprintln!("{}: {}; logging to file", "Warning".yellow().bold(), e);
        LogDestination::File
    });
    LoggerConfig {
        destination,
        min_level: LogLevel::Info,
    }
}

pub fn finish_ok(pb: Option<ProgressBar>, message: impl AsRef<str>) {
    if let Some(pb) = pb {
        pb.finish_with_message(format!("{} {}", "✓".green(), message.as_ref()));
    }
}

pub fn finish_err(pb: Option<ProgressBar>, message: impl AsRef<str>) {
    if let Some(pb) = pb {
        pb.finish_with_message(format!("{} {}", "✗".red(), message.as_ref()));
    }
}

pub async fn run(command: Commands, ctx: &mut AppContext) -> anyhow::Result<()> {
    match command {
        Commands::Image(args) => commands::image::run(args, ctx).await,
        Commands::Video(args) => commands::video::run(args, ctx).await,
        Commands::Narration(args) => commands::narration::run(args, ctx).await,
        Commands::Caption(args) => commands::caption::run(args, ctx).await,
        Commands::Catalog(args) => commands::catalog::run(args, ctx).await,
        Commands::Preset(args) => commands::preset::run(args, ctx),
        Commands::Config(args) => commands::config::run(args, ctx),
        Commands::Log(args) => commands::log::run(args, ctx),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn command_names() {
        let cli = Cli::try_parse_from(["ergon", "--json", "image", "gen", "a fox"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.command.name(), "image gen");

        let cli = Cli::try_parse_from(["ergon", "narration", "gen", "hi", "--debug"]).unwrap();
        assert!(cli.debug);
        assert_eq!(cli.command.name(), "narration gen");
    }

    #[test]
    fn debug_overrides_log_destination() {
        let config = Config {
            log_destination: Some("console".to_string()),
            ..Config::default()
        };
        let normal = logger_config(&config, false);
        assert_eq!(normal.destination, LogDestination::Console);
        assert_eq!(normal.min_level, LogLevel::Info);

        let debug = logger_config(&config, true);
        assert_eq!(debug.destination, LogDestination::Both);
        assert_eq!(debug.min_level, LogLevel::Debug);
    }

    #[test]
    fn bad_log_destination_does_not_block_startup() {
        let home = tempfile::tempdir().unwrap();
        std::fs::write(home.path().join("config.json"), r#"{"logDestination":"syslog"}"#).unwrap();

        let mut ctx = AppContext::load_from(home.path().to_path_buf(), true, false).unwrap();
        assert_eq!(logger_config(&ctx.config, false).destination, LogDestination::File);

        let args = commands::config::ConfigArgs {
            command: Some(commands::config::ConfigCommand::Unset {
                key: "logDestination".to_string(),
            }),
        };
        commands::config::run(args, &mut ctx).unwrap();

        let reloaded = Config::load_from(&home.path().join("config.json")).unwrap();
        assert!(reloaded.log_destination.is_none());
        assert_eq!(reloaded.log_destination().unwrap(), LogDestination::File);
    }
}
