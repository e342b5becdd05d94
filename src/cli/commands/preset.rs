use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;
use serde_json::json;

use super::image::ImageOptionFlags;
use crate::cli::AppContext;
use crate::core::{ErgonError, Quality};
use crate::presets::{ImagePreset, PresetEntry};

#[derive(Args)]
pub struct PresetArgs {
    #[command(subcommand)]
    pub command: PresetCommand,
}

#[derive(Subcommand)]
pub enum PresetCommand {
    /// List built-in and saved presets
    #[command(alias = "ls")]
    List,

    /// Show one preset
    Show {
        /// Preset name
        name: String,
    },

    /// Save a preset (overwrites an existing one with the same name)
    #[command(after_help = r#"EXAMPLES:
    ergon preset save blog -a 16:9 -t illustration -f webp
    ergon preset save print -e imagen4-ultra -s 4k -f png"#)]
    Save {
        /// Preset name
        name: String,

        #[command(flatten)]
        options: ImageOptionFlags,
    },

    /// Delete a saved preset
    #[command(alias = "rm")]
    Delete {
        /// Preset name
        name: String,
    },
}

pub fn run(args: PresetArgs, ctx: &AppContext) -> Result<()> {
    match args.command {
        PresetCommand::List => list_presets(ctx),
        PresetCommand::Show { name } => show_preset(&name, ctx),
        PresetCommand::Save { name, options } => save_preset(&name, &options, ctx),
        PresetCommand::Delete { name } => delete_preset(&name, ctx),
    }
}

/// Preset from `preset save` flags; quality is range-checked here since the file stores a number
pub fn preset_from_flags(flags: &ImageOptionFlags) -> Result<ImagePreset, ErgonError> {
    let quality = flags.quality.as_deref().map(Quality::parse).transpose()?;
    Ok(ImagePreset {
        aspect_ratio: flags.aspect_ratio.clone(),
        image_type: flags.image_type.clone(),
        engine: flags.engine.clone(),
        format: flags.format.clone(),
        size: flags.size.clone(),
        quality: quality.map(|q| q.get()),
    })
}

pub fn describe(preset: &ImagePreset) -> String {
    let mut parts = Vec::new();
    let fields = [
        ("aspect", preset.aspect_ratio.clone()),
        ("type", preset.image_type.clone()),
        ("engine", preset.engine.clone()),
        ("format", preset.format.clone()),
        ("size", preset.size.clone()),
        ("quality", preset.quality.map(|q| q.to_string())),
    ];
    for (label, value) in fields {
        if let Some(value) = value {
            parts.push(format!("{}={}", label, value));
        }
    }
    parts.join(", ")
}

fn list_presets(ctx: &AppContext) -> Result<()> {
    let store = ctx.presets();
    let entries = store.list_all()?;
    ctx.emit("preset list", &entries, || {
        println!("{}", "Presets".cyan().bold());
        println!("{}", "=".repeat(50));
        for PresetEntry { name, builtin, preset } in &entries {
            let label = if *builtin { name.dimmed().to_string() } else { name.bold().to_string() };
            println!("  {:<24} {}", label, describe(preset));
        }
        println!();
        println!("{}", format!("Preset file: {}", store.path().display()).dimmed());
    });
    Ok(())
}

fn show_preset(name: &str, ctx: &AppContext) -> Result<()> {
    let preset = ctx.presets().require(name)?;
    let result = json!({ "name": name, "preset": preset });
    ctx.emit("preset show", &result, || {
        println!("{}", name.cyan().bold());
        let rows = [
            ("Aspect Ratio", preset.aspect_ratio.clone()),
            ("Type", preset.image_type.clone()),
            ("Engine", preset.engine.clone()),
            ("Format", preset.format.clone()),
            ("Size", preset.size.clone()),
            ("Quality", preset.quality.map(|q| q.to_string())),
        ];
        for (label, value) in rows {
            if let Some(value) = value {
                println!("  {}: {}", label.bold(), value);
            }
        }
    });
    Ok(())
}

fn save_preset(name: &str, flags: &ImageOptionFlags, ctx: &AppContext) -> Result<()> {
    let preset = preset_from_flags(flags)?;
    let store = ctx.presets();
    store.save(name, preset.clone())?;
    ctx.logger("preset").info("Saved preset", Some(json!({ "name": name, "preset": preset })));

    ctx.emit("preset save", &json!({ "name": name, "preset": preset }), || {
        println!("{} Saved preset {} ({})", "✓".green(), name.cyan(), describe(&preset));
    });
    Ok(())
}

fn delete_preset(name: &str, ctx: &AppContext) -> Result<()> {
    if !ctx.presets().delete(name)? {
        return Err(ErgonError::PresetNotFound(name.to_string()).into());
    }
    ctx.logger("preset").info("Deleted preset", Some(json!({ "name": name })));

    ctx.emit("preset delete", &json!({ "name": name, "deleted": true }), || {
        println!("{} Deleted preset {}", "✓".green(), name.cyan());
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_become_preset_fields() {
        let flags = ImageOptionFlags {
            aspect_ratio: Some("16:9".to_string()),
            image_type: Some("anime".to_string()),
            quality: Some("80".to_string()),
            ..ImageOptionFlags::default()
        };
        let preset = preset_from_flags(&flags).unwrap();
        assert_eq!(preset.aspect_ratio.as_deref(), Some("16:9"));
        assert_eq!(preset.quality, Some(80));
        assert_eq!(describe(&preset), "aspect=16:9, type=anime, quality=80");
    }

    #[test]
    fn quality_out_of_range_is_rejected() {
        let flags = ImageOptionFlags {
            quality: Some("300".to_string()),
            ..ImageOptionFlags::default()
        };
        assert!(preset_from_flags(&flags).is_err());
    }
}
