use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Args;
use colored::Colorize;

use crate::cli::AppContext;
use crate::core::ErgonError;
use crate::logging::{log_file_path, read_entries, render_entry, LogLevel};

#[derive(Args)]
#[command(after_help = r#"EXAMPLES:
    ergon log
    ergon log --component image-gen -n 50
    ergon log --component catalog --level warn --date 2025-06-01"#)]
pub struct LogArgs {
    /// Number of entries to show
    #[arg(short = 'n', long, default_value_t = 20)]
    pub lines: usize,

    /// Minimum level (debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub level: String,

    /// Component name (ergon, image-gen, image-edit, image-explain, video, tts, caption, catalog, preset, config)
    #[arg(long, default_value = "ergon")]
    pub component: String,

    /// Day to read (YYYY-MM-DD, default today)
    #[arg(long)]
    pub date: Option<String>,
}

pub fn parse_date(value: &str) -> Result<NaiveDate, ErgonError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| ErgonError::invalid("date", value, "YYYY-MM-DD"))
}

/// Accepts `[a-z0-9-]+`, the shape of every logger name
pub fn validate_component(name: &str) -> Result<&str, ErgonError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !valid {
        return Err(ErgonError::invalid("component", name, "lowercase letters, digits and '-'"));
    }
    Ok(name)
}

pub fn run(args: LogArgs, ctx: &AppContext) -> Result<()> {
    let level = LogLevel::parse(&args.level)?;
    let component = validate_component(&args.component)?;

    let (path, entries) = match &args.date {
        Some(date) => {
            let path = log_file_path(ctx.logs.log_dir(), component, parse_date(date)?);
            let entries = read_entries(&path, level, args.lines);
            (path, entries)
        }
        None => {
            let logger = ctx.logger(component);
            (logger.file_path().to_path_buf(), logger.entries(level, args.lines))
        }
    };
    let entries = entries.with_context(|| format!("Failed to read {}", path.display()))?;

    ctx.emit("log", &entries, || {
        if entries.is_empty() {
            println!("{}", "No log entries found".dimmed());
            println!("{}", format!("Log file: {}", path.display()).dimmed());
            return;
        }
        for entry in &entries {
            println!("{}", render_entry(entry, Some(component)));
        }
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_must_be_iso() {
        assert_eq!(parse_date("2025-06-01").unwrap(), NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        assert!(parse_date("06/01/2025").is_err());
        assert!(parse_date("2025-13-01").is_err());
    }

    #[test]
    fn component_names_stay_inside_the_log_directory() {
        assert_eq!(validate_component("image-gen").unwrap(), "image-gen");
        assert_eq!(validate_component("tts").unwrap(), "tts");
        for bad in ["../x", "a/b", "", "Catalog", "x.log"] {
            assert!(validate_component(bad).is_err(), "{bad}");
        }
    }
}
