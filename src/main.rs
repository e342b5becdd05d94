use clap::Parser;
use colored::Colorize;
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod audio;
mod cli;
mod config;
mod core;
mod files;
mod http_client;
mod logging;
mod media;
mod presets;

use cli::{AppContext, Cli};
use crate::core::{ErgonError, JsonOutput};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.debug { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let command_name = cli.command.name();
    let json = cli.json;

    let mut ctx = match AppContext::load(json, cli.debug) {
        Ok(ctx) => ctx,
        Err(e) => fail(command_name, json, &anyhow::Error::new(e)),
    };

    if let Err(e) = cli::run(cli.command, &mut ctx).await {
        ctx.logger("ergon").error(
            format!("{} failed", command_name),
            Some(json!({ "command": command_name, "error": format!("{:#}", e) })),
        );
        fail(command_name, json, &e);
    }
}

fn fail(command: &str, json: bool, error: &anyhow::Error) -> ! {
    if json {
        let code = error.downcast_ref::<ErgonError>().map(ErgonError::code);
        JsonOutput::failure(command, format!("{:#}", error), code).print();
    } else {
        eprintln!("{}: {:#}", "Error".red().bold(), error);
    }
    std::process::exit(1);
}
