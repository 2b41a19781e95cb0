use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use transcrify::cli::{Cli, Commands};
use transcrify::config::Config;
use transcrify::extractors::Platform;
use transcrify::transcribe::TranscriptionPipeline;
use transcrify::{output, server, utils};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load()?;

    init_tracing(cli.verbose, config.logging.json);

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }

            warn_missing_dependencies(&config).await;
            server::serve(&config).await?;
        }
        Commands::Transcribe { url, format } => {
            warn_missing_dependencies(&config).await;
            let pipeline = TranscriptionPipeline::from_config(&config)?;

            let progress = if cli.quiet {
                ProgressBar::hidden()
            } else {
                let progress = ProgressBar::new_spinner();
                progress.set_style(
                    ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?,
                );
                progress.enable_steady_tick(Duration::from_millis(120));
                progress
            };
            progress.set_message(format!("Transcribing {}...", url));

            let result = pipeline.transcribe_url(&url).await;
            progress.finish_and_clear();

            let response = result?;
            output::print_to_console(&response, &format)?;
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                match Config::config_path() {
                    Some(path) => println!("Configuration file: {}", path.display()),
                    None => println!("No configuration file found; using defaults and environment"),
                }
                println!("Run `transcrify config --show` to print the effective configuration.");
            }
        }
        Commands::Platforms => {
            println!("Supported platforms:");
            for platform in Platform::all() {
                let route = if platform.is_primary() {
                    "yt-dlp, Cobalt fallback"
                } else {
                    "Cobalt"
                };
                match platform {
                    Platform::Youtube => println!("  • YouTube (youtube.com, youtu.be) - {}", route),
                    Platform::Instagram => println!("  • Instagram (instagram.com) - {}", route),
                    Platform::Tiktok => println!("  • TikTok (tiktok.com) - {}", route),
                    Platform::Other => println!("  • Any other URL Cobalt supports - {}", route),
                }
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool, json: bool) {
    let default_filter = if verbose {
        "transcrify=debug,tower_http=debug"
    } else {
        "transcrify=info"
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // Logs go to stderr so `transcribe --format json` stays pipeable
    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

async fn warn_missing_dependencies(config: &Config) {
    let missing = utils::check_dependencies(&config.acquisition.yt_dlp_path).await;
    if !missing.is_empty() {
        eprintln!("⚠️  Dependency check warnings:");
        for dep in missing {
            eprintln!("   • {}", dep);
        }
        eprintln!("   (Continuing anyway - tools may be available)");
    }
}
