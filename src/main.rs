use anyhow::Result;
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use voxim::app::{run_index_command, run_keywords_command, run_listen_command, run_search_command};
use voxim::cli::{Cli, Commands, ListenArgs};
use voxim::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None => {
            let config = load_config(cli.config.as_deref())?;
            run_listen_command(config, ListenArgs::default(), cli.quiet, cli.verbose).await?;
        }
        Some(Commands::Listen(args)) => {
            let config = load_config(cli.config.as_deref())?;
            run_listen_command(config, args, cli.quiet, cli.verbose).await?;
        }
        Some(Commands::Index {
            dir,
            output,
            batch_size,
        }) => {
            let config = load_config(cli.config.as_deref())?;
            let summary = run_index_command(config, &dir, output, batch_size, cli.quiet)?;
            if !cli.quiet {
                println!("{} {}", "Index written:".green(), summary.path.display());
            }
        }
        Some(Commands::Search {
            query,
            top_k,
            index,
            keywords,
        }) => {
            let config = load_config(cli.config.as_deref())?;
            let hits = run_search_command(config, &query, top_k, index, keywords, cli.verbose)?;
            if hits.is_empty() && !cli.quiet {
                eprintln!("{}", "No results (index is empty)".yellow());
            }
        }
        Some(Commands::Keywords { text }) => {
            run_keywords_command(&text)?;
        }
        Some(Commands::Devices) => {
            list_audio_devices()?;
        }
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(shell, &mut Cli::command(), "voxim", &mut std::io::stdout());
        }
    }

    Ok(())
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config)
/// 2. Default config path (~/.config/voxim/config.toml)
/// 3. Built-in defaults with environment variable overrides
fn load_config(custom_path: Option<&std::path::Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        // Load from custom path
        Config::load(path)?
    } else {
        // Try default path, fall back to defaults
        let default_path = Config::default_path()?;
        Config::load_or_default(&default_path)?
    };

    // Apply environment variable overrides
    let config = config.with_env_overrides();
    config.validate()?;
    Ok(config)
}

/// List available audio input devices.
#[cfg(feature = "cpal-audio")]
fn list_audio_devices() -> Result<()> {
    let devices = voxim::audio::microphone::list_devices()?;

    if devices.is_empty() {
        eprintln!("No audio input devices found");
        std::process::exit(1);
    }

    println!("Available audio input devices:");
    for (idx, device) in devices.iter().enumerate() {
        if device.recommended {
            println!("  [{}] {} {}", idx, device.name, "(recommended)".dimmed());
        } else {
            println!("  [{}] {}", idx, device.name);
        }
    }

    Ok(())
}

#[cfg(not(feature = "cpal-audio"))]
fn list_audio_devices() -> Result<()> {
    anyhow::bail!("voxim was built without microphone support (feature `cpal-audio`)")
}
