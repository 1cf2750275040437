//! Widget Replay - command-line companion to the injected engine
//!
//! Checks scripts, manages configuration and prepares launch settings.

use std::path::Path;
use tracing::info;
use tracing_subscriber::EnvFilter;
use widget_replay::app::cli::{Cli, Commands, ConfigAction, LaunchModeArg};
use widget_replay::app::config::Config;
use widget_replay::runner::check_script;
use widget_replay::time::Timebase;
use widget_replay::workflow::{LaunchSettings, SessionMode};

fn main() -> anyhow::Result<()> {
    // Parse CLI arguments first so we can use --verbose to set log level
    let cli = Cli::parse_args();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    Timebase::init();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let config = if cli.config.is_some() {
        Config::load(&config_path)?
    } else {
        Config::load_default()?
    };

    match cli.command {
        Commands::Check { script } => run_check(&script)?,
        Commands::Init { force } => run_init(force, &config_path)?,
        Commands::Config { action } => run_config(action, config, &config_path)?,
        Commands::LaunchBlob { mode, script } => run_launch_blob(mode, script, &config)?,
    }

    Ok(())
}

fn run_check(script: &Path) -> anyhow::Result<()> {
    info!("Checking {:?}", script);
    if !script.exists() {
        anyhow::bail!("Script not found: {:?}", script);
    }

    let check = check_script(script)?;
    println!("Script OK: {} ({} lines)", script.display(), check.lines);
    if check.calls.is_empty() {
        println!("  (no actions)");
    }
    for (function, count) in &check.calls {
        println!("  {:<18} {}", function, count);
    }
    println!("  {:<18} {}", "total", check.total_calls());
    Ok(())
}

fn run_init(force: bool, config_path: &Path) -> anyhow::Result<()> {
    if config_path.exists() && !force {
        anyhow::bail!(
            "Config already exists at {:?}. Use --force to overwrite.",
            config_path
        );
    }

    let config = Config::default();
    config.save(config_path)?;
    println!("Created config at {:?}", config_path);
    println!("\nConfig content:\n{}", config.to_toml()?);
    Ok(())
}

fn run_config(action: ConfigAction, mut config: Config, config_path: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            println!("Configuration ({:?}):\n", config_path);
            println!("{}", config.to_toml()?);
        }
        ConfigAction::Get { key } => {
            let value = config.get(&key)?;
            println!("{} = {}", key, value);
        }
        ConfigAction::Set { key, value } => {
            if !config_path.exists() {
                anyhow::bail!("No config file found. Run 'widget-replay init' first.");
            }
            config.set(&key, &value)?;
            config.save(config_path)?;
            println!("Set {} = {}", key, config.get(&key)?);
        }
        ConfigAction::Reset { force } => {
            if config_path.exists() && !force {
                println!("Config exists at {:?}", config_path);
                println!("Use --force to reset to defaults");
                return Ok(());
            }
            Config::default().save(config_path)?;
            println!("Configuration reset to defaults at {:?}", config_path);
        }
    }
    Ok(())
}

fn run_launch_blob(
    mode: LaunchModeArg,
    script: Option<std::path::PathBuf>,
    config: &Config,
) -> anyhow::Result<()> {
    let mode = match mode {
        LaunchModeArg::Record => SessionMode::Record,
        LaunchModeArg::Run => SessionMode::Run,
    };
    let mut settings = LaunchSettings {
        mode,
        generation: config.generation.clone(),
        run: config.run.clone(),
        classifier: config.classifier.clone(),
    };
    if let Some(script) = script {
        settings.generation.script_path = script.clone();
        settings.run.script_path = script;
    }
    settings.validate()?;
    println!("{}", settings.to_blob()?);
    Ok(())
}
