// Configuration management module
// TOML settings stored under the user's config directory

pub mod settings;


use anyhow::{Context, Result};
use console::style;

pub use settings::{
    ApiConfig, CleanerConfig, Config, ConfigError, EmbeddingConfig, RetryConfig, StoreConfig,
};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::config_dir()
}

/// Load the configuration from the default directory
#[inline]
pub fn load_config() -> Result<Config> {
    let config_dir = get_config_dir()?;
    Config::load(&config_dir)
}

#[inline]
pub fn show_config() -> Result<()> {
    let config = load_config().context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Source API:").bold().yellow());
    eprintln!("  Base URL: {}", style(&config.api.base_url).cyan());
    eprintln!("  Tournament: {}", style(config.api.tournament_id).cyan());
    eprintln!("  Timeout: {}s", style(config.api.timeout_seconds).cyan());
    eprintln!("  Pacing: {}ms", style(config.api.pacing_ms).cyan());
    eprintln!(
        "  Retries: {} (backoff {}ms, statuses {:?})",
        style(config.api.retry.max_retries).cyan(),
        config.api.retry.backoff_ms,
        config.api.retry.retry_statuses
    );

    eprintln!();
    eprintln!("{}", style("Embedding Settings:").bold().yellow());
    match config.embedding_url() {
        Ok(url) => eprintln!("  Ollama URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  Ollama URL: {} ({})", style("Invalid").red(), e),
    }
    eprintln!("  Model: {}", style(&config.embedding.model).cyan());
    eprintln!("  Dimension: {}", style(config.embedding.dimension).cyan());

    eprintln!();
    eprintln!("{}", style("Vector Store:").bold().yellow());
    eprintln!("  Database: {}", style(config.database_path().display()).cyan());
    eprintln!(
        "  Max chunk size: {}",
        style(config.store.max_chunk_size).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Cleaner:").bold().yellow());
    eprintln!("  Keys: {}", style(config.cleaner.keys.join(", ")).cyan());
    eprintln!(
        "  Season dirs: {}",
        style(config.cleaner.season_dirs.join(", ")).cyan()
    );

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

/// Write the current (or default) configuration to disk so it can be edited
#[inline]
pub fn write_config() -> Result<()> {
    let config = load_config().context("Failed to load configuration")?;
    config.save()?;

    println!(
        "✅ Configuration written to {}",
        config.config_file_path().display()
    );
    Ok(())
}
