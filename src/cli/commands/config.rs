//! Config command - show or edit configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager};
use crate::error::{BenderError, BenderResult};
use console::style;
use std::path::Path;

/// Execute the config command
pub fn execute(args: ConfigArgs, config: &Config) -> BenderResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config),
        Some(ConfigAction::Path) => show_path(),
        Some(ConfigAction::Init { force }) => init_config(&ConfigManager::default_config_path(), force)?,
    }
    Ok(())
}

fn show_config(config: &Config) {
    let toml =
        toml::to_string_pretty(config).unwrap_or_else(|_| "Error serializing config".to_string());
    println!("{toml}");
}

fn show_path() {
    println!("{}", ConfigManager::default_config_path().display());
}

fn init_config(path: &Path, force: bool) -> BenderResult<()> {
    if path.exists() && !force {
        println!(
            "{} Config already exists at {} (use --force to overwrite)",
            style("!").yellow(),
            path.display()
        );
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| BenderError::io(format!("creating {}", parent.display()), e))?;
    }

    let toml = toml::to_string_pretty(&Config::default()).map_err(|e| {
        BenderError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }
    })?;
    std::fs::write(path, toml)
        .map_err(|e| BenderError::io(format!("writing {}", path.display()), e))?;

    println!(
        "{} Configuration initialized at {}",
        style("✓").green(),
        path.display()
    );
    Ok(())
}
