use std::path::Path;

use clap::Subcommand;

use rotator_store::{RotatorConfig, RotatorPaths};

// ── CLI Schema ──

#[derive(Subcommand)]
pub enum ConfigCmd {
    /// Set a config value
    Set {
        /// Config key (e.g. owner, schedule, apply_mode)
        key: String,
        /// Config value
        value: String,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// List all config values
    List,
}

// ── Dispatch ──

pub fn run(cmd: ConfigCmd, repo_root: &Path) -> anyhow::Result<()> {
    match cmd {
        ConfigCmd::Set { key, value } => set(repo_root, &key, &value),
        ConfigCmd::Get { key } => get(repo_root, &key),
        ConfigCmd::List => list(repo_root),
    }
}

// ── Command Implementations ──

fn initialized(repo_root: &Path) -> anyhow::Result<RotatorPaths> {
    let paths = RotatorPaths::discover(repo_root);
    if !paths.is_initialized() {
        anyhow::bail!("No .rotator/ workspace found. Run `rotator init` first.");
    }
    Ok(paths)
}

/// `rotator config set <key> <value>`
pub fn set(repo_root: &Path, key: &str, value: &str) -> anyhow::Result<()> {
    let paths = initialized(repo_root)?;
    let mut config = RotatorConfig::load(&paths.config_json)?;
    config.set(key, value)?;
    config.save(&paths.config_json)?;
    let shown = config.get(key).unwrap_or_default();
    println!("{key} = {shown}");
    Ok(())
}

/// `rotator config get <key>`
pub fn get(repo_root: &Path, key: &str) -> anyhow::Result<()> {
    let paths = RotatorPaths::discover(repo_root);
    let config = RotatorConfig::load(&paths.config_json)?;
    match config.get(key) {
        Some(value) => println!("{value}"),
        None => println!("(not set)"),
    }
    Ok(())
}

/// `rotator config list`
pub fn list(repo_root: &Path) -> anyhow::Result<()> {
    let paths = RotatorPaths::discover(repo_root);
    let config = RotatorConfig::load(&paths.config_json)?;
    for (key, value) in config.entries() {
        match value {
            Some(value) => println!("{key} = {value}"),
            None => println!("{key} = (not set)"),
        }
    }
    Ok(())
}
