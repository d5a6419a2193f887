use std::path::Path;

use rotator_store::{RotatorConfig, RotatorPaths};

pub fn execute(repo_root: &Path, owner: Option<&str>, repo: Option<&str>) -> anyhow::Result<()> {
    let paths = RotatorPaths::discover(repo_root);

    if paths.is_initialized() && owner.is_none() && repo.is_none() {
        println!("Already initialized at {}", paths.rotator_dir.display());
        return Ok(());
    }

    let mut config = RotatorConfig::load(&paths.config_json)?;
    if let Some(owner) = owner {
        config.set("owner", owner)?;
    }
    if let Some(repo) = repo {
        config.set("repo", repo)?;
    }
    config.save(&paths.config_json)?;

    println!("Initialized rotator at {}", paths.rotator_dir.display());
    if config.repository().is_err() {
        println!("  next: rotator config set owner <login>");
        println!("        rotator config set repo <name>");
    }
    println!("  optional: rotator token set <token>  (enables dispatch mode)");
    Ok(())
}
