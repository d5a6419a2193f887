use std::io::Read;
use std::path::Path;

use clap::Subcommand;

use rotator_core::RotatorError;
use rotator_store::credential::mask;
use rotator_store::{CredentialStore, RotatorConfig, RotatorPaths};

/// Without a token, dispatch fails with a credential error; it never
/// falls back to record mode.
pub const NO_TOKEN_NOTE: &str =
    "reads are anonymous and dispatch mode is unavailable until `rotator token set`";

#[derive(Subcommand)]
pub enum TokenCmd {
    /// Store an access token (reads stdin when omitted)
    Set {
        /// Token value
        token: Option<String>,
    },
    /// Remove the stored token
    Clear,
    /// Show whether a token is stored and who it belongs to
    Status,
}

pub fn run(cmd: TokenCmd, repo_root: &Path) -> anyhow::Result<()> {
    let store = CredentialStore::open_default();
    match cmd {
        TokenCmd::Set { token } => set(&store, repo_root, token),
        TokenCmd::Clear => {
            if store.clear()? {
                println!("Token removed from {}", store.path().display());
            } else {
                println!("No token stored");
            }
            Ok(())
        }
        TokenCmd::Status => status(&store, repo_root),
    }
}

fn set(store: &CredentialStore, repo_root: &Path, token: Option<String>) -> anyhow::Result<()> {
    let token = match token {
        Some(t) => t,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    store.save(&token)?;
    println!("Token saved ({})", mask(token.trim()));

    // An unset owner defaults to the token's login.
    let paths = RotatorPaths::discover(repo_root);
    if paths.is_initialized() {
        let mut config = RotatorConfig::load(&paths.config_json)?;
        if config.owner.is_empty() {
            match rotator_github::whoami(&config.api_base, token.trim()) {
                Ok(user) => {
                    config.set("owner", &user.login)?;
                    config.save(&paths.config_json)?;
                    println!("owner = {}", user.login);
                }
                Err(e) => tracing::warn!(error = %e, "could not resolve token owner"),
            }
        }
    }
    Ok(())
}

fn status(store: &CredentialStore, repo_root: &Path) -> anyhow::Result<()> {
    let Some(token) = store.load()? else {
        println!("No token stored: {NO_TOKEN_NOTE}");
        return Ok(());
    };
    println!("Token: {}", mask(&token));

    let config = RotatorConfig::load(&RotatorPaths::discover(repo_root).config_json)?;
    match rotator_github::whoami(&config.api_base, &token) {
        Ok(user) => match user.name {
            Some(name) => println!("Signed in as {} ({name})", user.login),
            None => println!("Signed in as {}", user.login),
        },
        Err(RotatorError::Auth(_)) => println!("Token was rejected; run `rotator token set` again"),
        Err(e) => println!("Could not verify token: {e}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_token_note_names_dispatch_limit() {
        assert!(NO_TOKEN_NOTE.contains("dispatch mode is unavailable"));
        assert!(!NO_TOKEN_NOTE.contains("record mode"));
    }
}
