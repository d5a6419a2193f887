//! `.rotator/config.json`: which repository to watch and how to apply.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use rotator_core::record::SELECTION_RECORD_PATH;
use rotator_core::schedule::Recurrence;
use rotator_core::{ApplyMode, DEFAULT_AVATARS_DIR};

pub const CONFIG_KEYS: &[&str] = &[
    "owner",
    "repo",
    "avatars_dir",
    "workflow",
    "git_ref",
    "apply_mode",
    "schedule",
    "api_base",
    "web_base",
    "record_path",
    "history_limit",
    "status_event",
    "request_timeout_secs",
    "poll_delay_secs",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotatorConfig {
    pub owner: String,
    pub repo: String,
    pub avatars_dir: String,
    pub workflow: String,
    pub git_ref: String,
    pub apply_mode: ApplyMode,
    pub schedule: String,
    pub api_base: String,
    pub web_base: String,
    pub record_path: String,
    pub history_limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_event: Option<String>,
    pub request_timeout_secs: u64,
    pub poll_delay_secs: u64,
}

impl Default for RotatorConfig {
    fn default() -> Self {
        Self {
            owner: String::new(),
            repo: String::new(),
            avatars_dir: DEFAULT_AVATARS_DIR.to_string(),
            workflow: "update-avatar.yml".to_string(),
            git_ref: "main".to_string(),
            apply_mode: ApplyMode::Record,
            schedule: "0 0 * * *".to_string(),
            api_base: "https://api.github.com".to_string(),
            web_base: "https://github.com".to_string(),
            record_path: SELECTION_RECORD_PATH.to_string(),
            history_limit: 10,
            status_event: None,
            request_timeout_secs: 10,
            poll_delay_secs: 5,
        }
    }
}

impl RotatorConfig {
    /// Read config; a missing file yields the defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        crate::write_atomic(path, json.as_bytes())
    }

    /// Owner and repo, or an error telling the user how to set them.
    pub fn repository(&self) -> anyhow::Result<(&str, &str)> {
        if self.owner.is_empty() || self.repo.is_empty() {
            anyhow::bail!(
                "No repository configured. Run `rotator config set owner <login>` and \
                 `rotator config set repo <name>`."
            );
        }
        Ok((&self.owner, &self.repo))
    }

    pub fn recurrence(&self) -> anyhow::Result<Recurrence> {
        Recurrence::parse(&self.schedule).context("config key `schedule`")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn poll_delay(&self) -> Duration {
        Duration::from_secs(self.poll_delay_secs)
    }

    /// Set one key from its string form, validating the value.
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "owner" => self.owner = value.trim().to_string(),
            "repo" => self.repo = value.trim().to_string(),
            "avatars_dir" => self.avatars_dir = value.trim_matches('/').to_string(),
            "workflow" => self.workflow = non_empty(key, value)?,
            "git_ref" => self.git_ref = non_empty(key, value)?,
            "apply_mode" => self.apply_mode = value.parse().map_err(anyhow::Error::msg)?,
            "schedule" => {
                Recurrence::parse(value)?;
                self.schedule = value.trim().to_string();
            }
            "api_base" => self.api_base = value.trim_end_matches('/').to_string(),
            "web_base" => self.web_base = value.trim_end_matches('/').to_string(),
            "record_path" => self.record_path = non_empty(key, value)?,
            "history_limit" => self.history_limit = parse_number(key, value)?,
            "status_event" => {
                self.status_event = match value.trim() {
                    "" | "any" => None,
                    event => Some(event.to_string()),
                }
            }
            "request_timeout_secs" => {
                let secs: u64 = parse_number(key, value)?;
                if secs == 0 {
                    anyhow::bail!("request_timeout_secs must be at least 1");
                }
                self.request_timeout_secs = secs;
            }
            "poll_delay_secs" => self.poll_delay_secs = parse_number(key, value)?,
            _ => anyhow::bail!(
                "unknown config key `{key}` (known: {})",
                CONFIG_KEYS.join(", ")
            ),
        }
        Ok(())
    }

    /// String form of one key, `None` for unknown keys or an unset event filter.
    pub fn get(&self, key: &str) -> Option<String> {
        let value = match key {
            "owner" => self.owner.clone(),
            "repo" => self.repo.clone(),
            "avatars_dir" => self.avatars_dir.clone(),
            "workflow" => self.workflow.clone(),
            "git_ref" => self.git_ref.clone(),
            "apply_mode" => self.apply_mode.as_str().to_string(),
            "schedule" => self.schedule.clone(),
            "api_base" => self.api_base.clone(),
            "web_base" => self.web_base.clone(),
            "record_path" => self.record_path.clone(),
            "history_limit" => self.history_limit.to_string(),
            "status_event" => return self.status_event.clone(),
            "request_timeout_secs" => self.request_timeout_secs.to_string(),
            "poll_delay_secs" => self.poll_delay_secs.to_string(),
            _ => return None,
        };
        Some(value)
    }

    pub fn entries(&self) -> Vec<(&'static str, Option<String>)> {
        CONFIG_KEYS.iter().map(|k| (*k, self.get(k))).collect()
    }
}

fn non_empty(key: &str, value: &str) -> anyhow::Result<String> {
    let value = value.trim();
    if value.is_empty() {
        anyhow::bail!("{key} must not be empty");
    }
    Ok(value.to_string())
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> anyhow::Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("{key} expects a non-negative integer, got `{value}`"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = RotatorConfig::load(&tmp.path().join("config.json")).unwrap();
        assert_eq!(config, RotatorConfig::default());
        assert_eq!(config.apply_mode, ApplyMode::Record);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn partial_file_fills_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{"owner":"octo","apply_mode":"dispatch"}"#).unwrap();
        let config = RotatorConfig::load(&path).unwrap();
        assert_eq!(config.owner, "octo");
        assert_eq!(config.apply_mode, ApplyMode::Dispatch);
        assert_eq!(config.workflow, "update-avatar.yml");
        assert_eq!(config.history_limit, 10);
    }

    #[test]
    fn save_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(".rotator").join("config.json");
        let mut config = RotatorConfig::default();
        config.set("owner", "octo").unwrap();
        config.set("repo", "avatars").unwrap();
        config.set("status_event", "schedule").unwrap();
        config.save(&path).unwrap();
        assert_eq!(RotatorConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn set_validates_values() {
        let mut config = RotatorConfig::default();
        assert!(config.set("schedule", "0 25 * * *").is_err());
        assert_eq!(config.schedule, "0 0 * * *");
        config.set("schedule", "@weekly").unwrap();
        assert_eq!(config.schedule, "@weekly");

        assert!(config.set("apply_mode", "push").is_err());
        assert!(config.set("history_limit", "-1").is_err());
        assert!(config.set("request_timeout_secs", "0").is_err());
        assert!(config.set("workflow", "  ").is_err());
        assert!(config.set("colour", "blue").is_err());
    }

    #[test]
    fn get_reports_string_forms() {
        let mut config = RotatorConfig::default();
        config.set("api_base", "https://ghe.example/api/v3/").unwrap();
        assert_eq!(config.get("api_base").unwrap(), "https://ghe.example/api/v3");
        assert_eq!(config.get("apply_mode").unwrap(), "record");
        assert_eq!(config.get("status_event"), None);
        assert_eq!(config.get("nope"), None);
        assert_eq!(config.entries().len(), CONFIG_KEYS.len());
    }

    #[test]
    fn repository_requires_owner_and_repo() {
        let mut config = RotatorConfig::default();
        assert!(config.repository().is_err());
        config.owner = "octo".into();
        config.repo = "r".into();
        assert_eq!(config.repository().unwrap(), ("octo", "r"));
    }
}
