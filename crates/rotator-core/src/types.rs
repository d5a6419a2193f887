use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

/// Default directory holding candidate avatars inside the repository.
pub const DEFAULT_AVATARS_DIR: &str = "avatars";

/// Title shown for runs that carry no display title.
pub const DEFAULT_RUN_TITLE: &str = "Avatar update";

/// Kind of a directory listing entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Dir,
    /// Symlinks and submodules; never avatar candidates.
    #[serde(other)]
    Other,
}

/// One entry of a remote directory listing. Lives for one refresh cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub download_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl FileEntry {
    pub fn file(name: &str, download_url: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: EntryKind::File,
            download_url: download_url.to_string(),
            path: None,
            size: None,
        }
    }

    pub fn dir(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: EntryKind::Dir,
            download_url: String::new(),
            path: None,
            size: None,
        }
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

/// An image eligible to become the profile avatar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AvatarCandidate {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// The account behind the stored credential.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GithubUser {
    pub login: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// Outcome of one automation run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Conclusion {
    Success,
    Failure,
    Pending,
    Unknown,
}

impl Conclusion {
    /// Map the hosting platform's `conclusion` field. `None` means the run
    /// has not finished yet.
    pub fn from_wire(conclusion: Option<&str>) -> Self {
        match conclusion {
            None => Conclusion::Pending,
            Some("success") => Conclusion::Success,
            Some("failure" | "timed_out" | "startup_failure") => Conclusion::Failure,
            Some(_) => Conclusion::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Conclusion::Success => "success",
            Conclusion::Failure => "failure",
            Conclusion::Pending => "pending",
            Conclusion::Unknown => "unknown",
        }
    }
}

/// Historical record of one automation execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunRecord {
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
    pub conclusion: Conclusion,
    pub html_url: String,
    pub title: String,
}

/// Query parameters for a run-history request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFilter {
    /// Restrict to runs triggered by this event (e.g. `schedule`).
    pub event: Option<String>,
    pub per_page: u8,
}

impl Default for RunFilter {
    fn default() -> Self {
        Self {
            event: None,
            per_page: 10,
        }
    }
}

/// How the candidate in a selection record was chosen.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    ManualInput,
    ConfigFile,
    Random,
}

impl SelectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionMode::ManualInput => "manual_input",
            SelectionMode::ConfigFile => "config_file",
            SelectionMode::Random => "random",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStatus {
    Success,
    Failure,
}

/// How an apply leaves the dashboard: as a workflow trigger, or as a
/// record document for the user to commit.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ApplyMode {
    #[default]
    Record,
    Dispatch,
}

impl ApplyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplyMode::Record => "record",
            ApplyMode::Dispatch => "dispatch",
        }
    }
}

impl std::str::FromStr for ApplyMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "record" => Ok(ApplyMode::Record),
            "dispatch" => Ok(ApplyMode::Dispatch),
            other => Err(format!("unknown apply mode `{other}` (expected record or dispatch)")),
        }
    }
}
