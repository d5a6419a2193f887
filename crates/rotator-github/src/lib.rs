use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use time::OffsetDateTime;

use rotator_core::gateway::{ContentGateway, DispatchGateway};
use rotator_core::url::{encode_component, encode_path};
use rotator_core::{
    Conclusion, FileEntry, GithubUser, Result, RotatorError, RunFilter, RunRecord,
    DEFAULT_RUN_TITLE,
};

// ── Config ──

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const ACCEPT_JSON: &str = "application/vnd.github+json";
const ACCEPT_RAW: &str = "application/vnd.github.raw+json";
const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("rotator/", env!("CARGO_PKG_VERSION"));

/// Connection settings for one repository.
#[derive(Clone)]
pub struct GithubConfig {
    pub api_base: String,
    pub owner: String,
    pub repo: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

impl GithubConfig {
    pub fn new(owner: &str, repo: &str) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
            token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

// Keeps the token out of debug output.
impl std::fmt::Debug for GithubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubConfig")
            .field("api_base", &self.api_base)
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

// ── Client ──

/// Blocking client for the subset of the REST API the dashboard uses.
pub struct GithubClient {
    config: GithubConfig,
    agent: ureq::Agent,
}

impl GithubClient {
    pub fn new(config: GithubConfig) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(config.timeout))
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { config, agent }
    }

    pub fn config(&self) -> &GithubConfig {
        &self.config
    }

    fn api_url(&self, tail: &str) -> String {
        format!("{}/{}", self.config.api_base.trim_end_matches('/'), tail)
    }

    fn repo_url(&self, tail: &str) -> String {
        self.api_url(&format!(
            "repos/{}/{}/{}",
            encode_component(&self.config.owner),
            encode_component(&self.config.repo),
            tail
        ))
    }

    fn bearer(&self) -> Option<String> {
        self.config.token.as_ref().map(|t| format!("Bearer {t}"))
    }

    /// GET `url` and return the body of a 2xx response.
    fn get_bytes(
        &self,
        what: &str,
        url: &str,
        query: &[(&str, String)],
        accept: &str,
    ) -> Result<Vec<u8>> {
        let mut req = self
            .agent
            .get(url)
            .header("Accept", accept)
            .header("User-Agent", USER_AGENT)
            .header("X-GitHub-Api-Version", API_VERSION);
        for (k, v) in query {
            req = req.query(*k, v);
        }
        if let Some(auth) = self.bearer() {
            req = req.header("Authorization", &auth);
        }

        tracing::debug!(what, url, "GET");
        let mut resp = req
            .call()
            .map_err(|e| transport_error(what, e, self.config.timeout))?;
        let status = resp.status().as_u16();
        if !(200..300).contains(&status) {
            let body = resp.body_mut().read_to_string().unwrap_or_default();
            return Err(read_status_error(what, status, &body));
        }
        resp.body_mut()
            .read_to_vec()
            .map_err(|e| transport_error(what, e, self.config.timeout))
    }

    fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        what: &str,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let bytes = self.get_bytes(what, url, query, ACCEPT_JSON)?;
        serde_json::from_slice(&bytes)
            .map_err(|e| RotatorError::fetch(what, format!("unexpected response: {e}")))
    }
}

// ── Errors ──

fn transport_error(what: &str, err: ureq::Error, timeout: Duration) -> RotatorError {
    match err {
        ureq::Error::Timeout(_) => {
            RotatorError::fetch(what, format!("timed out after {}s", timeout.as_secs()))
        }
        other => RotatorError::fetch(what, other),
    }
}

#[derive(Deserialize)]
struct ApiMessage {
    message: String,
}

fn api_message(body: &str) -> String {
    serde_json::from_str::<ApiMessage>(body)
        .map(|m| m.message)
        .unwrap_or_else(|_| body.chars().take(200).collect())
}

fn read_status_error(what: &str, status: u16, body: &str) -> RotatorError {
    let message = api_message(body);
    match status {
        401 | 403 => RotatorError::Auth(format!("HTTP {status} reading {what}: {message}")),
        _ => RotatorError::fetch(what, format!("HTTP {status}: {message}")),
    }
}

fn dispatch_status_error(status: u16, body: &str) -> RotatorError {
    let message = api_message(body);
    match status {
        401 | 403 => RotatorError::Auth(format!("HTTP {status} on dispatch: {message}")),
        _ => RotatorError::Dispatch { status, message },
    }
}

// ── Wire types ──

#[derive(Deserialize)]
struct RunsPage {
    workflow_runs: Vec<WireRun>,
}

#[derive(Deserialize)]
struct WireRun {
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    updated_at: Option<OffsetDateTime>,
    conclusion: Option<String>,
    html_url: String,
    #[serde(default)]
    display_title: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

impl From<WireRun> for RunRecord {
    fn from(run: WireRun) -> Self {
        let title = run
            .display_title
            .or(run.name)
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_RUN_TITLE.to_string());
        RunRecord {
            created_at: run.created_at,
            updated_at: run.updated_at,
            conclusion: Conclusion::from_wire(run.conclusion.as_deref()),
            html_url: run.html_url,
            title,
        }
    }
}

fn parse_runs(bytes: &[u8]) -> Result<Vec<RunRecord>> {
    let page: RunsPage = serde_json::from_slice(bytes)
        .map_err(|e| RotatorError::fetch("run history", format!("unexpected response: {e}")))?;
    Ok(page.workflow_runs.into_iter().map(RunRecord::from).collect())
}

fn dispatch_body(git_ref: &str, inputs: &BTreeMap<String, String>) -> serde_json::Value {
    if inputs.is_empty() {
        serde_json::json!({ "ref": git_ref })
    } else {
        serde_json::json!({ "ref": git_ref, "inputs": inputs })
    }
}

// ── Gateway impls ──

impl ContentGateway for GithubClient {
    fn current_user(&self) -> Result<GithubUser> {
        if self.config.token.is_none() {
            return Err(RotatorError::Auth("no credential stored".into()));
        }
        self.get_json("user", &self.api_url("user"), &[])
    }

    fn list_files(&self, path: &str) -> Result<Vec<FileEntry>> {
        let url = self.repo_url(&format!("contents/{}", encode_path(path)));
        let value: serde_json::Value = self.get_json(path, &url, &[])?;
        // A file path answers with a single object instead of a listing.
        if !value.is_array() {
            return Err(RotatorError::fetch(path, "not a directory"));
        }
        serde_json::from_value(value)
            .map_err(|e| RotatorError::fetch(path, format!("unexpected response: {e}")))
    }

    fn run_history(&self, filter: &RunFilter) -> Result<Vec<RunRecord>> {
        let mut query = vec![("per_page", filter.per_page.to_string())];
        if let Some(event) = &filter.event {
            query.push(("event", event.clone()));
        }
        let bytes = self.get_bytes(
            "run history",
            &self.repo_url("actions/runs"),
            &query,
            ACCEPT_JSON,
        )?;
        parse_runs(&bytes)
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let url = self.repo_url(&format!("contents/{}", encode_path(path)));
        self.get_bytes(path, &url, &[], ACCEPT_RAW)
    }
}

impl DispatchGateway for GithubClient {
    fn dispatch_workflow(
        &self,
        workflow: &str,
        git_ref: &str,
        inputs: &BTreeMap<String, String>,
    ) -> Result<()> {
        let Some(auth) = self.bearer() else {
            return Err(RotatorError::Auth(
                "a token with workflow permission is required to dispatch".into(),
            ));
        };
        let url = self.repo_url(&format!(
            "actions/workflows/{}/dispatches",
            encode_component(workflow)
        ));
        let body = dispatch_body(git_ref, inputs);

        tracing::info!(workflow, git_ref, "dispatching workflow");
        let mut resp = self
            .agent
            .post(&url)
            .header("Accept", ACCEPT_JSON)
            .header("User-Agent", USER_AGENT)
            .header("X-GitHub-Api-Version", API_VERSION)
            .header("Authorization", &auth)
            .header("Content-Type", "application/json")
            .send(body.to_string())
            .map_err(|e| transport_error("dispatch", e, self.config.timeout))?;
        let status = resp.status().as_u16();
        if !(200..300).contains(&status) {
            let text = resp.body_mut().read_to_string().unwrap_or_default();
            return Err(dispatch_status_error(status, &text));
        }
        Ok(())
    }
}

/// Resolve the login behind `token` (used when no owner is configured).
pub fn whoami(api_base: &str, token: &str) -> Result<GithubUser> {
    let mut config = GithubConfig::new("", "");
    config.api_base = api_base.to_string();
    config.token = Some(token.to_string());
    GithubClient::new(config).current_user()
}

// ── Tests ──
