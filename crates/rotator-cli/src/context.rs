use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use rotator_core::gateway::Gateway;
use rotator_github::{GithubClient, GithubConfig};
use rotator_session::{DashboardView, EventLoop, LoopHandle, NoticeLevel, Session, SessionSettings};
use rotator_store::{CredentialStore, RotatorConfig, RotatorPaths};

/// Everything a command needs before it talks to the network.
pub struct Context {
    pub paths: RotatorPaths,
    pub config: RotatorConfig,
    pub token: Option<String>,
}

impl Context {
    pub fn load(repo_root: &Path) -> anyhow::Result<Self> {
        let paths = RotatorPaths::discover(repo_root);
        let config = RotatorConfig::load(&paths.config_json)?;
        let token = CredentialStore::open_default().load()?;
        if token.is_none() {
            tracing::info!("no token stored; {}", crate::cmd_token::NO_TOKEN_NOTE);
        }
        Ok(Self {
            paths,
            config,
            token,
        })
    }

    pub fn settings(&self) -> anyhow::Result<SessionSettings> {
        settings_from(&self.config)
    }

    pub fn gateway(&self) -> anyhow::Result<Arc<dyn Gateway>> {
        let (owner, repo) = self.config.repository()?;
        let mut github = GithubConfig::new(owner, repo);
        github.api_base = self.config.api_base.clone();
        github.token = self.token.clone();
        github.timeout = self.config.request_timeout();
        Ok(Arc::new(GithubClient::new(github)))
    }

    /// Start a session loop on a fresh runtime and drive `f` against it.
    pub fn run<F, Fut, T>(&self, settings: SessionSettings, f: F) -> anyhow::Result<T>
    where
        F: FnOnce(LoopHandle) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let gateway = self.gateway()?;
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(async move {
            let handle = EventLoop::spawn(Session::new(settings), gateway);
            f(handle).await
        })
    }
}

pub fn settings_from(config: &RotatorConfig) -> anyhow::Result<SessionSettings> {
    let (owner, repo) = config.repository()?;
    let mut settings = SessionSettings::new(owner, repo);
    settings.avatars_dir = config.avatars_dir.clone();
    settings.workflow = config.workflow.clone();
    settings.git_ref = config.git_ref.clone();
    settings.apply_mode = config.apply_mode;
    settings.recurrence = config.recurrence()?;
    settings.web_base = config.web_base.clone();
    settings.record_path = config.record_path.clone();
    settings.history_limit = config.history_limit;
    settings.status_event = config.status_event.clone();
    settings.request_timeout = config.request_timeout();
    settings.poll_delay = config.poll_delay();
    Ok(settings)
}

/// Surface background failures that did not abort the command.
pub fn print_notices(view: &DashboardView) {
    for notice in &view.notices {
        match notice.level {
            NoticeLevel::Warning => eprintln!("warning: {}", notice.message),
            NoticeLevel::Error => eprintln!("error: {}", notice.message),
            NoticeLevel::Info | NoticeLevel::Success => {}
        }
    }
}
