//! In-memory gateway for tests and offline demos.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{Result, RotatorError};
use crate::gateway::{ContentGateway, DispatchGateway};
use crate::types::{FileEntry, GithubUser, RunFilter, RunRecord};

/// A recorded `dispatch_workflow` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchCall {
    pub workflow: String,
    pub git_ref: String,
    pub inputs: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
struct Inner {
    user: Option<GithubUser>,
    listings: HashMap<String, Vec<FileEntry>>,
    runs: Vec<RunRecord>,
    files: HashMap<String, Vec<u8>>,
    dispatch_status: Option<u16>,
    fail_reads: bool,
    delay: Option<Duration>,
    dispatched: Vec<DispatchCall>,
}

#[derive(Debug, Default)]
pub struct FixtureGateway {
    inner: Mutex<Inner>,
}

impl FixtureGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, login: &str) -> Self {
        self.lock().user = Some(GithubUser {
            login: login.to_string(),
            name: None,
            avatar_url: None,
        });
        self
    }

    pub fn with_listing(self, path: &str, entries: Vec<FileEntry>) -> Self {
        self.set_listing(path, entries);
        self
    }

    pub fn with_runs(self, runs: Vec<RunRecord>) -> Self {
        self.lock().runs = runs;
        self
    }

    pub fn with_file(self, path: &str, bytes: &[u8]) -> Self {
        self.lock().files.insert(path.to_string(), bytes.to_vec());
        self
    }

    /// Make every dispatch answer with this HTTP status.
    pub fn with_dispatch_status(self, status: u16) -> Self {
        self.lock().dispatch_status = Some(status);
        self
    }

    /// Make every read fail as if the network were down.
    pub fn with_failing_reads(self) -> Self {
        self.lock().fail_reads = true;
        self
    }

    /// Block every read and dispatch for `delay` before answering.
    pub fn with_delay(self, delay: Duration) -> Self {
        self.lock().delay = Some(delay);
        self
    }

    pub fn set_listing(&self, path: &str, entries: Vec<FileEntry>) {
        self.lock().listings.insert(path.to_string(), entries);
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        self.lock().delay = delay;
    }

    pub fn set_runs(&self, runs: Vec<RunRecord>) {
        self.lock().runs = runs;
    }

    pub fn dispatched(&self) -> Vec<DispatchCall> {
        self.lock().dispatched.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn before_read(&self, what: &str) -> Result<()> {
        let (delay, fail) = {
            let inner = self.lock();
            (inner.delay, inner.fail_reads)
        };
        if let Some(d) = delay {
            std::thread::sleep(d);
        }
        if fail {
            return Err(RotatorError::fetch(what, "connection refused"));
        }
        Ok(())
    }
}

impl ContentGateway for FixtureGateway {
    fn current_user(&self) -> Result<GithubUser> {
        self.before_read("user")?;
        self.lock()
            .user
            .clone()
            .ok_or_else(|| RotatorError::Auth("no credential stored".into()))
    }

    fn list_files(&self, path: &str) -> Result<Vec<FileEntry>> {
        self.before_read(path)?;
        self.lock()
            .listings
            .get(path)
            .cloned()
            .ok_or_else(|| RotatorError::fetch(path, "HTTP 404"))
    }

    fn run_history(&self, filter: &RunFilter) -> Result<Vec<RunRecord>> {
        self.before_read("run history")?;
        let inner = self.lock();
        Ok(inner
            .runs
            .iter()
            .take(usize::from(filter.per_page))
            .cloned()
            .collect())
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        self.before_read(path)?;
        self.lock()
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| RotatorError::fetch(path, "HTTP 404"))
    }
}

impl DispatchGateway for FixtureGateway {
    fn dispatch_workflow(
        &self,
        workflow: &str,
        git_ref: &str,
        inputs: &BTreeMap<String, String>,
    ) -> Result<()> {
        let delay = self.lock().delay;
        if let Some(d) = delay {
            std::thread::sleep(d);
        }
        let mut inner = self.lock();
        inner.dispatched.push(DispatchCall {
            workflow: workflow.to_string(),
            git_ref: git_ref.to_string(),
            inputs: inputs.clone(),
        });
        match inner.dispatch_status {
            Some(status) if !(200..300).contains(&status) => Err(RotatorError::Dispatch {
                status,
                message: "rejected by fixture".into(),
            }),
            _ => Ok(()),
        }
    }
}
