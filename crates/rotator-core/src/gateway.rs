//! Capabilities the session needs from the hosting platform.
//!
//! Calls are blocking; callers run them off the event loop.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::types::{FileEntry, GithubUser, RunFilter, RunRecord};

/// Read side: listings, run history, file contents.
pub trait ContentGateway: Send + Sync {
    /// The account the stored credential belongs to.
    fn current_user(&self) -> Result<GithubUser>;

    fn list_files(&self, path: &str) -> Result<Vec<FileEntry>>;

    /// Runs newest first.
    fn run_history(&self, filter: &RunFilter) -> Result<Vec<RunRecord>>;

    fn read_file(&self, path: &str) -> Result<Vec<u8>>;
}

/// Write side: trigger the update workflow.
pub trait DispatchGateway: Send + Sync {
    /// Fire-and-forget; success only means the platform accepted the request.
    fn dispatch_workflow(
        &self,
        workflow: &str,
        git_ref: &str,
        inputs: &BTreeMap<String, String>,
    ) -> Result<()>;
}

/// Both halves, as held by the session loop.
pub trait Gateway: ContentGateway + DispatchGateway {}

impl<T: ContentGateway + DispatchGateway> Gateway for T {}
