//! Application state of one dashboard session. Only the event loop mutates
//! it; every method here is synchronous and free of I/O.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use time::OffsetDateTime;

use rotator_core::catalog::Catalog;
use rotator_core::probe::{probe, ProbeReport};
use rotator_core::reconcile::{reconcile, DisplayStatus};
use rotator_core::record::{SelectionRecord, SELECTION_RECORD_PATH};
use rotator_core::schedule::Recurrence;
use rotator_core::selection::SelectionState;
use rotator_core::view::{
    gallery_view, history_rows, status_view, GalleryView, HistoryRow, StatusView,
};
use rotator_core::{
    ApplyMode, AvatarCandidate, FileEntry, GithubUser, Result, RotatorError, RunFilter, RunRecord,
    SelectionMode, DEFAULT_AVATARS_DIR,
};

use crate::apply::{self, ApplyOutcome, ApplyPlan, ApplyTarget};
use crate::notice::{Notice, NoticeLevel, Notices};
use crate::seq::{RequestSeq, Slot, Ticket};

/// Everything the session needs to know about the repository it watches.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub owner: String,
    pub repo: String,
    pub avatars_dir: String,
    pub workflow: String,
    pub git_ref: String,
    pub apply_mode: ApplyMode,
    pub recurrence: Recurrence,
    pub web_base: String,
    pub record_path: String,
    pub history_limit: usize,
    pub status_event: Option<String>,
    pub request_timeout: Duration,
    pub poll_delay: Duration,
}

impl SessionSettings {
    pub fn new(owner: &str, repo: &str) -> Self {
        Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            avatars_dir: DEFAULT_AVATARS_DIR.to_string(),
            workflow: "update-avatar.yml".to_string(),
            git_ref: "main".to_string(),
            apply_mode: ApplyMode::Record,
            recurrence: Recurrence::Manual,
            web_base: "https://github.com".to_string(),
            record_path: SELECTION_RECORD_PATH.to_string(),
            history_limit: 10,
            status_event: None,
            request_timeout: Duration::from_secs(10),
            poll_delay: Duration::from_secs(5),
        }
    }

    pub fn apply_target(&self) -> ApplyTarget {
        ApplyTarget {
            mode: self.apply_mode,
            owner: self.owner.clone(),
            repo: self.repo.clone(),
            workflow: self.workflow.clone(),
            git_ref: self.git_ref.clone(),
            web_base: self.web_base.clone(),
            record_path: self.record_path.clone(),
        }
    }

    /// Filter for the status slot. Only the newest run matters there.
    pub fn status_filter(&self) -> RunFilter {
        RunFilter {
            event: self.status_event.clone(),
            per_page: 5,
        }
    }

    pub fn history_filter(&self) -> RunFilter {
        RunFilter {
            event: None,
            per_page: self.history_limit.clamp(1, 100) as u8,
        }
    }
}

/// A completed fetch for one slot.
#[derive(Debug)]
pub enum Fetched {
    User(Result<GithubUser>),
    Status(Result<Vec<RunRecord>>),
    Catalog(Result<Vec<FileEntry>>),
    History(Result<Vec<RunRecord>>),
}

impl Fetched {
    pub fn slot(&self) -> Slot {
        match self {
            Fetched::User(_) => Slot::User,
            Fetched::Status(_) => Slot::Status,
            Fetched::Catalog(_) => Slot::Catalog,
            Fetched::History(_) => Slot::History,
        }
    }
}

/// Serializable picture of the whole dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub repository: String,
    pub user: Option<GithubUser>,
    pub status: StatusView,
    pub display_status: DisplayStatus,
    pub gallery: GalleryView,
    pub history: Vec<HistoryRow>,
    pub selection: SelectionState,
    pub apply_mode: ApplyMode,
    pub schedule: String,
    pub last_apply: Option<ApplyOutcome>,
    pub last_probe: Option<ProbeReport>,
    pub notices: Vec<Notice>,
    pub loading: Vec<Slot>,
}

pub struct Session {
    settings: SessionSettings,
    seq: RequestSeq,
    user: Option<GithubUser>,
    catalog: Catalog,
    status_runs: Vec<RunRecord>,
    history: Vec<RunRecord>,
    selection: SelectionState,
    last_apply: Option<ApplyOutcome>,
    last_probe: Option<ProbeReport>,
    notices: Notices,
    rng: StdRng,
}

impl Session {
    pub fn new(settings: SessionSettings) -> Self {
        Self::with_rng(settings, StdRng::from_entropy())
    }

    pub fn with_rng(settings: SessionSettings, rng: StdRng) -> Self {
        Self {
            settings,
            seq: RequestSeq::default(),
            user: None,
            catalog: Catalog::default(),
            status_runs: Vec::new(),
            history: Vec::new(),
            selection: SelectionState::default(),
            last_apply: None,
            last_probe: None,
            notices: Notices::default(),
            rng,
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn history(&self) -> &[RunRecord] {
        &self.history
    }

    pub fn user(&self) -> Option<&GithubUser> {
        self.user.as_ref()
    }

    pub fn last_apply(&self) -> Option<&ApplyOutcome> {
        self.last_apply.as_ref()
    }

    // ── Fetch slots ──

    pub fn begin(&mut self, slot: Slot) -> Ticket {
        self.seq.issue(slot)
    }

    pub fn pending(&self) -> Vec<Slot> {
        self.seq.pending()
    }

    /// Apply a completed fetch unless a newer one for the same slot was
    /// issued meanwhile. Returns whether it was applied.
    pub fn complete(&mut self, ticket: Ticket, fetched: Fetched, now: OffsetDateTime) -> bool {
        if !self.seq.complete(&ticket) {
            tracing::debug!(
                slot = ticket.slot.as_str(),
                seq = ticket.seq,
                "discarding stale response"
            );
            return false;
        }
        match fetched {
            Fetched::User(Ok(user)) => self.user = Some(user),
            Fetched::User(Err(err)) => {
                self.user = None;
                // No credential is a normal read-only setup.
                if !matches!(err, RotatorError::Auth(_)) {
                    self.report(&err, now);
                }
            }
            Fetched::Status(Ok(runs)) => self.status_runs = runs,
            Fetched::Status(Err(err)) => self.report(&err, now),
            Fetched::Catalog(Ok(entries)) => {
                self.catalog = Catalog::from_listing(&entries);
                if self.selection.retain_in(&self.catalog) {
                    self.notices.push(
                        NoticeLevel::Info,
                        "The selected avatar is no longer in the catalog",
                        now,
                    );
                }
            }
            Fetched::Catalog(Err(err)) => {
                // Soft failure: empty catalog, selection left as is.
                self.catalog = Catalog::default();
                self.report(&err, now);
            }
            Fetched::History(Ok(runs)) => self.history = runs,
            Fetched::History(Err(err)) => self.report(&err, now),
        }
        true
    }

    // ── Selection ──

    pub fn select(&mut self, name: &str) -> Result<AvatarCandidate> {
        let candidate = self
            .catalog
            .find(name)
            .cloned()
            .ok_or_else(|| RotatorError::UnknownAvatar(name.to_string()))?;
        self.selection
            .select(candidate.clone(), SelectionMode::ManualInput);
        self.last_probe = None;
        Ok(candidate)
    }

    pub fn select_random(&mut self) -> Result<AvatarCandidate> {
        let picked = self.selection.select_random(&self.catalog, &mut self.rng)?;
        self.last_probe = None;
        Ok(picked)
    }

    pub fn clear(&mut self) {
        self.selection.clear();
        self.last_probe = None;
    }

    /// Select the candidate named by an existing selection record.
    pub fn adopt_record(&mut self, bytes: &[u8]) -> Result<AvatarCandidate> {
        let record = SelectionRecord::parse(bytes)?;
        let candidate = self
            .catalog
            .find(&record.avatar_name)
            .cloned()
            .ok_or_else(|| RotatorError::UnknownAvatar(record.avatar_name.clone()))?;
        self.selection
            .select(candidate.clone(), SelectionMode::ConfigFile);
        self.last_probe = None;
        Ok(candidate)
    }

    // ── Apply ──

    pub fn plan_apply(&mut self, now: OffsetDateTime) -> Result<ApplyPlan> {
        let plan = apply::plan(&self.selection, &self.settings.apply_target(), now)?;
        if let ApplyPlan::Record {
            record,
            instructions,
        } = &plan
        {
            self.last_apply = Some(ApplyOutcome::Instructions {
                record: record.clone(),
                instructions: instructions.clone(),
            });
        }
        Ok(plan)
    }

    pub fn finish_dispatch(
        &mut self,
        record: SelectionRecord,
        workflow: String,
        result: Result<()>,
        now: OffsetDateTime,
    ) -> Result<ApplyOutcome> {
        let (outcome, err) = apply::finish_dispatch(record, workflow, result);
        self.last_apply = Some(outcome.clone());
        match err {
            Some(err) => Err(err),
            None => {
                self.notices.push(
                    NoticeLevel::Success,
                    format!(
                        "Update for {} dispatched; status refreshes shortly",
                        outcome.record().avatar_name
                    ),
                    now,
                );
                Ok(outcome)
            }
        }
    }

    // ── Probe ──

    /// Name of the selected candidate, or `NothingSelected`.
    pub fn selected_name(&self) -> Result<String> {
        self.selection
            .candidate()
            .map(|c| c.name.clone())
            .ok_or(RotatorError::NothingSelected)
    }

    /// Check downloaded bytes for `name`. The report is only kept, and
    /// announced, while `name` is still the selected candidate.
    pub fn finish_probe(&mut self, name: &str, bytes: &[u8], now: OffsetDateTime) -> ProbeReport {
        let report = probe(name, bytes);
        if self.selected_name().ok().as_deref() != Some(name) {
            tracing::debug!(name, "selection changed; discarding image check");
            return report;
        }
        if report.ready {
            self.notices.push(
                NoticeLevel::Success,
                format!("{name} looks good ({})", report.size_label),
                now,
            );
        } else {
            self.notices.push(
                NoticeLevel::Warning,
                format!("{name} is not a valid image for its extension"),
                now,
            );
        }
        self.last_probe = Some(report.clone());
        report
    }

    // ── Schedule ──

    /// Replace the recurrence; returns its next occurrence after `now`.
    pub fn set_schedule(
        &mut self,
        expr: &str,
        now: OffsetDateTime,
    ) -> Result<Option<OffsetDateTime>> {
        let recurrence = Recurrence::parse(expr)?;
        let next = recurrence.next_after(now);
        self.settings.recurrence = recurrence;
        Ok(next)
    }

    // ── Notices ──

    /// Log a caught error and turn it into a notice.
    pub fn report(&mut self, err: &RotatorError, now: OffsetDateTime) {
        if err.is_user_error() {
            tracing::info!(kind = err.kind(), "{err}");
        } else {
            tracing::warn!(kind = err.kind(), "{err}");
        }
        self.notices.push_error(err, now);
    }

    pub fn dismiss(&mut self, id: u64) -> bool {
        self.notices.dismiss(id)
    }

    // ── View ──

    pub fn display_status(&self, now: OffsetDateTime) -> DisplayStatus {
        reconcile(&self.status_runs, now, &self.settings.recurrence)
    }

    pub fn snapshot(&mut self, now: OffsetDateTime) -> DashboardView {
        self.notices.expire(now);
        let display_status = self.display_status(now);
        let selected = self.selection.candidate().map(|c| c.name.as_str());
        DashboardView {
            repository: format!("{}/{}", self.settings.owner, self.settings.repo),
            user: self.user.clone(),
            status: status_view(&display_status),
            display_status,
            gallery: gallery_view(&self.catalog, selected, &self.settings.avatars_dir),
            history: history_rows(&self.history, self.settings.history_limit),
            selection: self.selection.clone(),
            apply_mode: self.settings.apply_mode,
            schedule: self.settings.recurrence.to_string(),
            last_apply: self.last_apply.clone(),
            last_probe: self.last_probe.clone(),
            notices: self.notices.active(now),
            loading: self.seq.pending(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rotator_core::Conclusion;
    use time::format_description::well_known::Rfc3339;

    fn now() -> OffsetDateTime {
        OffsetDateTime::parse("2026-10-16T09:00:00Z", &Rfc3339).unwrap()
    }

    fn session() -> Session {
        let mut settings = SessionSettings::new("octo", "profile");
        settings.recurrence = Recurrence::parse("0 0 * * *").unwrap();
        Session::with_rng(settings, StdRng::seed_from_u64(7))
    }

    fn listing() -> Vec<FileEntry> {
        vec![
            FileEntry::file("a.png", "https://raw/a.png"),
            FileEntry::file("b.txt", "https://raw/b.txt"),
            FileEntry::dir("sub"),
            FileEntry::file("c.JPG", "https://raw/c.JPG"),
        ]
    }

    fn loaded() -> Session {
        let mut s = session();
        let t = s.begin(Slot::Catalog);
        assert!(s.complete(t, Fetched::Catalog(Ok(listing())), now()));
        s
    }

    fn run(ts: &str, conclusion: Conclusion) -> RunRecord {
        RunRecord {
            created_at: OffsetDateTime::parse(ts, &Rfc3339).unwrap(),
            updated_at: None,
            conclusion,
            html_url: format!("https://github.com/octo/profile/actions/runs/{ts}"),
            title: "Avatar update".into(),
        }
    }

    #[test]
    fn stale_catalog_response_is_discarded() {
        let mut s = session();
        let old = s.begin(Slot::Catalog);
        let new = s.begin(Slot::Catalog);
        assert!(s.complete(new, Fetched::Catalog(Ok(listing())), now()));
        assert!(!s.complete(old, Fetched::Catalog(Ok(vec![])), now()));
        assert_eq!(s.catalog().len(), 2);
        assert!(s.pending().is_empty());
    }

    #[test]
    fn catalog_error_empties_catalog_and_notifies() {
        let mut s = loaded();
        s.select("a.png").unwrap();
        let t = s.begin(Slot::Catalog);
        let failed = Fetched::Catalog(Err(RotatorError::fetch("avatars", "HTTP 500")));
        s.complete(t, failed, now());
        assert!(s.catalog().is_empty());
        assert!(s.selection().is_selected());
        let view = s.snapshot(now());
        assert_eq!(view.notices.len(), 1);
        assert_eq!(view.notices[0].level, NoticeLevel::Error);
    }

    #[test]
    fn select_unknown_name_fails() {
        let mut s = loaded();
        let err = s.select("zzz.png").unwrap_err();
        assert_eq!(err.kind(), "unknown_avatar");
        assert!(!s.selection().is_selected());
    }

    #[test]
    fn select_random_on_empty_catalog_fails() {
        let mut s = session();
        assert_eq!(s.select_random().unwrap_err(), RotatorError::EmptyCatalog);
        let mut s = loaded();
        let picked = s.select_random().unwrap();
        assert!(s.catalog().contains(&picked.name));
    }

    #[test]
    fn refreshed_catalog_drops_vanished_selection() {
        let mut s = loaded();
        s.select("c.JPG").unwrap();
        let t = s.begin(Slot::Catalog);
        s.complete(
            t,
            Fetched::Catalog(Ok(vec![FileEntry::file("a.png", "u")])),
            now(),
        );
        assert!(!s.selection().is_selected());
    }

    #[test]
    fn record_apply_end_to_end() {
        let mut s = loaded();
        s.select("a.png").unwrap();
        let plan = s.plan_apply(now()).unwrap();
        let ApplyPlan::Record { record, .. } = plan else {
            panic!("record mode is the default");
        };
        assert_eq!(record.avatar_name, "a.png");
        assert_eq!(record.mode, SelectionMode::ManualInput);
        assert!(record.parsed_timestamp().is_ok());
        assert!(matches!(
            s.last_apply(),
            Some(ApplyOutcome::Instructions { .. })
        ));
    }

    #[test]
    fn failed_dispatch_is_kept_as_failure() {
        let mut s = loaded();
        s.settings.apply_mode = ApplyMode::Dispatch;
        s.select_random().unwrap();
        let ApplyPlan::Dispatch {
            record, workflow, ..
        } = s.plan_apply(now()).unwrap()
        else {
            panic!("dispatch mode");
        };
        assert_eq!(record.mode, SelectionMode::Random);
        let err = s
            .finish_dispatch(
                record,
                workflow,
                Err(RotatorError::Dispatch {
                    status: 404,
                    message: "Not Found".into(),
                }),
                now(),
            )
            .unwrap_err();
        assert_eq!(err.kind(), "dispatch_error");
        assert!(matches!(s.last_apply(), Some(ApplyOutcome::Failed { .. })));
    }

    #[test]
    fn adopt_record_selects_as_config_file() {
        let mut s = loaded();
        let doc = br#"{"avatarName":"c.JPG","timestamp":"2026-10-15T00:00:00Z","mode":"random","status":"success"}"#;
        let picked = s.adopt_record(doc).unwrap();
        assert_eq!(picked.name, "c.JPG");
        assert_eq!(
            s.selection().selected().unwrap().origin,
            SelectionMode::ConfigFile
        );
        assert_eq!(s.adopt_record(b"not json").unwrap_err().kind(), "record_error");
    }

    #[test]
    fn status_uses_recurrence() {
        let mut s = session();
        let t = s.begin(Slot::Status);
        s.complete(
            t,
            Fetched::Status(Ok(vec![
                run("2026-10-16T00:00:05Z", Conclusion::Success),
                run("2026-10-15T00:00:05Z", Conclusion::Failure),
            ])),
            now(),
        );
        let view = s.snapshot(now());
        assert_eq!(view.status.label, "Last update succeeded");
        assert_eq!(
            view.status.next_expected_at.as_deref(),
            Some("2026-10-17T00:00:00Z")
        );

        let next = s.set_schedule("30 12 * * *", now()).unwrap();
        assert_eq!(next, OffsetDateTime::parse("2026-10-16T12:30:00Z", &Rfc3339).ok());
        assert_eq!(s.snapshot(now()).schedule, "30 12 * * *");
        assert!(s.set_schedule("61 * * * *", now()).is_err());
    }

    #[test]
    fn missing_credential_is_quiet() {
        let mut s = session();
        let t = s.begin(Slot::User);
        s.complete(t, Fetched::User(Err(RotatorError::Auth("none".into()))), now());
        assert!(s.snapshot(now()).notices.is_empty());
    }

    #[test]
    fn probe_mismatch_warns() {
        let mut s = loaded();
        s.select("a.png").unwrap();
        let report = s.finish_probe("a.png", b"<html>", now());
        assert!(!report.ready);
        let view = s.snapshot(now());
        assert_eq!(view.notices[0].level, NoticeLevel::Warning);
        assert!(view.last_probe.is_some());
    }

    #[test]
    fn check_for_replaced_selection_is_discarded() {
        let mut s = loaded();
        s.select("a.png").unwrap();
        s.select("c.JPG").unwrap();
        let report = s.finish_probe("a.png", b"<html>", now());
        assert!(!report.ready);
        let view = s.snapshot(now());
        assert!(view.last_probe.is_none());
        assert!(view.notices.is_empty());

        s.clear();
        s.finish_probe("c.JPG", b"<html>", now());
        assert!(s.snapshot(now()).last_probe.is_none());
    }
}
