//! Status reconciliation: derive the dashboard health from run history.

use serde::Serialize;
use time::{Duration, OffsetDateTime};

use crate::schedule::Recurrence;
use crate::types::{Conclusion, RunRecord};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Health {
    Healthy,
    Degraded,
    Unknown,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DisplayStatus {
    pub health: Health,
    pub last_run: Option<RunRecord>,
    /// Whole seconds since the last run was created, clamped at zero.
    pub elapsed_secs: Option<i64>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub next_expected: Option<OffsetDateTime>,
}

impl DisplayStatus {
    pub fn unknown() -> Self {
        Self {
            health: Health::Unknown,
            last_run: None,
            elapsed_secs: None,
            next_expected: None,
        }
    }

    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed_secs.map(Duration::seconds)
    }
}

impl Default for DisplayStatus {
    fn default() -> Self {
        Self::unknown()
    }
}

/// Reduce history to a single status using only the most recent run.
///
/// Recency is by `created_at`; among equal timestamps the earlier list
/// position wins, matching the newest-first order of the history API.
pub fn reconcile(
    history: &[RunRecord],
    now: OffsetDateTime,
    recurrence: &Recurrence,
) -> DisplayStatus {
    let next_expected = recurrence.next_after(now);
    let latest = history
        .iter()
        .reduce(|best, r| if r.created_at > best.created_at { r } else { best });

    let Some(latest) = latest else {
        return DisplayStatus {
            next_expected,
            ..DisplayStatus::unknown()
        };
    };

    let health = match latest.conclusion {
        Conclusion::Success => Health::Healthy,
        _ => Health::Degraded,
    };
    let elapsed = (now - latest.created_at).max(Duration::ZERO);

    DisplayStatus {
        health,
        last_run: Some(latest.clone()),
        elapsed_secs: Some(elapsed.whole_seconds()),
        next_expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::format_description::well_known::Rfc3339;

    fn at(ts: &str) -> OffsetDateTime {
        OffsetDateTime::parse(ts, &Rfc3339).unwrap()
    }

    fn run(ts: &str, conclusion: Conclusion) -> RunRecord {
        RunRecord {
            created_at: at(ts),
            updated_at: None,
            conclusion,
            html_url: format!("https://example/runs/{ts}"),
            title: "Avatar update".into(),
        }
    }

    fn daily() -> Recurrence {
        Recurrence::parse("0 0 * * *").unwrap()
    }

    #[test]
    fn empty_history_is_unknown() {
        let status = reconcile(&[], at("2026-10-16T12:00:00Z"), &daily());
        assert_eq!(status.health, Health::Unknown);
        assert!(status.last_run.is_none());
        assert_eq!(
            status.next_expected,
            Some(at("2026-10-17T00:00:00Z"))
        );
    }

    #[test]
    fn latest_success_is_healthy_regardless_of_older_runs() {
        let history = vec![
            run("2026-10-16T00:00:00Z", Conclusion::Success),
            run("2026-10-15T00:00:00Z", Conclusion::Failure),
            run("2026-10-14T00:00:00Z", Conclusion::Failure),
        ];
        let status = reconcile(&history, at("2026-10-16T03:00:00Z"), &daily());
        assert_eq!(status.health, Health::Healthy);
        assert_eq!(status.elapsed_secs, Some(3 * 3600));
        assert_eq!(
            status.last_run.unwrap().created_at,
            at("2026-10-16T00:00:00Z")
        );
    }

    #[test]
    fn latest_non_success_is_degraded() {
        for conclusion in [Conclusion::Failure, Conclusion::Pending, Conclusion::Unknown] {
            let history = vec![
                run("2026-10-16T00:00:00Z", conclusion),
                run("2026-10-15T00:00:00Z", Conclusion::Success),
            ];
            let status = reconcile(&history, at("2026-10-16T01:00:00Z"), &daily());
            assert_eq!(status.health, Health::Degraded, "{conclusion:?}");
        }
    }

    #[test]
    fn picks_newest_even_when_unordered() {
        let history = vec![
            run("2026-10-14T00:00:00Z", Conclusion::Failure),
            run("2026-10-16T00:00:00Z", Conclusion::Success),
        ];
        let status = reconcile(&history, at("2026-10-16T01:00:00Z"), &daily());
        assert_eq!(status.health, Health::Healthy);
    }

    #[test]
    fn future_run_clamps_elapsed() {
        let history = vec![run("2026-10-16T05:00:00Z", Conclusion::Success)];
        let status = reconcile(&history, at("2026-10-16T04:59:00Z"), &daily());
        assert_eq!(status.elapsed_secs, Some(0));
    }

    #[test]
    fn next_expected_follows_schedule_not_fixed_offset() {
        let history = vec![run("2026-10-16T09:00:00Z", Conclusion::Success)];
        let hourly = Recurrence::parse("@hourly").unwrap();
        let status = reconcile(&history, at("2026-10-16T09:10:00Z"), &hourly);
        assert_eq!(status.next_expected, Some(at("2026-10-16T10:00:00Z")));

        let manual = reconcile(&history, at("2026-10-16T09:10:00Z"), &Recurrence::Manual);
        assert!(manual.next_expected.is_none());
    }
}
