//! Pure data → view-model mapping. No I/O and no formatting decisions leak
//! back into the state types.

use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};

use crate::catalog::Catalog;
use crate::reconcile::{DisplayStatus, Health};
use crate::types::{Conclusion, RunRecord};

const BYTE_UNITS: &[&str] = &["Bytes", "KB", "MB", "GB"];

/// Human-readable size, 1024-based, at most two decimals.
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut unit = 0;
    let mut value = bytes as f64;
    while value >= 1024.0 && unit < BYTE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let mut text = format!("{value:.2}");
    if text.contains('.') {
        text = text.trim_end_matches('0').trim_end_matches('.').to_string();
    }
    format!("{text} {}", BYTE_UNITS[unit])
}

/// Relative age such as `5m ago` or `2h 10m ago`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let mins = elapsed.whole_minutes();
    if mins < 1 {
        return "just now".to_string();
    }
    let (days, hours, mins) = (mins / 1440, (mins % 1440) / 60, mins % 60);
    if days > 0 {
        format!("{days}d {hours}h ago")
    } else if hours > 0 {
        format!("{hours}h {mins}m ago")
    } else {
        format!("{mins}m ago")
    }
}

fn rfc3339(t: OffsetDateTime) -> String {
    t.format(&Rfc3339).unwrap_or_else(|_| t.to_string())
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatusView {
    pub health: Health,
    pub label: String,
    pub last_run_at: Option<String>,
    pub last_run_url: Option<String>,
    pub elapsed_label: Option<String>,
    /// `None` when updates only happen manually.
    pub next_expected_at: Option<String>,
}

pub fn status_view(status: &DisplayStatus) -> StatusView {
    let label = match status.health {
        Health::Healthy => "Last update succeeded",
        Health::Degraded => "Last update failed",
        Health::Unknown => "No runs yet",
    };
    StatusView {
        health: status.health,
        label: label.to_string(),
        last_run_at: status.last_run.as_ref().map(|r| rfc3339(r.created_at)),
        last_run_url: status.last_run.as_ref().map(|r| r.html_url.clone()),
        elapsed_label: status.elapsed().map(format_elapsed),
        next_expected_at: status.next_expected.map(rfc3339),
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HistoryRow {
    pub created_at: String,
    pub title: String,
    pub outcome_label: String,
    /// CSS-ish badge class: `success`, `danger` or `pending`.
    pub badge: &'static str,
    pub url: String,
}

/// Newest `limit` runs as table rows, preserving input order.
pub fn history_rows(runs: &[RunRecord], limit: usize) -> Vec<HistoryRow> {
    runs.iter()
        .take(limit)
        .map(|r| {
            let (outcome_label, badge) = match r.conclusion {
                Conclusion::Success => ("Succeeded", "success"),
                Conclusion::Pending => ("In progress", "pending"),
                Conclusion::Failure => ("Failed", "danger"),
                Conclusion::Unknown => ("Did not complete", "danger"),
            };
            HistoryRow {
                created_at: rfc3339(r.created_at),
                title: r.title.clone(),
                outcome_label: outcome_label.to_string(),
                badge,
                url: r.html_url.clone(),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GalleryItem {
    pub name: String,
    pub url: String,
    pub size_label: Option<String>,
    pub selected: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GalleryView {
    pub count: usize,
    pub items: Vec<GalleryItem>,
    pub empty_message: Option<String>,
}

pub fn gallery_view(catalog: &Catalog, selected: Option<&str>, avatars_dir: &str) -> GalleryView {
    let items: Vec<GalleryItem> = catalog
        .candidates()
        .iter()
        .map(|c| GalleryItem {
            name: c.name.clone(),
            url: c.url.clone(),
            size_label: c.size.map(format_bytes),
            selected: selected == Some(c.name.as_str()),
        })
        .collect();
    let empty_message = items
        .is_empty()
        .then(|| format!("No avatars available. Add PNG or JPEG images to {avatars_dir}/"));
    GalleryView {
        count: items.len(),
        items,
        empty_message,
    }
}
