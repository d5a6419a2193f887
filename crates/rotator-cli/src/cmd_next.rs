use std::path::Path;

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use rotator_core::schedule::Recurrence;
use rotator_store::{RotatorConfig, RotatorPaths};

/// `rotator next`: upcoming occurrences, computed offline.
pub fn execute(repo_root: &Path, schedule: Option<&str>, count: usize) -> anyhow::Result<()> {
    let expr = match schedule {
        Some(expr) => expr.to_string(),
        None => RotatorConfig::load(&RotatorPaths::discover(repo_root).config_json)?.schedule,
    };
    for line in upcoming_lines(&expr, OffsetDateTime::now_utc(), count)? {
        println!("{line}");
    }
    Ok(())
}

fn upcoming_lines(expr: &str, now: OffsetDateTime, count: usize) -> anyhow::Result<Vec<String>> {
    let recurrence = Recurrence::parse(expr)?;
    if recurrence == Recurrence::Manual {
        return Ok(vec!["manual: updates only run when dispatched".to_string()]);
    }
    let times = recurrence.upcoming(now, count.clamp(1, 100));
    if times.is_empty() {
        return Ok(vec![format!("`{recurrence}` never fires")]);
    }
    times
        .into_iter()
        .map(|t| Ok(t.format(&Rfc3339)?))
        .collect()
}
