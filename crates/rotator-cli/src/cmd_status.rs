use std::path::Path;

use rotator_session::Slot;

use crate::context::{print_notices, Context};

/// `rotator status`
pub fn status(repo_root: &Path, json: bool) -> anyhow::Result<()> {
    let ctx = Context::load(repo_root)?;
    let settings = ctx.settings()?;
    let view = ctx.run(settings, |session| async move {
        anyhow::Ok(session.refresh(vec![Slot::Status], true).await?)
    })?;
    print_notices(&view);

    if json {
        println!("{}", serde_json::to_string_pretty(&view.display_status)?);
        return Ok(());
    }

    let status = &view.status;
    println!("{}: {}", view.repository, status.label);
    if let (Some(at), Some(ago)) = (&status.last_run_at, &status.elapsed_label) {
        println!("  last run:  {at} ({ago})");
    }
    if let Some(url) = &status.last_run_url {
        println!("  details:   {url}");
    }
    match &status.next_expected_at {
        Some(next) => println!("  next:      {next} ({})", view.schedule),
        None => println!("  next:      manual only"),
    }
    Ok(())
}

/// `rotator avatars`
pub fn avatars(repo_root: &Path, json: bool) -> anyhow::Result<()> {
    let ctx = Context::load(repo_root)?;
    let settings = ctx.settings()?;
    let view = ctx.run(settings, |session| async move {
        anyhow::Ok(session.refresh(vec![Slot::Catalog], true).await?)
    })?;
    print_notices(&view);

    if json {
        println!("{}", serde_json::to_string_pretty(&view.gallery)?);
        return Ok(());
    }

    if let Some(msg) = &view.gallery.empty_message {
        println!("{msg}");
        return Ok(());
    }
    println!("{} avatars in {}", view.gallery.count, view.repository);
    for item in &view.gallery.items {
        let size = item.size_label.as_deref().unwrap_or("-");
        println!("  {:<32} {size:>8}", item.name);
    }
    Ok(())
}

/// `rotator history`
pub fn history(repo_root: &Path, limit: Option<usize>, json: bool) -> anyhow::Result<()> {
    let ctx = Context::load(repo_root)?;
    let mut settings = ctx.settings()?;
    if let Some(limit) = limit {
        settings.history_limit = limit.max(1);
    }
    let view = ctx.run(settings, |session| async move {
        anyhow::Ok(session.refresh(vec![Slot::History], true).await?)
    })?;
    print_notices(&view);

    if json {
        println!("{}", serde_json::to_string_pretty(&view.history)?);
        return Ok(());
    }

    if view.history.is_empty() {
        println!("No runs yet");
        return Ok(());
    }
    for row in &view.history {
        println!("{}  {:<12} {}", row.created_at, row.outcome_label, row.title);
        println!("    {}", row.url);
    }
    Ok(())
}
