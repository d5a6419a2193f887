use std::path::Path;

use rotator_core::ApplyMode;
use rotator_session::{ApplyOutcome, Slot};

use crate::context::{print_notices, Context};

pub struct ApplyArgs {
    pub name: Option<String>,
    pub random: bool,
    pub mode: Option<String>,
    pub json: bool,
}

/// `rotator apply [NAME] [--random]`
pub fn apply(repo_root: &Path, args: ApplyArgs) -> anyhow::Result<()> {
    let ctx = Context::load(repo_root)?;
    let mut settings = ctx.settings()?;
    if let Some(mode) = &args.mode {
        settings.apply_mode = mode.parse::<ApplyMode>().map_err(anyhow::Error::msg)?;
    }
    if settings.apply_mode == ApplyMode::Dispatch && ctx.token.is_none() {
        anyhow::bail!("dispatch mode needs a token. Run `rotator token set` or use --mode record.");
    }

    let ApplyArgs {
        name, random, json, ..
    } = args;
    let outcome = ctx.run(settings, |session| async move {
        let view = session.refresh(vec![Slot::Catalog], true).await?;
        print_notices(&view);
        let chosen = match name {
            Some(name) if !random => session.select(&name).await?,
            _ => session.select_random().await?,
        };
        tracing::debug!(avatar = %chosen.name, "selected");
        anyhow::Ok(session.apply().await?)
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    match &outcome {
        ApplyOutcome::Dispatched { record, workflow } => {
            println!("Dispatched {workflow} for {}", record.avatar_name);
            println!("Run `rotator status` in a minute to see the result.");
        }
        ApplyOutcome::Instructions {
            record,
            instructions,
        } => {
            println!("Selected {}", record.avatar_name);
            println!("Commit this file as {}:", instructions.path);
            println!();
            println!("{}", instructions.document.trim_end());
            println!();
            println!("Create it at: {}", instructions.create_url);
        }
        ApplyOutcome::Failed { kind, error, .. } => {
            anyhow::bail!("apply failed ({kind}): {error}");
        }
    }
    Ok(())
}

/// `rotator adopt`
pub fn adopt(repo_root: &Path) -> anyhow::Result<()> {
    let ctx = Context::load(repo_root)?;
    let settings = ctx.settings()?;
    let record_path = settings.record_path.clone();
    let chosen = ctx.run(settings, |session| async move {
        session.refresh(vec![Slot::Catalog], true).await?;
        anyhow::Ok(session.adopt_record().await?)
    })?;
    println!("{record_path} selects {}", chosen.name);
    Ok(())
}

/// `rotator probe NAME`
pub fn probe(repo_root: &Path, name: &str) -> anyhow::Result<()> {
    let ctx = Context::load(repo_root)?;
    let settings = ctx.settings()?;
    let report = ctx.run(settings, |session| async move {
        session.refresh(vec![Slot::Catalog], true).await?;
        session.select(name).await?;
        anyhow::Ok(session.probe().await?)
    })?;

    let kind = report
        .detected
        .map(|k| format!("{k:?}").to_uppercase())
        .unwrap_or_else(|| "unrecognized".to_string());
    println!("{}: {} ({kind})", report.name, report.size_label);
    if report.ready {
        println!("ready to use");
    } else {
        anyhow::bail!("{} is not a usable PNG or JPEG image", report.name);
    }
    Ok(())
}
