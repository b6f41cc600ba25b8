use std::io::Write;

use anyhow::{Context, Result};
use chrono::Local;
use wips_store::{Event, Namespace, ShardKey};

use crate::app::App;
use crate::filter::{is_hidden, is_within};
use crate::render::{columns, context_label, format_age, icon, summary};

#[derive(Debug, Clone)]
pub struct TailArgs {
    pub lines: usize,
    pub show_id: bool,
    pub global: bool,
    pub include_hidden: bool,
}

/// Last events of the current month, oldest first.
pub fn run(app: &App, args: &TailArgs, out: &mut dyn Write) -> Result<()> {
    let now = Local::now();
    let events = app
        .store
        .events()
        .read_shard(ShardKey::for_time(&now))
        .context("failed to read this month's events")?;
    if events.is_empty() {
        writeln!(out, "No events found for this month.")?;
        return Ok(());
    }

    let dirs = app.dictionary(Namespace::Dirs);
    let repos = app.dictionary(Namespace::Repos);
    let cwd = app.cwd.as_ref().map(|cwd| cwd.display().to_string());

    let visible: Vec<&Event> = events
        .iter()
        .filter(|event| {
            let dir = event
                .ctx
                .cwd_id
                .as_ref()
                .and_then(|key| dirs.dir(key))
                .unwrap_or_default();
            if !args.include_hidden && is_hidden(dir, app.hidden_dirs()) {
                return false;
            }
            args.global || cwd.as_deref().is_some_and(|cwd| is_within(dir, cwd))
        })
        .collect();

    let skip = visible.len().saturating_sub(args.lines);
    let rows: Vec<Vec<String>> = visible[skip..]
        .iter()
        .map(|event| {
            let mut row = vec![
                format_age(now.signed_duration_since(event.timestamp)),
                icon(&event.kind).to_string(),
                summary(event),
            ];
            if args.global {
                row.push(context_label(event, &repos, &dirs).unwrap_or_default());
            }
            if args.show_id {
                row.push(event.id.to_string());
            }
            row
        })
        .collect();

    write!(out, "{}", columns(&rows))?;
    Ok(())
}
