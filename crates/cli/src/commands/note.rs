use std::io::Write;

use anyhow::{Context, Result};
use tracing::info;
use wips_store::{Event, EventType};

use crate::app::App;
use crate::context::Gathered;

/// Records `message` as a note with the current context.
pub fn run(app: &App, message: &str, out: &mut dyn Write) -> Result<()> {
    if let Some(cwd) = &app.cwd {
        if app.config.is_ignored(cwd) {
            writeln!(out, "Ignored by config.")?;
            return Ok(());
        }
    }

    let ctx = Gathered::collect(app.cwd.as_deref()).record(app.store.dicts());
    let event = Event::new(EventType::Note, message).with_context(ctx);
    app.store
        .events()
        .append(&event)
        .context("failed to save event")?;

    info!(id = %event.id, "note recorded");
    writeln!(out, "✅ Note recorded: {message} (ID: {})", event.id)?;
    Ok(())
}
