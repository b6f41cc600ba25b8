use std::io::Write;
use std::process::Command;

use anyhow::{bail, Context, Result};

use crate::app::App;

const DEFAULT_EDITOR: &str = "vi";

/// Edits an event's content in `$EDITOR`. Without an id, the latest event of
/// the current month is edited.
pub fn run(app: &App, id: Option<&str>, out: &mut dyn Write) -> Result<()> {
    run_with(app, id, open_editor, out)
}

/// `edit` receives the current content and returns the new one.
pub fn run_with<F>(app: &App, id: Option<&str>, edit: F, out: &mut dyn Write) -> Result<()>
where
    F: FnOnce(&str) -> Result<String>,
{
    let target = match id {
        Some(id) => app
            .store
            .events()
            .get_by_id(id)
            .with_context(|| format!("event not found: {id}"))?,
        None => match app.latest_this_month()? {
            Some(event) => event,
            None => bail!("no events found for this month"),
        },
    };

    let edited = edit(&target.content).context("failed to open editor")?;
    // editors add a final newline on save
    let edited = edited.trim_end_matches(['\n', '\r']);
    if edited == target.content {
        writeln!(out, "No changes made.")?;
        return Ok(());
    }

    let id = target.id.to_string();
    app.store
        .events()
        .update_by_id(&id, |event| event.content = edited.to_string())
        .with_context(|| format!("failed to update event {id}"))?;

    writeln!(out, "Event {id} updated.")?;
    Ok(())
}

/// Writes `content` to a temp file, runs `$EDITOR` on it and reads it back.
/// `$EDITOR` may carry arguments (`code --wait`).
fn open_editor(content: &str) -> Result<String> {
    let editor = std::env::var("EDITOR")
        .ok()
        .filter(|editor| !editor.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_EDITOR.to_string());
    let mut words = editor.split_whitespace();
    let program = words.next().unwrap_or(DEFAULT_EDITOR);

    let mut file = tempfile::Builder::new()
        .prefix("wip-edit-")
        .suffix(".md")
        .tempfile()
        .context("failed to create temp file")?;
    file.write_all(content.as_bytes())
        .and_then(|_| file.flush())
        .context("failed to write temp file")?;

    let status = Command::new(program)
        .args(words)
        .arg(file.path())
        .status()
        .with_context(|| format!("failed to run editor '{program}'"))?;
    if !status.success() {
        bail!("editor '{program}' exited with {status}");
    }

    std::fs::read_to_string(file.path()).context("failed to read edited content")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::start_of_month;
    use crate::config::UserConfig;
    use chrono::Local;
    use tempfile::TempDir;
    use wips_store::{Event, EventType, Store, StoreConfig};

    fn app(dir: &TempDir) -> App {
        let store = Store::open(StoreConfig::new(dir.path())).unwrap();
        App::new(store, UserConfig::default(), None)
    }

    fn output(f: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> String {
        let mut out = Vec::new();
        f(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn edits_the_named_event() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);
        let first_moment = start_of_month(&Local::now()).unwrap();
        let earlier = Event::at(&first_moment, EventType::Note, "tpyo");
        let later = Event::new(EventType::Note, "latest");
        app.store.events().append(&earlier).unwrap();
        app.store.events().append(&later).unwrap();

        let id = earlier.id.to_string();
        let fix_typo =
            |old: &str| -> Result<String> { Ok(format!("{}\n", old.replace("tpyo", "typo"))) };
        let text = output(|out| run_with(&app, Some(&id), fix_typo, out));
        assert_eq!(text, format!("Event {id} updated.\n"));

        assert_eq!(app.store.events().get_by_id(&id).unwrap().content, "typo");
        assert_eq!(
            app.store.events().get_by_id(&later.id.to_string()).unwrap(),
            later
        );
    }

    #[test]
    fn defaults_to_latest_and_skips_unchanged() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);
        let event = Event::new(EventType::Note, "same");
        app.store.events().append(&event).unwrap();
        let shard = app
            .store
            .events()
            .shard_path(wips_store::ShardKey::for_time(&event.timestamp));
        let before = std::fs::read(&shard).unwrap();

        let text = output(|out| run_with(&app, None, |old| Ok(format!("{old}\n")), out));
        assert_eq!(text, "No changes made.\n");
        assert_eq!(std::fs::read(&shard).unwrap(), before);
    }

    #[test]
    fn empty_month_is_an_error() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);
        let err = run_with(&app, None, |_| panic!("no editor expected"), &mut Vec::new())
            .unwrap_err();
        assert!(err.to_string().contains("no events found"));
    }
}
