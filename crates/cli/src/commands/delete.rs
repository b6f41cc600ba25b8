use std::io::Write;

use anyhow::{bail, Context, Result};

use crate::app::App;

/// Deletes an event; without an id, the latest one of the current month.
pub fn run(app: &App, id: Option<&str>, out: &mut dyn Write) -> Result<()> {
    let id = match id {
        Some(id) => id.to_string(),
        None => {
            let Some(latest) = app.latest_this_month()? else {
                bail!("no events found for this month");
            };
            writeln!(out, "Deleting latest event: {}", latest.content)?;
            latest.id.to_string()
        }
    };

    app.store
        .events()
        .delete_by_id(&id)
        .with_context(|| format!("failed to delete event {id}"))?;

    writeln!(out, "Event {id} deleted.")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::start_of_month;
    use crate::config::UserConfig;
    use chrono::Local;
    use tempfile::TempDir;
    use wips_store::{Event, EventType, Store, StoreConfig, StoreError};

    fn app(dir: &TempDir) -> App {
        let store = Store::open(StoreConfig::new(dir.path())).unwrap();
        App::new(store, UserConfig::default(), None)
    }

    #[test]
    fn deletes_latest_by_default() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);
        let first_moment = start_of_month(&Local::now()).unwrap();
        let keep = Event::at(&first_moment, EventType::Note, "keep");
        let oops = Event::new(EventType::Note, "oops");
        app.store.events().append(&keep).unwrap();
        app.store.events().append(&oops).unwrap();

        let mut out = Vec::new();
        run(&app, None, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Deleting latest event: oops\n"));
        assert!(text.contains(&format!("Event {} deleted.", oops.id)));

        assert_eq!(app.latest_this_month().unwrap(), Some(keep));
    }

    #[test]
    fn unknown_id_is_not_found() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);
        let ghost = Event::new(EventType::Note, "never stored");
        let err = run(&app, Some(&ghost.id.to_string()), &mut Vec::new()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::NotFound { .. })
        ));
    }
}
