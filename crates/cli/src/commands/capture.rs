use std::io::Write;
use std::path::Path;
use std::process::Command;

use anyhow::{bail, Context, Result};
use tracing::info;
use wips_store::{Event, EventType};

use crate::app::App;
use crate::context::Gathered;

pub const GIT_COMMIT: &str = "git-commit";

/// Records an event produced by a hook. `git_show` supplies the commit
/// description for `git-commit`.
pub fn run<F>(app: &App, kind: &str, git_show: F, out: &mut dyn Write) -> Result<()>
where
    F: FnOnce() -> Result<String>,
{
    if kind != GIT_COMMIT {
        bail!("unknown event type: {kind}");
    }

    let content = git_show().context("failed to get git show")?;
    let ctx = Gathered::collect(app.cwd.as_deref()).record(app.store.dicts());
    let event = Event::new(EventType::GitCommit, content.trim()).with_context(ctx);
    app.store
        .events()
        .append(&event)
        .context("failed to save event")?;

    info!(id = %event.id, "git commit captured");
    writeln!(out, "Git commit captured: {}", event.id)?;
    Ok(())
}

/// `git show --stat --oneline --no-color HEAD` in `dir`.
pub fn git_show_head(dir: Option<&Path>) -> Result<String> {
    let mut command = Command::new("git");
    command.args(["show", "--stat", "--oneline", "--no-color", "HEAD"]);
    if let Some(dir) = dir {
        command.current_dir(dir);
    }

    let output = command.output().context("failed to run git")?;
    if !output.status.success() {
        bail!(
            "git show exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    String::from_utf8(output.stdout).context("git show printed invalid UTF-8")
}
