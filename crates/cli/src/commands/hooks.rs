use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::info;

const POST_COMMIT: &str = "post-commit";

const POST_COMMIT_SCRIPT: &str = "#!/bin/sh
# wip hook: fail silently if wip is not found or fails
if command -v wip >/dev/null 2>&1; then
  wip capture git-commit || true
fi
exit 0
";

/// Installs the post-commit hook into `<repo>/.git/hooks`.
pub fn install(repo: &Path, force: bool, out: &mut dyn Write) -> Result<()> {
    let git_dir = repo.join(".git");
    if !git_dir.is_dir() {
        bail!("not a git repository (no .git directory found)");
    }

    let hooks_dir = git_dir.join("hooks");
    std::fs::create_dir_all(&hooks_dir)
        .with_context(|| format!("failed to create {}", hooks_dir.display()))?;

    let hook = hooks_dir.join(POST_COMMIT);
    if hook.exists() && !force {
        bail!(
            "{} already exists; rerun with --force to overwrite it",
            hook.display()
        );
    }

    std::fs::write(&hook, POST_COMMIT_SCRIPT)
        .with_context(|| format!("failed to write hook {}", hook.display()))?;
    make_executable(&hook)?;

    info!(hook = %hook.display(), "post-commit hook installed");
    writeln!(out, "Installed git hook: {}", hook.display())?;
    Ok(())
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .with_context(|| format!("failed to mark {} executable", path.display()))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
