//! Capture-time context: host, repository and working directory.
//!
//! Each piece is written to its dictionary namespace first and referenced
//! from the event by fingerprint. A failed dictionary write drops only that
//! reference; the event is still recorded.

use std::path::Path;
use std::process::Command;

use tracing::{debug, warn};
use wips_store::{DictStore, DictValue, EnvInfo, EventContext, Fingerprint, RepoInfo};

/// Everything gathered for one event before it is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gathered {
    pub env: EnvInfo,
    pub repo: Option<RepoInfo>,
    pub branch: Option<String>,
    pub head: Option<String>,
    pub cwd: Option<String>,
}

impl Gathered {
    /// Gathers the host and the git repository containing `cwd`.
    pub fn collect(cwd: Option<&Path>) -> Self {
        let repo = cwd.and_then(repo_info);
        let (branch, head) = match (cwd, &repo) {
            (Some(dir), Some(_)) => (
                run_git(dir, &["rev-parse", "--abbrev-ref", "HEAD"]),
                run_git(dir, &["rev-parse", "--short", "HEAD"]),
            ),
            _ => (None, None),
        };

        Self {
            env: env_info(),
            repo,
            branch,
            head,
            cwd: cwd.map(|dir| dir.display().to_string()),
        }
    }

    /// Saves the dictionary entries and builds the event's references.
    pub fn record(&self, dicts: &DictStore) -> EventContext {
        let mut ctx = EventContext::default();

        ctx.env_id = save(dicts, DictValue::Env(self.env.clone()));
        if let Some(repo) = &self.repo {
            ctx.repo_id = save(dicts, DictValue::Repo(repo.clone()));
            ctx.branch = self.branch.clone();
            ctx.head = self.head.clone();
        }
        if let Some(cwd) = &self.cwd {
            ctx.cwd_id = save(dicts, DictValue::Dir(cwd.clone()));
        }

        ctx
    }
}

fn save(dicts: &DictStore, value: DictValue) -> Option<Fingerprint> {
    let key = value.fingerprint();
    match dicts.save_if_absent(&key, &value) {
        Ok(_) => Some(key),
        Err(err) => {
            warn!(
                namespace = value.namespace().file_stem(),
                error = %err,
                "context not saved, reference omitted"
            );
            None
        }
    }
}

pub fn env_info() -> EnvInfo {
    let host = hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_default();
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .ok()
        .filter(|user| !user.is_empty())
        .unwrap_or_else(|| "unknown".to_string());

    EnvInfo::new(host, std::env::consts::OS, std::env::consts::ARCH, user)
}

/// `None` outside a git work tree or when git is not installed.
pub fn repo_info(dir: &Path) -> Option<RepoInfo> {
    let root = run_git(dir, &["rev-parse", "--show-toplevel"])?;
    let remote = run_git(dir, &["remote", "get-url", "origin"]);
    let name = Path::new(&root)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| root.clone());
    debug!(%root, ?remote, "repository detected");
    Some(RepoInfo::new(name, root, remote))
}

/// Trimmed stdout of a successful git call; `None` on any failure or empty
/// output.
pub fn run_git(dir: &Path, args: &[&str]) -> Option<String> {
    Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .ok()
        .and_then(|output| output.status.success().then_some(output.stdout))
        .and_then(|stdout| String::from_utf8(stdout).ok())
        .map(|raw| raw.trim().to_string())
        .filter(|output| !output.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wips_store::{Namespace, Store, StoreConfig};

    fn gathered() -> Gathered {
        Gathered {
            env: EnvInfo::new("box", "linux", "x86_64", "me"),
            repo: Some(RepoInfo::new(
                "wips",
                "/home/me/wips",
                Some("git@example.com:me/wips.git".to_string()),
            )),
            branch: Some("main".to_string()),
            head: Some("abc1234".to_string()),
            cwd: Some("/home/me/wips/src".to_string()),
        }
    }

    #[test]
    fn record_references_every_saved_entry() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(StoreConfig::new(dir.path())).unwrap();

        let ctx = gathered().record(store.dicts());
        assert_eq!(ctx.env_id, Some(Fingerprint::of("boxme")));
        assert_eq!(
            ctx.repo_id,
            Some(Fingerprint::of("git@example.com:me/wips.git"))
        );
        assert_eq!(ctx.cwd_id, Some(Fingerprint::of("/home/me/wips/src")));
        assert_eq!(ctx.branch.as_deref(), Some("main"));

        let dirs = store.dicts().load(Namespace::Dirs).unwrap();
        assert_eq!(
            dirs.dir(&Fingerprint::of("/home/me/wips/src")),
            Some("/home/me/wips/src")
        );
    }

    #[test]
    fn broken_namespace_only_drops_its_reference() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(StoreConfig::new(dir.path())).unwrap();
        std::fs::write(store.dicts().path(Namespace::Repos), "{ broken").unwrap();

        let ctx = gathered().record(store.dicts());
        assert_eq!(ctx.repo_id, None);
        assert!(ctx.env_id.is_some());
        assert!(ctx.cwd_id.is_some());
    }

    #[test]
    fn outside_a_repository_no_git_fields_are_set() {
        let dir = TempDir::new().unwrap();
        let gathered = Gathered::collect(Some(dir.path()));
        assert!(gathered.repo.is_none());
        assert!(gathered.branch.is_none());
        assert_eq!(gathered.cwd, Some(dir.path().display().to_string()));
    }

    #[test]
    fn run_git_failure_is_none() {
        let dir = TempDir::new().unwrap();
        assert_eq!(run_git(dir.path(), &["definitely-not-a-git-command"]), None);
    }
}
