//! User configuration (`~/.wip/config.toml`).
//!
//! ```toml
//! ignore_patterns = ["/tmp/*"]
//! hidden_directories = ["/home/me/private"]
//!
//! [store]
//! root = "/data/wip"
//! ```

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;
use globset::GlobBuilder;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const CONFIG_ENV: &str = "WIP_CONFIG";
const STORE_ENV: &str = "WIPS_HOME";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    /// Globs matched against the working directory; notes taken inside a
    /// match are not recorded.
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
    /// Absolute paths whose events are left out of listings by default.
    #[serde(default)]
    pub hidden_directories: Vec<String>,
    #[serde(default)]
    pub store: StoreSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
}

/// `$WIP_CONFIG`, else `~/.wip/config.toml`.
pub fn config_path() -> Result<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    let home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .context("Neither HOME nor USERPROFILE environment variables are set")?;
    Ok(home.join(".wip").join("config.toml"))
}

impl UserConfig {
    /// Missing file means defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("unable to read config at {}", path.display()))
            }
        };
        toml::from_str(&text)
            .with_context(|| format!("failed to parse config at {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = toml::to_string_pretty(self).context("failed to encode config")?;
        wips_store::fs::replace_file(path, text.as_bytes())
            .with_context(|| format!("failed to write config at {}", path.display()))
    }

    /// Load, `change`, save, all under an exclusive lock on `<config>.lock`
    /// so concurrent edits cannot drop each other's changes. The file is only
    /// rewritten when `change` succeeds and actually modified the config.
    pub fn update<T>(path: &Path, change: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let _lock = lock_exclusive(path)?;

        let before = Self::load(path)?;
        let mut config = before.clone();
        let outcome = change(&mut config)?;
        if config != before {
            config.save(path)?;
            debug!(path = %path.display(), "config updated");
        }
        Ok(outcome)
    }

    /// Returns `false` when `dir` was already listed.
    pub fn add_hidden(&mut self, dir: &str) -> bool {
        if self.hidden_directories.iter().any(|known| known == dir) {
            return false;
        }
        self.hidden_directories.push(dir.to_string());
        true
    }

    /// Returns `false` when `dir` was not listed.
    pub fn remove_hidden(&mut self, dir: &str) -> bool {
        let before = self.hidden_directories.len();
        self.hidden_directories.retain(|known| known != dir);
        self.hidden_directories.len() != before
    }

    /// Whether `cwd` matches one of the ignore globs. `*` stops at path
    /// separators; a malformed pattern is skipped with a warning.
    pub fn is_ignored(&self, cwd: &Path) -> bool {
        self.ignore_patterns.iter().any(|pattern| {
            match GlobBuilder::new(pattern).literal_separator(true).build() {
                Ok(glob) => glob.compile_matcher().is_match(cwd),
                Err(err) => {
                    warn!(%pattern, error = %err, "invalid ignore pattern");
                    false
                }
            }
        })
    }

    /// Store root precedence: explicit flag, `$WIPS_HOME`, `[store] root`.
    /// `None` leaves the choice to the platform default.
    pub fn store_root(&self, flag: Option<PathBuf>) -> Option<PathBuf> {
        flag.or_else(|| {
            std::env::var_os(STORE_ENV)
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
        })
        .or_else(|| self.store.root.clone())
    }
}

/// Held until the returned handle is dropped.
fn lock_exclusive(config: &Path) -> Result<File> {
    let mut name = config
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| "config.toml".into());
    name.push(".lock");
    let lock_path = config.with_file_name(name);

    if let Some(parent) = lock_path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let lock = File::create(&lock_path)
        .with_context(|| format!("failed to open {}", lock_path.display()))?;
    lock.lock_exclusive()
        .with_context(|| format!("failed to lock {}", lock_path.display()))?;
    Ok(lock)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let config = UserConfig::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, UserConfig::default());
    }

    #[test]
    fn parses_all_sections() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
ignore_patterns = ["/tmp/*"]
hidden_directories = ["/home/me/private"]

[store]
root = "/data/wip"

[sync]
default_targets = ["obsidian"]
"#,
        )
        .unwrap();

        let config = UserConfig::load(&path).unwrap();
        assert_eq!(config.ignore_patterns, vec!["/tmp/*"]);
        assert_eq!(config.hidden_directories, vec!["/home/me/private"]);
        assert_eq!(config.store.root, Some(PathBuf::from("/data/wip")));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "ignore_patterns = [").unwrap();
        assert!(UserConfig::load(&path).is_err());
    }

    #[test]
    fn save_then_load_keeps_hidden_list() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = UserConfig::default();
        assert!(config.add_hidden("/a"));
        assert!(!config.add_hidden("/a"));
        assert!(config.add_hidden("/b"));
        config.save(&path).unwrap();

        let mut loaded = UserConfig::load(&path).unwrap();
        assert_eq!(loaded.hidden_directories, vec!["/a", "/b"]);
        assert!(loaded.remove_hidden("/a"));
        assert!(!loaded.remove_hidden("/a"));
        assert_eq!(loaded.hidden_directories, vec!["/b"]);
    }

    #[test]
    fn concurrent_updates_keep_every_change() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let path = path.clone();
                std::thread::spawn(move || {
                    UserConfig::update(&path, |config| {
                        let added = config.add_hidden(&format!("/hidden/{i}"));
                        // widen the window between load and save
                        std::thread::sleep(std::time::Duration::from_millis(5));
                        Ok(added)
                    })
                    .unwrap()
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }

        let mut hidden = UserConfig::load(&path).unwrap().hidden_directories;
        hidden.sort();
        let mut expected: Vec<String> = (0..8).map(|i| format!("/hidden/{i}")).collect();
        expected.sort();
        assert_eq!(hidden, expected);
    }

    #[test]
    fn failed_update_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let result: Result<()> = UserConfig::update(&path, |config| {
            config.add_hidden("/a");
            anyhow::bail!("changed my mind")
        });
        assert!(result.is_err());
        assert!(!path.exists());

        UserConfig::update(&path, |config| Ok(config.remove_hidden("/a"))).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn ignore_globs_do_not_cross_separators() {
        let config = UserConfig {
            ignore_patterns: vec!["/tmp/*".to_string(), "[".to_string()],
            ..UserConfig::default()
        };
        assert!(config.is_ignored(Path::new("/tmp/scratch")));
        assert!(!config.is_ignored(Path::new("/tmp/scratch/deeper")));
        assert!(!config.is_ignored(Path::new("/home/me")));
    }

    #[test]
    fn explicit_store_root_wins() {
        let config = UserConfig {
            store: StoreSection {
                root: Some(PathBuf::from("/from/config")),
            },
            ..UserConfig::default()
        };
        assert_eq!(
            config.store_root(Some(PathBuf::from("/from/flag"))),
            Some(PathBuf::from("/from/flag"))
        );
    }
}
