use std::io::Write;
use std::path::Path;

use anyhow::{bail, Result};

use crate::app::absolute;
use crate::config::UserConfig;

pub fn list(config: &UserConfig, store_root: &Path, out: &mut dyn Write) -> Result<()> {
    writeln!(out, "=== wip configuration ===")?;
    writeln!(out)?;
    writeln!(out, "Store Root:")?;
    writeln!(out, "  {}", store_root.display())?;
    print_list(out, "Hidden Directories:", &config.hidden_directories)?;
    print_list(out, "Ignore Patterns:", &config.ignore_patterns)?;
    Ok(())
}

fn print_list(out: &mut dyn Write, title: &str, items: &[String]) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "{title}")?;
    if items.is_empty() {
        writeln!(out, "  (none)")?;
    }
    for item in items {
        writeln!(out, "  - {item}")?;
    }
    Ok(())
}

/// Adds `path` (made absolute against `cwd`) to the hidden list and saves.
pub fn add_hidden(
    config_path: &Path,
    cwd: &Path,
    path: &str,
    out: &mut dyn Write,
) -> Result<()> {
    let dir = absolute(cwd, path).display().to_string();
    UserConfig::update(config_path, |config| Ok(config.add_hidden(&dir)))?;
    writeln!(out, "Added hidden directory: {dir}")?;
    Ok(())
}

pub fn remove_hidden(
    config_path: &Path,
    cwd: &Path,
    path: &str,
    out: &mut dyn Write,
) -> Result<()> {
    let dir = absolute(cwd, path).display().to_string();
    UserConfig::update(config_path, |config| {
        if !config.remove_hidden(&dir) {
            bail!("directory not found in hidden list: {dir}");
        }
        Ok(())
    })?;
    writeln!(out, "Removed hidden directory: {dir}")?;
    Ok(())
}
