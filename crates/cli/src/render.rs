//! Terminal rendering of events.

use std::path::Path;

use chrono::{DateTime, Duration, Local};
use wips_store::{Dictionary, Event, EventType};

/// `5m`, `3h`, `2d`, `1w`. Negative ages (clock skew) render as `0m`.
pub fn format_age(age: Duration) -> String {
    let age = age.max(Duration::zero());
    if age < Duration::hours(1) {
        format!("{}m", age.num_minutes())
    } else if age < Duration::days(1) {
        format!("{}h", age.num_hours())
    } else if age < Duration::weeks(1) {
        format!("{}d", age.num_days())
    } else {
        format!("{}w", age.num_weeks())
    }
}

pub fn icon(kind: &EventType) -> &'static str {
    match kind {
        EventType::Note => "📝",
        EventType::GitCommit => "🔧",
        EventType::Undo => "↩️ ",
        EventType::Other(_) => "•",
    }
}

/// One-line summary. Commits captured from `git show --oneline` start with
/// `<hash> <message>` and render as `<message> (<hash>)`; anything longer
/// than one line is cut with ` ...`.
pub fn summary(event: &Event) -> String {
    let mut text = event.content.clone();

    if event.kind == EventType::GitCommit {
        let first = text.lines().next().unwrap_or_default();
        let mut parts = first.split_whitespace();
        if let (Some(hash), Some(_)) = (parts.next(), parts.next()) {
            let message = first
                .trim_start()
                .strip_prefix(hash)
                .unwrap_or(first)
                .trim();
            text = format!("{message} ({hash})");
        }
    }

    let text = text.trim();
    match text.split_once('\n') {
        Some((first, _)) => format!("{} ...", first.trim_end()),
        None => text.to_string(),
    }
}

/// `@repo` when the repository is known, else the working directory's last
/// component.
pub fn context_label(event: &Event, repos: &Dictionary, dirs: &Dictionary) -> Option<String> {
    let repo = event
        .ctx
        .repo_id
        .as_ref()
        .and_then(|key| repos.repo(key))
        .map(|repo| format!("@{}", repo.name));

    repo.or_else(|| {
        let dir = event.ctx.cwd_id.as_ref().and_then(|key| dirs.dir(key))?;
        let base = Path::new(dir)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| dir.to_string());
        Some(format!("📁 {base}"))
    })
}

pub fn format_local(at: &DateTime<chrono::FixedOffset>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

/// Lays rows out in left-aligned columns two spaces apart. Cells are
/// measured in chars, which is close enough for the icons used here.
pub fn columns(rows: &[Vec<String>]) -> String {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut widths = vec![0usize; width];
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let mut out = String::new();
    for row in rows {
        let mut line = String::new();
        for (i, cell) in row.iter().enumerate() {
            line.push_str(cell);
            if i + 1 < row.len() {
                let pad = widths[i] - cell.chars().count() + 2;
                line.extend(std::iter::repeat(' ').take(pad));
            }
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}
