//! Activity summaries: events of a period grouped by day, then by the
//! repository or directory they were recorded in.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Datelike, Duration, Local, NaiveDate};
use wips_store::{Dictionary, Event, EventType, Namespace};

use crate::app::App;
use crate::commands::search::local_midnight;
use crate::filter::is_hidden;
use crate::render::{icon, summary};

const UNKNOWN_PLACE: &str = "(unknown)";

/// Time window of a summary, always ending now except for `LastWeek`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Period {
    #[default]
    Day,
    /// Since Monday of the current week.
    Week,
    /// Monday through Sunday of the previous week.
    LastWeek,
    /// Today plus the `n` days before it.
    Days(u32),
}

impl Period {
    /// `--last-week` wins over `--week`, which wins over `--days`.
    pub fn from_flags(week: bool, last_week: bool, days: u32) -> Self {
        if last_week {
            Period::LastWeek
        } else if week {
            Period::Week
        } else if days > 0 {
            Period::Days(days)
        } else {
            Period::Day
        }
    }

    pub fn range(&self, now: DateTime<Local>) -> Result<(DateTime<Local>, DateTime<Local>)> {
        let today = now.date_naive();
        let monday = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));

        Ok(match self {
            Period::Day => (local_midnight(today)?, now),
            Period::Week => (local_midnight(monday)?, now),
            Period::LastWeek => (
                local_midnight(monday - Duration::days(7))?,
                local_midnight(monday)? - Duration::nanoseconds(1),
            ),
            Period::Days(days) => (
                local_midnight(today - Duration::days(i64::from(*days)))?,
                now,
            ),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// Indented terminal view with icons.
    #[default]
    Pretty,
    Markdown,
    Text,
}

impl FromStr for Format {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.trim().to_lowercase().as_str() {
            "pretty" => Format::Pretty,
            "md" | "markdown" => Format::Markdown,
            "txt" | "text" => Format::Text,
            other => bail!("unknown format '{other}' (expected pretty, md or txt)"),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct SummaryArgs {
    pub period: Period,
    pub commits_only: bool,
    pub notes_only: bool,
    pub include_hidden: bool,
    pub hidden_only: bool,
    pub format: Format,
    /// Write to this file instead of stdout; `Pretty` becomes Markdown.
    pub output: Option<PathBuf>,
}

/// Events of one local day keyed by place label. Labels are `@repo`,
/// `📁 /full/path` or `(unknown)` and iterate in byte order.
#[derive(Debug, Clone, PartialEq)]
pub struct DayGroup {
    pub date: NaiveDate,
    pub places: BTreeMap<String, Vec<Event>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
    /// Oldest day first.
    pub days: Vec<DayGroup>,
}

pub fn run(app: &App, args: &SummaryArgs, out: &mut dyn Write) -> Result<()> {
    let now = Local::now();
    let summary = collect(app, args, now)?;
    if summary.days.is_empty() {
        writeln!(out, "No events found.")?;
        return Ok(());
    }

    match &args.output {
        Some(path) => {
            let format = match args.format {
                Format::Pretty => Format::Markdown,
                other => other,
            };
            let text = render_export(&summary, format);
            wips_store::fs::replace_file(path, text.as_bytes())
                .with_context(|| format!("failed to write {}", path.display()))?;
            writeln!(out, "Exported to {}", path.display())?;
        }
        None => {
            let text = match args.format {
                Format::Pretty => render_pretty(&summary, now.date_naive()),
                format => render_export(&summary, format),
            };
            write!(out, "{text}")?;
        }
    }
    Ok(())
}

/// Scans the period, applies the type and hidden-directory filters and
/// groups what is left.
pub fn collect(app: &App, args: &SummaryArgs, now: DateTime<Local>) -> Result<Summary> {
    let (start, end) = args.period.range(now)?;
    let mut events = app
        .store
        .events()
        .scan(&start, &end)
        .context("failed to get events")?;

    let repos = app.dictionary(Namespace::Repos);
    let dirs = app.dictionary(Namespace::Dirs);

    events.retain(|event| {
        if args.commits_only && event.kind != EventType::GitCommit {
            return false;
        }
        if args.notes_only && event.kind != EventType::Note {
            return false;
        }

        let dir = event
            .ctx
            .cwd_id
            .as_ref()
            .and_then(|key| dirs.dir(key))
            .unwrap_or_default();
        let hidden = is_hidden(dir, app.hidden_dirs());
        if args.hidden_only {
            hidden
        } else {
            args.include_hidden || !hidden
        }
    });
    events.sort_by_key(|event| event.timestamp);

    let mut days: Vec<DayGroup> = Vec::new();
    for event in events {
        let date = event.timestamp.with_timezone(&Local).date_naive();
        if days.last().map(|day| day.date) != Some(date) {
            days.push(DayGroup {
                date,
                places: BTreeMap::new(),
            });
        }
        let label = place_label(&event, &repos, &dirs);
        if let Some(day) = days.last_mut() {
            day.places.entry(label).or_default().push(event);
        }
    }

    Ok(Summary { start, end, days })
}

fn place_label(event: &Event, repos: &Dictionary, dirs: &Dictionary) -> String {
    if let Some(repo) = event.ctx.repo_id.as_ref().and_then(|key| repos.repo(key)) {
        return format!("@{}", repo.name);
    }
    if let Some(dir) = event.ctx.cwd_id.as_ref().and_then(|key| dirs.dir(key)) {
        return format!("📁 {dir}");
    }
    UNKNOWN_PLACE.to_string()
}

fn local_time(event: &Event) -> String {
    event.timestamp.with_timezone(&Local).format("%H:%M").to_string()
}

pub fn render_pretty(summary_data: &Summary, today: NaiveDate) -> String {
    let mut text = String::new();
    for day in &summary_data.days {
        text.push('\n');
        text.push_str(&day.date.format("%Y-%m-%d (%a)").to_string());
        if day.date == today {
            text.push_str(" [Today]");
        }
        text.push('\n');

        for (place, events) in &day.places {
            text.push_str(&format!("  {place}\n"));
            for event in events {
                text.push_str(&format!(
                    "    {}  {}  {}\n",
                    local_time(event),
                    icon(&event.kind),
                    summary(event)
                ));
            }
        }
    }
    text
}

/// Markdown or plain-text export. Notes keep their full content; commits
/// show their subject with the hash in brackets.
pub fn render_export(summary_data: &Summary, format: Format) -> String {
    let markdown = format == Format::Markdown;
    let range = format!(
        "{} - {}",
        summary_data.start.format("%Y-%m-%d"),
        summary_data.end.format("%Y-%m-%d")
    );

    let mut text = if markdown {
        format!("# Activities ({range})\n\n")
    } else {
        format!("Activities ({range})\n\n")
    };

    for day in &summary_data.days {
        let date = day.date.format("%Y-%m-%d");
        if markdown {
            text.push_str(&format!("\n## {date}\n\n"));
        } else {
            text.push_str(&format!("\n[{date}]\n"));
        }

        for (place, events) in &day.places {
            if markdown {
                text.push_str(&format!("### {place}\n\n"));
            } else {
                text.push_str(&format!("\n{place}\n"));
            }
            for event in events {
                let time = local_time(event);
                let content = export_content(event);
                if markdown {
                    text.push_str(&format!("- **{time}**: {content}\n"));
                } else {
                    text.push_str(&format!("- {time} {content}\n"));
                }
            }
            text.push('\n');
        }
    }
    text
}

fn export_content(event: &Event) -> String {
    if event.kind != EventType::GitCommit {
        return event.content.clone();
    }

    let first = event.content.lines().next().unwrap_or_default();
    let mut words = first.split_whitespace();
    match (words.next(), words.next()) {
        (Some(hash), Some(_)) => {
            let message = first
                .trim_start()
                .strip_prefix(hash)
                .unwrap_or(first)
                .trim();
            format!("{message} [{hash}]")
        }
        _ => first.to_string(),
    }
}
