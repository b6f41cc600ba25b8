use std::io::Write;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone};
use regex::Regex;
use wips_store::{Event, EventType};

use crate::app::App;
use crate::render::{columns, format_local, icon, summary};

#[derive(Debug, Clone, Default)]
pub struct SearchArgs {
    pub query: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub regex: bool,
    pub kind: Option<String>,
    pub tags: Vec<String>,
}

/// Content filter built once per search.
enum Matcher {
    Any,
    Substring(String),
    Pattern(Regex),
}

impl Matcher {
    fn new(query: Option<&str>, regex: bool) -> Result<Self> {
        Ok(match query.filter(|query| !query.is_empty()) {
            None => Matcher::Any,
            Some(query) if regex => {
                Matcher::Pattern(Regex::new(query).context("invalid regex")?)
            }
            Some(query) => Matcher::Substring(query.to_lowercase()),
        })
    }

    fn matches(&self, content: &str) -> bool {
        match self {
            Matcher::Any => true,
            Matcher::Substring(needle) => content.to_lowercase().contains(needle),
            Matcher::Pattern(pattern) => pattern.is_match(content),
        }
    }
}

pub fn run(app: &App, args: &SearchArgs, out: &mut dyn Write) -> Result<()> {
    let now = Local::now();
    let (start, end) = date_range(args, now)?;
    let matcher = Matcher::new(args.query.as_deref(), args.regex)?;
    let kind = args.kind.as_deref().map(parse_kind).transpose()?;
    let tags: Vec<String> = args
        .tags
        .iter()
        .map(|tag| format!("#{}", tag.to_lowercase()))
        .collect();

    let mut found: Vec<Event> = app
        .store
        .events()
        .scan(&start, &end)
        .context("failed to get events")?
        .into_iter()
        .filter(|event| kind.as_ref().map_or(true, |kind| &event.kind == kind))
        .filter(|event| matcher.matches(&event.content))
        .filter(|event| {
            let content = event.content.to_lowercase();
            tags.is_empty() || tags.iter().any(|tag| content.contains(tag.as_str()))
        })
        .collect();

    if found.is_empty() {
        writeln!(out, "No events found.")?;
        return Ok(());
    }

    // shards come back in month order only
    found.sort_by_key(|event| event.timestamp);

    let rows: Vec<Vec<String>> = found
        .iter()
        .map(|event| {
            vec![
                format_local(&event.timestamp),
                icon(&event.kind).to_string(),
                summary(event),
            ]
        })
        .collect();
    write!(out, "{}", columns(&rows))?;
    Ok(())
}

/// Defaults: from 2020-01-01 until now.
fn date_range(
    args: &SearchArgs,
    now: DateTime<Local>,
) -> Result<(DateTime<Local>, DateTime<Local>)> {
    let today = now.date_naive();

    let first_day = match args.from.as_deref() {
        Some(from) => parse_day(from, today).context("could not parse 'from' date")?,
        None => NaiveDate::from_ymd_opt(2020, 1, 1).context("invalid default start")?,
    };
    let start = local_midnight(first_day)?;

    let end = match args.to.as_deref() {
        Some(to) => {
            let day = parse_day(to, today).context("could not parse 'to' date")?;
            let next = day.succ_opt().context("date out of range")?;
            local_midnight(next)? - Duration::nanoseconds(1)
        }
        None => now,
    };

    Ok((start, end))
}

/// `today`, `yesterday`, or `YYYY-MM-DD`.
pub fn parse_day(input: &str, today: NaiveDate) -> Result<NaiveDate> {
    match input.trim().to_lowercase().as_str() {
        "today" => Ok(today),
        "yesterday" => today.pred_opt().context("date out of range"),
        other => NaiveDate::parse_from_str(other, "%Y-%m-%d")
            .with_context(|| format!("expected YYYY-MM-DD, today or yesterday, got '{input}'")),
    }
}

pub(crate) fn local_midnight(day: NaiveDate) -> Result<DateTime<Local>> {
    let naive = day.and_hms_opt(0, 0, 0).context("invalid time of day")?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .with_context(|| format!("{day} has no local midnight"))
}

pub fn parse_kind(input: &str) -> Result<EventType> {
    Ok(match input.trim().to_lowercase().as_str() {
        "note" => EventType::Note,
        "commit" | "git_commit" | "git-commit" => EventType::GitCommit,
        "undo" => EventType::Undo,
        other => bail!("unknown event type '{other}' (expected note, commit or undo)"),
    })
}
