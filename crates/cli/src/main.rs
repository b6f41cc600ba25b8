// # -----------------------------
// # crates/cli/src/main.rs
// # -----------------------------
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};
use wips_cli::commands::{
    self,
    search::SearchArgs,
    summary::{Period, SummaryArgs},
    tail::TailArgs,
};
use wips_cli::config::{config_path, UserConfig};
use wips_cli::App;
use wips_store::StoreConfig;

#[derive(Parser, Debug)]
#[command(
    name = "wip",
    version,
    about = "Quick memos and lightweight journaling with automatic git commit capture",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    /// Note to record
    message: Option<String>,
    /// Store directory (overrides WIPS_HOME and the config file)
    #[arg(long = "home", global = true, value_name = "DIR")]
    home: Option<PathBuf>,
    /// Log level (trace, debug, info, warn, error, off). Overrides RUST_LOG if set.
    #[arg(long = "log-level", global = true, value_name = "LEVEL")]
    log_level: Option<String>,
    /// Emit logs as JSON lines (with targets, files and line numbers)
    #[arg(long = "json-logs", global = true)]
    json_logs: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Capture internal events (e.g. git-commit)
    #[command(hide = true)]
    Capture {
        /// Event kind; only `git-commit` is known
        kind: String,
    },
    /// Show recent events
    #[command(visible_alias = "t")]
    Tail {
        /// Number of events to show
        #[arg(short = 'n', long = "lines", default_value_t = 10)]
        lines: usize,
        /// Display event IDs
        #[arg(short = 'i', long = "id")]
        id: bool,
        /// Show all events regardless of the current directory
        #[arg(short = 'g', long = "global")]
        global: bool,
        /// Include hidden directories in output
        #[arg(long = "include-hidden")]
        include_hidden: bool,
    },
    /// Search for events
    Search {
        /// Text to look for (case-insensitive)
        query: Option<String>,
        /// Start date (YYYY-MM-DD, today, yesterday)
        #[arg(short = 'f', long = "from")]
        from: Option<String>,
        /// End date, inclusive (YYYY-MM-DD, today, yesterday)
        #[arg(short = 't', long = "to")]
        to: Option<String>,
        /// Treat the query as a regular expression
        #[arg(short = 'r', long = "regex")]
        regex: bool,
        /// Filter by event type (note, commit, undo)
        #[arg(long = "type")]
        kind: Option<String>,
        /// Filter by #tag mentions
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Summarize activities by day and repository
    #[command(visible_alias = "sum")]
    Summary {
        /// Today's activities (default)
        #[arg(long = "day")]
        day: bool,
        /// This week's activities
        #[arg(long = "week")]
        week: bool,
        /// Last week's activities
        #[arg(long = "last-week")]
        last_week: bool,
        /// Activities of today and the N days before it
        #[arg(short = 'd', long = "days", default_value_t = 0)]
        days: u32,
        /// Show only git commits
        #[arg(long = "commits-only", conflicts_with = "notes_only")]
        commits_only: bool,
        /// Show only notes
        #[arg(long = "notes-only")]
        notes_only: bool,
        /// Write to a file instead of stdout
        #[arg(short = 'o', long = "out", value_name = "FILE")]
        output: Option<PathBuf>,
        /// Output format (pretty, md, txt)
        #[arg(short = 'f', long = "format", default_value = "pretty")]
        format: String,
        /// Include hidden directories
        #[arg(long = "include-hidden", conflicts_with = "hidden_only")]
        include_hidden: bool,
        /// Show only hidden directories
        #[arg(long = "hidden-only")]
        hidden_only: bool,
    },
    /// Edit an event in $EDITOR (latest of this month if no ID)
    #[command(visible_alias = "e")]
    Edit { id: Option<String> },
    /// Delete an event (latest of this month if no ID)
    Delete { id: Option<String> },
    /// Manage git hooks
    Hooks {
        #[command(subcommand)]
        action: HooksAction,
    },
    /// Manage wip configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum HooksAction {
    /// Install the post-commit hook in the current repository
    Install {
        /// Overwrite an existing post-commit hook
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// List current configuration
    List,
    /// Add a directory to the hidden list
    AddHidden { path: String },
    /// Remove a directory from the hidden list
    RemoveHidden { path: String },
}

/// Initialize logging based on CLI arguments and environment
fn init_logging(log_level: Option<&str>, json_logs: bool) {
    let filter = if let Some(level) = log_level {
        match level.to_lowercase().as_str() {
            "off" => EnvFilter::new("off"),
            "error" => EnvFilter::new("error"),
            "warn" | "warning" => EnvFilter::new("warn"),
            "info" => EnvFilter::new("info"),
            "debug" => EnvFilter::new("debug"),
            "trace" => EnvFilter::new("trace"),
            _ => {
                eprintln!("Warning: Invalid log level '{}', using 'warn'", level);
                EnvFilter::new("warn")
            }
        }
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    // stdout carries command output only
    if json_logs {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }
}

fn current_dir() -> Result<PathBuf> {
    std::env::current_dir().context("failed to get current directory")
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref(), cli.json_logs);
    tracing::debug!("CLI arguments: {:?}", cli);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        None => match cli.message {
            Some(message) => {
                let app = App::init(cli.home)?;
                commands::note::run(&app, &message, &mut out)?;
            }
            None => Cli::command().print_help()?,
        },
        Some(Commands::Capture { kind }) => {
            let app = App::init(cli.home)?;
            let cwd = app.cwd.clone();
            commands::capture::run(
                &app,
                &kind,
                || commands::capture::git_show_head(cwd.as_deref()),
                &mut out,
            )?;
        }
        Some(Commands::Tail {
            lines,
            id,
            global,
            include_hidden,
        }) => {
            let app = App::init(cli.home)?;
            let args = TailArgs {
                lines,
                show_id: id,
                global,
                include_hidden,
            };
            commands::tail::run(&app, &args, &mut out)?;
        }
        Some(Commands::Search {
            query,
            from,
            to,
            regex,
            kind,
            tags,
        }) => {
            let app = App::init(cli.home)?;
            let args = SearchArgs {
                query,
                from,
                to,
                regex,
                kind,
                tags,
            };
            commands::search::run(&app, &args, &mut out)?;
        }
        Some(Commands::Summary {
            day: _,
            week,
            last_week,
            days,
            commits_only,
            notes_only,
            output,
            format,
            include_hidden,
            hidden_only,
        }) => {
            let app = App::init(cli.home)?;
            let args = SummaryArgs {
                period: Period::from_flags(week, last_week, days),
                commits_only,
                notes_only,
                include_hidden,
                hidden_only,
                format: format.parse()?,
                output,
            };
            commands::summary::run(&app, &args, &mut out)?;
        }
        Some(Commands::Edit { id }) => {
            let app = App::init(cli.home)?;
            commands::edit::run(&app, id.as_deref(), &mut out)?;
        }
        Some(Commands::Delete { id }) => {
            let app = App::init(cli.home)?;
            commands::delete::run(&app, id.as_deref(), &mut out)?;
        }
        Some(Commands::Hooks {
            action: HooksAction::Install { force },
        }) => {
            commands::hooks::install(&current_dir()?, force, &mut out)?;
        }
        Some(Commands::Config { action }) => {
            let path = config_path()?;
            match action {
                ConfigAction::List => {
                    let config = UserConfig::load(&path).context("failed to load config")?;
                    let store = StoreConfig::resolve(config.store_root(cli.home))
                        .context("failed to resolve store location")?;
                    commands::config::list(&config, store.root(), &mut out)?;
                }
                ConfigAction::AddHidden { path: dir } => {
                    commands::config::add_hidden(&path, &current_dir()?, &dir, &mut out)?;
                }
                ConfigAction::RemoveHidden { path: dir } => {
                    commands::config::remove_hidden(&path, &current_dir()?, &dir, &mut out)?;
                }
            }
        }
    }

    out.flush()?;
    Ok(())
}
