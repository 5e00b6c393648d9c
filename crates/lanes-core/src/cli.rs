use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::projector::SortOrder;
use crate::task::{TaskId, TaskPriority, TaskStatus};

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "lanes",
    version,
    about = "Lanes: kanban board client for a REST task backend",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "lanesrc")]
    pub lanesrc: Option<PathBuf>,

    /// Backend base URL, e.g. http://localhost:8000
    #[arg(long = "api-url")]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Show every column of the board
    Board {
        #[arg(long, value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<SortOrder>()))]
        sort: Option<SortOrder>,
    },
    /// Show one task in detail
    Show { id: TaskId },
    /// Create a task
    Add {
        title: String,
        #[arg(short = 'd', long)]
        description: Option<String>,
        /// Column to create the task in; the form pins it
        #[arg(short = 's', long, value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<TaskStatus>()))]
        status: Option<TaskStatus>,
        #[arg(short = 'p', long, value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<TaskPriority>()))]
        priority: Option<TaskPriority>,
        /// Due date: YYYY-MM-DD, YYYY-MM-DDTHH:MM, RFC 3339, today, tomorrow
        #[arg(long)]
        due: Option<String>,
    },
    /// Edit the fields of a task; an empty --due clears the due date
    Edit {
        id: TaskId,
        #[arg(short = 't', long)]
        title: Option<String>,
        #[arg(short = 'd', long)]
        description: Option<String>,
        #[arg(short = 's', long, value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<TaskStatus>()))]
        status: Option<TaskStatus>,
        #[arg(short = 'p', long, value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<TaskPriority>()))]
        priority: Option<TaskPriority>,
        #[arg(long)]
        due: Option<String>,
    },
    /// Drag a task onto another column
    Move {
        id: TaskId,
        #[arg(value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<TaskStatus>()))]
        status: TaskStatus,
    },
    /// Delete a task
    Delete { id: TaskId },
}

impl Default for Command {
    fn default() -> Self {
        Command::Board { sort: None }
    }
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls positional `rc.key=value` / `rc.key:value` overrides out of the
/// argument list before clap sees it.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = if let Some((k, v)) = rest.split_once('=') {
                Some((format!("rc.{k}"), v.to_string()))
            } else if let Some((k, v)) = rest.split_once(':') {
                Some((format!("rc.{k}"), v.to_string()))
            } else {
                None
            };

            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((k, v));
                continue;
            }
        }

        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}
