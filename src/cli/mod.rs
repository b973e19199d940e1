pub mod client;
pub mod dates;
pub mod output;
pub mod process;
pub mod watch;

use std::{env, path::PathBuf};

use anyhow::{bail, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use client::send_request;
use dates::{parse_day, DateStyle};
use output::print_response;
use process::{daemon_executable, kill_previous_servers, restart_server};
use tracing::{error, level_filters::LevelFilter};

use crate::{
    daemon::start_daemon,
    timer::request::Request,
    utils::{
        dir::{log_dir, resolve_application_path, socket_path},
        logging::{enable_logging, CLI_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "bprod", version, long_about = None)]
#[command(about = "Pomodoro timer that keeps a per-domain ledger of your day", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Enable logging")]
    log: bool,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Starts a daemon for the application")]
    Init,
    #[command(
        about = "Run a daemon directly in current console. Used for debugging"
    )]
    Serve,
    #[command(about = "Stop currently running daemon. Unsaved time is written to the ledger")]
    Stop,
    #[command(about = "Start a Pomodoro when idle, pause a running one, resume a paused one")]
    Toggle {
        #[arg(short, long, help = "Where the time goes. Used when starting")]
        domain: Option<String>,
        #[arg(
            short,
            long,
            value_parser = clap::value_parser!(u64).range(1..=1440),
            help = "Length in minutes, at most a day. Defaults to the configured Pomodoro"
        )]
        minutes: Option<u64>,
    },
    #[command(about = "Log the unsaved time of a paused timer")]
    Save,
    #[command(about = "Stop the timer and drop its unsaved time")]
    Reset,
    #[command(
        name = "pause-stage",
        about = "Pause the running timer and hold its time until commit or discard"
    )]
    PauseStage,
    #[command(about = "Log the staged time")]
    Commit,
    #[command(about = "Drop the staged time")]
    Discard,
    #[command(about = "Show the timer, staged time and focus session")]
    Status,
    #[command(about = "Live countdown. Ctrl-c stages a running timer")]
    Watch,
    #[command(about = "Open-ended focus sessions")]
    Focus {
        #[command(subcommand)]
        command: FocusCommand,
    },
    #[command(about = "Today's tasks")]
    Task {
        #[command(subcommand)]
        command: TaskCommand,
    },
    #[command(about = "Today's domains")]
    Domain {
        #[command(subcommand)]
        command: DomainCommand,
    },
    #[command(about = "Show or change the daily goal and Pomodoro length")]
    Settings {
        #[arg(long, help = "Daily goal in minutes, at most 1440")]
        goal: Option<i64>,
        #[arg(long, help = "Pomodoro length in minutes, at most 60")]
        pomodoro: Option<i64>,
    },
    #[command(about = "Delete every logged day")]
    Clear {
        #[arg(long, help = "Confirm deletion")]
        yes: bool,
    },
    #[command(about = "Totals, streaks and domains of a day")]
    Summary {
        #[arg(
            long,
            help = "Day to summarize. Examples are \"yesterday\", \"15/03/2025\". Defaults to today"
        )]
        date: Option<String>,
        #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
        date_style: DateStyle,
    },
    #[command(about = "Print logged days as JSON")]
    Export {
        #[arg(long, help = "First day to include")]
        from: Option<String>,
        #[arg(long, help = "Last day to include")]
        to: Option<String>,
        #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
        date_style: DateStyle,
    },
}

#[derive(Subcommand, Debug)]
enum FocusCommand {
    Start { domain: String },
    Stop,
}

#[derive(Subcommand, Debug)]
enum TaskCommand {
    Add { text: String },
    Toggle { index: usize },
    Delete { index: usize },
}

#[derive(Subcommand, Debug)]
enum DomainCommand {
    Delete { domain: String },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();
    let app_dir = resolve_application_path(args.dir)?;

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(CLI_PREFIX, &log_dir(&app_dir), logging_level, args.log)?;

    let request = match args.commands {
        Commands::Init => return restart_server(Some(&app_dir)),
        Commands::Stop => {
            let mut stopped = kill_previous_servers(&daemon_executable()?)?;
            stopped += kill_previous_servers(&env::current_exe()?)?;
            println!("Stopped {stopped} daemon(s)");
            return Ok(());
        }
        Commands::Serve => return start_daemon(app_dir).await,
        Commands::Watch => return watch::watch(&socket_path(&app_dir)).await,
        Commands::Toggle { domain, minutes } => Request::StartOrToggle {
            domain,
            duration_seconds: minutes.map(|minutes| minutes * 60),
        },
        Commands::Save => Request::Save,
        Commands::Reset => Request::Reset,
        Commands::PauseStage => Request::PauseAndStage,
        Commands::Commit => Request::CommitStaged,
        Commands::Discard => Request::DiscardStaged,
        Commands::Status => Request::GetFullState,
        Commands::Focus { command } => match command {
            FocusCommand::Start { domain } => Request::FocusStart { domain },
            FocusCommand::Stop => Request::FocusStop,
        },
        Commands::Task { command } => match command {
            TaskCommand::Add { text } => Request::AddTask { text },
            TaskCommand::Toggle { index } => Request::ToggleTask { index },
            TaskCommand::Delete { index } => Request::DeleteTask { index },
        },
        Commands::Domain {
            command: DomainCommand::Delete { domain },
        } => Request::DeleteDomain { domain },
        Commands::Settings { goal, pomodoro } => Request::UpdateSettings {
            daily_goal: goal,
            pom_duration: pomodoro,
        },
        Commands::Clear { yes } => {
            if !yes {
                bail!("Refusing to delete every logged day without --yes");
            }
            Request::ClearData
        }
        Commands::Summary { date, date_style } => Request::Summary {
            date: parse_day(date.as_deref(), date_style, Local::now(), "date")?,
        },
        Commands::Export {
            from,
            to,
            date_style,
        } => {
            let now = Local::now();
            Request::Export {
                from: parse_day(from.as_deref(), date_style, now, "start date")?,
                to: parse_day(to.as_deref(), date_style, now, "end date")?,
            }
        }
    };

    match send_request(&socket_path(&app_dir), &request).await? {
        Ok(response) => print_response(&response),
        Err(e) => {
            error!("Daemon refused {request:?}: {e}");
            bail!("{e}")
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::Args;

    #[test]
    fn test_toggle_minutes_are_bounded() {
        assert!(Args::try_parse_from(["bprod", "toggle", "--minutes", "25"]).is_ok());
        assert!(Args::try_parse_from(["bprod", "toggle", "--minutes", "1440"]).is_ok());
        for minutes in ["0", "1441", "99999999999999999"] {
            assert!(Args::try_parse_from(["bprod", "toggle", "--minutes", minutes]).is_err());
        }
    }
}
