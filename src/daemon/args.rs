use std::path::PathBuf;

use clap::Parser;
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "bprod-daemon", version, about = "Background Pomodoro timer")]
pub struct DaemonArgs {
    /// Run in the foreground instead of detaching.
    #[arg(long)]
    pub force: bool,
    /// Application directory. By default $XDG_STATE_HOME/bprod or $HOME/.local/state/bprod.
    #[arg(long)]
    pub dir: Option<PathBuf>,
    /// This option is for debugging purposes only.
    #[arg(long = "log-console")]
    pub log_console: bool,
    #[arg(long = "log-filter")]
    pub log: Option<LevelFilter>,
}
