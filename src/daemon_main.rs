use std::{env::args, path::PathBuf};

use anyhow::Result;
use bprod::{
    daemon::{args::DaemonArgs, start_daemon},
    utils::{
        dir::{log_dir, resolve_application_path},
        logging::{enable_logging, DAEMON_PREFIX},
        runtime::single_thread_runtime,
    },
};
use clap::Parser;

fn main() -> Result<()> {
    run_service(args().collect::<Vec<_>>())
}

fn run_service(command_args: Vec<String>) -> Result<()> {
    let args = DaemonArgs::parse_from(&command_args);
    let app_dir = resolve_application_path(args.dir.clone())?;

    #[cfg(unix)]
    if !args.force {
        use daemonize::Daemonize;

        let daemonize = Daemonize::new()
            .stdout(daemonize::Stdio::devnull())
            .stderr(daemonize::Stdio::devnull())
            .execute();
        match daemonize {
            daemonize::Outcome::Parent(parent) => {
                parent.inspect_err(|e| eprintln!("Failed to create daemon on parent side {e:?}"))?;
                println!("Created daemon");
                return Ok(());
            }
            daemonize::Outcome::Child(child) => {
                child?;
            }
        }
    }

    run(args, app_dir)
}

fn run(args: DaemonArgs, app_dir: PathBuf) -> Result<()> {
    enable_logging(DAEMON_PREFIX, &log_dir(&app_dir), args.log, args.log_console)?;
    single_thread_runtime()?.block_on(async move { start_daemon(app_dir).await })?;
    Ok(())
}
