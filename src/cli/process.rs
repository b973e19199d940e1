use std::{
    path::{Path, PathBuf},
    process::Stdio,
};

use anyhow::{anyhow, Result};
use sysinfo::{get_current_pid, Signal, System};
use tracing::info;

use crate::utils::dir::to_daemon_path;

/// Terminates every process started from `name` except this one and its children. SIGTERM is tried
/// first so the daemon gets to flush unsaved time. Returns how many were stopped.
pub fn kill_previous_servers(name: &Path) -> Result<usize> {
    let system = System::new_all();
    let current_id = get_current_pid().map_err(|e| anyhow!("Can't get current pid {e}"))?;
    let mut stopped = 0;
    for (pid, process) in system.processes().iter() {
        if *pid == current_id {
            continue;
        }
        if matches!(process.parent(), Some(p) if p == current_id) {
            continue;
        }

        if process
            .exe()
            .filter(|v| v.exists())
            .filter(|v| name == *v)
            .is_some()
        {
            info!("Stopping {pid}");
            // This will forcefully terminate the process on Windows. Anything better will require a
            // lot more work.
            if process.kill_with(Signal::Term).is_none() {
                process.kill();
            }
            process.wait();
            stopped += 1;
        }
    }
    Ok(stopped)
}

pub fn daemon_executable() -> Result<PathBuf> {
    Ok(to_daemon_path(std::env::current_exe()?))
}

/// Shuts down a previous daemon and starts a new one. The daemon binary detaches itself.
pub fn restart_server(dir: Option<&Path>) -> Result<()> {
    let daemon = daemon_executable()?;
    kill_previous_servers(&daemon)?;

    let mut command = std::process::Command::new(&daemon);
    if let Some(dir) = dir {
        command.arg("--dir").arg(dir);
    }
    command.stdin(Stdio::null());
    command.stdout(Stdio::null());

    println!("Spawning {daemon:?}");
    let status = command.status()?;
    if !status.success() {
        return Err(anyhow!("Daemon launcher exited with {status}"));
    }
    println!("Success");
    Ok(())
}
