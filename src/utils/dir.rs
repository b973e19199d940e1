use std::{
    env, io,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Result};

pub const APPLICATION_NAME: &str = "bprod";

/// Resolves the directory holding the store, logs and the control socket.
pub fn create_application_default_path() -> Result<PathBuf> {
    let path = {
        #[cfg(windows)]
        {
            let mut path = PathBuf::from(
                env::var("APPDATA").map_err(|_| anyhow!("APPDATA should be present on Windows"))?,
            );
            path.push(APPLICATION_NAME);
            path
        }
        #[cfg(not(windows))]
        {
            let mut path = env::var("XDG_STATE_HOME")
                .map(PathBuf::from)
                .or_else(|_| {
                    env::var("HOME").map(|home| {
                        let mut path = PathBuf::from(home);
                        path.push(".local/state");
                        path
                    })
                })
                .map_err(|_| anyhow!("Couldn't find neither XDG_STATE_HOME nor HOME"))?;
            path.push(APPLICATION_NAME);
            path
        }
    };

    ensure_dir(path)
}

/// Uses `dir` when given, the default location otherwise.
pub fn resolve_application_path(dir: Option<PathBuf>) -> Result<PathBuf> {
    match dir {
        Some(dir) => ensure_dir(dir),
        None => create_application_default_path(),
    }
}

/// Creates `path` and makes it absolute, the daemon changes its working directory when it
/// detaches.
fn ensure_dir(path: PathBuf) -> Result<PathBuf> {
    match std::fs::create_dir_all(&path) {
        Ok(_) => (),
        Err(v) if v.kind() == io::ErrorKind::AlreadyExists => (),
        Err(v) => return Err(v.into()),
    }
    Ok(std::path::absolute(path)?)
}

pub fn store_dir(app_dir: &Path) -> PathBuf {
    app_dir.join("store")
}

pub fn log_dir(app_dir: &Path) -> PathBuf {
    app_dir.join("logs")
}

pub fn socket_path(app_dir: &Path) -> PathBuf {
    app_dir.join("bprod.sock")
}

/// The daemon binary installed next to the cli one.
pub fn to_daemon_path(mut path: PathBuf) -> PathBuf {
    path.set_file_name("bprod-daemon");
    #[cfg(windows)]
    {
        path.set_extension("exe");
    }
    path
}
