use std::{io::Write, path::Path, time::Duration};

use anyhow::{anyhow, bail, Result};
use chrono::Utc;
use tokio::select;
use tracing::{debug, info};

use crate::timer::request::{FullState, Request, Response};

use super::{
    client::send_request,
    output::{describe_timer, print_staged},
};

const REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Keeps a live countdown in the terminal. The daemon owns no ticking, every redraw derives the
/// remaining time from the stored deadline. Leaving with ctrl-c counts as closing the surface, so a
/// running timer is paused and its time staged.
pub async fn watch(socket: &Path) -> Result<()> {
    let mut interval = tokio::time::interval(REFRESH_INTERVAL);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        select! {
            _ = &mut ctrl_c => break,
            _ = interval.tick() => {
                let state = full_state(socket).await?;
                let mut stdout = std::io::stdout().lock();
                if state.just_finished {
                    writeln!(stdout, "\x07\r\x1b[2KPomodoro finished!")?;
                }
                write!(stdout, "\r\x1b[2K{}", describe_timer(state.timer.as_ref(), Utc::now()))?;
                stdout.flush()?;
            }
        }
    }
    println!();

    info!("Watch closed");
    match send_request(socket, &Request::SurfaceClosed).await? {
        Ok(_) => debug!("Surface close delivered"),
        Err(e) => bail!("Daemon refused surface close: {e}"),
    }
    if let Some(segment) = full_state(socket).await?.staged_segment {
        print_staged(&segment);
    }
    Ok(())
}

async fn full_state(socket: &Path) -> Result<FullState> {
    match send_request(socket, &Request::GetFullState).await? {
        Ok(Response::FullState(state)) => Ok(state),
        Ok(other) => Err(anyhow!("Unexpected reply {other:?}")),
        Err(e) => Err(anyhow!("Daemon refused to share its state: {e}")),
    }
}
