use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::UnixStream,
};
use tracing::debug;

use crate::{daemon::Reply, timer::request::Request};

/// Sends one request to the daemon listening on `socket` and waits for its reply. The outer
/// error is about reaching the daemon, the inner one is the daemon refusing the action.
pub async fn send_request(socket: &Path, request: &Request) -> Result<Reply> {
    let stream = UnixStream::connect(socket).await.with_context(|| {
        format!("Couldn't reach the daemon at {socket:?}. Is it running? Try `bprod init`")
    })?;
    let (read, mut write) = stream.into_split();

    let mut raw = serde_json::to_string(request)?;
    raw.push('\n');
    debug!("Sending {raw}");
    write.write_all(raw.as_bytes()).await?;

    let line = BufReader::new(read)
        .lines()
        .next_line()
        .await?
        .ok_or_else(|| anyhow!("Daemon closed the connection without replying"))?;
    Ok(serde_json::from_str(&line)?)
}
