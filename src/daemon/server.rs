use std::path::PathBuf;

use anyhow::Result;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{UnixListener, UnixStream},
    select,
    sync::{mpsc, oneshot},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::{error::ErrorReply, timer::request::Request};

use super::{DaemonMessage, Reply};

/// Control socket of the daemon. Each line a client writes is one JSON [Request], answered by one
/// JSON line holding a [Reply]. Requests are forwarded to the event loop, never handled here.
pub struct SocketServer {
    listener: UnixListener,
    path: PathBuf,
    sender: mpsc::Sender<DaemonMessage>,
    shutdown: CancellationToken,
}

impl SocketServer {
    /// Binds `path`, replacing a socket file left behind by a previous run.
    pub fn bind(
        path: PathBuf,
        sender: mpsc::Sender<DaemonMessage>,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        let listener = UnixListener::bind(&path)?;
        info!("Socket server listening on {path:?}");
        Ok(Self {
            listener,
            path,
            sender,
            shutdown,
        })
    }

    pub async fn run(self) -> Result<()> {
        loop {
            select! {
                _ = self.shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let sender = self.sender.clone();
                        tokio::spawn(
                            async move {
                                if let Err(e) = handle_client(stream, sender).await {
                                    warn!("Client connection failed {e:?}");
                                }
                            }
                            .instrument(info_span!("client")),
                        );
                    }
                    Err(e) => error!("Failed to accept connection {e}"),
                }
            }
        }

        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!("Failed to remove socket {:?} {e}", self.path);
        }
        Ok(())
    }
}

async fn handle_client(stream: UnixStream, sender: mpsc::Sender<DaemonMessage>) -> Result<()> {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let reply = dispatch(&line, &sender).await;
        let mut raw = serde_json::to_string(&reply)?;
        raw.push('\n');
        write.write_all(raw.as_bytes()).await?;
    }
    debug!("Client disconnected");
    Ok(())
}

async fn dispatch(line: &str, sender: &mpsc::Sender<DaemonMessage>) -> Reply {
    let request: Request = serde_json::from_str(line)
        .map_err(|e| ErrorReply::protocol(format!("malformed request: {e}")))?;
    debug!("Received {request:?}");

    let (reply, response) = oneshot::channel();
    sender
        .send(DaemonMessage::Request { request, reply })
        .await
        .map_err(|_| ErrorReply::protocol("daemon is shutting down"))?;
    response
        .await
        .map_err(|_| ErrorReply::protocol("daemon dropped the request"))?
}
