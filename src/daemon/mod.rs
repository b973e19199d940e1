use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use chrono::{DateTime, Local, TimeZone, Utc};
use notify::TerminalNotifier;
use scheduler::TokioDeadlineScheduler;
use server::SocketServer;
use tokio::{
    select,
    sync::{mpsc, oneshot},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    error::{ErrorReply, TimerError},
    ledger::{repository::LedgerRepository, store::FileBlobStore},
    timer::{
        request::{Request, Response},
        service::TimerService,
    },
    utils::{
        clock::{Clock, DefaultClock},
        dir::{socket_path, store_dir},
    },
};

pub mod args;
pub mod notify;
pub mod scheduler;
pub mod server;
pub mod shutdown;

const MESSAGE_BUFFER: usize = 16;

/// What a connection answers with: the response, or why the action was refused.
pub type Reply = Result<Response, ErrorReply>;

/// Everything the event loop reacts to. Requests from clients and deadline triggers share one
/// queue, so they are applied strictly one after another.
#[derive(Debug)]
pub enum DaemonMessage {
    Request {
        request: Request,
        reply: oneshot::Sender<Reply>,
    },
    Deadline(DateTime<Utc>),
}

/// Represents the starting point for the daemon
pub async fn start_daemon(dir: PathBuf) -> Result<()> {
    let (sender, receiver) = mpsc::channel::<DaemonMessage>(MESSAGE_BUFFER);
    let shutdown_token = CancellationToken::new();
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);

    let service = create_service(store_dir(&dir), sender.clone(), clock, Local)?;
    let server = SocketServer::bind(socket_path(&dir), sender, shutdown_token.clone())?;

    let (_, server_result, _) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token.clone()),
        server.run(),
        run_event_loop(service, receiver, shutdown_token),
    );

    if let Err(server_result) = server_result {
        error!("Socket server got an error {:?}", server_result);
    }

    Ok(())
}

fn create_service<Tz: TimeZone>(
    store_dir: PathBuf,
    sender: mpsc::Sender<DaemonMessage>,
    clock: Arc<dyn Clock>,
    timezone: Tz,
) -> Result<TimerService<Tz>> {
    let repository = LedgerRepository::new(FileBlobStore::new(store_dir)?);
    let scheduler = TokioDeadlineScheduler::new(sender, clock.clone());
    Ok(TimerService::new(
        repository,
        clock,
        timezone,
        Box::new(scheduler),
        Box::new(TerminalNotifier),
    ))
}

/// Executes the daemon event loop. Startup recovery runs before the first message and teardown
/// after the last one, whatever stopped the loop.
pub async fn run_event_loop<Tz: TimeZone>(
    mut service: TimerService<Tz>,
    mut receiver: mpsc::Receiver<DaemonMessage>,
    shutdown: CancellationToken,
) {
    service.on_startup().await;
    info!("Daemon is ready");

    loop {
        let message = select! {
            _ = shutdown.cancelled() => break,
            message = receiver.recv() => message,
        };
        match message {
            Some(DaemonMessage::Request { request, reply }) => {
                let result = service.handle(request).await.map_err(|e| {
                    log_failure(&e);
                    ErrorReply::from(&e)
                });
                if reply.send(result).is_err() {
                    debug!("Client went away before the reply");
                }
            }
            Some(DaemonMessage::Deadline(deadline)) => {
                if let Err(e) = service.deadline_fired(deadline).await {
                    error!("Failed to complete timer {e}");
                }
            }
            None => break,
        }
    }

    info!("Shutting down");
    service.on_teardown().await;
}

fn log_failure(error: &TimerError) {
    match error {
        TimerError::Storage(e) => error!("Request failed on storage {e}"),
        TimerError::InvalidTransition(reason) => debug!("Request refused: {reason}"),
        TimerError::InvalidInput(reason) => warn!("Invalid request: {reason}"),
    }
}

#[cfg(test)]
mod daemon_tests {
    use anyhow::Result;
    use chrono::Duration;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use crate::{
        cli::client::send_request,
        daemon::{run_event_loop, server::SocketServer, DaemonMessage},
        error::ErrorKind,
        timer::{
            request::{Request, Response},
            test_support::{at, TestService},
        },
    };

    /// Drives a real socket and event loop: a timer started through a client is flushed to the
    /// ledger when the daemon shuts down.
    #[tokio::test]
    async fn smoke_test_daemon() -> Result<()> {
        let test = TestService::new(at(3, 9, 0, 0))?;
        let service = test.relaxed();
        let socket = test.dir.path().join("test.sock");

        let (sender, receiver) = mpsc::channel::<DaemonMessage>(4);
        let shutdown_token = CancellationToken::new();
        let server = SocketServer::bind(socket.clone(), sender, shutdown_token.clone())?;

        let (client_result, server_result, _) = tokio::join!(
            async {
                let started = send_request(
                    &socket,
                    &Request::StartOrToggle {
                        domain: Some("docs.rs".into()),
                        duration_seconds: Some(1500),
                    },
                )
                .await?;
                test.clock.advance(Duration::minutes(12));

                let refused = send_request(&socket, &Request::CommitStaged).await?;
                shutdown_token.cancel();
                anyhow::Ok((started, refused))
            },
            server.run(),
            run_event_loop(service, receiver, shutdown_token.clone()),
        );
        server_result?;
        let (started, refused) = client_result?;

        let Ok(Response::Timer { timer: Some(timer) }) = started else {
            panic!("expected a running timer, got {started:?}");
        };
        assert!(timer.is_running());
        assert_eq!(refused.unwrap_err().kind, ErrorKind::InvalidTransition);

        let ledger = test.repository().ledger().await?;
        assert_eq!(ledger.day("2024-11-03").unwrap().domains["docs.rs"], 12);
        assert!(!socket.exists());
        Ok(())
    }
}
