use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Detects signals sent to the process and cancels `cancelation`. Returns early when something
/// else cancelled it first.
///
/// Both ctrl-c and SIGTERM are handled, the latter being what `bprod stop` sends.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received ctrl-c");
            cancelation.cancel();
        },
        _ = terminate() => {
            info!("Received SIGTERM");
            cancelation.cancel();
        },
        _ = cancelation.cancelled() => (),
    };
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            error!("Couldn't listen for SIGTERM {e}");
            std::future::pending::<()>().await
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await
}
