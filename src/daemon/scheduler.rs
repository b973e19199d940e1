use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, warn};

use crate::{
    timer::deadline::DeadlineScheduler,
    utils::{clock::Clock, time::deadline_instant},
};

use super::DaemonMessage;

/// Sleeps until the deadline on a separate task, then posts [DaemonMessage::Deadline] to the event
/// loop. The timer itself is only touched by the loop.
pub struct TokioDeadlineScheduler {
    sender: mpsc::Sender<DaemonMessage>,
    clock: Arc<dyn Clock>,
    pending: Option<JoinHandle<()>>,
}

impl TokioDeadlineScheduler {
    pub fn new(sender: mpsc::Sender<DaemonMessage>, clock: Arc<dyn Clock>) -> Self {
        Self {
            sender,
            clock,
            pending: None,
        }
    }
}

impl DeadlineScheduler for TokioDeadlineScheduler {
    fn schedule(&mut self, at: DateTime<Utc>) {
        self.cancel();
        let sender = self.sender.clone();
        let clock = self.clock.clone();
        let instant = deadline_instant(clock.as_ref(), at);
        debug!("Deadline set for {at}");
        self.pending = Some(tokio::spawn(async move {
            clock.sleep_until(instant).await;
            if sender.send(DaemonMessage::Deadline(at)).await.is_err() {
                warn!("Deadline {at} fired after the event loop stopped");
            }
        }));
    }

    fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }
}

impl Drop for TokioDeadlineScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
