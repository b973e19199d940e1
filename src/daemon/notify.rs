use std::io::Write;

use tracing::{info, warn};

use crate::timer::deadline::NotificationSink;

/// Announces a finished Pomodoro in the log and rings the terminal bell when the daemon has one.
pub struct TerminalNotifier;

impl NotificationSink for TerminalNotifier {
    fn pomodoro_finished(&self, domain: &str, logged_minutes: u64) {
        info!("Time's up! {logged_minutes} min of {domain} logged, take a break");
        let mut stdout = std::io::stdout();
        if let Err(e) = stdout.write_all(b"\x07").and_then(|_| stdout.flush()) {
            warn!("Couldn't ring the bell {e}");
        }
    }
}
