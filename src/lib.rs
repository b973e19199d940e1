//! Pomodoro timer with a per-domain productivity ledger.
//!
//! A small daemon owns the timer and the ledger and applies actions one at a time. The `bprod`
//! cli talks to it over a Unix socket. Time is attributed to the local calendar day it was spent
//! in, even when a session crosses midnight.

pub mod cli;
pub mod daemon;
pub mod error;
pub mod ledger;
pub mod timer;
pub mod utils;
