use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::ledger::{
    entities::{ActiveFocus, DayRecord, Ledger, MetaRecord, Task},
    stats::DaySummary,
};

use super::state::{TimerRecord, UnsavedSegment};

/// Every action the core accepts. One JSON object per request, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Request {
    /// Starts a timer when idle, pauses a running one, resumes a paused one.
    #[serde(rename_all = "camelCase")]
    StartOrToggle {
        #[serde(default)]
        domain: Option<String>,
        #[serde(default)]
        duration_seconds: Option<u64>,
    },
    /// Logs the unsaved time of a paused timer.
    Save,
    Reset,
    PauseAndStage,
    /// The surface showing the timer went away while it was running.
    SurfaceClosed,
    CommitStaged,
    DiscardStaged,
    GetFullState,
    FocusStart {
        domain: String,
    },
    FocusStop,
    #[serde(rename_all = "camelCase")]
    UpdateSettings {
        #[serde(default)]
        daily_goal: Option<i64>,
        #[serde(default)]
        pom_duration: Option<i64>,
    },
    AddTask {
        text: String,
    },
    ToggleTask {
        index: usize,
    },
    DeleteTask {
        index: usize,
    },
    DeleteDomain {
        domain: String,
    },
    ClearData,
    Export {
        #[serde(default)]
        from: Option<NaiveDate>,
        #[serde(default)]
        to: Option<NaiveDate>,
    },
    Summary {
        #[serde(default)]
        date: Option<NaiveDate>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Response {
    Timer {
        timer: Option<TimerRecord>,
    },
    #[serde(rename_all = "camelCase")]
    Logged {
        logged_minutes: u64,
    },
    Staged {
        segment: UnsavedSegment,
    },
    Ok,
    FullState(FullState),
    Settings {
        meta: MetaRecord,
    },
    Tasks {
        tasks: Vec<Task>,
    },
    #[serde(rename_all = "camelCase")]
    DomainDeleted {
        removed_minutes: Option<u64>,
    },
    Export {
        days: BTreeMap<String, DayRecord>,
    },
    Summary(DaySummary),
}

/// Snapshot of everything a presentation layer needs to draw itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullState {
    pub ledger: Ledger,
    pub timer: Option<TimerRecord>,
    /// Remaining seconds at the moment of the snapshot. Presentation derives later values from
    /// the timer's deadline itself.
    pub remaining_seconds: Option<u64>,
    pub staged_segment: Option<UnsavedSegment>,
    pub active_focus: Option<ActiveFocus>,
    pub just_finished: bool,
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::Request;

    #[test]
    fn test_request_wire_format() -> Result<()> {
        let request: Request = serde_json::from_str(
            r#"{"type": "start-or-toggle", "domain": "github.com", "durationSeconds": 1500}"#,
        )?;
        assert_eq!(
            request,
            Request::StartOrToggle {
                domain: Some("github.com".into()),
                duration_seconds: Some(1500)
            }
        );

        let request: Request = serde_json::from_str(r#"{"type": "start-or-toggle"}"#)?;
        assert_eq!(
            request,
            Request::StartOrToggle {
                domain: None,
                duration_seconds: None
            }
        );

        assert_eq!(
            serde_json::to_string(&Request::CommitStaged)?,
            r#"{"type":"commit-staged"}"#
        );
        assert!(serde_json::from_str::<Request>(r#"{"type": "explode"}"#).is_err());
        Ok(())
    }
}
