use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};
use uuid::Uuid;

const TELEMETRY_TARGET: &str = "mindmap::events::telemetry";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum HistoryAction {
    Commit,
    Undo,
    Redo,
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Commit => write!(f, "history_commit"),
            Self::Undo => write!(f, "history_undo"),
            Self::Redo => write!(f, "history_redo"),
        }
    }
}

/// One structured record per history movement, tagged with the session it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryTelemetry {
    pub session_id: String,
    pub action: HistoryAction,
    pub label: String,
    pub position: usize,
    pub len: usize,
}

fn now_unix_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn history_moved(
    session_id: &str,
    action: HistoryAction,
    label: &str,
    position: usize,
    len: usize,
) -> HistoryTelemetry {
    let telemetry = HistoryTelemetry {
        session_id: session_id.to_string(),
        action,
        label: label.to_string(),
        position,
        len,
    };
    debug!(
        target: TELEMETRY_TARGET,
        session_id = %telemetry.session_id,
        action = %telemetry.action,
        label = %telemetry.label,
        position = telemetry.position,
        len = telemetry.len,
        timestamp_ms = now_unix_ms(),
        "history"
    );
    telemetry
}

pub fn session_started(session_id: &str, nodes: usize, restored: bool) {
    info!(
        target: TELEMETRY_TARGET,
        session_id = %session_id,
        nodes,
        restored,
        timestamp_ms = now_unix_ms(),
        "session_start"
    );
}

pub fn session_ended(session_id: &str, nodes: usize) {
    info!(
        target: TELEMETRY_TARGET,
        session_id = %session_id,
        nodes,
        timestamp_ms = now_unix_ms(),
        "session_end"
    );
}

pub fn persistence_failure(session_id: &str, operation: &str, error: &str) {
    warn!(
        target: TELEMETRY_TARGET,
        session_id = %session_id,
        operation = %operation,
        error = %error,
        timestamp_ms = now_unix_ms(),
        "persistence_failure"
    );
}
