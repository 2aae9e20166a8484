use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Stages of a deploy run.
///
/// `Start → SessionReady → GroupReady → Deploying → Deployed`, or `Failed`
/// from any stage. There are no retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Start,
    SessionReady,
    GroupReady,
    Deploying,
    Deployed,
    Failed,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Deployed | Stage::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Start => "START",
            Stage::SessionReady => "SESSION_READY",
            Stage::GroupReady => "GROUP_READY",
            Stage::Deploying => "DEPLOYING",
            Stage::Deployed => "DEPLOYED",
            Stage::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StageEvent {
    pub run_id: Uuid,
    pub stage: Stage,
    pub occurred_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Receives every stage transition of a run.
pub trait EventSink: Send + Sync {
    fn record(&self, event: StageEvent);
}

/// Logs transitions through `tracing`.
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn record(&self, event: StageEvent) {
        match (&event.stage, &event.detail) {
            (Stage::Failed, detail) => tracing::error!(
                run_id = %event.run_id,
                stage = %event.stage,
                detail = detail.as_deref().unwrap_or(""),
                "Deploy run failed"
            ),
            (_, Some(detail)) => tracing::info!(
                run_id = %event.run_id,
                stage = %event.stage,
                detail = %detail,
                "Stage reached"
            ),
            (_, None) => tracing::info!(
                run_id = %event.run_id,
                stage = %event.stage,
                "Stage reached"
            ),
        }
    }
}
