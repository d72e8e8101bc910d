//! Entities persisted as whole-file JSONL arrays: cron, proc, spawn,
//! subscriptions, cron history, and per-role session metadata.

use serde::{Deserialize, Serialize};

use super::message::MessageType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronEntry {
    pub id: String,
    /// `@every <duration>` (min 10s) or `@hourly`/`@daily`/`@half-hourly`.
    pub schedule: String,
    pub target: String,
    pub action: String,
    pub message: String,
    #[serde(rename = "type")]
    pub msg_type: MessageType,
    pub enabled: bool,
    pub last_run_ts: i64,
    pub run_count: u64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronHistoryEntry {
    pub id: String,
    pub cron_id: String,
    pub fired_at: i64,
    pub target: String,
    pub outcome: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcStatus {
    Running,
    Exited,
    Failed,
    Stopped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcEntry {
    pub id: String,
    pub pid: i32,
    pub command: String,
    pub dir: String,
    pub owner: String,
    pub status: ProcStatus,
    pub exit_code: i32,
    pub started_at: i64,
    pub finished_at: i64,
    pub log_file: String,
    pub notified: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpawnStatus {
    Running,
    Completed,
    Stopped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnEntry {
    pub id: String,
    pub role: String,
    pub spawn_role: String,
    pub owner: String,
    pub task: String,
    pub status: SpawnStatus,
    pub window: String,
    pub started_at: i64,
    pub finished_at: i64,
    pub notified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub subscriber_role: String,
    pub event_action_glob: String,
    pub source_role_glob: String,
    pub enabled: bool,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMeta {
    pub start_ts: i64,
    pub compact_count: u64,
    pub last_compact_ts: i64,
}

impl Default for SessionMeta {
    fn default() -> Self {
        let now = chrono::Utc::now().timestamp();
        SessionMeta {
            start_ts: now,
            compact_count: 0,
            last_compact_ts: 0,
        }
    }
}
