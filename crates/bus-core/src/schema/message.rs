//! The canonical message exchanged between roles.

use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Chain-relevant message kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Request,
    Response,
    Event,
}

/// A single JSON line in an inbox or the session log.
///
/// Unknown fields round-trip via `extra` so a future producer can add
/// fields without breaking older readers, mirroring the flatten pattern
/// used by the team-mail inbox message type this is grounded on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub ts: i64,
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub msg_type: MessageType,
    pub action: String,
    pub payload: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reply_to: String,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl Message {
    /// Builds a new message, generating `id`/`ts` if the caller does not
    /// already have a stable id in hand.
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        msg_type: MessageType,
        action: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        let from = from.into();
        let ts = now_unix();
        Message {
            id: generate_id(&from, ts),
            ts,
            from,
            to: to.into(),
            msg_type,
            action: action.into(),
            payload: payload.into(),
            reply_to: String::new(),
            extra: HashMap::new(),
        }
    }

    pub fn reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = reply_to.into();
        self
    }

    /// Overrides the generated timestamp. Used by tests and by callers
    /// replaying history with a caller-supplied clock.
    pub fn with_ts(mut self, ts: i64) -> Self {
        self.ts = ts;
        self
    }

    /// Serializes to a single JSON line terminated by `\n`, as required by
    /// spec invariant (i).
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut s = serde_json::to_string(self)?;
        s.push('\n');
        Ok(s)
    }

    /// Parses one JSONL line. Callers skip lines that fail to parse rather
    /// than propagating the error — a corrupt or partial line never blocks
    /// the reader from seeing everything after it.
    pub fn from_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim_end())
    }
}

fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

/// `id` = millisecond counter + sender role + random 4-byte hex.
fn generate_id(from: &str, _ts_secs: i64) -> String {
    let millis = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let mut rng = rand::thread_rng();
    let bytes: [u8; 4] = rng.r#gen();
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    format!("{millis}-{from}-{hex}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_minimal() {
        let m = Message::new("edit", "build", MessageType::Request, "compile", "build it");
        let line = m.to_line().unwrap();
        assert!(line.ends_with('\n'));
        let decoded = Message::from_line(&line).unwrap();
        assert_eq!(decoded.from, "edit");
        assert_eq!(decoded.to, "build");
        assert_eq!(decoded.action, "compile");
        assert_eq!(decoded.payload, "build it");
        assert_eq!(decoded.reply_to, "");
    }

    #[test]
    fn unknown_fields_round_trip() {
        let json = r#"{"id":"1-edit-aaaa","ts":1,"from":"edit","to":"build","type":"event","action":"x","payload":"y","extra_field":"kept"}"#;
        let decoded = Message::from_line(json).unwrap();
        assert_eq!(
            decoded.extra.get("extra_field").unwrap().as_str().unwrap(),
            "kept"
        );
        let reencoded = decoded.to_line().unwrap();
        assert!(reencoded.contains("extra_field"));
    }

    #[test]
    fn corrupt_line_is_rejected_not_panicking() {
        assert!(Message::from_line("{not json").is_err());
    }

    #[test]
    fn ids_are_unique_across_rapid_calls() {
        let mut ids = std::collections::HashSet::new();
        for _ in 0..100 {
            let m = Message::new("edit", "build", MessageType::Event, "a", "b");
            assert!(ids.insert(m.id));
        }
    }
}
