use serde::{Deserialize, Serialize};

/// How a capture session ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "reason", content = "detail")]
pub enum SessionEnd {
    Stopped,
    Faulted(String),
}

/// Diagnostics for one capture session, returned by `LevelMeter::stop`.
///
/// Serializable for JSON export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub id: String,
    pub started_at: String,
    pub duration_secs: f64,
    pub blocks_processed: u64,
    pub silent_blocks: u64,
    pub frames_processed: u64,
    pub empty_polls: u64,
    pub end: SessionEnd,
}

impl SessionReport {
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            started_at: chrono::Utc::now().to_rfc3339(),
            duration_secs: 0.0,
            blocks_processed: 0,
            silent_blocks: 0,
            frames_processed: 0,
            empty_polls: 0,
            end: SessionEnd::Stopped,
        }
    }

    pub fn is_faulted(&self) -> bool {
        matches!(self.end, SessionEnd::Faulted(_))
    }
}

impl Default for SessionReport {
    fn default() -> Self {
        Self::new()
    }
}
