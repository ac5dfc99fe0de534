//! Scrollback snapshots - capture and hash terminal content.

use crate::error::Result;
use crate::tmux::TerminalGateway;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Compute SHA-256 hash of content and return as hex string.
///
/// Pure and deterministic: equal content always yields an equal digest, which
/// is all change detection needs. Collision resistance is not a security
/// requirement here.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Capture of a session's recent output.
///
/// Only one generation is retained: the previous tick's snapshot exists just
/// long enough to diff against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrollbackSnapshot {
    pub session_name: String,
    pub content_hash: String,
    pub captured_at: DateTime<Utc>,
}

/// Captures scrollback snapshots through the terminal gateway.
pub struct Snapshotter {
    gateway: Arc<dyn TerminalGateway>,
    lines: u32,
}

impl Snapshotter {
    /// `lines` is the scrollback depth captured per tick. Too small a window
    /// makes slow-scrolling output look stalled; the default lives in config.
    pub fn new(gateway: Arc<dyn TerminalGateway>, lines: u32) -> Self {
        Self { gateway, lines }
    }

    /// Capture and hash the current scrollback of a session.
    pub async fn capture(&self, session_name: &str) -> Result<ScrollbackSnapshot> {
        let content = self.gateway.capture_pane(session_name, self.lines).await?;
        Ok(ScrollbackSnapshot {
            session_name: session_name.to_string(),
            content_hash: content_hash(&content),
            captured_at: Utc::now(),
        })
    }

    /// Raw pane content, for callers that want the text rather than the hash.
    pub async fn raw_content(&self, session_name: &str) -> Result<String> {
        self.gateway.capture_pane(session_name, self.lines).await
    }
}
