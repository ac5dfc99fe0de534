//! Stall detection over scrollback snapshots.
//!
//! A session is stalled when its scrollback hash has not changed for longer
//! than the orchestrator's configured threshold. The detector itself is
//! stateless; the scheduler owns the single-generation snapshot history.

use crate::error::Result;
use crate::snapshot::{ScrollbackSnapshot, Snapshotter};
use chrono::Utc;

/// Output of comparing two snapshots.
#[derive(Debug, Clone)]
pub struct StallDetection {
    pub is_stalled: bool,
    /// Seconds since the scrollback content last changed.
    pub seconds_since_change: i64,
    /// The snapshot to retain as "previous" for the next tick. When the hash
    /// is unchanged this carries the earlier baseline timestamp forward, so
    /// elapsed time accumulates across ticks.
    pub snapshot: ScrollbackSnapshot,
}

/// Threshold-based staleness policy.
pub struct StallDetector {
    snapshotter: Snapshotter,
}

impl StallDetector {
    pub fn new(snapshotter: Snapshotter) -> Self {
        Self { snapshotter }
    }

    /// Capture a fresh snapshot and compare against the previous one.
    ///
    /// - No previous snapshot: cold start, never a stall.
    /// - Unchanged hash: stalled once the time since the hash was first seen
    ///   reaches `stall_threshold_secs`.
    /// - Changed hash: baseline resets to now.
    ///
    /// A missing session surfaces as `Error::SessionNotReady` from the
    /// capture, never as a stall.
    pub async fn detect(
        &self,
        session_name: &str,
        previous: Option<&ScrollbackSnapshot>,
        stall_threshold_secs: i64,
    ) -> Result<StallDetection> {
        let mut snapshot = self.snapshotter.capture(session_name).await?;

        let previous = match previous {
            Some(prev) => prev,
            None => {
                return Ok(StallDetection {
                    is_stalled: false,
                    seconds_since_change: 0,
                    snapshot,
                });
            }
        };

        if previous.content_hash == snapshot.content_hash {
            // Keep the timestamp of when this hash was first seen.
            snapshot.captured_at = previous.captured_at;
            let elapsed = Utc::now()
                .signed_duration_since(previous.captured_at)
                .num_seconds();
            Ok(StallDetection {
                is_stalled: elapsed >= stall_threshold_secs,
                seconds_since_change: elapsed,
                snapshot,
            })
        } else {
            Ok(StallDetection {
                is_stalled: false,
                seconds_since_change: 0,
                snapshot,
            })
        }
    }

    /// Raw scrollback text, used when building intervention context.
    pub async fn scrollback(&self, session_name: &str) -> Result<String> {
        self.snapshotter.raw_content(session_name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::tmux::{ControlChar, TerminalGateway};
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::Arc;
    use std::sync::Mutex;

    struct FakeGateway {
        content: Mutex<String>,
        exists: Mutex<bool>,
    }

    impl FakeGateway {
        fn new(content: &str) -> Arc<Self> {
            Arc::new(Self {
                content: Mutex::new(content.to_string()),
                exists: Mutex::new(true),
            })
        }

        fn set_content(&self, content: &str) {
            *self.content.lock().unwrap() = content.to_string();
        }

        fn kill(&self) {
            *self.exists.lock().unwrap() = false;
        }
    }

    #[async_trait]
    impl TerminalGateway for FakeGateway {
        async fn session_exists(&self, _session_name: &str) -> Result<bool> {
            Ok(*self.exists.lock().unwrap())
        }

        async fn capture_pane(&self, session_name: &str, _lines: u32) -> Result<String> {
            if !*self.exists.lock().unwrap() {
                return Err(Error::SessionNotReady(session_name.to_string()));
            }
            Ok(self.content.lock().unwrap().clone())
        }

        async fn send_keys(&self, _session_name: &str, _keys: &str, _enter: bool) -> Result<()> {
            Ok(())
        }

        async fn send_control(&self, _session_name: &str, _ctrl: ControlChar) -> Result<()> {
            Ok(())
        }
    }

    fn detector(gateway: Arc<FakeGateway>) -> StallDetector {
        StallDetector::new(Snapshotter::new(gateway, 200))
    }

    #[tokio::test]
    async fn test_first_tick_never_stalls() {
        let gateway = FakeGateway::new("some output");
        let detector = detector(gateway);

        let result = detector.detect("sess", None, 1).await.unwrap();
        assert!(!result.is_stalled);
        assert_eq!(result.seconds_since_change, 0);
    }

    #[tokio::test]
    async fn test_unchanged_past_threshold_stalls() {
        let gateway = FakeGateway::new("frozen output");
        let detector = detector(gateway);

        let mut previous = detector.detect("sess", None, 60).await.unwrap().snapshot;
        // Pretend the hash was first seen 90 seconds ago.
        previous.captured_at = Utc::now() - Duration::seconds(90);

        let result = detector.detect("sess", Some(&previous), 60).await.unwrap();
        assert!(result.is_stalled);
        assert!(result.seconds_since_change >= 90);
        // Baseline carried forward for the next tick.
        assert_eq!(result.snapshot.captured_at, previous.captured_at);
    }

    #[tokio::test]
    async fn test_unchanged_below_threshold_not_stalled() {
        let gateway = FakeGateway::new("frozen output");
        let detector = detector(gateway);

        let mut previous = detector.detect("sess", None, 60).await.unwrap().snapshot;
        previous.captured_at = Utc::now() - Duration::seconds(30);

        let result = detector.detect("sess", Some(&previous), 60).await.unwrap();
        assert!(!result.is_stalled);
    }

    #[tokio::test]
    async fn test_changed_content_resets_baseline() {
        let gateway = FakeGateway::new("first output");
        let detector = detector(Arc::clone(&gateway));

        let mut previous = detector.detect("sess", None, 60).await.unwrap().snapshot;
        previous.captured_at = Utc::now() - Duration::seconds(3600);

        gateway.set_content("second output");
        let result = detector.detect("sess", Some(&previous), 60).await.unwrap();
        assert!(!result.is_stalled);
        assert_eq!(result.seconds_since_change, 0);
        assert_ne!(result.snapshot.content_hash, previous.content_hash);
        // Baseline reset to capture time.
        assert!(result.snapshot.captured_at > previous.captured_at);
    }

    #[tokio::test]
    async fn test_missing_session_is_not_a_stall() {
        let gateway = FakeGateway::new("output");
        let detector = detector(Arc::clone(&gateway));

        let previous = detector.detect("sess", None, 60).await.unwrap().snapshot;
        gateway.kill();

        let err = detector.detect("sess", Some(&previous), 60).await.unwrap_err();
        assert!(matches!(err, Error::SessionNotReady(_)));
    }
}
