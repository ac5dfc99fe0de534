//! Default command-candidate producer.

use crate::db::types::WatchedSession;
use crate::error::Result;
use crate::orchestrator::Orchestrator;
use crate::store::CommandProducer;
use async_trait::async_trait;

const DEFAULT_NUDGE: &str =
    "You appear to be stalled. Review your last output and continue the task.";

/// Produces a nudge line for a stalled agent session.
///
/// Renders the orchestrator's custom instructions (or a stock message) in
/// the `# NUDGE:` convention agents are prompted to watch for. The scrollback
/// is ignored; richer policies implement `CommandProducer` themselves.
#[derive(Debug, Default)]
pub struct NudgeProducer;

#[async_trait]
impl CommandProducer for NudgeProducer {
    async fn candidate(
        &self,
        orchestrator: &Orchestrator,
        _session: &WatchedSession,
        _scrollback: &str,
    ) -> Result<Option<String>> {
        let message = orchestrator
            .custom_instructions
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_NUDGE);

        Ok(Some(format!("# NUDGE: {}", message)))
    }
}
