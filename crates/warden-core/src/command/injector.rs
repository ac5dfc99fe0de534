//! Command injection against a live session.
//!
//! The injector is the only part of the engine with side effects; snapshot,
//! detection and validation upstream are all read-only.

use crate::command::validator::validate_command;
use crate::error::{Error, Result};
use crate::tmux::{ControlChar, TerminalGateway};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of a single injection attempt.
#[derive(Debug, Clone, Serialize)]
pub struct InjectionResult {
    pub success: bool,
    /// Milliseconds since epoch.
    pub timestamp: i64,
    pub error: Option<String>,
}

/// Sends validated commands into terminal sessions.
pub struct CommandInjector {
    gateway: Arc<dyn TerminalGateway>,
}

impl CommandInjector {
    pub fn new(gateway: Arc<dyn TerminalGateway>) -> Self {
        Self { gateway }
    }

    /// True iff the session exists and is accepting input. Checked
    /// immediately before every injection, never cached.
    pub async fn is_session_ready(&self, session_name: &str) -> bool {
        self.gateway
            .session_exists(session_name)
            .await
            .unwrap_or(false)
    }

    /// Validate and send a command to a session.
    ///
    /// Returns `Error::Validation` if the safety gate rejects the command and
    /// `Error::SessionNotReady` if the target is gone; both happen before any
    /// keys are sent.
    pub async fn inject_command(
        &self,
        session_name: &str,
        command: &str,
        press_enter: bool,
    ) -> Result<InjectionResult> {
        let validation = validate_command(command);
        if !validation.valid {
            return Err(Error::Validation {
                reason: validation
                    .reason
                    .unwrap_or_else(|| "Command rejected".to_string()),
                dangerous: validation.dangerous,
            });
        }

        if !self.is_session_ready(session_name).await {
            return Err(Error::SessionNotReady(session_name.to_string()));
        }

        self.gateway
            .send_keys(session_name, command, press_enter)
            .await?;

        info!(session = %session_name, "Injected command");
        Ok(InjectionResult {
            success: true,
            timestamp: chrono::Utc::now().timestamp_millis(),
            error: None,
        })
    }

    /// Send a control character (interrupt, EOF, suspend).
    ///
    /// Restricted to the closed `ControlChar` set, so it bypasses the
    /// free-text validator.
    pub async fn send_control_char(
        &self,
        session_name: &str,
        ctrl: ControlChar,
    ) -> Result<()> {
        if !self.is_session_ready(session_name).await {
            return Err(Error::SessionNotReady(session_name.to_string()));
        }
        self.gateway.send_control(session_name, ctrl).await
    }

    /// Read-only confirmation helper for callers verifying effect
    /// post-injection.
    pub async fn current_pane_content(&self, session_name: &str, lines: u32) -> Result<String> {
        debug!(session = %session_name, "Capturing pane content");
        self.gateway.capture_pane(session_name, lines).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FakeGateway {
        exists: Mutex<bool>,
        sent: Mutex<Vec<(String, bool)>>,
        controls: Mutex<Vec<ControlChar>>,
    }

    impl FakeGateway {
        fn new(exists: bool) -> Arc<Self> {
            Arc::new(Self {
                exists: Mutex::new(exists),
                sent: Mutex::new(Vec::new()),
                controls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl TerminalGateway for FakeGateway {
        async fn session_exists(&self, _session_name: &str) -> Result<bool> {
            Ok(*self.exists.lock().unwrap())
        }

        async fn capture_pane(&self, _session_name: &str, _lines: u32) -> Result<String> {
            Ok("pane content".to_string())
        }

        async fn send_keys(&self, _session_name: &str, keys: &str, enter: bool) -> Result<()> {
            self.sent.lock().unwrap().push((keys.to_string(), enter));
            Ok(())
        }

        async fn send_control(&self, _session_name: &str, ctrl: ControlChar) -> Result<()> {
            self.controls.lock().unwrap().push(ctrl);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_inject_valid_command() {
        let gateway = FakeGateway::new(true);
        let injector = CommandInjector::new(Arc::clone(&gateway) as Arc<dyn TerminalGateway>);

        let result = injector.inject_command("sess", "npm test", true).await.unwrap();
        assert!(result.success);
        assert_eq!(
            gateway.sent.lock().unwrap().as_slice(),
            &[("npm test".to_string(), true)]
        );
    }

    #[tokio::test]
    async fn test_dangerous_command_never_sent() {
        let gateway = FakeGateway::new(true);
        let injector = CommandInjector::new(Arc::clone(&gateway) as Arc<dyn TerminalGateway>);

        let err = injector.inject_command("sess", "rm -rf /", true).await.unwrap_err();
        assert!(matches!(err, Error::Validation { dangerous: true, .. }));
        assert!(gateway.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_session_is_not_ready() {
        let gateway = FakeGateway::new(false);
        let injector = CommandInjector::new(Arc::clone(&gateway) as Arc<dyn TerminalGateway>);

        assert!(!injector.is_session_ready("sess").await);
        let err = injector.inject_command("sess", "npm test", true).await.unwrap_err();
        assert!(matches!(err, Error::SessionNotReady(_)));
        assert!(gateway.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_control_char() {
        let gateway = FakeGateway::new(true);
        let injector = CommandInjector::new(Arc::clone(&gateway) as Arc<dyn TerminalGateway>);

        injector
            .send_control_char("sess", ControlChar::Interrupt)
            .await
            .unwrap();
        assert_eq!(
            gateway.controls.lock().unwrap().as_slice(),
            &[ControlChar::Interrupt]
        );
    }
}
