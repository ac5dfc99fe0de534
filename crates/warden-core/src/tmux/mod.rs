//! tmux integration - the terminal gateway the engine acts through.
//!
//! Provides low-level tmux operations for:
//! - Pane content capture (scrollback)
//! - Sending keys and control characters to sessions
//! - Session existence checks
//!
//! All operations are subprocess calls and are bounded by a timeout. A
//! timed-out call is a transient failure, never silently treated as
//! "no change".

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Default timeout for tmux subprocess calls.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Check if tmux is installed and available.
pub fn check_tmux() -> Result<()> {
    match which::which("tmux") {
        Ok(path) => {
            debug!("Found tmux at: {:?}", path);
            Ok(())
        }
        Err(_) => Err(Error::TmuxNotFound),
    }
}

/// Closed set of control characters the injector may send.
///
/// These bypass the free-text command validator because they never carry an
/// attacker-controlled payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlChar {
    /// Ctrl-C
    Interrupt,
    /// Ctrl-D
    Eof,
    /// Ctrl-Z
    Suspend,
}

impl ControlChar {
    /// The tmux `send-keys` name for this control character.
    pub fn tmux_key(&self) -> &'static str {
        match self {
            ControlChar::Interrupt => "C-c",
            ControlChar::Eof => "C-d",
            ControlChar::Suspend => "C-z",
        }
    }
}

/// Abstraction over the terminal multiplexer.
///
/// The engine only ever talks to sessions through this trait, so tests
/// substitute a fake without spawning tmux.
#[async_trait]
pub trait TerminalGateway: Send + Sync {
    /// Check if a session exists.
    async fn session_exists(&self, session_name: &str) -> Result<bool>;

    /// Capture the last `lines` of a session's scrollback.
    async fn capture_pane(&self, session_name: &str, lines: u32) -> Result<String>;

    /// Send key text to a session, optionally followed by Enter.
    async fn send_keys(&self, session_name: &str, keys: &str, enter: bool) -> Result<()>;

    /// Send a control character to a session.
    async fn send_control(&self, session_name: &str, ctrl: ControlChar) -> Result<()>;
}

/// Real tmux gateway backed by `tmux` subprocess calls.
pub struct TmuxGateway {
    call_timeout: Duration,
}

impl TmuxGateway {
    pub fn new(call_timeout: Duration) -> Self {
        Self { call_timeout }
    }

    async fn run(&self, args: &[&str]) -> Result<std::process::Output> {
        let fut = Command::new("tmux").args(args).output();
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(output) => Ok(output?),
            Err(_) => Err(Error::Timeout(format!("tmux {}", args.join(" ")))),
        }
    }
}

impl Default for TmuxGateway {
    fn default() -> Self {
        Self::new(DEFAULT_CALL_TIMEOUT)
    }
}

#[async_trait]
impl TerminalGateway for TmuxGateway {
    async fn session_exists(&self, session_name: &str) -> Result<bool> {
        let output = self.run(&["has-session", "-t", session_name]).await?;
        Ok(output.status.success())
    }

    async fn capture_pane(&self, session_name: &str, lines: u32) -> Result<String> {
        if !self.session_exists(session_name).await? {
            return Err(Error::SessionNotReady(session_name.to_string()));
        }

        let start = format!("-{}", lines);
        let output = self
            .run(&["capture-pane", "-t", session_name, "-p", "-S", &start])
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Tmux(format!("capture-pane failed: {}", stderr)));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn send_keys(&self, session_name: &str, keys: &str, enter: bool) -> Result<()> {
        if !self.session_exists(session_name).await? {
            return Err(Error::SessionNotReady(session_name.to_string()));
        }

        let mut args = vec!["send-keys", "-t", session_name, keys];
        if enter {
            args.push("Enter");
        }

        let output = self.run(&args).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Tmux(format!("send-keys failed: {}", stderr)));
        }

        debug!("Sent keys to session {}", session_name);
        Ok(())
    }

    async fn send_control(&self, session_name: &str, ctrl: ControlChar) -> Result<()> {
        if !self.session_exists(session_name).await? {
            return Err(Error::SessionNotReady(session_name.to_string()));
        }

        let output = self
            .run(&["send-keys", "-t", session_name, ctrl.tmux_key()])
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Tmux(format!("send-keys failed: {}", stderr)));
        }

        debug!("Sent {:?} to session {}", ctrl, session_name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_char_keys() {
        assert_eq!(ControlChar::Interrupt.tmux_key(), "C-c");
        assert_eq!(ControlChar::Eof.tmux_key(), "C-d");
        assert_eq!(ControlChar::Suspend.tmux_key(), "C-z");
    }

    #[test]
    fn test_check_tmux() {
        let result = check_tmux();
        println!("tmux check result: {:?}", result);
    }
}
