//! Server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

const DEFAULT_LISTEN: &str = "127.0.0.1:7433";

/// Server configuration
///
/// Standard directory structure:
/// ```text
/// ~/.warden/
/// ├── warden.db              # Database
/// └── server/
///     └── server.log         # Logs
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP listen address
    pub listen_addr: SocketAddr,
    /// Database path
    pub database_path: PathBuf,
    /// Log file path
    pub log_file: PathBuf,
    /// Scrollback lines captured per snapshot
    pub scrollback_lines: u32,
    /// Timeout for each tmux subprocess call, in seconds
    pub call_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment or defaults.
    ///
    /// `WARDEN_DIR` overrides the base directory, `WARDEN_LISTEN` the listen
    /// address, and `WARDEN_DATABASE_PATH` the database location.
    pub fn load() -> anyhow::Result<Self> {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let warden_dir = std::env::var("WARDEN_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join(".warden"));
        let server_dir = warden_dir.join("server");
        std::fs::create_dir_all(&server_dir)?;

        let listen_addr = std::env::var("WARDEN_LISTEN")
            .unwrap_or_else(|_| DEFAULT_LISTEN.to_string())
            .parse()?;

        let database_path = std::env::var("WARDEN_DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| warden_dir.join("warden.db"));

        let call_timeout_secs = std::env::var("WARDEN_TMUX_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);

        let scrollback_lines = std::env::var("WARDEN_SCROLLBACK_LINES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(warden_core::monitor::DEFAULT_SCROLLBACK_LINES);

        Ok(Self {
            listen_addr,
            database_path,
            log_file: server_dir.join("server.log"),
            scrollback_lines,
            call_timeout_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_listen_addr_parses() {
        let addr: SocketAddr = DEFAULT_LISTEN.parse().unwrap();
        assert_eq!(addr.port(), 7433);
    }

    #[test]
    fn test_env_overrides_capture_knobs() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("WARDEN_DIR", dir.path());
        std::env::set_var("WARDEN_SCROLLBACK_LINES", "500");
        std::env::set_var("WARDEN_TMUX_TIMEOUT_SECS", "9");

        let config = Config::load().unwrap();
        assert_eq!(config.scrollback_lines, 500);
        assert_eq!(config.call_timeout_secs, 9);

        std::env::remove_var("WARDEN_DIR");
        std::env::remove_var("WARDEN_SCROLLBACK_LINES");
        std::env::remove_var("WARDEN_TMUX_TIMEOUT_SECS");
    }
}
