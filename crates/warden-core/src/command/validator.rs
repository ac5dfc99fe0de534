//! Safety gate for candidate commands.
//!
//! Everything that reaches a live shell goes through `validate_command`
//! first, whether it came from the autonomous loop or a direct operator
//! call. Control characters never pass through here - they have their own
//! restricted path on the injector.

use serde::Serialize;

/// Destructive filesystem / system patterns, matched case-insensitively.
const DESTRUCTIVE_PATTERNS: &[&str] = &[
    "rm -rf /",
    "rm -fr /",
    "rm -rf ~",
    "rm -rf *",
    "rm --no-preserve-root",
    ":(){",
    "dd if=/dev/zero",
    "dd of=/dev/",
    "mkfs.",
    "> /dev/sd",
    "chmod -r 777 /",
    "chown -r",
];

/// Prefixes that escalate privileges.
const ESCALATION_PREFIXES: &[&str] = &["sudo", "doas", "su"];

/// Metacharacter sequences that chain unrelated commands. A single `&`
/// also chains (backgrounding the left side); `&&` is listed first so the
/// rejection reason names the full operator.
const CHAIN_SEQUENCES: &[&str] = &[";", "&&", "||", "&", "`", "$("];

/// Pipe targets that hand arbitrary text to a shell.
const PIPE_TO_SHELL: &[&str] = &["| sh", "|sh", "| bash", "|bash", "| zsh", "|zsh"];

/// Result of validating a candidate command.
#[derive(Debug, Clone, Serialize)]
pub struct CommandValidation {
    pub valid: bool,
    pub reason: Option<String>,
    pub dangerous: bool,
}

impl CommandValidation {
    fn ok() -> Self {
        Self {
            valid: true,
            reason: None,
            dangerous: false,
        }
    }

    fn rejected(reason: impl Into<String>, dangerous: bool) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
            dangerous,
        }
    }
}

/// Validate a candidate command before injection.
///
/// Validation failure always blocks injection.
pub fn validate_command(command: &str) -> CommandValidation {
    let trimmed = command.trim();
    if trimmed.is_empty() {
        return CommandValidation::rejected("Command is empty", false);
    }

    // Raw control sequences must go through send_control_char, never the
    // free-text path where they could smuggle extra keystrokes.
    if command.chars().any(|c| c.is_ascii_control()) {
        return CommandValidation::rejected(
            "Command contains control characters; use the control-char path",
            true,
        );
    }

    let lower = trimmed.to_lowercase();

    if let Some(first) = lower.split_whitespace().next() {
        if ESCALATION_PREFIXES.contains(&first) {
            return CommandValidation::rejected(
                format!("Privilege escalation prefix: {}", first),
                true,
            );
        }
    }

    for seq in CHAIN_SEQUENCES {
        if lower.contains(seq) {
            return CommandValidation::rejected(
                format!("Command chaining sequence: {}", seq),
                true,
            );
        }
    }

    for target in PIPE_TO_SHELL {
        if lower.contains(target) {
            return CommandValidation::rejected("Command pipes into a shell", true);
        }
    }

    for pattern in DESTRUCTIVE_PATTERNS {
        if lower.contains(pattern) {
            return CommandValidation::rejected(
                format!("Destructive pattern: {}", pattern),
                true,
            );
        }
    }

    CommandValidation::ok()
}
