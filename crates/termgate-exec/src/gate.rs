//! Command admissibility checks.
//!
//! Pure, synchronous logic: nothing here spawns a process. The gate is
//! consulted by the HTTP layer before a command ever reaches the
//! execution gateway.

use once_cell::sync::Lazy;
use regex::{Regex, RegexSetBuilder};

use crate::error::{ExecError, ExecResult};

/// Shell chaining and redirection characters, blocked unconditionally.
static FORBIDDEN_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[|&;<>]").expect("forbidden-chars regex is valid"));

/// Default whitelist patterns.
///
/// Exact matches for argument-less commands, prefix matches for commands
/// that take arguments. Matching is case-insensitive.
pub fn default_whitelist() -> Vec<String> {
    [
        r"^whoami$",
        r"^date$",
        r"^uptime$",
        r"^ls($|\s)",
        r"^dir($|\s)",
        r"^echo\s.+",
        r"^systeminfo$",
        r"^ping\s+\S+$",
    ]
    .iter()
    .map(|p| (*p).to_string())
    .collect()
}

/// Decides whether a raw command string may be executed.
///
/// The pattern set is compiled once at startup and immutable for the
/// process lifetime.
#[derive(Debug)]
pub struct CommandGate {
    whitelist: regex::RegexSet,
}

impl CommandGate {
    /// Compile a gate from whitelist patterns.
    pub fn new<I, S>(patterns: I) -> ExecResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let whitelist = RegexSetBuilder::new(patterns)
            .case_insensitive(true)
            .build()?;
        Ok(Self { whitelist })
    }

    /// Gate with the default whitelist.
    pub fn with_defaults() -> Self {
        Self::new(default_whitelist()).expect("default whitelist patterns are valid")
    }

    /// Number of configured whitelist patterns.
    pub fn pattern_count(&self) -> usize {
        self.whitelist.len()
    }

    /// Check a command for admissibility.
    ///
    /// Order of checks:
    /// 1. empty / whitespace-only input is rejected;
    /// 2. `| & ; < >` anywhere in the string is rejected, regardless of
    ///    whitelist mode;
    /// 3. with `require_whitelist`, the trimmed command must match at
    ///    least one pattern. An EMPTY whitelist is an implicit allow --
    ///    the operator opted out of pattern enforcement entirely.
    pub fn check(&self, command: &str, require_whitelist: bool) -> ExecResult<()> {
        if command.trim().is_empty() {
            return Err(ExecError::InvalidInput("command must be non-empty".into()));
        }

        if FORBIDDEN_CHARS.is_match(command) {
            return Err(ExecError::ForbiddenChars);
        }

        if require_whitelist
            && !self.whitelist.is_empty()
            && !self.whitelist.is_match(command.trim())
        {
            return Err(ExecError::NotWhitelisted);
        }

        Ok(())
    }
}
