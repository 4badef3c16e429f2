//! Session configuration

/// Access code a fresh card ships with
pub const DEFAULT_ACCESS_CODE: &str = "000000";

/// Passcode a fresh card ships with
pub const DEFAULT_PASSCODE: &str = "000";

/// Configuration options for a card session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Consecutive identical responses tolerated before giving up
    pub max_stalled_responses: usize,

    /// Well-known access code tried before prompting the user
    pub default_access_code: &'static str,

    /// Well-known passcode tried before prompting the user
    pub default_passcode: &'static str,

    /// Prefix every command with the legacy NFC timeout setting
    pub legacy_mode: bool,

    /// Run prechecks and map card errors through the command hooks
    pub handle_errors: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_stalled_responses: 3,
            default_access_code: DEFAULT_ACCESS_CODE,
            default_passcode: DEFAULT_PASSCODE,
            legacy_mode: false,
            handle_errors: true,
        }
    }
}

impl SessionConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bound for the no-forward-progress guard
    pub const fn with_max_stalled_responses(mut self, max: usize) -> Self {
        self.max_stalled_responses = max;
        self
    }

    /// Set the well-known access code
    pub const fn with_default_access_code(mut self, code: &'static str) -> Self {
        self.default_access_code = code;
        self
    }

    /// Set the well-known passcode
    pub const fn with_default_passcode(mut self, code: &'static str) -> Self {
        self.default_passcode = code;
        self
    }

    /// Set legacy mode
    pub const fn with_legacy_mode(mut self, legacy_mode: bool) -> Self {
        self.legacy_mode = legacy_mode;
        self
    }

    /// Set whether command error hooks run
    pub const fn with_handle_errors(mut self, handle_errors: bool) -> Self {
        self.handle_errors = handle_errors;
        self
    }
}
