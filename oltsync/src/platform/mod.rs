//! Platform definitions for OLT CLI dialects.
//!
//! A platform captures everything vendor-specific about driving the CLI:
//! the login and shell prompt patterns, how to disable paging, which
//! response fragments mean the device refused a command, and the command
//! surface itself (see each vendor module).

pub mod vendors;

use std::fmt;

use regex::bytes::Regex;

use crate::channel::{compile_login_pattern, compile_prompt_pattern};

/// Platform definition containing all vendor-specific configuration.
#[derive(Clone)]
pub struct OltPlatform {
    /// Platform name (e.g., "zte_zxan").
    pub name: String,

    /// Pattern for the username prompt.
    pub login_pattern: Regex,

    /// Pattern for the password prompt.
    pub password_pattern: Regex,

    /// Shell prompt pattern, anchored at the end of the output.
    pub prompt_pattern: Regex,

    /// Command that disables output paging.
    pub paging_command: String,

    /// Patterns that indicate command failure in a response.
    pub failed_when_contains: Vec<String>,

    /// Case-insensitive markers that abort a mutating script.
    pub script_error_markers: Vec<String>,

    /// How many bytes from the end of the output to search for prompts.
    pub search_depth: usize,
}

impl OltPlatform {
    /// Create a new platform definition from its shell prompt pattern.
    pub fn new(name: impl Into<String>, prompt: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.into(),
            login_pattern: compile_login_pattern(r"(username|login):")?,
            password_pattern: compile_login_pattern("password:")?,
            prompt_pattern: compile_prompt_pattern(prompt)?,
            paging_command: "terminal length 0".to_string(),
            failed_when_contains: vec![],
            script_error_markers: vec![],
            search_depth: 1000,
        })
    }

    /// Override the username prompt pattern (matched case-insensitively).
    pub fn with_login_pattern(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.login_pattern = compile_login_pattern(pattern)?;
        Ok(self)
    }

    /// Override the password prompt pattern (matched case-insensitively).
    pub fn with_password_pattern(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.password_pattern = compile_login_pattern(pattern)?;
        Ok(self)
    }

    /// Set the paging disable command.
    pub fn with_paging_command(mut self, command: impl Into<String>) -> Self {
        self.paging_command = command.into();
        self
    }

    /// Add a failure pattern.
    pub fn with_failure_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.failed_when_contains.push(pattern.into());
        self
    }

    /// Add a script error marker.
    pub fn with_script_error_marker(mut self, marker: impl Into<String>) -> Self {
        self.script_error_markers.push(marker.into().to_lowercase());
        self
    }

    /// Set the prompt search depth.
    pub fn with_search_depth(mut self, depth: usize) -> Self {
        self.search_depth = depth;
        self
    }

    /// First failure pattern contained in `output`, if any.
    pub fn detect_failure(&self, output: &str) -> Option<&str> {
        self.failed_when_contains
            .iter()
            .find(|p| output.contains(p.as_str()))
            .map(String::as_str)
    }

    /// Whether `output` carries a script error marker.
    pub fn has_error_marker(&self, output: &str) -> bool {
        let lowered = output.to_lowercase();
        self.script_error_markers
            .iter()
            .any(|m| lowered.contains(m.as_str()))
    }

    /// Strip the command echo and the trailing prompt from raw output.
    pub fn normalize_output(&self, raw: &str, command: &str) -> String {
        let text = raw.replace("\r\n", "\n").replace('\r', "");
        let mut lines: Vec<&str> = text.lines().collect();

        // Trailing prompt line
        if let Some(last) = lines.last() {
            if self.prompt_pattern.is_match(last.as_bytes()) {
                lines.pop();
            }
        }

        // Command echo, possibly preceded by blank lines
        while lines.first().is_some_and(|l| l.trim().is_empty()) {
            lines.remove(0);
        }
        if lines.first().is_some_and(|l| l.trim_end().ends_with(command.trim())) {
            lines.remove(0);
        }

        lines.join("\n")
    }
}

impl fmt::Debug for OltPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OltPlatform")
            .field("name", &self.name)
            .field("prompt_pattern", &self.prompt_pattern.as_str())
            .field("paging_command", &self.paging_command)
            .field("failed_when_contains", &self.failed_when_contains)
            .field("script_error_markers", &self.script_error_markers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn platform() -> OltPlatform {
        OltPlatform::new("test", r"OLT#")
            .unwrap()
            .with_failure_pattern("%Error")
            .with_script_error_marker("%")
            .with_script_error_marker("ERROR")
    }

    #[test]
    fn test_normalize_strips_echo_and_prompt() {
        let raw = "show card\r\nline one\r\nline two\r\nOLT#";
        assert_eq!(platform().normalize_output(raw, "show card"), "line one\nline two");
    }

    #[test]
    fn test_normalize_keeps_output_without_echo() {
        let raw = "\r\nline one\r\nOLT# ";
        assert_eq!(platform().normalize_output(raw, "show card"), "line one");
    }

    #[test]
    fn test_detect_failure() {
        let p = platform();
        assert_eq!(p.detect_failure("%Error 20203: Unknown command."), Some("%Error"));
        assert_eq!(p.detect_failure("all good"), None);
    }

    #[test]
    fn test_custom_login_patterns() {
        let p = platform()
            .with_login_pattern("login name:")
            .unwrap()
            .with_password_pattern("passcode:")
            .unwrap();
        assert!(p.login_pattern.is_match(b"\r\nLogin Name:"));
        assert!(p.password_pattern.is_match(b"Passcode:"));
        assert!(!p.password_pattern.is_match(b"Password:"));
    }

    #[test]
    fn test_error_markers_case_insensitive() {
        let p = platform();
        assert!(p.has_error_marker("%Invalid VLAN"));
        assert!(p.has_error_marker("Onu Error: exists"));
        assert!(!p.has_error_marker("Successful"));
    }
}
