//! Prompt pattern helpers.

use regex::bytes::Regex;

/// Compile a prompt pattern string into a regex.
///
/// Prompts are only ever matched at the end of the received data, so an
/// end anchor (allowing trailing whitespace) is appended when missing.
pub fn compile_prompt_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    let pattern = if pattern.ends_with('$') {
        pattern.to_string()
    } else {
        format!("{}\\s*$", pattern)
    };

    Regex::new(&pattern)
}

/// Compile a case-insensitive login or password prompt pattern.
///
/// Anchored at the end like prompts, so banner text such as
/// `Last login: ...` does not count as the prompt.
pub fn compile_login_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    let pattern = if pattern.ends_with('$') {
        pattern.to_string()
    } else {
        format!("{}\\s*$", pattern)
    };

    Regex::new(&format!("(?i){}", pattern))
}
