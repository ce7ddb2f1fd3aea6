//! Error primitives shared by every Kestrel crate.

use core::fmt;

/// Result alias used across the workspace.
pub type BrowserResult<T> = Result<T, BrowserError>;

/// Coded error carried through the fetch and transform pipeline.
///
/// `code` is a dotted, stable identifier (`net.dns.resolve_failed`) meant for
/// logs and tests. `message` is the human-readable text shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserError {
    pub code: &'static str,
    pub message: String,
}

impl BrowserError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for BrowserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for BrowserError {}

#[cfg(test)]
mod tests {
    use super::BrowserError;

    #[test]
    fn display_includes_code_and_message() {
        let error = BrowserError::new("net.dns.resolve_failed", "no such host");
        assert_eq!(error.to_string(), "net.dns.resolve_failed: no such host");
    }

    #[test]
    fn errors_compare_by_code_and_message() {
        let error = BrowserError::new("net.http.status", "Not Found");
        assert_eq!(error, BrowserError::new("net.http.status", String::from("Not Found")));
        assert_ne!(error, BrowserError::new("net.http.status", "Gone"));
    }
}
