/// Markup shown in place of a page that could not be fetched.
///
/// `message` is inserted verbatim.
pub fn error_fragment(message: &str) -> String {
    format!("<p style='color:red;'><strong>Error:</strong> {message}</p>")
}
