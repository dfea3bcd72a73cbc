//! Response vocabulary produced by rules, plugins and fallbacks.

use std::collections::HashMap;

/// A gate decision in response form.
///
/// A pass-through response means "let the request reach the application
/// handler"; any other response terminates the request with itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Response body.
    pub body: Vec<u8>,
    pass_through: bool,
}

impl Response {
    /// Creates a new terminating response with the given status.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
            pass_through: false,
        }
    }

    /// Creates a pass-through response.
    pub fn pass() -> Self {
        Self {
            pass_through: true,
            ..Self::new(200)
        }
    }

    /// Creates a 302 redirect response.
    pub fn redirect(url: impl Into<String>) -> Self {
        Self::new(302).header("Location", url)
    }

    /// Creates a JSON response with the given status.
    pub fn json<T: serde::Serialize>(data: &T, status: u16) -> Self {
        match serde_json::to_vec(data) {
            Ok(body) => Self::new(status)
                .header("Content-Type", "application/json")
                .body(body),
            Err(_) => Self::new(500).body("Internal Server Error"),
        }
    }

    /// Creates a plain text response.
    pub fn text(body: impl Into<String>) -> Self {
        Self::new(200)
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(body.into())
    }

    /// Creates a 401 Unauthorized response.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::error(401, message.into())
    }

    /// Creates a 403 Forbidden response.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::error(403, message.into())
    }

    /// Creates a 404 Not Found response.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::error(404, message.into())
    }

    fn error(status: u16, message: String) -> Self {
        Self::json(&serde_json::json!({ "error": message }), status)
    }

    /// Sets a header.
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Sets the status code.
    #[must_use]
    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Returns true if this response lets the request through.
    pub fn is_pass_through(&self) -> bool {
        self.pass_through
    }

    /// Returns true for 3xx responses.
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }

    /// Returns the `Location` header, if any.
    pub fn location(&self) -> Option<&str> {
        self.headers.get("Location").map(String::as_str)
    }

    /// Returns the body as a string.
    pub fn body_string(&self) -> Option<String> {
        String::from_utf8(self.body.clone()).ok()
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::pass()
    }
}
