// Shared HTTP response types.

#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    // Human-readable reason, the only field of every JSON error body.
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
