use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Unauthorized - API key may be missing or revoked")]
    Unauthorized,

    #[error("Section not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Catalog unavailable: {0}")]
    Unavailable(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl CatalogError {
    /// Truncate a response body to avoid logging excessive data.
    /// Cuts on a char boundary; bodies are often Arabic.
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!(
            "{}... (truncated, {} total bytes)",
            &body[..end],
            body.len()
        )
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 => CatalogError::Unauthorized,
            403 => CatalogError::AccessDenied(truncated),
            404 => CatalogError::NotFound(truncated),
            429 => CatalogError::RateLimited,
            500..=599 => CatalogError::ServerError(truncated),
            _ => CatalogError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_mapping() {
        assert!(matches!(
            CatalogError::from_status(StatusCode::UNAUTHORIZED, ""),
            CatalogError::Unauthorized
        ));
        assert!(matches!(
            CatalogError::from_status(StatusCode::NOT_FOUND, "no such section"),
            CatalogError::NotFound(body) if body == "no such section"
        ));
        assert!(matches!(
            CatalogError::from_status(StatusCode::BAD_GATEWAY, ""),
            CatalogError::ServerError(_)
        ));
        assert!(matches!(
            CatalogError::from_status(StatusCode::IM_A_TEAPOT, ""),
            CatalogError::InvalidResponse(_)
        ));
    }

    #[test]
    fn test_truncate_body_respects_char_boundaries() {
        let body = "ش".repeat(400); // 800 bytes
        let truncated = CatalogError::truncate_body(&body);
        assert!(truncated.starts_with(&"ش".repeat(250)));
        assert!(truncated.contains("800 total bytes"));
    }
}
