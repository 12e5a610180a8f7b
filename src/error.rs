//! Error types for the layout renderer
//!
//! This module defines the error type shared by every render stage,
//! providing clear error messages and `?` propagation from the sinks,
//! font loading and image decoding.

use thiserror::Error;

/// Custom error type for render operations
#[derive(Error, Debug)]
pub enum RendererError {
    /// A deferred page-number reference points at a target that layout never registered.
    #[error("Unresolved page reference: '{0}'")]
    UnresolvedReference(String),

    #[error("Font '{family}' in style '{style}' is not defined in the font section of the document definition.")]
    FontNotFound { family: String, style: String },

    #[error("Font error: {0}")]
    FontError(String),

    #[error("Image error: {0}")]
    ImageError(String),

    #[error("SVG error: {0}")]
    SvgError(String),

    #[error("PDF generation error: {0}")]
    PdfError(String),

    #[error("JSON parsing error: {0}")]
    JsonError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid value for field '{0}': {1}")]
    InvalidValue(String, String),

    #[error("No current page: add_page must be called before drawing")]
    NoCurrentPage,
}

/// Result type alias for renderer operations
pub type RendererResult<T> = Result<T, RendererError>;

/// Helper to convert serde_json errors
impl From<serde_json::Error> for RendererError {
    fn from(err: serde_json::Error) -> Self {
        RendererError::JsonError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_font_not_found_message() {
        let err = RendererError::FontNotFound {
            family: "Comic".to_string(),
            style: "bolditalics".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Font 'Comic' in style 'bolditalics' is not defined in the font section of the document definition."
        );
    }

    #[test]
    fn test_json_error_conversion() {
        let parsed: Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: RendererError = parsed.unwrap_err().into();
        assert!(matches!(err, RendererError::JsonError(_)));
    }
}
