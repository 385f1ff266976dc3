use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("chromium error: {0}")]
    ChromiumError(String),

    #[error("navigation failed: {0}")]
    NavigationError(String),

    #[error("selector not found: {0}")]
    SelectorNotFound(String),

    #[error("no option with value '{value}' in {selector}")]
    OptionNotFound { selector: String, value: String },

    #[error("script evaluation failed: {0}")]
    ScriptError(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("browser already closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BrowserError::NavigationError("page not found".to_string());
        assert_eq!(err.to_string(), "navigation failed: page not found");
    }

    #[test]
    fn test_option_not_found_names_selector_and_value() {
        let err = BrowserError::OptionNotFound {
            selector: "#municipio-uf".to_string(),
            value: "XX".to_string(),
        };
        assert!(err.to_string().contains("#municipio-uf"));
        assert!(err.to_string().contains("'XX'"));
    }
}
