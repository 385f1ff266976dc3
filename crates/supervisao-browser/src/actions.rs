use crate::controls::ControlInspector;
use crate::error::{BrowserError, Result};
use std::time::Duration;

/// Page-level actions the filing flow needs from a browser.
#[async_trait::async_trait]
pub trait PortalPage: ControlInspector {
    /// Navigate to a URL and wait for it to load
    async fn navigate(&self, url: &str) -> Result<()>;

    /// URL the page is currently showing
    async fn current_url(&self) -> Result<String>;

    /// Set the text value of a control verbatim
    async fn fill_field(&self, selector: &str, value: &str) -> Result<()>;

    /// Click an element by selector
    async fn click(&self, selector: &str) -> Result<()>;

    /// Wait for the navigation triggered by a previous action
    async fn wait_for_navigation(&self, timeout: Duration) -> Result<()>;

    /// Select the option whose value equals `value`
    async fn select_option(&self, selector: &str, value: &str) -> Result<()>;

    /// Bring a radio or checkbox to the requested state; no-op if already there
    async fn set_checked(&self, selector: &str, checked: bool) -> Result<()>;

    /// Release the page and its browser process
    async fn close(&mut self) -> Result<()>;
}

/// Launches one fresh page (and browser) per call.
#[async_trait::async_trait]
pub trait PageLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn PortalPage>>;
}

/// Helper to extract domain from URL
pub fn extract_domain(url: &str) -> Result<String> {
    let url = url::Url::parse(url)
        .map_err(|e| BrowserError::NavigationError(format!("Invalid URL: {}", e)))?;

    url.host_str()
        .ok_or_else(|| BrowserError::NavigationError("No host in URL".to_string()))
        .map(|s| s.to_string())
}

/// Compare two URLs ignoring fragments and a trailing slash.
///
/// Unparseable input falls back to plain string comparison.
pub fn same_page(a: &str, b: &str) -> bool {
    match (url::Url::parse(a), url::Url::parse(b)) {
        (Ok(mut a), Ok(mut b)) => {
            a.set_fragment(None);
            b.set_fragment(None);
            a.as_str().trim_end_matches('/') == b.as_str().trim_end_matches('/')
        }
        _ => a.trim_end_matches('/') == b.trim_end_matches('/'),
    }
}

/// Selector for the radio input of a group whose value is `value`.
pub fn radio_option_selector(group: &str, value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("{group}[value=\"{escaped}\"]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_domain() {
        assert_eq!(
            extract_domain("https://acesso.unasus.gov.br/idp/login").unwrap(),
            "acesso.unasus.gov.br"
        );
        assert_eq!(
            extract_domain("http://subdomain.example.com:8080/path").unwrap(),
            "subdomain.example.com"
        );
    }

    #[test]
    fn test_extract_domain_invalid() {
        assert!(extract_domain("not-a-url").is_err());
    }

    #[test]
    fn test_same_page() {
        assert!(same_page(
            "https://portal.example.gov/login",
            "https://portal.example.gov/login/"
        ));
        assert!(same_page(
            "https://portal.example.gov/login#top",
            "https://portal.example.gov/login"
        ));
        assert!(!same_page(
            "https://portal.example.gov/login",
            "https://portal.example.gov/home"
        ));
        assert!(!same_page(
            "https://portal.example.gov/login?x=1",
            "https://portal.example.gov/login"
        ));
    }

    #[test]
    fn test_radio_option_selector() {
        assert_eq!(
            radio_option_selector("input[name=\"contato\"]", "sim"),
            "input[name=\"contato\"][value=\"sim\"]"
        );
        assert_eq!(
            radio_option_selector("input[name=\"g\"]", "a\"b"),
            "input[name=\"g\"][value=\"a\\\"b\"]"
        );
    }
}
