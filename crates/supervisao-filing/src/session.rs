//! Browser session against the portal.
//!
//! One session owns one browser page for one processing attempt. It is never
//! reused across reports.

use crate::credentials::PortalCredentials;
use crate::error::{FilingError, Result};
use crate::mapping::FieldMapping;
use std::sync::Arc;
use std::time::Duration;
use supervisao_browser::actions::{extract_domain, same_page};
use supervisao_browser::{BrowserError, PageLauncher, PortalPage};

/// Path segment of a login page.
const LOGIN_SEGMENT: &str = "login";

/// Username/password step of the portal's single sign-on.
const LOGIN_FORM_MARKER: &str = "loginuserpass";

/// Whether `url` still looks like a login page.
#[must_use]
pub fn looks_like_login(url: &str) -> bool {
    let lower = url.to_lowercase();
    if lower.contains(LOGIN_FORM_MARKER) {
        return true;
    }

    let path = match url::Url::parse(&lower) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => lower,
    };

    path.split('/').any(|segment| {
        let stem = segment.split('.').next().unwrap_or(segment);
        stem == LOGIN_SEGMENT
    })
}

/// A logged-in (or logging-in) browser session on the portal.
pub struct PortalSession {
    page: Option<Box<dyn PortalPage>>,
    mapping: Arc<FieldMapping>,
    navigation_timeout: Duration,
}

impl PortalSession {
    /// Launch a fresh browser page for one processing attempt.
    ///
    /// # Errors
    /// Returns `FilingError::SessionError` if the browser cannot be launched.
    pub async fn open(
        launcher: &dyn PageLauncher,
        mapping: Arc<FieldMapping>,
        navigation_timeout: Duration,
    ) -> Result<Self> {
        let page = launcher
            .launch()
            .await
            .map_err(|e| FilingError::SessionError(format!("failed to launch browser: {e}")))?;

        Ok(Self {
            page: Some(page),
            mapping,
            navigation_timeout,
        })
    }

    /// The live page.
    ///
    /// # Errors
    /// Returns `FilingError::SessionError` after the session was closed.
    pub fn page(&self) -> Result<&dyn PortalPage> {
        self.page
            .as_deref()
            .ok_or_else(|| FilingError::SessionError("portal session already closed".to_string()))
    }

    /// Log into the portal.
    ///
    /// Ending up back on a login page, or the post-login navigation timing
    /// out, is an `AuthenticationFailed`.
    pub async fn login(&self, credentials: &PortalCredentials) -> Result<()> {
        let page = self.page()?;
        let mapping = &self.mapping;
        let session_error = |step: &str, e: BrowserError| FilingError::SessionError(format!("{step}: {e}"));

        page.navigate(&mapping.login_url)
            .await
            .map_err(|e| session_error("failed to open login page", e))?;
        page.fill_field(&mapping.user_field, credentials.login_name())
            .await
            .map_err(|e| session_error("failed to fill login name", e))?;
        page.fill_field(&mapping.password_field, credentials.secret())
            .await
            .map_err(|e| session_error("failed to fill password", e))?;
        page.click(&mapping.login_button)
            .await
            .map_err(|e| session_error("failed to click login button", e))?;

        match page.wait_for_navigation(self.navigation_timeout).await {
            Ok(()) => {}
            Err(BrowserError::Timeout(_)) => {
                return Err(FilingError::AuthenticationFailed(format!(
                    "login navigation timed out after {}s",
                    self.navigation_timeout.as_secs()
                )));
            }
            Err(e) => return Err(session_error("login navigation failed", e)),
        }

        let landed = page
            .current_url()
            .await
            .map_err(|e| session_error("failed to read page URL", e))?;

        if same_page(&landed, &mapping.login_url) || looks_like_login(&landed) {
            return Err(FilingError::AuthenticationFailed(format!(
                "login rejected, still on login page ({landed})"
            )));
        }

        let portal = extract_domain(&mapping.login_url).unwrap_or_else(|_| mapping.login_url.clone());
        tracing::info!(portal = %portal, login = %credentials.login_name(), "logged into portal");
        Ok(())
    }

    /// Move to the report form unless login already landed on it.
    pub async fn navigate_to_form(&self) -> Result<()> {
        let page = self.page()?;
        if let Some(form_url) = self.mapping.form_navigation_target() {
            page.navigate(form_url).await.map_err(|e| {
                FilingError::SessionError(format!("failed to open report form: {e}"))
            })?;
            tracing::debug!(url = %form_url, "opened report form");
        }
        Ok(())
    }

    /// Click the form's submit control.
    ///
    /// The portal's confirmation page is not inspected.
    pub async fn submit(&self) -> Result<()> {
        self.page()?
            .click(&self.mapping.submit_button)
            .await
            .map_err(|e| FilingError::SubmitError(format!("failed to click submit: {e}")))
    }

    /// Release the browser. Safe to call more than once.
    pub async fn close(&mut self) -> Result<()> {
        let Some(mut page) = self.page.take() else {
            return Ok(());
        };

        page.close()
            .await
            .map_err(|e| FilingError::SessionError(format!("failed to close browser: {e}")))
    }

    /// Whether the browser has been released.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.page.is_none()
    }
}

impl Drop for PortalSession {
    fn drop(&mut self) {
        if self.page.is_some() {
            tracing::warn!("portal session dropped without close; browser process may linger");
        }
    }
}
