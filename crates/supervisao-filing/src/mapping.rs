//! Report field keys to portal locators.

use crate::error::Result;
use std::collections::HashMap;
use supervisao_browser::actions::same_page;
use supervisao_core::PortalConfig;

/// Static mapping from report fields to portal controls, plus the login
/// and submit locators. Built once at startup and shared read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    /// Portal entry page
    pub login_url: String,
    /// Form page; empty when the form is served at the login address
    pub form_url: String,
    /// Username input on the login page
    pub user_field: String,
    /// Password input on the login page
    pub password_field: String,
    /// Login submit control
    pub login_button: String,
    /// Form save/submit control
    pub submit_button: String,
    fields: HashMap<String, String>,
}

impl FieldMapping {
    /// Build the mapping from validated portal configuration.
    ///
    /// # Errors
    /// Returns `FilingError::Config` if a URL or locator is empty or still a
    /// template placeholder.
    pub fn from_config(config: &PortalConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            login_url: config.login_url.trim().to_string(),
            form_url: config.form_url.trim().to_string(),
            user_field: config.user_field.clone(),
            password_field: config.password_field.clone(),
            login_button: config.login_button.clone(),
            submit_button: config.submit_button.clone(),
            fields: config
                .fields
                .iter()
                .map(|(key, locator)| (key.clone(), locator.clone()))
                .collect(),
        })
    }

    /// Locator for a report field, if the portal has a control for it.
    #[must_use]
    pub fn locator(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Form URL to visit after login, or `None` when the form is the page
    /// login already lands on.
    #[must_use]
    pub fn form_navigation_target(&self) -> Option<&str> {
        if self.form_url.is_empty() || same_page(&self.form_url, &self.login_url) {
            None
        } else {
            Some(&self.form_url)
        }
    }

    /// Number of mapped report fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no report field is mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FilingError;
    use std::collections::BTreeMap;

    fn portal_config() -> PortalConfig {
        let mut fields = BTreeMap::new();
        fields.insert("medico-nome".to_string(), "#nome-medico".to_string());
        fields.insert("tipo-visita".to_string(), "input[name=\"tipo\"]".to_string());

        PortalConfig {
            login_url: "https://portal.example.gov/idp/login".to_string(),
            form_url: "https://portal.example.gov/supervisao/novo".to_string(),
            user_field: "#username".to_string(),
            password_field: "#password".to_string(),
            login_button: "button[type=submit]".to_string(),
            submit_button: "#salvar".to_string(),
            fields,
        }
    }

    #[test]
    fn test_locator_lookup() {
        let mapping = FieldMapping::from_config(&portal_config()).expect("valid mapping");
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping.locator("medico-nome"), Some("#nome-medico"));
        assert_eq!(mapping.locator("observacoes"), None);
    }

    #[test]
    fn test_form_navigation_target() {
        let mut config = portal_config();
        let mapping = FieldMapping::from_config(&config).unwrap();
        assert_eq!(
            mapping.form_navigation_target(),
            Some("https://portal.example.gov/supervisao/novo")
        );

        config.form_url = "https://portal.example.gov/idp/login/".to_string();
        let mapping = FieldMapping::from_config(&config).unwrap();
        assert_eq!(mapping.form_navigation_target(), None);

        config.form_url = String::new();
        let mapping = FieldMapping::from_config(&config).unwrap();
        assert_eq!(mapping.form_navigation_target(), None);
    }

    #[test]
    fn test_rejects_placeholders() {
        let mut config = portal_config();
        config
            .fields
            .insert("crm".to_string(), "#ID_DO_CAMPO_CRM_AQUI".to_string());

        let err = FieldMapping::from_config(&config).unwrap_err();
        assert!(matches!(err, FilingError::Config(_)));
        assert!(err.to_string().contains("portal.fields.crm"));
    }
}
