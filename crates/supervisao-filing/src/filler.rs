//! Per-field form filling.
//!
//! Each mapped field is filled by first classifying the live control at its
//! locator and then applying the strategy for that kind of control.

use crate::error::{FilingError, Result};
use serde_json::Value;
use supervisao_browser::actions::radio_option_selector;
use supervisao_browser::{BrowserError, FormControlKind, PortalPage};

/// Checkbox values that mean "unchecked", compared lowercase.
const UNCHECKED_VALUES: [&str; 3] = ["nao", "off", ""];

/// What happened to a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
    /// The control was found and filled
    Filled(FormControlKind),
    /// No control exists at the locator on this page
    Skipped,
}

/// Whether a report value should be filled at all.
///
/// Null, `false`, numeric zero and the empty string are never filled.
#[must_use]
pub fn is_fillable(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => !matches!(n.as_f64(), Some(f) if f == 0.0),
        _ => true,
    }
}

/// Text form of a report value, strings verbatim.
#[must_use]
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Checkbox state for a report value.
#[must_use]
pub fn checkbox_truthy(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::Bool(true) => true,
        other => {
            let text = value_text(other).to_lowercase();
            !UNCHECKED_VALUES.contains(&text.as_str())
        }
    }
}

/// Fills one form control according to its live kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldFiller;

impl FieldFiller {
    /// Create a new filler.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Fill the control at `locator` with `value`.
    ///
    /// A locator that matches nothing is skipped with a warning. Any error
    /// while classifying or filling is returned as `FilingError::FillError`.
    pub async fn fill(
        &self,
        page: &dyn PortalPage,
        field: &str,
        locator: &str,
        value: &Value,
    ) -> Result<FillOutcome> {
        let fill_error = |e: BrowserError| FilingError::FillError {
            field: field.to_string(),
            selector: locator.to_string(),
            reason: e.to_string(),
        };

        let Some(kind) = page.inspect_control(locator).await.map_err(fill_error)? else {
            tracing::warn!(field = %field, selector = %locator, "control not found on page, skipping");
            return Ok(FillOutcome::Skipped);
        };

        let text = value_text(value);
        let filled = match kind {
            FormControlKind::Select => page.select_option(locator, &text).await,
            FormControlKind::Radio => {
                page.set_checked(&radio_option_selector(locator, &text), true)
                    .await
            }
            FormControlKind::Checkbox => page.set_checked(locator, checkbox_truthy(value)).await,
            FormControlKind::SingleLineText
            | FormControlKind::MultiLineText
            | FormControlKind::Unknown => page.fill_field(locator, &text).await,
        };
        filled.map_err(fill_error)?;

        tracing::debug!(field = %field, selector = %locator, kind = %kind, "filled field");
        Ok(FillOutcome::Filled(kind))
    }
}
