//! Form control classification.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a live form control, derived by inspecting the page.
///
/// Never persisted: a control is classified again on every fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormControlKind {
    /// `<input>` with a text-like or missing `type`
    SingleLineText,
    /// `<textarea>`
    MultiLineText,
    /// `<select>`
    Select,
    /// `<input type="radio">`
    Radio,
    /// `<input type="checkbox">`
    Checkbox,
    /// Any other element; filled as text on a best-effort basis
    Unknown,
}

impl FormControlKind {
    /// Classify a control from its tag name and declared `type` attribute.
    #[must_use]
    pub fn classify(tag: &str, input_type: Option<&str>) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "select" => Self::Select,
            "textarea" => Self::MultiLineText,
            "input" => match input_type.map(str::to_ascii_lowercase).as_deref() {
                Some("radio") => Self::Radio,
                Some("checkbox") => Self::Checkbox,
                _ => Self::SingleLineText,
            },
            _ => Self::Unknown,
        }
    }

    /// Short uppercase label used in logs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::SingleLineText => "TEXT",
            Self::MultiLineText => "TEXTAREA",
            Self::Select => "SELECT",
            Self::Radio => "RADIO",
            Self::Checkbox => "CHECKBOX",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for FormControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Raw facts about a control read from the DOM.
#[derive(Debug, Clone, Deserialize)]
pub struct ControlProbe {
    pub tag: String,
    #[serde(rename = "type")]
    pub input_type: Option<String>,
}

impl ControlProbe {
    #[must_use]
    pub fn kind(&self) -> FormControlKind {
        FormControlKind::classify(&self.tag, self.input_type.as_deref())
    }
}

/// Capability to inspect a live control by locator.
#[async_trait::async_trait]
pub trait ControlInspector: Send + Sync {
    /// Classify the control at `selector`.
    ///
    /// Returns `Ok(None)` when nothing matches; errors are inspection failures.
    async fn inspect_control(&self, selector: &str) -> Result<Option<FormControlKind>>;
}
