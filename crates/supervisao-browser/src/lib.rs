//! Browser automation for the government report portal.
//!
//! Provides a page capability trait for the filing flow, form control
//! classification and a headless Chromium implementation.

pub mod actions;
pub mod controls;
pub mod engine;
pub mod error;

pub use actions::{PageLauncher, PortalPage};
pub use controls::{ControlInspector, FormControlKind};
pub use engine::{BrowserEngine, ChromiumLauncher, LaunchOptions};
pub use error::{BrowserError, Result};
