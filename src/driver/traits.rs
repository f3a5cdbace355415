use crate::error::Result;
use crate::model::Locator;
use async_trait::async_trait;
use std::fmt;

/// Opaque reference to a live page element, issued by a driver lookup.
///
/// A handle can go stale when the page re-renders; operations on a stale
/// handle fail with `MacroError::StaleReference`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(String);

impl ElementHandle {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Browser driver interface
///
/// The boundary between the capture-and-replay core and a remote
/// browser-automation session. Implementations translate these abstract
/// requests into their wire protocol; the core never sees that protocol.
///
/// Error contract:
/// * `MacroError::StaleReference` when a handle no longer points at a live element
/// * `MacroError::DriverSession` when the automation connection is gone
/// * `MacroError::Driver` for any other failure of a single request
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Driver name for logs (e.g., "chromium")
    fn name(&self) -> &str;

    /// Navigate the current page to `url`
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Find every live element matched by a single locator candidate
    ///
    /// # Returns
    /// All matches; the caller decides what zero or several matches mean
    async fn find_candidates(&self, locator: &Locator) -> Result<Vec<ElementHandle>>;

    /// Click on an element
    async fn click(&self, handle: &ElementHandle) -> Result<()>;

    /// Replace the value of a text-like element
    async fn set_value(&self, handle: &ElementHandle, text: &str) -> Result<()>;

    /// Choose an option of a `select` element by option identifier
    async fn select_option(&self, handle: &ElementHandle, option_id: &str) -> Result<()>;

    /// Option identifiers currently offered by a `select` element
    async fn list_options(&self, handle: &ElementHandle) -> Result<Vec<String>>;

    /// Whether the element currently accepts interaction
    async fn is_enabled(&self, handle: &ElementHandle) -> Result<bool>;

    /// Current checked-state of a checkbox or radio element
    async fn get_checked_state(&self, handle: &ElementHandle) -> Result<bool>;

    /// Drive a checkbox or radio element to `checked`
    async fn set_checked_state(&self, handle: &ElementHandle, checked: bool) -> Result<()>;
}
