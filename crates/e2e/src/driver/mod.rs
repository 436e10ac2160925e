//! UI automation capability
//!
//! Stages talk to the browser only through [`Driver`]. Elements are
//! addressed by [`Locator`] values, which are resolved fresh on every call
//! the way Playwright locators are.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::error::E2eResult;

pub mod scripted;

/// Where a locator is resolved
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Scope {
    Page,
    /// Inside the iframe matched by this CSS selector
    FrameElement(String),
    /// Inside the first embedded document whose URL contains this substring
    FrameUrl(String),
}

/// How an element is selected
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Selector {
    Css { css: String },
    /// ARIA role with accessible name, matched case-insensitively
    Role { role: String, name: String },
    Text { text: String },
}

/// A lazily resolved element query
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator {
    pub scope: Scope,
    pub selector: Selector,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_not_text: Option<String>,
    /// Zero-based position among the matches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nth: Option<usize>,
}

impl Locator {
    fn with_selector(selector: Selector) -> Self {
        Self {
            scope: Scope::Page,
            selector,
            has_text: None,
            has_not_text: None,
            nth: None,
        }
    }

    pub fn css(css: impl Into<String>) -> Self {
        Self::with_selector(Selector::Css { css: css.into() })
    }

    pub fn role(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self::with_selector(Selector::Role { role: role.into(), name: name.into() })
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::with_selector(Selector::Text { text: text.into() })
    }

    /// Resolve inside the iframe element matched by `frame_css`
    pub fn in_frame(mut self, frame_css: impl Into<String>) -> Self {
        self.scope = Scope::FrameElement(frame_css.into());
        self
    }

    /// Resolve inside the embedded document whose URL contains `marker`
    pub fn in_frame_url(mut self, marker: impl Into<String>) -> Self {
        self.scope = Scope::FrameUrl(marker.into());
        self
    }

    pub fn has_text(mut self, text: impl Into<String>) -> Self {
        self.has_text = Some(text.into());
        self
    }

    pub fn has_not_text(mut self, text: impl Into<String>) -> Self {
        self.has_not_text = Some(text.into());
        self
    }

    pub fn nth(mut self, index: usize) -> Self {
        self.nth = Some(index);
        self
    }

    pub fn first(self) -> Self {
        self.nth(0)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            Scope::Page => {}
            Scope::FrameElement(frame) => write!(f, "frame({}) >> ", frame)?,
            Scope::FrameUrl(marker) => write!(f, "frame(url~{}) >> ", marker)?,
        }
        match &self.selector {
            Selector::Css { css } => write!(f, "{}", css)?,
            Selector::Role { role, name } => write!(f, "role={}[name=\"{}\"]", role, name)?,
            Selector::Text { text } => write!(f, "text={}", text)?,
        }
        if let Some(text) = &self.has_text {
            write!(f, " [has-text=\"{}\"]", text)?;
        }
        if let Some(text) = &self.has_not_text {
            write!(f, " [has-not-text=\"{}\"]", text)?;
        }
        if let Some(n) = self.nth {
            write!(f, " >> nth={}", n)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
}

impl WaitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitState::Visible => "visible",
            WaitState::Hidden => "hidden",
            WaitState::Attached => "attached",
            WaitState::Detached => "detached",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadState {
    #[default]
    #[serde(rename = "load")]
    Load,
    #[serde(rename = "domcontentloaded")]
    DomContentLoaded,
    #[serde(rename = "networkidle")]
    NetworkIdle,
}

impl LoadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadState::Load => "load",
            LoadState::DomContentLoaded => "domcontentloaded",
            LoadState::NetworkIdle => "networkidle",
        }
    }
}

/// An embedded document on the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameInfo {
    pub name: String,
    pub url: String,
}

/// Browser automation surface used by the checkout stages.
///
/// Waiting methods fail with `E2eError::Timeout` when the bound elapses,
/// interactions inside a torn-down frame fail with `E2eError::FrameDetached`.
/// Probing methods (`is_visible`, `count`, ...) never wait.
#[async_trait]
pub trait Driver: Send + Sync {
    async fn goto(&self, url: &str) -> E2eResult<()>;

    async fn current_url(&self) -> E2eResult<String>;

    async fn wait_for(&self, locator: &Locator, state: WaitState, timeout: Duration) -> E2eResult<()>;

    async fn is_visible(&self, locator: &Locator) -> E2eResult<bool>;

    async fn is_enabled(&self, locator: &Locator) -> E2eResult<bool>;

    async fn is_checked(&self, locator: &Locator) -> E2eResult<bool>;

    async fn count(&self, locator: &Locator) -> E2eResult<usize>;

    /// Interaction-simulating click with actionability checks
    async fn click(&self, locator: &Locator, timeout: Duration) -> E2eResult<()>;

    /// `element.click()` dispatched in the page, bypassing actionability checks
    async fn dom_click(&self, locator: &Locator) -> E2eResult<()>;

    async fn fill(&self, locator: &Locator, value: &str) -> E2eResult<()>;

    /// Per-keystroke typing, for masked inputs that ignore `fill`
    async fn type_text(&self, locator: &Locator, text: &str) -> E2eResult<()>;

    async fn press(&self, locator: &Locator, key: &str) -> E2eResult<()>;

    async fn select_option(&self, locator: &Locator, value: &str) -> E2eResult<()>;

    async fn set_checked(&self, locator: &Locator, checked: bool) -> E2eResult<()>;

    async fn text_content(&self, locator: &Locator) -> E2eResult<Option<String>>;

    async fn all_text_contents(&self, locator: &Locator) -> E2eResult<Vec<String>>;

    async fn get_attribute(&self, locator: &Locator, name: &str) -> E2eResult<Option<String>>;

    /// Wait until the page URL matches a regex
    async fn wait_for_url(&self, pattern: &str, timeout: Duration) -> E2eResult<()>;

    /// Wait for the next main-frame navigation to reach `domcontentloaded`
    async fn wait_for_navigation(&self, timeout: Duration) -> E2eResult<()>;

    async fn wait_for_load_state(&self, state: LoadState, timeout: Duration) -> E2eResult<()>;

    /// Every embedded document currently attached, main frame excluded
    async fn frames(&self) -> E2eResult<Vec<FrameInfo>>;

    async fn screenshot(&self, path: &Path, full_page: bool) -> E2eResult<()>;

    /// Release the page and whatever process backs it
    async fn close(&self) -> E2eResult<()> {
        Ok(())
    }
}
