//! Browser seam: the operations the wizard engine needs from a live page.

mod chrome;

pub use chrome::{ChromeProvider, ChromeSession};

use crate::config::BrowserConfig;
use crate::locator::Locator;
use crate::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;

/// Snapshot of one DOM node, taken when a locator was resolved.
///
/// The snapshot is never refreshed. Acting on it after the application has
/// replaced the node fails with [`crate::Error::NotFound`]; callers re-resolve.
#[derive(Debug, Clone, Deserialize)]
pub struct Element {
    /// CSS selector that re-finds this exact node while it stays attached.
    pub handle: String,
    pub tag: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub class_name: String,
    /// Own text, whitespace collapsed.
    #[serde(default)]
    pub text: String,
    pub visible: bool,
    pub enabled: bool,
    #[serde(default)]
    pub readonly: bool,
    #[serde(default)]
    pub input_type: Option<String>,
    /// Inside a `<label>`.
    #[serde(default)]
    pub in_label: bool,
    pub bbox: BoundingBox,
    #[serde(default = "default_dpr")]
    pub device_pixel_ratio: f64,
}

fn default_dpr() -> f64 {
    1.0
}

impl Element {
    pub fn is_clickable(&self) -> bool {
        self.visible && self.enabled
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.class_name.split_whitespace().any(|c| c == class)
    }

    /// Visible, editable free-text input.
    pub fn is_text_input(&self) -> bool {
        self.tag == "input"
            && self.visible
            && !self.readonly
            && matches!(self.input_type.as_deref(), None | Some("text") | Some("search"))
    }

    pub fn describe(&self) -> String {
        match &self.id {
            Some(id) if !id.is_empty() => format!("<{} id={}>", self.tag, id),
            _ => format!("<{} {}>", self.tag, self.handle),
        }
    }
}

/// Viewport-relative CSS pixel rectangle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// One browser session as seen by the engine.
#[async_trait]
pub trait Driver: Send + Sync {
    async fn goto(&self, url: &str) -> Result<()>;

    async fn current_url(&self) -> Result<String>;

    /// Resolve a locator against the live DOM. Never cached.
    async fn query(&self, locator: &Locator) -> Result<Vec<Element>>;

    /// Native pointer click at the element's center.
    async fn click(&self, element: &Element) -> Result<()>;

    /// `element.click()` from page script.
    async fn script_click(&self, element: &Element) -> Result<()>;

    /// Click the element's parent node.
    async fn click_parent(&self, element: &Element) -> Result<()>;

    /// Move the pointer over the element, then click.
    async fn hover_click(&self, element: &Element) -> Result<()>;

    /// Select all content of an input and delete it.
    async fn clear(&self, element: &Element) -> Result<()>;

    async fn type_text(&self, element: &Element, text: &str) -> Result<()>;

    async fn press_key(&self, element: &Element, key: &str) -> Result<()>;

    async fn scroll_into_view(&self, element: &Element) -> Result<()>;

    /// PNG of the current viewport.
    async fn screenshot(&self) -> Result<Vec<u8>>;

    /// PNG of one element's bounding box.
    async fn screenshot_element(&self, element: &Element) -> Result<Vec<u8>> {
        self.scroll_into_view(element).await?;
        // bbox changes after scrolling
        let fresh = self
            .query(&Locator::css(element.handle.clone()))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| crate::Error::NotFound(element.describe()))?;
        let png = self.screenshot().await?;
        crate::evidence::crop_png(&png, fresh.bbox, fresh.device_pixel_ratio)
    }
}

/// Ways of clicking a widget trigger.
///
/// Different rendering hiccups of the host application swallow different
/// kinds of click, so the dropdown cycles through these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interaction {
    Click,
    ScriptClick,
    ParentClick,
    HoverClick,
}

impl Interaction {
    pub const ALL: [Interaction; 4] = [
        Interaction::Click,
        Interaction::ScriptClick,
        Interaction::ParentClick,
        Interaction::HoverClick,
    ];

    pub async fn perform<D: Driver + ?Sized>(self, driver: &D, element: &Element) -> Result<()> {
        match self {
            Self::Click => driver.click(element).await,
            Self::ScriptClick => driver.script_click(element).await,
            Self::ParentClick => driver.click_parent(element).await,
            Self::HoverClick => driver.hover_click(element).await,
        }
    }
}

impl fmt::Display for Interaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Click => "click",
            Self::ScriptClick => "script_click",
            Self::ParentClick => "parent_click",
            Self::HoverClick => "hover_click",
        })
    }
}

/// Starts and stops browser sessions.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    type Session: Driver;

    async fn acquire(&self, config: &BrowserConfig) -> Result<Self::Session>;

    async fn release(&self, session: Self::Session) -> Result<()>;
}
