use super::locators::{self, PLATE_ERROR_CLASS};
use super::PageContext;
use crate::browser::Driver;
use crate::{Error, Result};
use std::fmt;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

/// Why the landing page is considered to have rejected a plate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlateError {
    /// The plate input carries the error class.
    InputStyled,
    /// A visible validation message.
    Message(String),
    /// No redirect within the observation window. Racy on slow networks.
    NoNavigation,
}

impl fmt::Display for PlateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InputStyled => f.write_str("plate input marked invalid"),
            Self::Message(text) => write!(f, "validation message: {}", text),
            Self::NoNavigation => f.write_str("no navigation after submitting the plate"),
        }
    }
}

/// Landing page: plate entry.
pub struct HomePage<'a, D: ?Sized> {
    ctx: PageContext<'a, D>,
}

impl<'a, D: Driver + ?Sized> HomePage<'a, D> {
    pub(crate) fn new(ctx: PageContext<'a, D>) -> Self {
        Self { ctx }
    }

    /// Type the plate (possibly empty) and press the quote button.
    pub async fn submit_plate(&self, plate: &str) -> Result<()> {
        let explicit = self.ctx.config.timeouts.explicit();
        let input = self
            .ctx
            .resolver
            .wait_visible(&locators::plate_input(), explicit)
            .await?;

        self.ctx.driver.clear(&input).await?;
        if !plate.is_empty() {
            self.ctx.driver.type_text(&input, plate).await?;
        }
        info!("Submitting plate '{}'", plate);
        self.ctx
            .resolver
            .click(&locators::quote_button(), explicit)
            .await?;
        Ok(())
    }

    /// Whether the URL reached the plan-selection path within `timeout`.
    pub async fn wait_for_advance(&self, timeout: Duration) -> Result<bool> {
        let plans_path = &self.ctx.config.app.plans_path;
        let waited = self
            .ctx
            .resolver
            .waits()
            .until(format!("url contains {:?}", plans_path), timeout, || async {
                let url = self.ctx.driver.current_url().await?;
                Ok(url.contains(plans_path.as_str()).then_some(()))
            })
            .await;
        match waited {
            Ok(()) => Ok(true),
            Err(Error::Timeout { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Check, in order: error class on the input, a visible validation
    /// message, and finally the absence of a redirect.
    pub async fn read_error_state(&self) -> Result<Option<PlateError>> {
        if self.input_styled().await? {
            debug!("plate input has class {}", PLATE_ERROR_CLASS);
            return Ok(Some(PlateError::InputStyled));
        }

        let message = self
            .ctx
            .resolver
            .waits()
            .until("plate validation message", self.ctx.config.timeouts.error_message_wait(), || {
                self.find_message()
            })
            .await;
        if let Ok(text) = message {
            return Ok(Some(PlateError::Message(text)));
        }

        if !self.wait_for_advance(self.ctx.config.timeouts.observation()).await? {
            debug!(
                "no redirect within {:?}, assuming the plate was rejected",
                self.ctx.config.timeouts.observation()
            );
            return Ok(Some(PlateError::NoNavigation));
        }
        Ok(None)
    }

    /// Visible validation text, a fixed description when only the error
    /// styling is present, or empty.
    pub async fn error_message(&self) -> Result<String> {
        if let Some(text) = self.find_message().await? {
            return Ok(text);
        }
        if self.input_styled().await? {
            return Ok(PlateError::InputStyled.to_string());
        }
        Ok(String::new())
    }

    /// Wait out the observation window, then check the URL.
    pub async fn is_still_on_home(&self) -> Result<bool> {
        sleep(self.ctx.config.timeouts.observation()).await;
        let url = self.ctx.driver.current_url().await?;
        Ok(!url.contains(self.ctx.config.app.plans_path.as_str()))
    }

    async fn input_styled(&self) -> Result<bool> {
        Ok(self
            .ctx
            .resolver
            .resolve_all(&locators::plate_input())
            .await?
            .iter()
            .any(|e| e.has_class(PLATE_ERROR_CLASS)))
    }

    async fn find_message(&self) -> Result<Option<String>> {
        Ok(self
            .ctx
            .resolver
            .resolve_all(&locators::plate_message())
            .await?
            .into_iter()
            .find(|e| e.visible && e.tag != "input" && locators::is_plate_error_text(&e.text))
            .map(|e| e.text))
    }
}
