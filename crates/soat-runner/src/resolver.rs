//! Locator resolution against the live DOM.

use crate::browser::{Driver, Element};
use crate::locator::Locator;
use crate::wait::WaitEngine;
use crate::{Error, Result};
use std::time::Duration;
use tracing::debug;

/// Resolves locators on every call, never caching a node.
pub struct ElementResolver<'a, D: ?Sized> {
    driver: &'a D,
    waits: WaitEngine,
    /// Budget of a single [`resolve`](Self::resolve) lookup.
    implicit: Duration,
}

impl<D: ?Sized> Clone for ElementResolver<'_, D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<D: ?Sized> Copy for ElementResolver<'_, D> {}

impl<'a, D: Driver + ?Sized> ElementResolver<'a, D> {
    pub fn new(driver: &'a D, waits: WaitEngine) -> Self {
        Self {
            driver,
            waits,
            implicit: Duration::ZERO,
        }
    }

    pub fn with_implicit_timeout(mut self, implicit: Duration) -> Self {
        self.implicit = implicit;
        self
    }

    pub fn driver(&self) -> &'a D {
        self.driver
    }

    pub fn waits(&self) -> WaitEngine {
        self.waits
    }

    /// First visible match, polled for at most the implicit timeout.
    pub async fn resolve(&self, locator: &Locator) -> Result<Element> {
        let found = self
            .waits
            .until(format!("visible({})", locator), self.implicit, || {
                self.find_visible(locator)
            })
            .await;
        match found {
            Err(Error::Timeout { .. }) => Err(Error::NotFound(locator.to_string())),
            other => other,
        }
    }

    /// Every match, visible or not. Possibly empty.
    pub async fn resolve_all(&self, locator: &Locator) -> Result<Vec<Element>> {
        self.driver.query(locator).await
    }

    pub async fn find_visible(&self, locator: &Locator) -> Result<Option<Element>> {
        Ok(self
            .driver
            .query(locator)
            .await?
            .into_iter()
            .find(|e| e.visible))
    }

    async fn find_clickable(&self, locator: &Locator) -> Result<Option<Element>> {
        Ok(self
            .driver
            .query(locator)
            .await?
            .into_iter()
            .find(Element::is_clickable))
    }

    pub async fn wait_visible(&self, locator: &Locator, timeout: Duration) -> Result<Element> {
        self.waits
            .until(format!("visible({})", locator), timeout, || {
                self.find_visible(locator)
            })
            .await
    }

    pub async fn wait_clickable(&self, locator: &Locator, timeout: Duration) -> Result<Element> {
        self.waits
            .until(format!("clickable({})", locator), timeout, || {
                self.find_clickable(locator)
            })
            .await
    }

    pub async fn wait_invisible(&self, locator: &Locator, timeout: Duration) -> Result<()> {
        self.waits
            .until(format!("invisible({})", locator), timeout, || async {
                let visible = self.find_visible(locator).await?;
                Ok(visible.is_none().then_some(()))
            })
            .await
    }

    /// The first match in document order, once that node is clickable.
    ///
    /// A later match is never taken instead, even when it is ready sooner.
    pub async fn wait_first_clickable(&self, locator: &Locator, timeout: Duration) -> Result<Element> {
        self.waits
            .until(format!("first clickable({})", locator), timeout, || async {
                let first = self.driver.query(locator).await?.into_iter().next();
                Ok(first.filter(Element::is_clickable))
            })
            .await
    }

    /// Wait until clickable, then click.
    ///
    /// A click that fails because the node was replaced in between is retried
    /// against a fresh resolution within the same budget.
    pub async fn click(&self, locator: &Locator, timeout: Duration) -> Result<Element> {
        self.waits
            .until(format!("click({})", locator), timeout, || async {
                let Some(element) = self.find_clickable(locator).await? else {
                    return Ok(None);
                };
                match self.driver.click(&element).await {
                    Ok(()) => Ok(Some(element)),
                    Err(Error::NotFound(what)) => {
                        debug!("click on {} went stale: {}", locator, what);
                        Ok(None)
                    }
                    Err(e) => Err(e),
                }
            })
            .await
    }
}
