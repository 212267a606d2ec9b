//! Polling waits over live page state.

use crate::browser::Driver;
use crate::locator::Locator;
use crate::{Error, Result};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Polls a condition at a fixed interval until it holds or a timeout elapses.
#[derive(Debug, Clone, Copy)]
pub struct WaitEngine {
    poll_interval: Duration,
}

impl WaitEngine {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Poll `check` until it yields `Some`.
    ///
    /// The check runs at least once. Its errors (a node detached between
    /// query and read, a script evaluated mid-navigation) count as "not yet".
    pub async fn until<T, F, Fut>(
        &self,
        condition: impl fmt::Display,
        timeout: Duration,
        mut check: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        let start = Instant::now();
        loop {
            match check().await {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => {}
                Err(e) => debug!("{}: not yet ({})", condition, e),
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return Err(Error::Timeout {
                    condition: condition.to_string(),
                    elapsed,
                });
            }
            sleep(self.poll_interval.min(timeout - elapsed)).await;
        }
    }

    /// Wait for a readiness predicate.
    pub async fn wait_for<D: Driver + ?Sized>(
        &self,
        driver: &D,
        predicate: &Predicate,
        timeout: Duration,
    ) -> Result<()> {
        self.until(predicate, timeout, || async {
            Ok(predicate.evaluate(driver).await?.then_some(()))
        })
        .await
    }
}

/// Named boolean condition over page state.
#[derive(Debug, Clone)]
pub enum Predicate {
    UrlContains(String),
    /// At least one match is visible.
    Visible(Locator),
    /// No match is visible (or there is no match).
    Invisible(Locator),
    /// Any branch holds; a failing branch counts as false.
    Any(Vec<Predicate>),
    All(Vec<Predicate>),
}

impl Predicate {
    pub fn url_contains(fragment: impl Into<String>) -> Self {
        Self::UrlContains(fragment.into())
    }

    pub async fn evaluate<D: Driver + ?Sized>(&self, driver: &D) -> Result<bool> {
        match self {
            Self::UrlContains(fragment) => Ok(driver.current_url().await?.contains(fragment.as_str())),
            Self::Visible(locator) => Ok(driver.query(locator).await?.iter().any(|e| e.visible)),
            Self::Invisible(locator) => Ok(!driver.query(locator).await?.iter().any(|e| e.visible)),
            Self::Any(parts) => {
                for part in parts {
                    match Box::pin(part.evaluate(driver)).await {
                        Ok(true) => return Ok(true),
                        Ok(false) => {}
                        Err(e) => debug!("{}: {}", part, e),
                    }
                }
                Ok(false)
            }
            Self::All(parts) => {
                for part in parts {
                    if !Box::pin(part.evaluate(driver)).await? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, name: &str, parts: &[Predicate]) -> fmt::Result {
    write!(f, "{}(", name)?;
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", part)?;
    }
    f.write_str(")")
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UrlContains(fragment) => write!(f, "url contains {:?}", fragment),
            Self::Visible(locator) => write!(f, "visible({})", locator),
            Self::Invisible(locator) => write!(f, "invisible({})", locator),
            Self::Any(parts) => write_list(f, "any", parts),
            Self::All(parts) => write_list(f, "all", parts),
        }
    }
}
