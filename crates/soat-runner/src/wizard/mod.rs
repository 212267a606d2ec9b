//! Forward-only navigation through the quote wizard.
//!
//! Each stage's page object is only handed out once that stage's entry
//! predicate has held, so plan or payment operations can never run against
//! the landing page.

mod home;
pub mod locators;
mod payment;
mod plans;

pub use home::{HomePage, PlateError};
pub use payment::PaymentPage;
pub use plans::PlanSelectionPage;

use crate::browser::Driver;
use crate::config::Config;
use crate::evidence::EvidenceCapture;
use crate::resolver::ElementResolver;
use crate::wait::{Predicate, WaitEngine};
use crate::{Error, Result};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// Which page object is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WizardStage {
    Home,
    PlanSelection,
    Payment,
}

impl fmt::Display for WizardStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Everything a page object needs, borrowed for one scenario.
pub(crate) struct PageContext<'a, D: ?Sized> {
    pub driver: &'a D,
    pub config: &'a Config,
    pub evidence: &'a EvidenceCapture,
    pub resolver: ElementResolver<'a, D>,
}

impl<D: ?Sized> Clone for PageContext<'_, D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<D: ?Sized> Copy for PageContext<'_, D> {}

/// Drives one browser session through Home → PlanSelection → Payment.
pub struct WizardNavigator<'a, D: ?Sized> {
    ctx: PageContext<'a, D>,
    stage: WizardStage,
}

impl<'a, D: Driver + ?Sized> WizardNavigator<'a, D> {
    pub fn new(driver: &'a D, config: &'a Config, evidence: &'a EvidenceCapture) -> Self {
        let waits = WaitEngine::new(config.timeouts.poll());
        Self {
            ctx: PageContext {
                driver,
                config,
                evidence,
                resolver: ElementResolver::new(driver, waits)
                    .with_implicit_timeout(config.browser.implicit_timeout()),
            },
            stage: WizardStage::Home,
        }
    }

    pub fn stage(&self) -> WizardStage {
        self.stage
    }

    pub fn evidence(&self) -> &'a EvidenceCapture {
        self.ctx.evidence
    }

    pub fn driver(&self) -> &'a D {
        self.ctx.driver
    }

    /// Load the landing page and wait for the plate input.
    pub async fn open(&mut self) -> Result<HomePage<'a, D>> {
        self.require(WizardStage::Home)?;
        let start = Instant::now();
        let url = self.ctx.config.home_url();
        info!("Opening {}", url);
        self.ctx.driver.goto(url).await?;

        let ready = Predicate::Visible(locators::plate_input());
        if let Err(e) = self.wait_entry(&ready, self.ctx.config.timeouts.explicit()).await {
            warn!("Landing page not ready: {}", e);
            return Err(Error::Navigation {
                expected: WizardStage::Home,
                current: self.stage,
                elapsed: start.elapsed(),
            });
        }
        Ok(HomePage::new(self.ctx))
    }

    pub fn home(&self) -> Result<HomePage<'a, D>> {
        self.require(WizardStage::Home)?;
        Ok(HomePage::new(self.ctx))
    }

    /// Plan selection, advancing from Home once its entry predicate holds.
    pub async fn plan_selection(&mut self) -> Result<PlanSelectionPage<'a, D>> {
        if self.stage == WizardStage::Home {
            let predicate = locators::plan_selection_entry(&self.ctx.config.app.plans_path);
            let timeout = self.ctx.config.timeouts.redirect();
            self.advance(WizardStage::PlanSelection, &predicate, timeout)
                .await?;
        }
        self.require(WizardStage::PlanSelection)?;
        Ok(PlanSelectionPage::new(self.ctx))
    }

    /// Payment, advancing from PlanSelection once the summary is visible.
    pub async fn payment(&mut self) -> Result<PaymentPage<'a, D>> {
        if self.stage == WizardStage::PlanSelection {
            let predicate = locators::payment_entry();
            let timeout = self.ctx.config.timeouts.explicit();
            self.advance(WizardStage::Payment, &predicate, timeout).await?;
        }
        self.require(WizardStage::Payment)?;
        Ok(PaymentPage::new(self.ctx))
    }

    fn require(&self, expected: WizardStage) -> Result<()> {
        if self.stage == expected {
            Ok(())
        } else {
            Err(Error::Navigation {
                expected,
                current: self.stage,
                elapsed: Duration::ZERO,
            })
        }
    }

    async fn advance(
        &mut self,
        to: WizardStage,
        predicate: &Predicate,
        timeout: Duration,
    ) -> Result<()> {
        let start = Instant::now();
        match self.wait_entry(predicate, timeout).await {
            Ok(()) => {
                info!("Wizard: {} -> {} ({:?})", self.stage, to, start.elapsed());
                self.stage = to;
                Ok(())
            }
            Err(Error::Timeout { .. }) => Err(Error::Navigation {
                expected: to,
                current: self.stage,
                elapsed: start.elapsed(),
            }),
            Err(e) => Err(e),
        }
    }

    async fn wait_entry(&self, predicate: &Predicate, timeout: Duration) -> Result<()> {
        self.ctx
            .resolver
            .waits()
            .wait_for(self.ctx.driver, predicate, timeout)
            .await
    }
}
