use super::locators;
use super::PageContext;
use crate::browser::Driver;
use crate::dropdown::{DropdownController, RetryPolicy, Selection};
use crate::locator::Locator;
use crate::{Error, Result};
use tokio::time::sleep;
use tracing::{info, warn};

/// Plan selection: vehicle editor, plan list and renewal prompt.
pub struct PlanSelectionPage<'a, D: ?Sized> {
    ctx: PageContext<'a, D>,
}

impl<'a, D: Driver + ?Sized> PlanSelectionPage<'a, D> {
    pub(crate) fn new(ctx: PageContext<'a, D>) -> Self {
        Self { ctx }
    }

    pub async fn open_editor(&self) -> Result<()> {
        let explicit = self.ctx.config.timeouts.explicit();
        info!("Opening vehicle editor");
        self.ctx
            .resolver
            .click(&locators::edit_vehicle(), explicit)
            .await?;
        self.ctx
            .resolver
            .wait_visible(&locators::make_field(), explicit)
            .await?;
        sleep(self.ctx.config.pauses.editor_open()).await;
        Ok(())
    }

    pub async fn select_make(&self, make: &str) -> Result<Selection> {
        self.select(&locators::make_field(), make).await
    }

    /// The model list reloads after a make is chosen, so this waits first.
    pub async fn select_model(&self, model: &str) -> Result<Selection> {
        sleep(self.ctx.config.pauses.model_refresh()).await;
        self.select(&locators::model_field(), model).await
    }

    /// Open the editor and pick make then model.
    pub async fn edit_vehicle(&self, make: &str, model: &str) -> Result<(Selection, Selection)> {
        self.open_editor().await?;
        let make = self.select_make(make).await?;
        let model = self.select_model(model).await?;
        Ok((make, model))
    }

    /// Save and wait for the editor to close.
    pub async fn save_vehicle(&self) -> Result<()> {
        let explicit = self.ctx.config.timeouts.explicit();
        self.ctx
            .resolver
            .click(&locators::save_button(), explicit)
            .await?;
        self.ctx
            .resolver
            .wait_invisible(&locators::make_field(), explicit)
            .await?;
        info!("Vehicle saved");
        sleep(self.ctx.config.pauses.after_save()).await;
        Ok(())
    }

    /// Choose the first plan button; the list is ordered by price.
    pub async fn select_cheapest_plan(&self) -> Result<()> {
        let explicit = self.ctx.config.timeouts.explicit();
        let first = self
            .ctx
            .resolver
            .wait_first_clickable(&locators::plan_button(), explicit)
            .await?;
        self.ctx.driver.scroll_into_view(&first).await?;
        sleep(self.ctx.config.pauses.scroll()).await;
        self.ctx
            .resolver
            .click(&Locator::css(first.handle.clone()), explicit)
            .await?;
        info!("Selected cheapest plan");
        sleep(self.ctx.config.pauses.after_plan()).await;
        Ok(())
    }

    /// Dismiss the auto-renewal prompt. `false` when it never showed up.
    pub async fn decline_renewal(&self) -> Result<bool> {
        let timeout = self.ctx.config.timeouts.renewal();
        let locator = locators::renewal_opt_out();
        match self.ctx.resolver.wait_clickable(&locator, timeout).await {
            Ok(_) => {
                self.ctx.resolver.click(&locator, timeout).await?;
                info!("Declined auto-renewal");
                Ok(true)
            }
            Err(Error::Timeout { .. }) => {
                warn!("Renewal prompt not shown within {:?}, continuing", timeout);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Press the continue button. The navigator confirms the payment page.
    pub async fn continue_to_payment(&self) -> Result<()> {
        self.scroll_and_click(&locators::continue_button()).await?;
        info!("Continuing to payment");
        Ok(())
    }

    async fn select(&self, trigger: &Locator, value: &str) -> Result<Selection> {
        let policy = RetryPolicy::from_config(&self.ctx.config.dropdown);
        DropdownController::new(self.ctx.resolver, policy, self.ctx.config.timeouts.explicit())
            .select_value(trigger, value)
            .await
    }

    async fn scroll_and_click(&self, locator: &Locator) -> Result<()> {
        let explicit = self.ctx.config.timeouts.explicit();
        let element = self.ctx.resolver.wait_clickable(locator, explicit).await?;
        self.ctx.driver.scroll_into_view(&element).await?;
        sleep(self.ctx.config.pauses.scroll()).await;
        self.ctx.resolver.click(locator, explicit).await?;
        Ok(())
    }
}
