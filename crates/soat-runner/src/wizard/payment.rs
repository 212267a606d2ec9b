use super::locators;
use super::PageContext;
use crate::browser::Driver;
use crate::evidence::EvidenceArtifact;
use crate::Result;
use tracing::warn;

const SUMMARY_CAPTURE: &str = "resumen_de_compra";
const SUMMARY_FALLBACK: &str = "resumen_de_compra_fullpage";

/// Payment page with the purchase summary.
pub struct PaymentPage<'a, D: ?Sized> {
    ctx: PageContext<'a, D>,
}

impl<'a, D: Driver + ?Sized> PaymentPage<'a, D> {
    pub(crate) fn new(ctx: PageContext<'a, D>) -> Self {
        Self { ctx }
    }

    pub async fn is_summary_visible(&self) -> Result<bool> {
        Ok(self
            .ctx
            .resolver
            .find_visible(&locators::summary_label())
            .await?
            .is_some())
    }

    /// Screenshot of the summary box, or of the whole page when the box
    /// cannot be located or cropped.
    pub async fn capture_summary(&self) -> Result<EvidenceArtifact> {
        self.ctx
            .resolver
            .wait_visible(&locators::summary_label(), self.ctx.config.timeouts.explicit())
            .await?;

        let container = match self
            .ctx
            .resolver
            .find_visible(&locators::summary_container())
            .await
        {
            Ok(Some(el)) => Some(el),
            Ok(None) => {
                warn!("Summary container not found, capturing full page");
                None
            }
            Err(e) => {
                warn!("Summary container lookup failed: {}", e);
                None
            }
        };

        self.ctx
            .evidence
            .capture_region_or_page(
                self.ctx.driver,
                container.as_ref(),
                SUMMARY_CAPTURE,
                SUMMARY_FALLBACK,
            )
            .await
    }
}
