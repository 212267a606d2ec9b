use crate::browser::Driver;
use crate::config::Step;
use crate::evidence::EvidenceArtifact;
use crate::wizard::WizardNavigator;
use crate::{Error, Result};
use tracing::{debug, info};

/// Execute one step, returning the artifact it produced, if any.
pub async fn execute<D: Driver + ?Sized>(
    nav: &mut WizardNavigator<'_, D>,
    step: &Step,
) -> Result<Option<EvidenceArtifact>> {
    match step {
        Step::SubmitPlate(s) => {
            nav.home()?.submit_plate(&s.plate).await?;
        }
        Step::ExpectPlateError => match nav.home()?.read_error_state().await? {
            Some(reason) => info!("Plate rejected: {}", reason),
            None => {
                return Err(Error::AssertionFailed(
                    "expected the plate to be rejected, but the wizard advanced".into(),
                ))
            }
        },
        Step::ExpectHome => {
            if !nav.home()?.is_still_on_home().await? {
                return Err(Error::AssertionFailed(
                    "expected to stay on the landing page".into(),
                ));
            }
        }
        Step::EditVehicle(s) => {
            let (make, model) = nav
                .plan_selection()
                .await?
                .edit_vehicle(&s.make, &s.model)
                .await?;
            debug!(
                "make '{}' via {}, model '{}' via {}",
                make.value, make.strategy, model.value, model.strategy
            );
        }
        Step::SaveVehicle => {
            nav.plan_selection().await?.save_vehicle().await?;
        }
        Step::SelectCheapestPlan => {
            nav.plan_selection().await?.select_cheapest_plan().await?;
        }
        Step::DeclineRenewal => {
            nav.plan_selection().await?.decline_renewal().await?;
        }
        Step::ContinueToPayment => {
            nav.plan_selection().await?.continue_to_payment().await?;
            nav.payment().await?;
        }
        Step::ExpectSummary => {
            if !nav.payment().await?.is_summary_visible().await? {
                return Err(Error::AssertionFailed(
                    "purchase summary is not visible".into(),
                ));
            }
        }
        Step::CaptureSummary => {
            let artifact = nav.payment().await?.capture_summary().await?;
            return Ok(Some(artifact));
        }
        Step::Capture(s) => {
            let artifact = nav
                .evidence()
                .capture_full_page(nav.driver(), &s.name)
                .await?;
            return Ok(Some(artifact));
        }
    }
    Ok(None)
}
