use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;

/// A named scenario: an ordered list of wizard steps.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,

    /// Free-form tags; `ignore` skips the scenario.
    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn has_tag(&self, tag: &str) -> bool {
        let tag = tag.trim_start_matches('@');
        self.tags.iter().any(|t| t.trim_start_matches('@') == tag)
    }
}

/// One wizard step.
#[derive(Debug, Clone)]
pub enum Step {
    // Landing
    SubmitPlate(SubmitPlateStep),
    ExpectPlateError,
    ExpectHome,

    // Plan selection
    EditVehicle(EditVehicleStep),
    SaveVehicle,
    SelectCheapestPlan,
    DeclineRenewal,
    ContinueToPayment,

    // Payment
    ExpectSummary,
    CaptureSummary,

    // Evidence
    Capture(CaptureStep),
}

impl Step {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SubmitPlate(_) => "submit_plate",
            Self::ExpectPlateError => "expect_plate_error",
            Self::ExpectHome => "expect_home",
            Self::EditVehicle(_) => "edit_vehicle",
            Self::SaveVehicle => "save_vehicle",
            Self::SelectCheapestPlan => "select_cheapest_plan",
            Self::DeclineRenewal => "decline_renewal",
            Self::ContinueToPayment => "continue_to_payment",
            Self::ExpectSummary => "expect_summary",
            Self::CaptureSummary => "capture_summary",
            Self::Capture(_) => "capture",
        }
    }
}

const STEP_NAMES: &[&str] = &[
    "submit_plate",
    "expect_plate_error",
    "expect_home",
    "edit_vehicle",
    "save_vehicle",
    "select_cheapest_plan",
    "decline_renewal",
    "continue_to_payment",
    "expect_summary",
    "capture_summary",
    "capture",
];

fn unit_step(name: &str) -> Option<Step> {
    match name {
        "expect_plate_error" => Some(Step::ExpectPlateError),
        "expect_home" => Some(Step::ExpectHome),
        "save_vehicle" => Some(Step::SaveVehicle),
        "select_cheapest_plan" => Some(Step::SelectCheapestPlan),
        "decline_renewal" => Some(Step::DeclineRenewal),
        "continue_to_payment" => Some(Step::ContinueToPayment),
        "expect_summary" => Some(Step::ExpectSummary),
        "capture_summary" => Some(Step::CaptureSummary),
        _ => None,
    }
}

impl<'de> Deserialize<'de> for Step {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(StepVisitor)
    }
}

struct StepVisitor;

impl<'de> Visitor<'de> for StepVisitor {
    type Value = Step;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a step (string for steps without arguments, or map with single key)")
    }

    fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        unit_step(value).ok_or_else(|| de::Error::unknown_variant(value, STEP_NAMES))
    }

    fn visit_map<M>(self, mut map: M) -> Result<Self::Value, M::Error>
    where
        M: MapAccess<'de>,
    {
        let key: String = map
            .next_key()?
            .ok_or_else(|| de::Error::custom("expected step type key"))?;

        let step = match key.as_str() {
            "submit_plate" => Step::SubmitPlate(map.next_value()?),
            "edit_vehicle" => Step::EditVehicle(map.next_value()?),
            "capture" => Step::Capture(map.next_value()?),
            other => match unit_step(other) {
                Some(step) => {
                    let _: serde_yaml::Value = map.next_value()?;
                    step
                }
                None => return Err(de::Error::unknown_variant(other, STEP_NAMES)),
            },
        };

        Ok(step)
    }
}

// --- Step payloads ---

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitPlateStep {
    /// May be empty: the negative scenario submits a blank plate.
    #[serde(default)]
    pub plate: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EditVehicleStep {
    pub make: String,
    pub model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureStep {
    pub name: String,
}
