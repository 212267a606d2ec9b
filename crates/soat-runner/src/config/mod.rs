pub mod params;
pub mod schema;
pub mod steps;

pub use params::{ParamDef, Params};
pub use schema::{
    AppConfig, BrowserConfig, Config, DropdownConfig, EvidenceConfig, Pauses, Timeouts, Viewport,
};
pub use steps::{CaptureStep, EditVehicleStep, Scenario, Step, SubmitPlateStep};
