//! # soat-runner
//!
//! Drives the SOAT Digital quote wizard (landing → plans → payment) through a
//! real browser, tolerating the application's asynchronous rendering.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use soat_runner::{ChromeProvider, Config, ScenarioRunner};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> soat_runner::Result<()> {
//! let config = Arc::new(Config::load("configs/soat.yaml")?);
//! let runner = ScenarioRunner::new(ChromeProvider, config.clone());
//! for scenario in &config.scenarios {
//!     let report = runner.run(scenario).await;
//!     println!("{}: {}", report.name, report.success);
//! }
//! # Ok(())
//! # }
//! ```

mod browser;
mod config;
mod dropdown;
mod evidence;
mod locator;
mod resolver;
mod runner;
mod wait;
mod wizard;

#[cfg(test)]
mod testing;

pub use browser::{ChromeProvider, ChromeSession, Driver, Element, Interaction, SessionProvider};
pub use config::{
    AppConfig, BrowserConfig, CaptureStep, Config, DropdownConfig, EditVehicleStep,
    EvidenceConfig, ParamDef, Params, Pauses, Scenario, Step, SubmitPlateStep, Timeouts,
    Viewport,
};
pub use dropdown::{DropdownController, OptionMatch, RetryPolicy, Selection};
pub use evidence::{CapturedRegion, EvidenceArtifact, EvidenceCapture};
pub use locator::Locator;
pub use resolver::ElementResolver;
pub use runner::{select_scenarios, ScenarioReport, ScenarioRunner};
pub use wait::{Predicate, WaitEngine};
pub use wizard::{HomePage, PaymentPage, PlanSelectionPage, PlateError, WizardNavigator, WizardStage};

use std::time::Duration;

/// Result type for soat-runner operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading a scenario file or driving the wizard.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("timed out after {elapsed:?} waiting for {condition}")]
    Timeout { condition: String, elapsed: Duration },

    #[error("no element matches {0}")]
    NotFound(String),

    #[error("dropdown {trigger}: could not select '{value}' after {attempts} attempt(s): {reason}")]
    Dropdown {
        trigger: String,
        value: String,
        attempts: u32,
        reason: String,
    },

    #[error("could not reach {expected} (wizard at {current}) after {elapsed:?}")]
    Navigation {
        expected: WizardStage,
        current: WizardStage,
        elapsed: Duration,
    },

    #[error("config error: {0}")]
    Config(String),

    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("evidence error: {0}")]
    Evidence(String),

    #[error("browser error: {0}")]
    Browser(#[from] eoka::Error),

    #[error("assertion failed: {0}")]
    AssertionFailed(String),
}
