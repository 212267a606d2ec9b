mod executor;

use crate::browser::SessionProvider;
use crate::config::{Config, Scenario};
use crate::evidence::{EvidenceArtifact, EvidenceCapture};
use crate::wizard::WizardNavigator;
use crate::Result;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

static NON_ALPHANUMERIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9]").unwrap());

/// Tag that excludes a scenario from every run.
pub const IGNORE_TAG: &str = "ignore";

/// Result of running one scenario.
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    /// Scenario name.
    pub name: String,
    /// Whether every step succeeded.
    pub success: bool,
    /// Error message if failed.
    pub error: Option<String>,
    /// Number of steps completed.
    pub steps_executed: usize,
    /// Total duration in milliseconds.
    pub duration_ms: u64,
    /// Screenshots taken, including the failure capture.
    pub artifacts: Vec<EvidenceArtifact>,
}

/// Runs scenarios, one browser session each.
pub struct ScenarioRunner<P> {
    provider: P,
    config: Arc<Config>,
    evidence: EvidenceCapture,
}

impl<P: SessionProvider> ScenarioRunner<P> {
    pub fn new(provider: P, config: Arc<Config>) -> Self {
        let evidence = EvidenceCapture::new(&config.evidence.dir);
        Self {
            provider,
            config,
            evidence,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run one scenario. Failures end up in the report, never as an `Err`.
    pub async fn run(&self, scenario: &Scenario) -> ScenarioReport {
        let start = Instant::now();
        info!("Scenario: {}", scenario.name);

        let session = match self.provider.acquire(&self.config.browser).await {
            Ok(session) => session,
            Err(e) => {
                warn!("Could not start a browser session: {}", e);
                return ScenarioReport {
                    name: scenario.name.clone(),
                    success: false,
                    error: Some(e.to_string()),
                    steps_executed: 0,
                    duration_ms: start.elapsed().as_millis() as u64,
                    artifacts: Vec::new(),
                };
            }
        };

        let mut artifacts = Vec::new();
        let mut steps_executed = 0;
        let outcome = self
            .run_steps(&session, scenario, &mut artifacts, &mut steps_executed)
            .await;

        if let Err(ref e) = outcome {
            warn!("Scenario '{}' failed: {}", scenario.name, e);
            if self.config.evidence.on_failure {
                let name = failure_capture_name(&scenario.name);
                match self.evidence.capture_full_page(&session, &name).await {
                    Ok(artifact) => artifacts.push(artifact),
                    Err(capture) => warn!("Failure screenshot not saved: {}", capture),
                }
            }
        }

        if let Err(e) = self.provider.release(session).await {
            warn!("Failed to close browser session: {}", e);
        }

        ScenarioReport {
            name: scenario.name.clone(),
            success: outcome.is_ok(),
            error: outcome.err().map(|e| e.to_string()),
            steps_executed,
            duration_ms: start.elapsed().as_millis() as u64,
            artifacts,
        }
    }

    /// Run scenarios one after another.
    pub async fn run_all(&self, scenarios: &[&Scenario]) -> Vec<ScenarioReport> {
        let mut reports = Vec::with_capacity(scenarios.len());
        for scenario in scenarios {
            reports.push(self.run(scenario).await);
        }
        reports
    }

    async fn run_steps(
        &self,
        session: &P::Session,
        scenario: &Scenario,
        artifacts: &mut Vec<EvidenceArtifact>,
        steps_executed: &mut usize,
    ) -> Result<()> {
        let mut nav = WizardNavigator::new(session, &self.config, &self.evidence);
        nav.open().await?;

        for (i, step) in scenario.steps.iter().enumerate() {
            debug!("Executing step {}: {}", i + 1, step.name());
            if let Some(artifact) = executor::execute(&mut nav, step).await? {
                artifacts.push(artifact);
            }
            *steps_executed += 1;
        }
        Ok(())
    }
}

/// Scenarios to run: not ignored, optionally filtered by tag and exact name.
pub fn select_scenarios<'c>(
    config: &'c Config,
    tag: Option<&str>,
    name: Option<&str>,
) -> Vec<&'c Scenario> {
    config
        .scenarios
        .iter()
        .filter(|s| !s.has_tag(IGNORE_TAG))
        .filter(|s| tag.map_or(true, |t| s.has_tag(t)))
        .filter(|s| name.map_or(true, |n| s.name == n))
        .collect()
}

fn failure_capture_name(scenario: &str) -> String {
    format!("FALLO_{}", NON_ALPHANUMERIC.replace_all(scenario, "_"))
}
