//! Search-filtered dropdown widgets without native `<select>` semantics.
//!
//! Clicking the read-only trigger field should reveal a transient search
//! input plus an option list. The application sometimes swallows that click,
//! and option nodes have no stable structure, so selection runs as a small
//! state machine:
//!
//! ```text
//! Closed -> Opening -> Open -> Filtering -> Selected
//!              |
//!              +------> Failed (attempt budget exhausted)
//! ```
//!
//! Opening cycles through [`Interaction`]s, one per attempt. Filtering picks
//! an option by exact text, then by substring, and as a last resort commits
//! the typed filter with Enter.

use crate::browser::{Driver, Element, Interaction};
use crate::config::DropdownConfig;
use crate::locator::Locator;
use crate::resolver::ElementResolver;
use crate::{Error, Result};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Search input the widget normally renders.
const SEARCH_INPUT: &str = "input[placeholder='buscar']";

/// Static form fields that must never be mistaken for the search input.
const STATIC_FIELDS: &[&str] = &["plate", "make", "model"];

/// Lookups of the search input per action when the widget re-renders it.
const SEARCH_INPUT_RETRIES: u32 = 3;

/// Retry budget for one selection.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub inter_attempt_delay: Duration,
    /// How long each attempt waits for the search input.
    pub open_timeout: Duration,
    /// Pause after typing so the option list can re-render.
    pub settle: Duration,
    pub methods: Vec<Interaction>,
    pub strict_commit: bool,
}

impl RetryPolicy {
    pub fn from_config(config: &DropdownConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            inter_attempt_delay: Duration::from_millis(config.attempt_delay_ms),
            open_timeout: Duration::from_millis(config.open_timeout_ms),
            settle: Duration::from_millis(config.settle_ms),
            methods: config.methods.clone(),
            strict_commit: config.strict_commit,
        }
    }

    /// Interaction for a 1-based attempt number, wrapping around.
    pub fn method_for(&self, attempt: u32) -> Interaction {
        if self.methods.is_empty() {
            return Interaction::Click;
        }
        let index = (attempt.saturating_sub(1) as usize) % self.methods.len();
        self.methods[index]
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&DropdownConfig::default())
    }
}

/// Which tier of the option fallback chain made the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionMatch {
    Exact,
    Contains,
    /// Filter committed with Enter; the resulting selection is not verified.
    KeyboardCommit,
}

impl fmt::Display for OptionMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Exact => "exact text",
            Self::Contains => "contained text",
            Self::KeyboardCommit => "keyboard commit",
        })
    }
}

/// Outcome of a successful selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub value: String,
    pub strategy: OptionMatch,
    /// Opening attempts used.
    pub attempts: u32,
    /// Interaction that opened the widget.
    pub method: Interaction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Opening,
    Open,
    Filtering,
    Selected,
    Failed,
}

/// Per-call state. Dropped when the call returns.
struct DropdownSession<'t> {
    trigger: &'t Locator,
    value: &'t str,
    state: State,
    attempts: u32,
    search_input: Option<Element>,
}

impl<'t> DropdownSession<'t> {
    fn new(trigger: &'t Locator, value: &'t str) -> Self {
        Self {
            trigger,
            value,
            state: State::Closed,
            attempts: 0,
            search_input: None,
        }
    }

    fn enter(&mut self, state: State) {
        debug!(
            "dropdown {} ({:?}): {:?} -> {:?}",
            self.trigger, self.value, self.state, state
        );
        self.state = state;
    }

    fn fail(&mut self, reason: impl Into<String>) -> Error {
        self.enter(State::Failed);
        Error::Dropdown {
            trigger: self.trigger.to_string(),
            value: self.value.to_string(),
            attempts: self.attempts,
            reason: reason.into(),
        }
    }
}

/// Drives one custom dropdown widget at a time.
pub struct DropdownController<'a, D: ?Sized> {
    resolver: ElementResolver<'a, D>,
    policy: RetryPolicy,
    /// Budget for the trigger to become clickable.
    ready_timeout: Duration,
}

impl<'a, D: Driver + ?Sized> DropdownController<'a, D> {
    pub fn new(resolver: ElementResolver<'a, D>, policy: RetryPolicy, ready_timeout: Duration) -> Self {
        Self {
            resolver,
            policy,
            ready_timeout,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Open the widget behind `trigger`, filter by `value`, pick an option.
    pub async fn select_value(&self, trigger: &Locator, value: &str) -> Result<Selection> {
        let mut session = DropdownSession::new(trigger, value);
        if value.trim().is_empty() {
            return Err(session.fail("empty value"));
        }
        self.resolver.wait_clickable(trigger, self.ready_timeout).await?;

        session.enter(State::Opening);
        let method = self.open(&mut session).await?;
        session.enter(State::Open);

        let Some(input) = session.search_input.take() else {
            return Err(session.fail("search input lost after opening"));
        };
        let driver = self.resolver.driver();
        if let Err(e) = self
            .with_search_input(&input, |input| async move { driver.clear(&input).await })
            .await
        {
            return Err(session.fail(format!("clearing the search input: {}", e)));
        }
        if let Err(e) = self
            .with_search_input(&input, |input| async move {
                driver.type_text(&input, value).await
            })
            .await
        {
            return Err(session.fail(format!("typing into the search input: {}", e)));
        }
        session.enter(State::Filtering);
        sleep(self.policy.settle).await;

        let strategy = match self.pick_option(value).await? {
            Some(strategy) => strategy,
            None if self.policy.strict_commit => {
                return Err(session.fail("no option matched the filter"));
            }
            None => {
                warn!(
                    "dropdown {}: no option matches '{}', committing filter with Enter",
                    trigger, value
                );
                if let Err(e) = self
                    .with_search_input(&input, |input| async move {
                        driver.press_key(&input, "Enter").await
                    })
                    .await
                {
                    warn!("dropdown {}: Enter on the search input failed: {}", trigger, e);
                }
                OptionMatch::KeyboardCommit
            }
        };
        session.enter(State::Selected);
        info!(
            "Selected '{}' in {} ({}, attempt {} via {})",
            value, trigger, strategy, session.attempts, method
        );

        Ok(Selection {
            value: value.to_string(),
            strategy,
            attempts: session.attempts,
            method,
        })
    }

    /// Attempt loop of the `Opening` state.
    async fn open(&self, session: &mut DropdownSession<'_>) -> Result<Interaction> {
        let driver = self.resolver.driver();

        for attempt in 1..=self.policy.max_attempts {
            session.attempts = attempt;
            let method = self.policy.method_for(attempt);

            // re-resolve: the trigger may have been re-rendered since the last attempt
            match self.resolver.resolve(session.trigger).await {
                Ok(trigger) => {
                    if let Err(e) = method.perform(driver, &trigger).await {
                        debug!("attempt {} ({}) on {}: {}", attempt, method, session.trigger, e);
                    }
                }
                Err(e) => debug!("attempt {}: trigger unavailable: {}", attempt, e),
            }

            let found = self
                .resolver
                .waits()
                .until("dropdown search input", self.policy.open_timeout, || {
                    self.find_search_input()
                })
                .await;
            match found {
                Ok(input) => {
                    debug!(
                        "dropdown {} opened on attempt {} via {}",
                        session.trigger, attempt, method
                    );
                    session.search_input = Some(input);
                    return Ok(method);
                }
                Err(_) => debug!(
                    "dropdown {} still closed after attempt {}/{} ({})",
                    session.trigger, attempt, self.policy.max_attempts, method
                ),
            }

            if attempt < self.policy.max_attempts {
                sleep(self.policy.inter_attempt_delay).await;
            }
        }

        Err(session.fail("search input never appeared"))
    }

    /// Run `act` on the current search input, looked up again before each
    /// try. `fallback` is used while no input is found.
    async fn with_search_input<F, Fut>(&self, fallback: &Element, act: F) -> Result<()>
    where
        F: Fn(Element) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let mut tries = 0;
        loop {
            tries += 1;
            let input = self
                .find_search_input()
                .await
                .ok()
                .flatten()
                .unwrap_or_else(|| fallback.clone());
            match act(input).await {
                Err(Error::NotFound(what)) if tries < SEARCH_INPUT_RETRIES => {
                    debug!("search input went away ({}), looking it up again", what);
                }
                other => return other,
            }
        }
    }

    /// Primary search selector first, then any plain editable text input.
    async fn find_search_input(&self) -> Result<Option<Element>> {
        let driver = self.resolver.driver();
        if let Some(input) = driver
            .query(&Locator::css(SEARCH_INPUT))
            .await?
            .into_iter()
            .find(|e| e.visible)
        {
            return Ok(Some(input));
        }
        Ok(driver
            .query(&Locator::css("input"))
            .await?
            .into_iter()
            .find(|e| {
                e.is_text_input()
                    && !e
                        .id
                        .as_deref()
                        .is_some_and(|id| STATIC_FIELDS.contains(&id))
            }))
    }

    /// Exact, then contains. `None` when neither tier clicked an option.
    async fn pick_option(&self, value: &str) -> Result<Option<OptionMatch>> {
        let driver = self.resolver.driver();
        let tiers = [
            (OptionMatch::Exact, Locator::text(value)),
            (OptionMatch::Contains, Locator::contains(value)),
        ];

        for (strategy, locator) in tiers {
            let candidates = driver.query(&locator).await?;
            let Some(option) = candidates.iter().find(|e| is_option(e)) else {
                debug!("no option by {} for '{}'", strategy, value);
                continue;
            };

            match driver.click(option).await {
                Ok(()) => return Ok(Some(strategy)),
                Err(e) => {
                    debug!("click on option {} failed ({}), trying script click", option.describe(), e);
                    match driver.script_click(option).await {
                        Ok(()) => return Ok(Some(strategy)),
                        Err(e) => debug!("script click on {} failed: {}", option.describe(), e),
                    }
                }
            }
        }
        Ok(None)
    }
}

/// Visible node that can be an option: not an input, not inside a label.
fn is_option(element: &Element) -> bool {
    element.visible
        && element.tag != "input"
        && element.tag != "label"
        && !element.in_label
        && !element.class_name.contains("input")
}
