use anyhow::{bail, Context};
use clap::Parser;
use soat_runner::{select_scenarios, ChromeProvider, Config, Params, ScenarioRunner};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "soat-e2e")]
#[command(about = "End-to-end checks for the SOAT Digital quote wizard")]
#[command(version)]
struct Cli {
    /// Scenario file to run
    config: PathBuf,

    /// Run in headless mode (overrides config)
    #[arg(long)]
    headless: bool,

    /// Set a parameter (can be used multiple times)
    #[arg(short = 'P', long = "param", value_name = "KEY=VALUE")]
    params: Vec<String>,

    /// Only run scenarios with this tag
    #[arg(short, long)]
    tag: Option<String>,

    /// Only run the scenario with this exact name
    #[arg(short, long)]
    scenario: Option<String>,

    /// Verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Validate config without running
    #[arg(long)]
    check: bool,

    /// Quiet mode (only errors)
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.quiet {
        Level::ERROR
    } else {
        match cli.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            _ => Level::DEBUG,
        }
    };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    let params = Params::from_args(&cli.params)?;
    let mut config = Config::load_with_params(&cli.config, &params)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    if cli.check {
        println!("Config valid: {}", config.name);
        println!("  Base URL: {}", config.app.base_url);
        println!("  Scenarios: {}", config.scenarios.len());
        for scenario in &config.scenarios {
            println!(
                "    - {} [{}]: {} steps",
                scenario.name,
                scenario.tags.join(", "),
                scenario.steps.len()
            );
        }
        if !config.params.is_empty() {
            println!("  Parameters: {}", config.params.len());
            for (name, def) in &config.params {
                let req = if def.required { " (required)" } else { "" };
                let desc = def.description.as_deref().unwrap_or("");
                println!("    - {}{}: {}", name, req, desc);
            }
        }
        println!(
            "  Dropdown: {} attempts, {}ms settle",
            config.dropdown.max_attempts, config.dropdown.settle_ms
        );
        return Ok(());
    }

    if cli.headless {
        config.browser.headless = true;
    }

    let config = Arc::new(config);
    let selected = select_scenarios(&config, cli.tag.as_deref(), cli.scenario.as_deref());
    if selected.is_empty() {
        bail!("no scenario matches the given filters");
    }

    println!("Running: {} ({} scenarios)", config.name, selected.len());

    let runner = ScenarioRunner::new(ChromeProvider, config.clone());
    let reports = runner.run_all(&selected).await;

    println!();
    let mut failed = 0;
    for report in &reports {
        if report.success {
            println!("✓ {}", report.name);
        } else {
            failed += 1;
            println!("✗ {}", report.name);
            if let Some(ref error) = report.error {
                println!("  Error: {}", error);
            }
        }
        println!("  Steps: {}", report.steps_executed);
        println!("  Duration: {}ms", report.duration_ms);
        for artifact in &report.artifacts {
            println!("  Screenshot: {}", artifact.path.display());
        }
    }

    println!();
    println!("{} passed, {} failed", reports.len() - failed, failed);

    if failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}
