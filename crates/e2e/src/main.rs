//! AnestEasy E2E runner - Main Entry Point
//!
//! Runs YAML scenarios against a live AnestEasy instance through Playwright.
//! Exit status: 0 when every scenario passed, 1 when any failed, 2 on harness errors.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use anesteasy_e2e::config::BrowserKind;
use anesteasy_e2e::playwright::PlaywrightLauncher;
use anesteasy_e2e::{target, RunnerConfig, Scenario, ScenarioRunner};

mod output;

use output::OutputFormat;

#[derive(Parser)]
#[command(name = "anesteasy-e2e")]
#[command(about = "E2E scenario runner for the AnestEasy web application")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "anesteasy-e2e.toml", global = true)]
    config: PathBuf,

    /// Base URL of the application under test
    #[arg(long, env = "ANESTEASY_BASE_URL", global = true)]
    base_url: Option<String>,

    /// Directory holding scenario files
    #[arg(short, long, global = true)]
    scenarios: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run scenarios
    Run(RunArgs),

    /// List available scenarios
    List {
        /// Only scenarios carrying this tag
        #[arg(short, long)]
        tag: Option<String>,
    },

    /// Parse and validate every scenario file
    Validate,

    /// Check that Playwright is installed and the application answers
    Probe,
}

#[derive(Args)]
struct RunArgs {
    /// Run only scenarios carrying this tag
    #[arg(short, long)]
    tag: Option<String>,

    /// Run only these scenarios (name or id, repeatable)
    #[arg(short, long)]
    name: Vec<String>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Browser engine (chromium, firefox, webkit)
    #[arg(long)]
    browser: Option<BrowserKind>,

    /// Close sessions right after a passing check
    #[arg(long)]
    no_linger: bool,

    /// Skip the reachability probe
    #[arg(long)]
    skip_probe: bool,

    /// Output directory for results
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table")]
    format: OutputFormat,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match run(cli).await {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    let mut config = RunnerConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(url) = cli.base_url {
        config.target.base_url = url;
    }
    if let Some(dir) = cli.scenarios {
        config.scenarios_dir = dir;
    }

    match cli.command {
        Commands::Run(args) => run_scenarios(config, args).await,
        Commands::List { tag } => {
            let scenarios = Scenario::load_all(&config.scenarios_dir)?;
            let selected: Vec<&Scenario> = match tag {
                Some(tag) => Scenario::filter_by_tag(&scenarios, &tag),
                None => scenarios.iter().collect(),
            };
            output::print_scenarios(&selected);
            Ok(true)
        }
        Commands::Validate => {
            let scenarios = Scenario::load_all(&config.scenarios_dir)?;
            println!(
                "{} scenario(s) valid in {}",
                scenarios.len(),
                config.scenarios_dir.display()
            );
            Ok(true)
        }
        Commands::Probe => {
            let version = PlaywrightLauncher::check_installed(&config.session).await?;
            println!("Playwright {}", version);
            target::probe(
                &config.target.base_url,
                std::time::Duration::from_millis(config.target.probe_timeout_ms),
            )
            .await?;
            println!("Application reachable at {}", config.target.base_url);
            Ok(true)
        }
    }
}

async fn run_scenarios(mut config: RunnerConfig, args: RunArgs) -> anyhow::Result<bool> {
    if args.headed {
        config.session.headless = false;
    }
    if let Some(browser) = args.browser {
        config.session.browser = browser;
    }
    if args.no_linger {
        config.session.linger_ms = 0;
    }
    if args.skip_probe {
        config.target.probe = false;
    }
    if let Some(dir) = args.output {
        config.output_dir = dir;
    }

    let all = Scenario::load_all(&config.scenarios_dir)?;
    let mut selected: Vec<Scenario> = match &args.tag {
        Some(tag) => Scenario::filter_by_tag(&all, tag).into_iter().cloned().collect(),
        None => all.clone(),
    };
    if !args.name.is_empty() {
        let mut named = Vec::new();
        for key in &args.name {
            match Scenario::find(&selected, key) {
                Some(s) => named.push(s.clone()),
                None => bail!("scenario not found: {}", key),
            }
        }
        selected = named;
    }
    if selected.is_empty() {
        bail!("no scenarios selected");
    }

    let version = PlaywrightLauncher::check_installed(&config.session).await?;
    info!("Using Playwright {}", version);

    if config.target.probe {
        target::probe(
            &config.target.base_url,
            std::time::Duration::from_millis(config.target.probe_timeout_ms),
        )
        .await?;
    }

    let runner = ScenarioRunner::new(config, PlaywrightLauncher::new());
    let suite = runner.run_all(&selected).await;
    runner.write_results(&suite)?;
    output::print_suite(&suite, args.format);

    Ok(suite.success())
}
