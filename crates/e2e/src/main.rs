//! Checkout E2E runner - Main Entry Point

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use checkout_common::{Fixtures, PaymentFlow};
use checkout_e2e::runner::{build_cases, CaseSelection, PlaywrightLauncher, SuiteRunner};
use checkout_e2e::{storefront, CheckoutConfig};

/// Browser-driven checkout and payment verification
#[derive(Parser)]
#[command(name = "checkout-e2e")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (defaults apply when it does not exist)
    #[arg(long, short, default_value = "checkout.toml", env = "CHECKOUT_CONFIG", global = true)]
    config: PathBuf,

    /// Fixtures directory, overrides the config file
    #[arg(long, global = true)]
    fixtures: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run checkout cases against the storefront
    Run(RunArgs),

    /// Print the cases that would run
    List(SelectArgs),
}

#[derive(Clone, Copy, ValueEnum)]
enum FlowArg {
    Iframe,
    Redirect,
}

impl From<FlowArg> for PaymentFlow {
    fn from(flow: FlowArg) -> Self {
        match flow {
            FlowArg::Iframe => PaymentFlow::Iframe,
            FlowArg::Redirect => PaymentFlow::Redirect,
        }
    }
}

#[derive(Args)]
struct SelectArgs {
    /// Payment flows to cover (default: all)
    #[arg(long = "flow", value_enum)]
    flows: Vec<FlowArg>,

    /// Only cards whose label contains this
    #[arg(long)]
    card: Option<String>,

    /// One random product scenario with this many random cards
    #[arg(long)]
    sample: Option<usize>,

    /// Seed for every random choice
    #[arg(long, env = "CHECKOUT_SEED")]
    seed: Option<u64>,
}

impl SelectArgs {
    fn selection(&self) -> CaseSelection {
        let flows = if self.flows.is_empty() {
            PaymentFlow::ALL.to_vec()
        } else {
            self.flows.iter().map(|f| PaymentFlow::from(*f)).collect()
        };
        CaseSelection {
            flows,
            card_filter: self.card.clone(),
            sample: self.sample,
        }
    }
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    select: SelectArgs,

    /// Storefront root URL
    #[arg(long)]
    base_url: Option<String>,

    /// Output directory for results and screenshots
    #[arg(long)]
    output: Option<PathBuf>,

    /// Cases run concurrently
    #[arg(long)]
    workers: Option<usize>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Skip the storefront reachability check
    #[arg(long)]
    skip_preflight: bool,

    /// How long the reachability check may poll
    #[arg(long, default_value = "30")]
    preflight_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let mut config = CheckoutConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(dir) = &cli.fixtures {
        config.fixtures_dir = dir.clone();
    }
    let fixtures = Fixtures::load_dir(&config.fixtures_dir)
        .with_context(|| format!("loading fixtures from {}", config.fixtures_dir.display()))?;

    match cli.command {
        Commands::List(select) => {
            let seed = select.seed.or(config.policy.seed).unwrap_or_else(rand::random);
            let mut rng = StdRng::seed_from_u64(seed);
            let cases = build_cases(&fixtures, &select.selection(), &mut rng);
            for case in &cases {
                println!("{}  (expect {})", case.title, case.expectation);
            }
            println!("{} case(s), seed {}", cases.len(), seed);
        }
        Commands::Run(args) => {
            if let Some(url) = args.base_url {
                config.base_url = url;
            }
            if let Some(dir) = args.output {
                config.output_dir = dir;
            }
            if let Some(workers) = args.workers {
                config.workers = workers;
            }
            if args.headed {
                config.browser.headless = false;
            }
            config.validate()?;

            if !args.skip_preflight {
                storefront::wait_for_storefront(
                    &config.base_url,
                    Duration::from_secs(args.preflight_timeout_secs),
                )
                .await?;
            }

            let seed = args.select.seed.or(config.policy.seed).unwrap_or_else(rand::random);
            info!("Seed {} (pass --seed {} to replay)", seed, seed);
            let mut rng = StdRng::seed_from_u64(seed);
            let cases = build_cases(&fixtures, &args.select.selection(), &mut rng);
            if cases.is_empty() {
                anyhow::bail!("no cases selected");
            }

            let launcher = PlaywrightLauncher::new(config.browser.clone());
            let runner = SuiteRunner::new(config, launcher)?;
            let results = runner.run(cases, seed).await;
            let path = runner.write_results(&results)?;

            println!(
                "{} passed, {} failed, {} skipped of {} - {}",
                results.passed,
                results.failed,
                results.skipped,
                results.total,
                path.display()
            );
            if !results.success() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
