//! Suite runner: builds the case matrix and runs each case on its own page

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use checkout_common::{CheckoutOutcome, Fixtures, PaymentFlow};

use crate::artifacts::{ArtifactStore, Attachment};
use crate::config::CheckoutConfig;
use crate::driver::Driver;
use crate::error::E2eResult;
use crate::flow::{CheckoutCase, CheckoutFlow, FlowReport, FlowResult};
use crate::playwright::{PlaywrightConfig, PlaywrightSession};

/// Opens a fresh page for each case
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self) -> E2eResult<Box<dyn Driver>>;
}

/// One browser process per case
pub struct PlaywrightLauncher {
    config: PlaywrightConfig,
}

impl PlaywrightLauncher {
    pub fn new(config: PlaywrightConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Launcher for PlaywrightLauncher {
    async fn launch(&self) -> E2eResult<Box<dyn Driver>> {
        Ok(Box::new(PlaywrightSession::launch(&self.config).await?))
    }
}

/// Which cases to build from the fixtures
#[derive(Debug, Clone)]
pub struct CaseSelection {
    pub flows: Vec<PaymentFlow>,
    /// Keep cards whose label contains this, case-insensitively
    pub card_filter: Option<String>,
    /// One random scenario with this many random cards instead of the full matrix
    pub sample: Option<usize>,
}

impl Default for CaseSelection {
    fn default() -> Self {
        Self {
            flows: PaymentFlow::ALL.to_vec(),
            card_filter: None,
            sample: None,
        }
    }
}

/// Scenarios × flows × cards, or a seeded sample of it
pub fn build_cases(fixtures: &Fixtures, selection: &CaseSelection, rng: &mut StdRng) -> Vec<CheckoutCase> {
    let cards: Vec<_> = match &selection.card_filter {
        Some(filter) => fixtures.cards_matching(filter),
        None => fixtures.cards.iter().collect(),
    };

    let (scenarios, cards): (Vec<_>, Vec<_>) = match selection.sample {
        Some(n) => {
            let scenario: Vec<_> = fixtures.scenarios.choose(rng).into_iter().collect();
            let cards: Vec<_> = cards.choose_multiple(rng, n).copied().collect();
            (scenario, cards)
        }
        None => (fixtures.scenarios.iter().collect(), cards),
    };

    let mut cases = Vec::new();
    for scenario in &scenarios {
        for flow in &selection.flows {
            for card in &cards {
                cases.push(CheckoutCase::new(
                    (*scenario).clone(),
                    (*card).clone(),
                    *flow,
                    fixtures.addresses.clone(),
                ));
            }
        }
    }
    cases
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Passed,
    Failed,
    /// Card fields were rejected before an order could be placed
    Skipped,
}

/// Result of running a single case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseResult {
    pub title: String,
    pub status: CaseStatus,
    pub seed: u64,
    pub duration_ms: u64,
    pub outcome: Option<CheckoutOutcome>,
    pub report: Option<FlowReport>,
    pub failed_step: Option<String>,
    pub error: Option<String>,
    pub attachments: Vec<Attachment>,
}

impl CaseResult {
    pub fn success(&self) -> bool {
        self.status != CaseStatus::Failed
    }
}

/// Result of running all cases
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub seed: u64,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub results: Vec<CaseResult>,
}

impl SuiteResult {
    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Runs cases with bounded concurrency
pub struct SuiteRunner<L> {
    config: Arc<CheckoutConfig>,
    launcher: L,
    store: Arc<ArtifactStore>,
}

impl<L: Launcher> SuiteRunner<L> {
    pub fn new(config: CheckoutConfig, launcher: L) -> E2eResult<Self> {
        let store = Arc::new(ArtifactStore::new(&config.output_dir)?);
        Ok(Self { config: Arc::new(config), launcher, store })
    }

    /// Run every case; case `i` draws from `seed + i`
    pub async fn run(&self, cases: Vec<CheckoutCase>, seed: u64) -> SuiteResult {
        let start = Instant::now();
        let total = cases.len();
        info!("Running {} case(s) with {} worker(s), seed {}", total, self.config.workers, seed);

        let mut indexed: Vec<(usize, CaseResult)> = stream::iter(cases.into_iter().enumerate())
            .map(|(index, case)| async move {
                let result = self.run_case(&case, seed.wrapping_add(index as u64)).await;
                (index, result)
            })
            .buffer_unordered(self.config.workers.max(1))
            .collect()
            .await;
        indexed.sort_by_key(|(index, _)| *index);
        let results: Vec<CaseResult> = indexed.into_iter().map(|(_, r)| r).collect();

        let count = |status| results.iter().filter(|r| r.status == status).count();
        let passed = count(CaseStatus::Passed);
        let failed = count(CaseStatus::Failed);
        let skipped = count(CaseStatus::Skipped);
        let duration_ms = start.elapsed().as_millis() as u64;

        info!(
            "Suite results: {} passed, {} failed, {} skipped ({} ms)",
            passed, failed, skipped, duration_ms
        );

        SuiteResult { seed, total, passed, failed, skipped, duration_ms, results }
    }

    /// Run one case on a fresh page; never fails, errors land in the result
    pub async fn run_case(&self, case: &CheckoutCase, seed: u64) -> CaseResult {
        let start = Instant::now();
        let artifacts = self.store.case(&case.title);
        let mut rng = StdRng::seed_from_u64(seed);
        debug!("Starting '{}' (seed {})", case.title, seed);

        let mut result = CaseResult {
            title: case.title.clone(),
            status: CaseStatus::Failed,
            seed,
            duration_ms: 0,
            outcome: None,
            report: None,
            failed_step: None,
            error: None,
            attachments: Vec::new(),
        };

        match self.launcher.launch().await {
            Err(e) => {
                error!("✗ {} - could not open a page: {}", case.title, e);
                result.error = Some(e.to_string());
            }
            Ok(driver) => {
                let flow = CheckoutFlow::new(&self.config, driver.as_ref(), &artifacts);
                match flow.run(case, &mut rng).await {
                    Ok(report) => {
                        result.status = match &report.result {
                            FlowResult::Placed { outcome } => {
                                result.outcome = Some(outcome.clone());
                                CaseStatus::Passed
                            }
                            FlowResult::SkippedInvalidFields => CaseStatus::Skipped,
                        };
                        result.report = Some(report);
                    }
                    Err(e) => {
                        error!("✗ {} - {}", case.title, e);
                        artifacts.capture_failure_screenshot(driver.as_ref(), None).await;
                        result.failed_step = e.step().map(str::to_string);
                        result.error = Some(e.to_string());
                    }
                }
                if let Err(e) = driver.close().await {
                    warn!("Closing page for '{}' failed: {}", case.title, e);
                }
            }
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        result.attachments = artifacts.attachments();
        if result.success() {
            info!("✓ {} ({} ms)", result.title, result.duration_ms);
        }
        result
    }

    /// Write suite results to `test-results.json`
    pub fn write_results(&self, results: &SuiteResult) -> E2eResult<PathBuf> {
        let path = self.store.root().join("test-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}
