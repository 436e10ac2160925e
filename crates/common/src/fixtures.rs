//! Fixture loading
//!
//! A fixtures directory holds one or more card files (`cards*.json|yaml`),
//! a product scenario file (`products.*`) and an address file (`addresses.*`).

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{FixtureError, Result};
use crate::types::{AddressBook, CardFixture, ProductScenario};

/// Everything one suite run consumes
#[derive(Debug, Clone)]
pub struct Fixtures {
    pub cards: Vec<CardFixture>,
    pub scenarios: Vec<ProductScenario>,
    pub addresses: AddressBook,
}

impl Fixtures {
    /// Load and validate all fixtures from a directory
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let cards = load_cards(dir)?;
        let scenarios: Vec<ProductScenario> = read_fixture(&find_one(dir, "products")?)?;
        let addresses: AddressBook = read_fixture(&find_one(dir, "addresses")?)?;

        let fixtures = Self { cards, scenarios, addresses };
        fixtures.validate()?;

        info!(
            "Loaded {} card(s), {} product scenario(s) from {}",
            fixtures.cards.len(),
            fixtures.scenarios.len(),
            dir.display()
        );
        Ok(fixtures)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cards.is_empty() {
            return Err(FixtureError::Invalid("no cards".to_string()));
        }
        if self.scenarios.is_empty() {
            return Err(FixtureError::Invalid("no product scenarios".to_string()));
        }
        for card in &self.cards {
            card.validate()?;
        }
        for scenario in &self.scenarios {
            scenario.validate()?;
        }
        self.addresses.shipping.validate_shipping()
    }

    /// Cards whose label contains `filter`, case-insensitively
    pub fn cards_matching(&self, filter: &str) -> Vec<&CardFixture> {
        let filter = filter.to_lowercase();
        self.cards
            .iter()
            .filter(|c| c.label.to_lowercase().contains(&filter))
            .collect()
    }
}

/// Read every `cards*` file in a directory, in file-name order
pub fn load_cards(dir: &Path) -> Result<Vec<CardFixture>> {
    let mut paths: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| has_stem_prefix(p, "cards") && is_fixture_file(p))
        .collect();
    paths.sort();

    if paths.is_empty() {
        return Err(FixtureError::NotFound(format!("cards*.json in {}", dir.display())));
    }

    let mut cards = Vec::new();
    for path in paths {
        let mut batch: Vec<CardFixture> = read_fixture(&path)?;
        debug!("{} card(s) from {}", batch.len(), path.display());
        cards.append(&mut batch);
    }
    Ok(cards)
}

/// Deserialize a JSON or YAML fixture file, chosen by extension
pub fn read_fixture<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    match extension(path).as_deref() {
        Some("json") => Ok(serde_json::from_str(&content)?),
        Some("yaml") | Some("yml") => Ok(serde_yaml::from_str(&content)?),
        other => Err(FixtureError::UnsupportedFormat(format!(
            "{} ({})",
            path.display(),
            other.unwrap_or("no extension")
        ))),
    }
}

fn find_one(dir: &Path, stem: &str) -> Result<PathBuf> {
    ["json", "yaml", "yml"]
        .iter()
        .map(|ext| dir.join(format!("{}.{}", stem, ext)))
        .find(|p| p.exists())
        .ok_or_else(|| FixtureError::NotFound(format!("{}.json in {}", stem, dir.display())))
}

fn extension(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}

fn is_fixture_file(path: &Path) -> bool {
    matches!(extension(path).as_deref(), Some("json" | "yaml" | "yml"))
}

fn has_stem_prefix(path: &Path, prefix: &str) -> bool {
    path.file_stem()
        .map(|s| s.to_string_lossy().starts_with(prefix))
        .unwrap_or(false)
}
