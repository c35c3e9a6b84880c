//! Cascading resolver: maps a raw product name to an existing product through
//! an ordered list of match stages, stopping at the first that answers.

mod stages;

pub use stages::{AliasStage, ExactStage, FuzzyAliasStage, FuzzyProductStage, MatchStrategy};

use rusqlite::Connection;
use tracing::debug;

use crate::config::ResolverConfig;
use crate::error::{PricewiseError, Result};
use crate::matching::{normalize, NormalizedName};
use crate::models::Resolution;

/// Inputs shared by every stage of one lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolveRequest {
    pub normalized: NormalizedName,
    pub brand: Option<String>,
    pub threshold: f64,
    pub max_edit_distance: usize,
}

pub struct CascadingResolver {
    stages: Vec<Box<dyn MatchStrategy>>,
    settings: ResolverConfig,
}

impl CascadingResolver {
    /// Exact, alias, fuzzy alias, fuzzy product.
    pub fn new(settings: ResolverConfig) -> Self {
        Self::with_stages(
            settings,
            vec![
                Box::new(ExactStage),
                Box::new(AliasStage),
                Box::new(FuzzyAliasStage),
                Box::new(FuzzyProductStage),
            ],
        )
    }

    pub fn with_stages(settings: ResolverConfig, stages: Vec<Box<dyn MatchStrategy>>) -> Self {
        Self { stages, settings }
    }

    pub fn settings(&self) -> &ResolverConfig {
        &self.settings
    }

    /// Builds the request for `raw_name`, rejecting input that is blank or
    /// normalizes to nothing and thresholds outside [0, 1].
    pub fn request(
        &self,
        raw_name: &str,
        brand: Option<&str>,
        threshold: Option<f64>,
    ) -> Result<ResolveRequest> {
        if raw_name.trim().is_empty() {
            return Err(PricewiseError::InvalidInput("product name is empty".to_string()));
        }
        let normalized = normalize(raw_name);
        if normalized.is_empty() {
            return Err(PricewiseError::InvalidInput(format!(
                "product name '{raw_name}' has no letters or digits"
            )));
        }

        let threshold = threshold.unwrap_or(self.settings.fuzzy_threshold);
        if !(0.0..=1.0).contains(&threshold) {
            return Err(PricewiseError::InvalidInput(format!(
                "fuzzy threshold {threshold} is outside [0, 1]"
            )));
        }

        Ok(ResolveRequest {
            normalized,
            brand: brand.map(str::trim).filter(|b| !b.is_empty()).map(str::to_string),
            threshold,
            max_edit_distance: self.settings.max_edit_distance,
        })
    }

    /// Runs the stages in order against `conn`. Callers wanting a consistent
    /// snapshot pass a connection inside a read transaction.
    pub fn resolve(
        &self,
        conn: &Connection,
        raw_name: &str,
        brand: Option<&str>,
        threshold: Option<f64>,
    ) -> Result<Resolution> {
        let request = self.request(raw_name, brand, threshold)?;
        self.resolve_request(conn, &request)
    }

    pub fn resolve_request(&self, conn: &Connection, request: &ResolveRequest) -> Result<Resolution> {
        for stage in &self.stages {
            if let Some(found) = stage.attempt(conn, request)? {
                debug!(
                    name = request.normalized.as_str(),
                    stage = %found.stage,
                    similarity = found.similarity,
                    product = %found.product_id,
                    "resolved"
                );
                return Ok(Resolution::Matched(found));
            }
            debug!(name = request.normalized.as_str(), stage = %stage.stage(), "no match at stage");
        }
        Ok(Resolution::NotFound)
    }
}

impl Default for CascadingResolver {
    fn default() -> Self {
        Self::new(ResolverConfig::default())
    }
}
