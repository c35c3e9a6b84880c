//! Merge engine: folds a duplicate product into its survivor in one
//! transaction, moving prices and aliases and recording the absorbed name.
//!
//! A proposal moves `Proposed -> Validated -> Applied`, or ends `Rejected`
//! when validation fails. Rejected proposals are discarded, never retried.

use std::fmt;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::MergeConfig;
use crate::error::{PricewiseError, Result};
use crate::matching::{brands_match, conflicting_markers, similarity};
use crate::models::{Alias, AliasOrigin, Product, ProductId};
use crate::storage::repositories::{
    AliasRegistry, PriceRepository, ProductRepository, Repository, SqliteAliasRegistry,
    SqlitePriceRepository, SqliteProductRepository,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeState {
    Proposed,
    Validated,
    Applied,
    Rejected,
}

impl MergeState {
    pub fn can_transition_to(self, next: MergeState) -> bool {
        matches!(
            (self, next),
            (Self::Proposed, Self::Validated)
                | (Self::Proposed, Self::Rejected)
                | (Self::Validated, Self::Applied)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Applied | Self::Rejected)
    }
}

impl fmt::Display for MergeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Proposed => "proposed",
            Self::Validated => "validated",
            Self::Applied => "applied",
            Self::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// How a proposal is authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeApproval {
    /// An operator confirmed the pair; the similarity threshold does not apply.
    Approved,
    /// Batch mode: requires matching brands and the auto-merge threshold.
    Automatic,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    SameProduct,
    ProductMissing { product_id: ProductId },
    VariantConflict { markers: Vec<String> },
    BrandMismatch {
        survivor: Option<String>,
        loser: Option<String>,
    },
    BelowThreshold { similarity: f64, threshold: f64 },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SameProduct => write!(f, "both sides are the same product"),
            Self::ProductMissing { product_id } => write!(f, "product {product_id} does not exist"),
            Self::VariantConflict { markers } => {
                write!(f, "variant markers differ: {}", markers.join(", "))
            }
            Self::BrandMismatch { survivor, loser } => write!(
                f,
                "brands differ: {} vs {}",
                survivor.as_deref().unwrap_or("(none)"),
                loser.as_deref().unwrap_or("(none)")
            ),
            Self::BelowThreshold {
                similarity,
                threshold,
            } => write!(f, "similarity {similarity:.3} is below {threshold:.3}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeProposal {
    pub first: ProductId,
    pub second: ProductId,
    pub approval: MergeApproval,
    state: MergeState,
}

impl MergeProposal {
    pub fn new(first: ProductId, second: ProductId, approval: MergeApproval) -> Self {
        Self {
            first,
            second,
            approval,
            state: MergeState::Proposed,
        }
    }

    pub fn state(&self) -> MergeState {
        self.state
    }

    fn advance(&mut self, next: MergeState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(PricewiseError::InvalidInput(format!(
                "merge cannot move from {} to {next}",
                self.state
            )));
        }
        self.state = next;
        Ok(())
    }
}

/// A proposal that passed validation, with its sides oriented.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedMerge {
    pub survivor: Product,
    pub loser: Product,
    pub similarity: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergeReport {
    pub survivor_id: ProductId,
    pub loser_id: ProductId,
    pub similarity: f64,
    pub prices_repointed: usize,
    pub aliases_moved: usize,
    /// Aliases the survivor already held; deleted with the loser.
    pub aliases_skipped: usize,
    /// Whether the loser's name was added as a new alias of the survivor.
    pub alias_created: bool,
    /// Survivor fields filled from the loser.
    pub enriched_fields: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MergeOutcome {
    Applied(MergeReport),
    Rejected { reason: RejectReason },
}

impl MergeOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    /// Turns a rejection into `MergeRejected`.
    pub fn into_result(self) -> Result<MergeReport> {
        match self {
            Self::Applied(report) => Ok(report),
            Self::Rejected { reason } => Err(PricewiseError::MergeRejected(reason)),
        }
    }
}

/// Earlier creation wins; ties go to the lower id.
pub fn choose_survivor<'a>(a: &'a Product, b: &'a Product) -> (&'a Product, &'a Product) {
    if (a.created_at, a.id) <= (b.created_at, b.id) {
        (a, b)
    } else {
        (b, a)
    }
}

#[derive(Debug, Clone)]
pub struct MergeEngine {
    auto_merge_threshold: f64,
    created_by: String,
}

impl Default for MergeEngine {
    fn default() -> Self {
        Self::from_config(&MergeConfig::default())
    }
}

impl MergeEngine {
    pub fn from_config(config: &MergeConfig) -> Self {
        Self {
            auto_merge_threshold: config.auto_merge_threshold.clamp(0.0, 1.0),
            created_by: config.created_by.clone(),
        }
    }

    pub fn with_auto_merge_threshold(mut self, threshold: f64) -> Self {
        self.auto_merge_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn auto_merge_threshold(&self) -> f64 {
        self.auto_merge_threshold
    }

    /// Validates and applies one merge inside a single write transaction.
    ///
    /// A rejection leaves the catalog untouched and is returned as
    /// `MergeOutcome::Rejected`. A failure while applying rolls everything
    /// back and surfaces as `PartialMergeFailure`.
    pub fn propose(
        &self,
        conn: &mut Connection,
        first: ProductId,
        second: ProductId,
        approval: MergeApproval,
    ) -> Result<MergeOutcome> {
        let mut proposal = MergeProposal::new(first, second, approval);
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let validated = match self.validate(&tx, &proposal)? {
            Ok(validated) => validated,
            Err(reason) => {
                proposal.advance(MergeState::Rejected)?;
                warn!(%first, %second, %reason, "merge rejected");
                return Ok(MergeOutcome::Rejected { reason });
            }
        };
        proposal.advance(MergeState::Validated)?;

        let survivor_id = validated.survivor.id;
        let loser_id = validated.loser.id;
        let applied = self.apply(&tx, &validated).and_then(|report| {
            tx.commit()?;
            Ok(report)
        });

        match applied {
            Ok(report) => {
                proposal.advance(MergeState::Applied)?;
                info!(
                    survivor = %survivor_id,
                    loser = %loser_id,
                    similarity = report.similarity,
                    prices = report.prices_repointed,
                    aliases = report.aliases_moved,
                    "merge applied"
                );
                Ok(MergeOutcome::Applied(report))
            }
            Err(err) => {
                error!(survivor = %survivor_id, loser = %loser_id, error = %err, "merge failed, rolled back");
                Err(PricewiseError::PartialMergeFailure {
                    survivor: survivor_id.to_string(),
                    loser: loser_id.to_string(),
                    reason: err.to_string(),
                })
            }
        }
    }

    /// Outer error: storage failure. Inner error: the proposal is rejected.
    pub fn validate(
        &self,
        conn: &Connection,
        proposal: &MergeProposal,
    ) -> Result<std::result::Result<ValidatedMerge, RejectReason>> {
        if proposal.first == proposal.second {
            return Ok(Err(RejectReason::SameProduct));
        }

        let products = SqliteProductRepository::new(conn);
        let Some(a) = products.find_by_id(&proposal.first)? else {
            return Ok(Err(RejectReason::ProductMissing {
                product_id: proposal.first,
            }));
        };
        let Some(b) = products.find_by_id(&proposal.second)? else {
            return Ok(Err(RejectReason::ProductMissing {
                product_id: proposal.second,
            }));
        };

        let markers = conflicting_markers(&a.display_name, &b.display_name);
        if !markers.is_empty() {
            return Ok(Err(RejectReason::VariantConflict {
                markers: markers.into_iter().map(str::to_string).collect(),
            }));
        }

        let (survivor, loser) = choose_survivor(&a, &b);
        let score = similarity(&survivor.normalized_name, &loser.normalized_name);

        if proposal.approval == MergeApproval::Automatic {
            if !brands_match(survivor.brand.as_deref(), loser.brand.as_deref()) {
                return Ok(Err(RejectReason::BrandMismatch {
                    survivor: survivor.brand.clone(),
                    loser: loser.brand.clone(),
                }));
            }
            if score < self.auto_merge_threshold {
                return Ok(Err(RejectReason::BelowThreshold {
                    similarity: score,
                    threshold: self.auto_merge_threshold,
                }));
            }
        }

        Ok(Ok(ValidatedMerge {
            survivor: survivor.clone(),
            loser: loser.clone(),
            similarity: score,
        }))
    }

    fn apply(&self, tx: &Transaction<'_>, merge: &ValidatedMerge) -> Result<MergeReport> {
        let survivor = &merge.survivor;
        let loser = &merge.loser;
        let products = SqliteProductRepository::new(tx);
        let registry = SqliteAliasRegistry::new(tx);

        let prices_repointed = SqlitePriceRepository::new(tx).repoint(&loser.id, &survivor.id)?;

        let reassigned = registry.reassign(&loser.id, &survivor.id)?;
        for skipped in &reassigned.skipped {
            warn!(
                alias = skipped.normalized_alias.as_str(),
                survivor = %survivor.id,
                "alias already held by survivor, dropped with loser"
            );
        }

        let former_name = Alias::new(
            survivor.id,
            loser.display_name.as_str(),
            AliasOrigin::Auto,
            merge.similarity,
        )
        .with_created_by(self.created_by.as_str());
        let alias_created = registry.add_alias(&former_name)?;

        let mut enriched_fields = Vec::new();
        let brand = fill_missing(&survivor.brand, &loser.brand, "brand", &mut enriched_fields);
        let category = fill_missing(&survivor.category, &loser.category, "category", &mut enriched_fields);
        if !enriched_fields.is_empty() {
            products.update_details(&survivor.id, brand.as_deref(), category.as_deref())?;
        }

        if !products.delete(&loser.id)? {
            return Err(PricewiseError::ProductNotFound(loser.id.to_string()));
        }

        Ok(MergeReport {
            survivor_id: survivor.id,
            loser_id: loser.id,
            similarity: merge.similarity,
            prices_repointed,
            aliases_moved: reassigned.moved,
            aliases_skipped: reassigned.skipped.len(),
            alias_created,
            enriched_fields,
        })
    }
}

fn fill_missing(
    target: &Option<String>,
    incoming: &Option<String>,
    field: &'static str,
    filled: &mut Vec<&'static str>,
) -> Option<String> {
    let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
    if !present(target) && present(incoming) {
        filled.push(field);
        return incoming.clone();
    }
    target.clone()
}
