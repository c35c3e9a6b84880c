use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::debug;

use super::ResolveRequest;
use crate::error::Result;
use crate::matching::{bounded_similarity, brands_conflict};
use crate::models::{MatchStage, ProductId, ResolvedMatch};
use crate::storage::repositories::{
    AliasRegistry, ProductRepository, SqliteAliasRegistry, SqliteProductRepository,
};

/// One step of the resolution cascade.
pub trait MatchStrategy: Send + Sync {
    fn stage(&self) -> MatchStage;

    /// `Ok(None)` hands the request to the next stage.
    fn attempt(&self, conn: &Connection, request: &ResolveRequest) -> Result<Option<ResolvedMatch>>;
}

/// Normalized name equality against products.
pub struct ExactStage;

impl MatchStrategy for ExactStage {
    fn stage(&self) -> MatchStage {
        MatchStage::Exact
    }

    fn attempt(&self, conn: &Connection, request: &ResolveRequest) -> Result<Option<ResolvedMatch>> {
        let found = SqliteProductRepository::new(conn)
            .find_by_normalized_name(request.normalized.as_str())?;
        Ok(found.map(|product| ResolvedMatch {
            product_id: product.id,
            stage: MatchStage::Exact,
            similarity: 1.0,
        }))
    }
}

/// Normalized equality against registered aliases. Not brand filtered: an
/// alias is an asserted fact.
pub struct AliasStage;

impl MatchStrategy for AliasStage {
    fn stage(&self) -> MatchStage {
        MatchStage::Alias
    }

    fn attempt(&self, conn: &Connection, request: &ResolveRequest) -> Result<Option<ResolvedMatch>> {
        let found = SqliteAliasRegistry::new(conn).find_by_alias(request.normalized.as_str())?;
        Ok(found.map(|product| ResolvedMatch {
            product_id: product.id,
            stage: MatchStage::Alias,
            similarity: 1.0,
        }))
    }
}

/// Edit-distance match against alias texts.
pub struct FuzzyAliasStage;

impl MatchStrategy for FuzzyAliasStage {
    fn stage(&self) -> MatchStage {
        MatchStage::AliasFuzzy
    }

    fn attempt(&self, conn: &Connection, request: &ResolveRequest) -> Result<Option<ResolvedMatch>> {
        let rows = SqliteAliasRegistry::new(conn)
            .within_length(request.normalized.len(), request.max_edit_distance)?;

        let candidates = rows.into_iter().filter_map(|row| {
            if brands_conflict(request.brand.as_deref(), row.owner.brand.as_deref()) {
                return None;
            }
            Candidate::score(
                request,
                &row.alias.normalized_alias,
                row.owner.id,
                row.alias.confidence,
                row.owner.created_at,
            )
        });

        Ok(pick_best(candidates).map(|c| c.into_match(MatchStage::AliasFuzzy)))
    }
}

/// Edit-distance match against product names.
pub struct FuzzyProductStage;

impl MatchStrategy for FuzzyProductStage {
    fn stage(&self) -> MatchStage {
        MatchStage::ProductFuzzy
    }

    fn attempt(&self, conn: &Connection, request: &ResolveRequest) -> Result<Option<ResolvedMatch>> {
        let rows = SqliteProductRepository::new(conn)
            .within_length(request.normalized.len(), request.max_edit_distance)?;

        let candidates = rows.into_iter().filter_map(|product| {
            if brands_conflict(request.brand.as_deref(), product.brand.as_deref()) {
                return None;
            }
            Candidate::score(
                request,
                &product.normalized_name,
                product.id,
                1.0,
                product.created_at,
            )
        });

        Ok(pick_best(candidates).map(|c| c.into_match(MatchStage::ProductFuzzy)))
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    product_id: ProductId,
    similarity: f64,
    confidence: f64,
    created_at: DateTime<Utc>,
}

impl Candidate {
    /// `None` when the text is beyond the distance cap or under the threshold.
    fn score(
        request: &ResolveRequest,
        text: &str,
        product_id: ProductId,
        confidence: f64,
        created_at: DateTime<Utc>,
    ) -> Option<Self> {
        let (distance, similarity) =
            bounded_similarity(request.normalized.as_str(), text, request.max_edit_distance)?;
        if similarity < request.threshold {
            return None;
        }
        debug!(candidate = text, distance, similarity, "fuzzy candidate");
        Some(Self {
            product_id,
            similarity,
            confidence,
            created_at,
        })
    }

    /// Higher similarity, then higher confidence, then newer owner, then
    /// greater id.
    fn rank(&self, other: &Self) -> Ordering {
        self.similarity
            .total_cmp(&other.similarity)
            .then_with(|| self.confidence.total_cmp(&other.confidence))
            .then_with(|| self.created_at.cmp(&other.created_at))
            .then_with(|| self.product_id.cmp(&other.product_id))
    }

    fn into_match(self, stage: MatchStage) -> ResolvedMatch {
        ResolvedMatch {
            product_id: self.product_id,
            stage,
            similarity: self.similarity,
        }
    }
}

fn pick_best(candidates: impl Iterator<Item = Candidate>) -> Option<Candidate> {
    candidates.max_by(|a, b| a.rank(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn candidate(similarity: f64, confidence: f64, minute: u32, id: u128) -> Candidate {
        Candidate {
            product_id: Uuid::from_u128(id),
            similarity,
            confidence,
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, minute, 0).unwrap(),
        }
    }

    #[test]
    fn test_similarity_wins_first() {
        let best = pick_best(
            [candidate(0.90, 1.0, 0, 1), candidate(0.95, 0.1, 0, 2)].into_iter(),
        )
        .unwrap();
        assert_eq!(best.product_id, Uuid::from_u128(2));
    }

    #[test]
    fn test_confidence_breaks_similarity_ties() {
        let best = pick_best(
            [candidate(0.90, 0.6, 30, 1), candidate(0.90, 0.9, 0, 2)].into_iter(),
        )
        .unwrap();
        assert_eq!(best.product_id, Uuid::from_u128(2));
    }

    #[test]
    fn test_newest_owner_breaks_confidence_ties() {
        let best = pick_best(
            [candidate(0.90, 0.9, 30, 1), candidate(0.90, 0.9, 0, 2)].into_iter(),
        )
        .unwrap();
        assert_eq!(best.product_id, Uuid::from_u128(1));
    }

    #[test]
    fn test_no_candidates() {
        assert!(pick_best(std::iter::empty()).is_none());
    }
}
