//! Offline duplicate scan over the product catalog.

use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;

use crate::config::DedupConfig;
use crate::matching::{
    brands_match, conflicting_markers, edit_distance, has_conflicting_variant_markers,
    similarity_upper_bound,
};
use crate::merge::choose_survivor;
use crate::models::Product;

/// Two products that look like one real-world product. `first` is the one a
/// merge would keep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateCandidate {
    pub first: Product,
    pub second: Product,
    pub similarity: f64,
    pub distance: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationReason {
    BrandMismatch,
    VariantConflict,
}

impl RelationReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BrandMismatch => "brand_mismatch",
            Self::VariantConflict => "variant_conflict",
        }
    }
}

impl fmt::Display for RelationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A similar pair that must go to a human, never to an automatic merge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelatedCandidate {
    pub first: Product,
    pub second: Product,
    pub similarity: f64,
    pub distance: usize,
    pub reason: RelationReason,
    /// Variant markers present on one side only. Empty for brand mismatches.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub markers: Vec<&'static str>,
}

#[derive(Debug, Clone)]
pub struct DuplicateDetector {
    min_similarity: f64,
    related_min_similarity: f64,
}

impl Default for DuplicateDetector {
    fn default() -> Self {
        Self::from_config(&DedupConfig::default())
    }
}

impl DuplicateDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &DedupConfig) -> Self {
        Self {
            min_similarity: config.min_similarity.clamp(0.0, 1.0),
            related_min_similarity: config.related_min_similarity.clamp(0.0, 1.0),
        }
    }

    pub fn with_min_similarity(mut self, threshold: f64) -> Self {
        self.min_similarity = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn with_related_min_similarity(mut self, threshold: f64) -> Self {
        self.related_min_similarity = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn min_similarity(&self) -> f64 {
        self.min_similarity
    }

    pub fn related_min_similarity(&self) -> f64 {
        self.related_min_similarity
    }

    /// Same-brand pairs at or above the threshold that the guard lets through,
    /// most similar first.
    pub fn find_candidates(&self, products: &[Product]) -> Vec<DuplicateCandidate> {
        let mut found = Vec::new();
        scan_pairs(products, self.min_similarity, |a, b, similarity, distance| {
            if !brands_match(a.brand.as_deref(), b.brand.as_deref()) {
                return;
            }
            if has_conflicting_variant_markers(&a.display_name, &b.display_name) {
                return;
            }
            let (first, second) = choose_survivor(a, b);
            found.push(DuplicateCandidate {
                first: first.clone(),
                second: second.clone(),
                similarity,
                distance,
            });
        });

        found.sort_by(|x, y| rank(x.similarity, &x.first, y.similarity, &y.first));
        found
    }

    /// Similar pairs excluded from `find_candidates` by brand or by the guard.
    pub fn find_related(&self, products: &[Product]) -> Vec<RelatedCandidate> {
        let mut found = Vec::new();
        scan_pairs(products, self.related_min_similarity, |a, b, similarity, distance| {
            let markers = conflicting_markers(&a.display_name, &b.display_name);
            let reason = if !brands_match(a.brand.as_deref(), b.brand.as_deref()) {
                RelationReason::BrandMismatch
            } else if !markers.is_empty() {
                RelationReason::VariantConflict
            } else {
                return;
            };

            let (first, second) = choose_survivor(a, b);
            found.push(RelatedCandidate {
                first: first.clone(),
                second: second.clone(),
                similarity,
                distance,
                reason,
                markers,
            });
        });

        found.sort_by(|x, y| rank(x.similarity, &x.first, y.similarity, &y.first));
        found
    }
}

/// Visits every unordered pair whose normalized names reach `min_similarity`.
///
/// Names are walked in length order so the inner loop can stop once the
/// length gap alone rules out the threshold.
fn scan_pairs<F>(products: &[Product], min_similarity: f64, mut visit: F)
where
    F: FnMut(&Product, &Product, f64, usize),
{
    let mut order: Vec<(usize, &Product)> = products
        .iter()
        .filter(|p| !p.normalized_name.is_empty())
        .map(|p| (p.normalized_name.chars().count(), p))
        .collect();
    order.sort_by_key(|(len, _)| *len);

    for (i, &(len_a, a)) in order.iter().enumerate() {
        for &(len_b, b) in &order[i + 1..] {
            if similarity_upper_bound(len_a, len_b) < min_similarity {
                break;
            }
            if a.id == b.id {
                continue;
            }
            let distance = edit_distance(&a.normalized_name, &b.normalized_name);
            let similarity = 1.0 - distance as f64 / len_a.max(len_b) as f64;
            if similarity >= min_similarity {
                visit(a, b, similarity, distance);
            }
        }
    }
}

fn rank(sim_a: f64, first_a: &Product, sim_b: f64, first_b: &Product) -> Ordering {
    sim_b
        .total_cmp(&sim_a)
        .then_with(|| first_a.created_at.cmp(&first_b.created_at))
        .then_with(|| first_a.id.cmp(&first_b.id))
}
