//! Pure string machinery shared by the resolver, the duplicate detector and
//! the merge engine. Nothing here touches storage.

pub mod brand;
pub mod guard;
pub mod normalize;
pub mod similarity;

pub use brand::{brand_key, brands_conflict, brands_match};
pub use guard::{conflicting_markers, has_conflicting_variant_markers, VARIANT_MARKERS};
pub use normalize::{fold_accents, normalize, normalize_opt, NormalizedName};
pub use similarity::{bounded_similarity, edit_distance, similarity, similarity_upper_bound};
