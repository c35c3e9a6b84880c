/// Case-insensitive comparison key for an optional brand; blank counts as absent.
pub fn brand_key(brand: Option<&str>) -> Option<String> {
    brand
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(str::to_lowercase)
}

/// Both records carry a brand and the brands differ.
///
/// Used by the fuzzy resolution stages, where a missing brand on either side
/// is not evidence against a match.
pub fn brands_conflict(a: Option<&str>, b: Option<&str>) -> bool {
    match (brand_key(a), brand_key(b)) {
        (Some(a), Some(b)) => a != b,
        _ => false,
    }
}

/// Both unbranded, or both carrying the same brand.
///
/// Used by the duplicate detector, which only auto-merges like with like.
pub fn brands_match(a: Option<&str>, b: Option<&str>) -> bool {
    brand_key(a) == brand_key(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_brand_is_absent() {
        assert_eq!(brand_key(Some("  ")), None);
        assert_eq!(brand_key(Some(" Liza ")), Some("liza".to_string()));
    }

    #[test]
    fn test_conflict_needs_two_brands() {
        assert!(brands_conflict(Some("Liza"), Some("Soya")));
        assert!(!brands_conflict(Some("Liza"), Some("LIZA")));
        assert!(!brands_conflict(Some("Liza"), None));
        assert!(!brands_conflict(None, None));
    }

    #[test]
    fn test_match_is_strict() {
        assert!(brands_match(None, None));
        assert!(brands_match(Some("Liza"), Some("liza")));
        assert!(!brands_match(Some("Liza"), None));
        assert!(!brands_match(Some("Liza"), Some("Soya")));
    }
}
