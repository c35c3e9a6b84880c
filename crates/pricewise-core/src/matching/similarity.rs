/// Levenshtein distance over characters, unit cost for every edit.
pub fn edit_distance(a: &str, b: &str) -> usize {
    strsim::levenshtein(a, b)
}

/// `1 - distance / max(len)`, in [0, 1].
///
/// Two empty inputs have no meaningful similarity and score 0.
pub fn similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 0.0;
    }
    score(edit_distance(a, b), max_len)
}

/// Scores a pair only when its edit distance stays within `max_distance`.
///
/// The length difference is a lower bound on the distance, so pairs that
/// cannot qualify are dropped before the matrix is computed.
pub fn bounded_similarity(a: &str, b: &str, max_distance: usize) -> Option<(usize, f64)> {
    let len_a = a.chars().count();
    let len_b = b.chars().count();
    let max_len = len_a.max(len_b);
    if max_len == 0 || len_a.abs_diff(len_b) > max_distance {
        return None;
    }

    let distance = edit_distance(a, b);
    if distance > max_distance {
        return None;
    }
    Some((distance, score(distance, max_len)))
}

/// Best similarity two strings of these lengths could possibly reach.
pub fn similarity_upper_bound(len_a: usize, len_b: usize) -> f64 {
    let max_len = len_a.max(len_b);
    if max_len == 0 {
        return 0.0;
    }
    score(len_a.abs_diff(len_b), max_len)
}

fn score(distance: usize, max_len: usize) -> f64 {
    1.0 - distance as f64 / max_len as f64
}
