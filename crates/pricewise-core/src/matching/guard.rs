//! Differentiator guard: a curated vocabulary of variant markers whose
//! asymmetric presence means two similar names are different products.
//!
//! Edit distance cannot tell "folha dupla" from "folha tripla". The guard
//! overrides similarity in every merge and duplicate-candidate decision.

use super::normalize::fold_accents;

/// One marker term. A term may have several spellings (abbreviations or the
/// masculine/feminine forms of the same word); any of them counts as presence.
/// Plurals in a trailing `s` match their singular spelling.
#[derive(Debug, Clone, Copy)]
pub struct Marker {
    pub label: &'static str,
    pub spellings: &'static [&'static str],
}

#[derive(Debug, Clone, Copy)]
pub struct MarkerGroup {
    pub name: &'static str,
    pub markers: &'static [Marker],
}

const fn marker(label: &'static str, spellings: &'static [&'static str]) -> Marker {
    Marker { label, spellings }
}

/// Spellings are accent-folded lowercase.
pub const VARIANT_MARKERS: &[MarkerGroup] = &[
    MarkerGroup {
        name: "ply",
        markers: &[
            marker("simples", &["simples"]),
            marker("dupla", &["dupla", "folha dupla"]),
            marker("tripla", &["tripla", "folha tripla"]),
        ],
    },
    MarkerGroup {
        name: "bone",
        markers: &[
            marker("com osso", &["com osso"]),
            marker("sem osso", &["sem osso"]),
        ],
    },
    MarkerGroup {
        name: "lid",
        markers: &[
            marker("com tampa", &["com tampa"]),
            marker("sem tampa", &["sem tampa"]),
        ],
    },
    MarkerGroup {
        name: "fat",
        markers: &[
            marker("integral", &["integral"]),
            marker("desnatado", &["desnatado", "desnatada"]),
            marker("semidesnatado", &["semidesnatado", "semidesnatada", "semi desnatado", "semi desnatada"]),
        ],
    },
    MarkerGroup {
        name: "diet",
        markers: &[
            marker("diet", &["diet"]),
            marker("zero", &["zero"]),
            marker("light", &["light"]),
        ],
    },
    MarkerGroup {
        name: "unit",
        markers: &[
            marker("kg", &["kg", "quilo"]),
            marker("g", &["g", "gr", "grama"]),
            marker("mg", &["mg"]),
            marker("l", &["l", "lt", "litro"]),
            marker("ml", &["ml"]),
            marker("m", &["m", "metro"]),
        ],
    },
    MarkerGroup {
        name: "cut",
        markers: &[
            marker("pedaco", &["pedaco"]),
            marker("fatia", &["fatia"]),
            marker("fatiado", &["fatiado", "fatiada"]),
        ],
    },
    MarkerGroup {
        name: "pack",
        markers: &[
            marker("pacote", &["pacote", "pct"]),
            marker("unidade", &["unidade", "un", "und"]),
            marker("caixa", &["caixa", "cx"]),
        ],
    },
];

impl Marker {
    fn present_in(&self, folded: &str) -> bool {
        self.spellings.iter().any(|s| contains_term(folded, s))
    }
}

/// True when any marker of the vocabulary occurs in exactly one of the two
/// names. Comparison runs on the original names, lowercased and accent-folded.
pub fn has_conflicting_variant_markers(name_a: &str, name_b: &str) -> bool {
    let a = fold_accents(name_a);
    let b = fold_accents(name_b);
    VARIANT_MARKERS
        .iter()
        .flat_map(|group| group.markers.iter())
        .any(|m| m.present_in(&a) != m.present_in(&b))
}

/// Labels of the markers present on one side only, in vocabulary order.
pub fn conflicting_markers(name_a: &str, name_b: &str) -> Vec<&'static str> {
    let a = fold_accents(name_a);
    let b = fold_accents(name_b);
    VARIANT_MARKERS
        .iter()
        .flat_map(|group| group.markers.iter())
        .filter(|m| m.present_in(&a) != m.present_in(&b))
        .map(|m| m.label)
        .collect()
}

/// Case-folded substring presence. The term must start a word and may only
/// run on into a plural `s`: "g" matches "500g" but not "gelo", "unidade"
/// matches "unidades", "fatia" does not match "fatiado".
fn contains_term(haystack: &str, term: &str) -> bool {
    haystack.match_indices(term).any(|(start, _)| {
        if haystack[..start].chars().next_back().is_some_and(char::is_alphabetic) {
            return false;
        }
        let mut after = haystack[start + term.len()..].chars();
        match after.next() {
            Some('s') => !after.next().is_some_and(char::is_alphabetic),
            next => !next.is_some_and(char::is_alphabetic),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ply_variants_conflict() {
        assert!(has_conflicting_variant_markers(
            "Papel Higiênico Folha Dupla",
            "Papel Higiênico Folha Tripla"
        ));
        assert_eq!(
            conflicting_markers("Papel Higiênico Folha Dupla", "Papel Higiênico Folha Tripla"),
            vec!["dupla", "tripla"]
        );
    }

    #[test]
    fn test_bone_variants_conflict() {
        assert!(has_conflicting_variant_markers("Pernil Suíno Sem Osso", "Pernil Suíno Com Osso"));
        assert!(has_conflicting_variant_markers("Pernil Suíno Sem Osso", "Pernil Suíno"));
    }

    #[test]
    fn test_spelling_variants_without_markers_pass() {
        assert!(!has_conflicting_variant_markers("Abóbora Cabotiá", "Abóbora Kabotiá"));
        assert!(!has_conflicting_variant_markers("Coca-Cola Lata", "Coca Cola Lata"));
    }

    #[test]
    fn test_shared_markers_do_not_conflict() {
        assert!(!has_conflicting_variant_markers("Leite Integral 1L", "LEITE INTEGRAL 1 L"));
        assert!(!has_conflicting_variant_markers("Refrigerante Zero 2L", "Refrigerante Zero 2 Litros"));
    }

    #[test]
    fn test_diet_light_zero_are_distinct() {
        assert!(has_conflicting_variant_markers("Refrigerante Cola Zero", "Refrigerante Cola Light"));
        assert!(has_conflicting_variant_markers("Refrigerante Cola Diet", "Refrigerante Cola"));
    }

    #[test]
    fn test_skim_and_semi_skim_differ() {
        assert!(has_conflicting_variant_markers("Leite Desnatado", "Leite Semidesnatado"));
    }

    #[test]
    fn test_unit_tokens_need_word_boundaries() {
        assert!(!has_conflicting_variant_markers("Gelo em cubos", "Gelo em cubo"));
        assert!(has_conflicting_variant_markers("Arroz 5kg", "Arroz Pacote"));
        assert!(!has_conflicting_variant_markers("Arroz 5kg", "Arroz 5 kg"));
        assert!(has_conflicting_variant_markers("Detergente 500ml", "Detergente 500g"));
    }

    #[test]
    fn test_gendered_forms_of_one_marker_match_each_other() {
        assert!(!has_conflicting_variant_markers("Presunto Fatiado", "Presunto Fatiada"));
        assert!(has_conflicting_variant_markers("Queijo Fatia", "Queijo Fatiado"));
        assert!(has_conflicting_variant_markers("Queijo Pedaço", "Queijo Fatiado"));
    }

    #[test]
    fn test_plural_forms_match_their_singular() {
        assert!(!has_conflicting_variant_markers("Ovos Brancos 12 Unidade", "Ovos Brancos 12 Unidades"));
        assert!(!has_conflicting_variant_markers("Biscoito Pacote", "Biscoito Pacotes"));
        assert!(!has_conflicting_variant_markers("Queijo Fatia", "Queijo Fatias"));
        assert!(!has_conflicting_variant_markers("Sabão em Pó 2 Cxs", "Sabão em Pó 2 Caixas"));
    }

    #[test]
    fn test_abbreviation_matches_full_word() {
        assert!(!has_conflicting_variant_markers("Ovos Brancos 12 un", "Ovos Brancos 12 Unidades"));
        assert!(!has_conflicting_variant_markers("Biscoito Pct", "Biscoito Pacote"));
        assert!(!has_conflicting_variant_markers("Refrigerante 2 Lt", "Refrigerante 2 Litros"));
    }

    #[test]
    fn test_marker_prefix_of_another_word_is_not_presence() {
        assert!(!has_conflicting_variant_markers("Unha Postiça Grande", "Unha Postiça"));
        assert!(has_conflicting_variant_markers("Queijo Fatia", "Queijo Fatiado"));
        assert_eq!(conflicting_markers("Queijo Fatia", "Queijo Fatiado"), vec!["fatia", "fatiado"]);
    }

    #[test]
    fn test_guard_is_symmetric() {
        let pairs = [
            ("Papel Folha Dupla", "Papel Folha Simples"),
            ("Abóbora Cabotiá", "Abóbora Kabotiá"),
            ("Iogurte Light", "Iogurte"),
        ];
        for (a, b) in pairs {
            assert_eq!(
                has_conflicting_variant_markers(a, b),
                has_conflicting_variant_markers(b, a)
            );
        }
    }
}
