//! Display casing for French place names.

/// Articles and prepositions that stay lowercase inside a name.
const LOWERCASE_PARTICLES: &[&str] = &[
    "le", "la", "les", "l", "de", "du", "des", "d", "en", "sur", "sous", "et", "à", "aux",
];

fn is_particle(word: &str) -> bool {
    LOWERCASE_PARTICLES.contains(&word)
}

fn upper_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn capitalize_hyphenated(word: &str) -> String {
    word.split('-')
        .enumerate()
        .map(|(idx, part)| {
            if idx != 0 && is_particle(part) {
                part.to_string()
            } else {
                upper_first(part)
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

fn capitalize_word(word: &str, first: bool) -> String {
    // Elisions ("l'", "d'") keep the particle lowercase and capitalize what follows.
    if let Some((prefix, rest)) = word.split_once('\'') {
        if is_particle(prefix) {
            return format!("{prefix}'{}", upper_first(rest));
        }
    }

    if word.contains('-') {
        return capitalize_hyphenated(word);
    }

    if !first && is_particle(word) {
        return word.to_string();
    }

    upper_first(word)
}

/// Normalize a free-text place name into display casing.
///
/// `"SAINT-DENIS-EN-VAL"` becomes `"Saint-Denis-en-Val"`, `"L'ILE D'YEU"` becomes
/// `"l'Ile d'Yeu"`. Whitespace runs collapse to a single space.
pub fn capitalize_place_name(name: &str) -> String {
    let lowered = name.to_lowercase();
    lowered
        .split_whitespace()
        .enumerate()
        .map(|(idx, word)| capitalize_word(word, idx == 0))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn capitalizes_plain_words() {
        assert_eq!(capitalize_place_name("PARIS"), "Paris");
        assert_eq!(capitalize_place_name("aix en provence"), "Aix en Provence");
    }

    #[test]
    fn keeps_particles_lowercase_after_first_word() {
        assert_eq!(capitalize_place_name("LE MANS"), "Le Mans");
        assert_eq!(capitalize_place_name("BOULOGNE SUR MER"), "Boulogne sur Mer");
        assert_eq!(capitalize_place_name("LA ROCHE SUR YON"), "La Roche sur Yon");
    }

    #[test]
    fn handles_hyphenated_names() {
        assert_eq!(
            capitalize_place_name("SAINT-DENIS-EN-VAL"),
            "Saint-Denis-en-Val"
        );
        assert_eq!(
            capitalize_place_name("chalons en champagne-le-petit"),
            "Chalons en Champagne-le-Petit"
        );
    }

    #[test]
    fn handles_elisions() {
        assert_eq!(capitalize_place_name("L'ILE D'YEU"), "l'Ile d'Yeu");
        assert_eq!(capitalize_place_name("VILLENEUVE D'ASCQ"), "Villeneuve d'Ascq");
    }

    #[test]
    fn empty_and_whitespace_inputs() {
        assert_eq!(capitalize_place_name(""), "");
        assert_eq!(capitalize_place_name("   "), "");
        assert_eq!(capitalize_place_name("  mont   blanc "), "Mont Blanc");
    }

    #[test]
    fn handles_accented_initials() {
        assert_eq!(capitalize_place_name("ÉVRY"), "Évry");
        assert_eq!(capitalize_place_name("île de batz"), "Île de Batz");
    }
}
