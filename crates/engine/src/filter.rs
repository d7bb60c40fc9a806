use crate::city::City;
use crate::membership::CodeMode;
use locator_geo::normalize_department_code;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Category checkbox selected by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinCategory {
    /// Cities with at least one record lacking the access flag
    WithoutAccess = 0,
    /// Cities with at least one record holding the access flag
    WithAccess = 1,
    /// Placeholder meaning "nothing selected"
    Neutral = 2,
}

/// Keyword and category selection, owned by the host and read on every query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    pub keyword: String,
    pub categories: BTreeSet<PinCategory>,
}

impl FilterState {
    pub fn keyword(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            categories: BTreeSet::new(),
        }
    }

    pub fn categories(categories: impl IntoIterator<Item = PinCategory>) -> Self {
        Self {
            keyword: String::new(),
            categories: categories.into_iter().collect(),
        }
    }

    /// Empty keyword with only the neutral marker selected.
    pub fn is_nothing_selected(&self) -> bool {
        self.keyword.trim().is_empty()
            && self.categories.len() == 1
            && self.categories.contains(&PinCategory::Neutral)
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

fn matches_keyword(city: &City, mode: CodeMode, term: &str) -> bool {
    match mode {
        CodeMode::Department => {
            let name_match = city
                .department_name
                .as_deref()
                .is_some_and(|name| contains_ci(name, term));
            if !term.chars().all(|c| c.is_ascii_digit()) {
                return name_match;
            }
            let code_match = city.department_code.as_deref().is_some_and(|code| {
                normalize_department_code(code) == normalize_department_code(term)
                    || code.contains(term)
            });
            code_match || name_match
        }
        CodeMode::Postal => {
            contains_ci(&city.code, term)
                || city
                    .department_name
                    .as_deref()
                    .is_some_and(|name| contains_ci(name, term))
                || city.places.iter().any(|place| contains_ci(&place.name, term))
        }
    }
}

fn matches_categories(city: &City, categories: &BTreeSet<PinCategory>) -> bool {
    let without = categories.contains(&PinCategory::WithoutAccess);
    let with = categories.contains(&PinCategory::WithAccess);
    match (without, with) {
        (true, true) => true,
        (true, false) => city.has_record_without_access(),
        (false, true) => city.has_record_with_access(),
        (false, false) => false,
    }
}

/// Cities selected by the filter state, deduplicated by code, in input order.
///
/// A non-empty keyword takes precedence over categories.
pub fn filter_cities<'a>(cities: &'a [City], mode: CodeMode, state: &FilterState) -> Vec<&'a City> {
    if cities.is_empty() || state.is_nothing_selected() {
        return Vec::new();
    }

    let term = state.keyword.trim().to_lowercase();
    let mut seen = HashSet::new();
    cities
        .iter()
        .filter(|city| {
            if term.is_empty() {
                matches_categories(city, &state.categories)
            } else {
                matches_keyword(city, mode, &term)
            }
        })
        .filter(|city| seen.insert(city.code.as_str()))
        .collect()
}
