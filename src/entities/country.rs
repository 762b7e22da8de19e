// 🌍 Country Entity - alternate spellings → canonical indicator-source names
//
// "Burma", "Ivory Coast", "Russia" in the tenure source must meet
// "Myanmar", "Cote d'Ivoire", "Russian Federation" in the indicator source.
// Names with no entry pass through unchanged.

use crate::error::{EngineError, EngineResult};
use crate::tables::Tenure;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// Tenure-source spelling → indicator-source canonical name.
/// No canonical name appears as a key, which keeps normalization idempotent.
const BUILTIN_ALIASES: &[(&str, &str)] = &[
    ("Burma", "Myanmar"),
    ("Russia", "Russian Federation"),
    ("USSR", "Russian Federation"),
    ("Iran", "Iran, Islamic Rep."),
    ("Egypt", "Egypt, Arab Rep."),
    ("Syria", "Syrian Arab Republic"),
    ("Venezuela", "Venezuela, RB"),
    ("South Korea", "Korea, Rep."),
    ("North Korea", "Korea, Dem. People's Rep."),
    ("Laos", "Lao PDR"),
    ("Yemen", "Yemen, Rep."),
    ("Gambia", "Gambia, The"),
    ("Bahamas", "Bahamas, The"),
    ("Kyrgyzstan", "Kyrgyz Republic"),
    ("Slovakia", "Slovak Republic"),
    ("Turkey", "Turkiye"),
    ("Czech Republic", "Czechia"),
    ("Democratic Republic of the Congo", "Congo, Dem. Rep."),
    ("Zaire", "Congo, Dem. Rep."),
    ("Republic of the Congo", "Congo, Rep."),
    ("Ivory Coast", "Cote d'Ivoire"),
    ("Cape Verde", "Cabo Verde"),
    ("Swaziland", "Eswatini"),
    ("Macedonia", "North Macedonia"),
    ("East Timor", "Timor-Leste"),
    ("Vietnam", "Viet Nam"),
    ("Brunei", "Brunei Darussalam"),
    ("United States of America", "United States"),
    ("USA", "United States"),
    ("UK", "United Kingdom"),
];

// ============================================================================
// COUNTRY ENTITY
// ============================================================================

/// Country - canonical name plus the spellings that map to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    pub canonical_name: String,
    pub aliases: Vec<String>,
}

impl Country {
    /// Check if a string names this country (canonical name or any alias)
    pub fn matches(&self, name: &str) -> bool {
        self.canonical_name == name || self.aliases.iter().any(|a| a == name)
    }
}

// ============================================================================
// COUNTRY REGISTRY (Name Normalizer)
// ============================================================================

/// Fixed alias table resolved once at construction.
///
/// Every value in `lookup` is a fixpoint: it is never itself a key.
#[derive(Debug, Clone)]
pub struct CountryRegistry {
    lookup: HashMap<String, String>,
}

impl CountryRegistry {
    /// Create registry with the built-in alias table
    pub fn new() -> Self {
        let lookup = BUILTIN_ALIASES
            .iter()
            .map(|(alias, canonical)| (alias.to_string(), canonical.to_string()))
            .collect();

        CountryRegistry { lookup }
    }

    /// Built-in table plus extra aliases (extra entries win).
    ///
    /// Chains such as `A → B`, `B → C` are flattened to `A → C`; cycles are
    /// rejected since they have no canonical name.
    pub fn with_aliases(extra: &BTreeMap<String, String>) -> EngineResult<Self> {
        let mut raw: HashMap<String, String> = BUILTIN_ALIASES
            .iter()
            .map(|(alias, canonical)| (alias.to_string(), canonical.to_string()))
            .collect();

        for (alias, canonical) in extra {
            if alias == canonical {
                raw.remove(alias);
            } else {
                raw.insert(alias.clone(), canonical.clone());
            }
        }

        let mut lookup = HashMap::with_capacity(raw.len());
        for alias in raw.keys() {
            lookup.insert(alias.clone(), resolve_chain(&raw, alias)?);
        }

        Ok(CountryRegistry { lookup })
    }

    /// Canonical name for `name`, or `name` itself when unmapped
    pub fn normalize<'a>(&'a self, name: &'a str) -> &'a str {
        self.lookup.get(name).map(String::as_str).unwrap_or(name)
    }

    /// Rewrite every tenure's country to its canonical name.
    /// Returns how many tenures were renamed.
    pub fn normalize_tenures(&self, tenures: &mut [Tenure]) -> usize {
        let mut renamed = 0;

        for tenure in tenures.iter_mut() {
            if let Some(canonical) = self.lookup.get(&tenure.country) {
                tenure.country = canonical.clone();
                renamed += 1;
            }
        }

        debug!(renamed, total = tenures.len(), "normalized tenure countries");
        renamed
    }

    /// Group the table into country entities (canonical + aliases)
    pub fn countries(&self) -> Vec<Country> {
        let mut grouped: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for (alias, canonical) in &self.lookup {
            grouped.entry(canonical.as_str()).or_default().push(alias.clone());
        }

        grouped
            .into_iter()
            .map(|(canonical, mut aliases)| {
                aliases.sort();
                Country {
                    canonical_name: canonical.to_string(),
                    aliases,
                }
            })
            .collect()
    }

    pub fn count(&self) -> usize {
        self.lookup.len()
    }
}

impl Default for CountryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Follow alias → alias links until reaching a name that is not a key
fn resolve_chain(raw: &HashMap<String, String>, start: &str) -> EngineResult<String> {
    let mut seen = HashSet::new();
    let mut current = start;

    while let Some(next) = raw.get(current) {
        if !seen.insert(current) {
            return Err(EngineError::Normalizer(format!(
                "country alias cycle through '{}'",
                start
            )));
        }
        current = next;
    }

    Ok(current.to_string())
}

// ============================================================================
// TESTS
// ============================================================================
