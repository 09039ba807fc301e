//! Static business classifier: named categories of merchant keywords.

use serde::{Deserialize, Serialize};
use tally_core::ExpenseType;
use tracing::warn;

use crate::error::ClassifyError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordCategory {
    pub name: String,
    /// Suggested tags, most specific first.
    pub tags: Vec<String>,
    pub keywords: Vec<String>,
    #[serde(default)]
    pub expense_type: Option<ExpenseType>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeywordMatch {
    pub category: String,
    pub tags: Vec<String>,
    pub expense_type: Option<ExpenseType>,
    /// Keywords found in the label, longest first.
    pub matched: Vec<String>,
}

#[derive(Deserialize)]
struct KeywordTable {
    #[serde(default)]
    category: Vec<KeywordCategory>,
}

pub struct KeywordClassifier {
    categories: Vec<KeywordCategory>,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::builtin()
    }
}

impl KeywordClassifier {
    /// Categories left without a tag or a keyword after cleanup are dropped.
    pub fn new(categories: Vec<KeywordCategory>) -> Self {
        let categories = categories
            .into_iter()
            .map(|mut c| {
                c.tags = c
                    .tags
                    .iter()
                    .map(|t| t.trim().to_lowercase())
                    .filter(|t| !t.is_empty())
                    .collect();
                c.keywords = c
                    .keywords
                    .iter()
                    .map(|k| words(k))
                    .filter(|k| !k.is_empty())
                    .collect();
                c
            })
            .filter(|c| {
                let usable = !c.tags.is_empty() && !c.keywords.is_empty();
                if !usable {
                    warn!(category = %c.name, "keyword category ignored: no tags or keywords");
                }
                usable
            })
            .collect();
        Self { categories }
    }

    /// Loads `[[category]]` tables, replacing the built-in set.
    pub fn from_toml(toml_content: &str) -> Result<Self, ClassifyError> {
        let table: KeywordTable = toml::from_str(toml_content)?;
        Ok(Self::new(table.category))
    }

    pub fn categories(&self) -> &[KeywordCategory] {
        &self.categories
    }

    /// Every category with at least one keyword in the label, best first:
    /// longest matched keyword, then number of keywords matched, then
    /// declaration order. Keywords match on whole words.
    pub fn classify(&self, label: &str) -> Vec<KeywordMatch> {
        let text = format!(" {} ", words(label));
        let mut hits: Vec<(usize, usize, usize, KeywordMatch)> = self
            .categories
            .iter()
            .enumerate()
            .filter_map(|(order, category)| {
                let mut matched: Vec<String> = category
                    .keywords
                    .iter()
                    .filter(|k| text.contains(&format!(" {k} ")))
                    .cloned()
                    .collect();
                if matched.is_empty() {
                    return None;
                }
                matched.sort_by(|a, b| b.len().cmp(&a.len()));
                let longest = matched[0].len();
                let count = matched.len();
                Some((
                    longest,
                    count,
                    order,
                    KeywordMatch {
                        category: category.name.clone(),
                        tags: category.tags.clone(),
                        expense_type: category.expense_type,
                        matched,
                    },
                ))
            })
            .collect();

        hits.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)).then(a.2.cmp(&b.2)));
        hits.into_iter().map(|(_, _, _, m)| m).collect()
    }

    pub fn builtin() -> Self {
        use ExpenseType::{Fixed, Variable};
        let table: &[(&str, &[&str], Option<ExpenseType>, &[&str])] = &[
            (
                "groceries",
                &["groceries"],
                Some(Variable),
                &[
                    "franprix", "monoprix", "carrefour", "carrefour city", "auchan", "lidl", "aldi",
                    "leclerc", "intermarche", "casino", "picard", "naturalia", "biocoop", "super u",
                    "g20", "supermarche", "epicerie",
                ],
            ),
            (
                "restaurant",
                &["restaurant"],
                Some(Variable),
                &[
                    "restaurant", "resto", "brasserie", "bistrot", "pizzeria", "sushi", "burger",
                    "mcdonald", "mcdonalds", "burger king", "kfc", "starbucks", "boulangerie",
                    "paul", "traiteur", "creperie",
                ],
            ),
            (
                "delivery",
                &["delivery", "restaurant"],
                Some(Variable),
                &["deliveroo", "uber eats", "ubereats", "just eat", "frichti", "foodora"],
            ),
            (
                "hotel",
                &["hotel", "travel"],
                Some(Variable),
                &["hotel", "ibis", "novotel", "mercure", "accor", "airbnb", "booking com", "hostel"],
            ),
            (
                "transport",
                &["transport"],
                Some(Variable),
                &[
                    "sncf", "ratp", "uber", "bolt", "blablacar", "ouigo", "taxi", "g7", "lime",
                    "parking", "peage", "total", "totalenergies", "esso", "shell",
                ],
            ),
            (
                "subscription",
                &["subscription"],
                Some(Fixed),
                &[
                    "netflix", "spotify", "deezer", "disney plus", "amazon prime", "canal",
                    "apple com bill", "youtube premium",
                ],
            ),
            (
                "telecom",
                &["telecom", "internet"],
                Some(Fixed),
                &["orange", "sfr", "bouygues", "bouygues telecom", "free mobile", "freebox", "sosh", "red by sfr"],
            ),
            (
                "utilities",
                &["utilities", "energy"],
                Some(Fixed),
                &["edf", "engie", "veolia", "eau de paris", "direct energie", "gaz"],
            ),
            (
                "housing",
                &["housing", "rent"],
                Some(Fixed),
                &["loyer", "foncia", "nexity", "syndic", "citya", "rent"],
            ),
            (
                "insurance",
                &["insurance"],
                Some(Fixed),
                &["assurance", "maif", "macif", "matmut", "axa", "allianz", "mutuelle", "alan"],
            ),
            (
                "health",
                &["health"],
                Some(Variable),
                &["pharmacie", "doctolib", "medecin", "dentiste", "laboratoire", "opticien", "hopital"],
            ),
            (
                "shopping",
                &["shopping"],
                Some(Variable),
                &["amazon", "fnac", "darty", "decathlon", "ikea", "zara", "leroy merlin", "cdiscount", "h m"],
            ),
        ];

        Self::new(
            table
                .iter()
                .map(|(name, tags, expense_type, keywords)| KeywordCategory {
                    name: name.to_string(),
                    tags: tags.iter().map(|t| t.to_string()).collect(),
                    keywords: keywords.iter().map(|k| k.to_string()).collect(),
                    expense_type: *expense_type,
                })
                .collect(),
        )
    }
}

/// Lower-cased alphanumeric words joined by single spaces.
fn words(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn best(label: &str) -> Option<KeywordMatch> {
        KeywordClassifier::builtin().classify(label).into_iter().next()
    }

    // ── builtin ───────────────────────────────────────────────────────────────

    #[test]
    fn matches_grocery_label() {
        let m = best("CARTE 24/11/24 FRANPRIX CB*8533").unwrap();
        assert_eq!(m.category, "groceries");
        assert_eq!(m.matched, vec!["franprix"]);
        assert_eq!(m.expense_type, Some(ExpenseType::Variable));
    }

    #[test]
    fn longest_keyword_wins() {
        let ranked = KeywordClassifier::builtin().classify("UBER EATS PARIS");
        assert_eq!(ranked[0].category, "delivery");
        assert_eq!(ranked[1].category, "transport");

        assert_eq!(best("AMAZON PRIME FR").unwrap().category, "subscription");
    }

    #[test]
    fn whole_words_only() {
        // "paul" must not fire inside "paulette", "edf" not inside "edfx".
        assert!(best("CHEZ PAULETTE EDFX").is_none());
    }

    #[test]
    fn fixed_categories_carry_expense_type() {
        let m = best("PRLV SEPA ORANGE SA").unwrap();
        assert_eq!(m.category, "telecom");
        assert_eq!(m.tags, vec!["telecom", "internet"]);
        assert_eq!(m.expense_type, Some(ExpenseType::Fixed));
    }

    #[test]
    fn unknown_merchant_has_no_match() {
        assert!(best("POKAWA PARIS 11").is_none());
    }

    // ── from_toml ─────────────────────────────────────────────────────────────

    #[test]
    fn loads_categories_from_toml() {
        let toml = r#"
            [[category]]
            name = "pets"
            tags = ["Pets"]
            keywords = ["Animalis", "croquettes"]
            expense_type = "VARIABLE"

            [[category]]
            name = "gym"
            tags = ["sport"]
            keywords = ["basic fit"]
            expense_type = "FIXED"
        "#;
        let classifier = KeywordClassifier::from_toml(toml).unwrap();
        assert_eq!(classifier.categories().len(), 2);

        let m = &classifier.classify("CB ANIMALIS 1234")[0];
        assert_eq!(m.tags, vec!["pets"]);
        assert_eq!(classifier.classify("BASIC-FIT PARIS")[0].category, "gym");
        assert!(classifier.classify("FRANPRIX").is_empty());
    }

    #[test]
    fn categories_without_tags_or_keywords_are_dropped() {
        let toml = r#"
            [[category]]
            name = "untagged"
            tags = ["  "]
            keywords = ["shop"]

            [[category]]
            name = "silent"
            tags = ["x"]
            keywords = []

            [[category]]
            name = "kept"
            tags = ["y"]
            keywords = ["shop"]
        "#;
        let classifier = KeywordClassifier::from_toml(toml).unwrap();
        assert_eq!(classifier.categories().len(), 1);
        assert_eq!(classifier.classify("THE SHOP")[0].category, "kept");
    }

    #[test]
    fn declaration_order_breaks_ties() {
        let toml = r#"
            [[category]]
            name = "first"
            tags = ["a"]
            keywords = ["shop"]

            [[category]]
            name = "second"
            tags = ["b"]
            keywords = ["shop"]
        "#;
        let classifier = KeywordClassifier::from_toml(toml).unwrap();
        assert_eq!(classifier.classify("THE SHOP")[0].category, "first");
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let err = KeywordClassifier::from_toml("[[category]]\nname = 3").err().unwrap();
        assert!(matches!(err, ClassifyError::Config(_)));
    }
}
