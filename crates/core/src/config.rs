use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::error::ConfigError;

/// Tunables for the whole core, loaded from TOML. Every field has a default,
/// so an empty file yields [`Settings::default`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub import: ImportSettings,
    pub learning: LearningSettings,
    pub classify: ClassifySettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    /// Amounts at most this far apart count as equal during dedup.
    pub amount_tolerance: Decimal,
    /// How long an analyzed import can wait for `confirm` before it is dropped.
    pub pending_ttl_secs: i64,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            amount_tolerance: Decimal::new(1, 2),
            pending_ttl_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningSettings {
    pub user_bootstrap: f64,
    pub predefined_bootstrap: f64,
    /// Fraction of the remaining gap to 1.0 closed by each reinforcement.
    pub reinforcement_rate: f64,
    /// Shortest token allowed to take part in a substring match.
    pub min_substring_len: usize,
    /// Multiplier applied to the confidence of substring matches.
    pub substring_penalty: f64,
}

impl Default for LearningSettings {
    fn default() -> Self {
        Self {
            user_bootstrap: 0.6,
            predefined_bootstrap: 0.9,
            reinforcement_rate: 0.3,
            min_substring_len: 4,
            substring_penalty: 0.9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifySettings {
    pub trusted_threshold: f64,
    pub keyword_confidence: f64,
    pub research_timeout_ms: u64,
    pub batch_concurrency: usize,
}

impl Default for ClassifySettings {
    fn default() -> Self {
        Self {
            trusted_threshold: 0.5,
            keyword_confidence: 0.7,
            research_timeout_ms: 5_000,
            batch_concurrency: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub ttl_secs: i64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: 30 * 24 * 3600,
        }
    }
}

impl Settings {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Reads `path`, or returns defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(Settings::from_toml("").unwrap(), Settings::default());
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let s = Settings::from_toml(
            r#"
            [classify]
            trusted_threshold = 0.75

            [learning]
            min_substring_len = 6
            "#,
        )
        .unwrap();
        assert_eq!(s.classify.trusted_threshold, 0.75);
        assert_eq!(s.classify.batch_concurrency, 8);
        assert_eq!(s.learning.min_substring_len, 6);
        assert_eq!(s.learning.user_bootstrap, 0.6);
    }

    #[test]
    fn invalid_toml_is_an_error() {
        assert!(matches!(
            Settings::from_toml("[classify\n"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = Settings::load(&dir.path().join("config.toml")).unwrap();
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn load_reads_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[cache]\nttl_secs = 60\n").unwrap();
        assert_eq!(Settings::load(&path).unwrap().cache.ttl_secs, 60);
    }
}
