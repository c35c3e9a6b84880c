use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Engine configuration, loaded from `~/.config/pricewise/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub storage: StorageConfig,
    pub resolver: ResolverConfig,
    pub dedup: DedupConfig,
    pub merge: MergeConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Minimum similarity for the fuzzy stages.
    pub fuzzy_threshold: f64,
    /// Levenshtein cap for the fuzzy stages.
    pub max_edit_distance: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub min_similarity: f64,
    pub related_min_similarity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Pairs at or above this similarity merge without operator approval.
    pub auto_merge_threshold: f64,
    /// Written to `created_by` on aliases the merge engine creates.
    pub created_by: String,
}

// ─── Defaults ──────────────────────────────────────────────

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("pricewise");

        Self {
            database_path: data_dir.join("catalog.db").to_string_lossy().to_string(),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 0.85,
            max_edit_distance: 3,
        }
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            min_similarity: 0.80,
            related_min_similarity: 0.70,
        }
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            auto_merge_threshold: 0.90,
            created_by: "merge-engine".to_string(),
        }
    }
}

// ─── Load / Save ───────────────────────────────────────────

impl EngineConfig {
    /// Standard config file path: `~/.config/pricewise/config.toml`
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("PRICEWISE_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("pricewise")
            .join("config.toml")
    }

    /// Load config from disk, falling back to defaults if the file doesn't exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config.validated())
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Clamps thresholds into [0, 1]. Non-finite values fall back to defaults.
    pub fn validated(mut self) -> Self {
        let resolver = ResolverConfig::default();
        let dedup = DedupConfig::default();
        let merge = MergeConfig::default();

        self.resolver.fuzzy_threshold =
            clamp_unit(self.resolver.fuzzy_threshold, resolver.fuzzy_threshold);
        self.dedup.min_similarity = clamp_unit(self.dedup.min_similarity, dedup.min_similarity);
        self.dedup.related_min_similarity =
            clamp_unit(self.dedup.related_min_similarity, dedup.related_min_similarity);
        self.merge.auto_merge_threshold =
            clamp_unit(self.merge.auto_merge_threshold, merge.auto_merge_threshold);
        if self.merge.created_by.trim().is_empty() {
            self.merge.created_by = merge.created_by;
        }
        self
    }

    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.storage.database_path)
    }
}

fn clamp_unit(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.resolver.fuzzy_threshold, 0.85);
        assert_eq!(cfg.resolver.max_edit_distance, 3);
        assert_eq!(cfg.dedup.min_similarity, 0.80);
        assert_eq!(cfg.dedup.related_min_similarity, 0.70);
        assert_eq!(cfg.merge.auto_merge_threshold, 0.90);
        assert!(cfg.database_path().to_string_lossy().ends_with("catalog.db"));
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = EngineConfig::default();
        cfg.storage.database_path = dir.path().join("db.sqlite").to_string_lossy().to_string();
        cfg.merge.created_by = "nightly-dedup".to_string();
        cfg.save_to(&path).unwrap();

        assert_eq!(EngineConfig::load_from(&path).unwrap(), cfg);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[resolver]\nfuzzy_threshold = 0.9\n").unwrap();

        let cfg = EngineConfig::load_from(&path).unwrap();
        assert_eq!(cfg.resolver.fuzzy_threshold, 0.9);
        assert_eq!(cfg.resolver.max_edit_distance, 3);
        assert_eq!(cfg.merge, MergeConfig::default());
    }

    #[test]
    fn test_out_of_range_thresholds_are_clamped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[dedup]\nmin_similarity = 1.7\nrelated_min_similarity = -0.2\n[merge]\ncreated_by = \" \"\n",
        )
        .unwrap();

        let cfg = EngineConfig::load_from(&path).unwrap();
        assert_eq!(cfg.dedup.min_similarity, 1.0);
        assert_eq!(cfg.dedup.related_min_similarity, 0.0);
        assert_eq!(cfg.merge.created_by, "merge-engine");
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        let dir = TempDir::new().unwrap();
        let cfg = EngineConfig::load_from(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(cfg, EngineConfig::default());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[resolver\n").unwrap();
        assert!(matches!(
            EngineConfig::load_from(&path),
            Err(crate::error::PricewiseError::TomlParse(_))
        ));
    }
}
