use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use docmatch_matching::MatchConfig;
use docmatch_ocr::{GazetteerConfig, PipelineConfig};
use serde::{Deserialize, Serialize};

/// Settings for the optional Tesseract engine.
#[cfg(feature = "tesseract")]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TesseractSettings {
    pub data_path: Option<String>,
    pub lang: String,
}

#[cfg(feature = "tesseract")]
impl Default for TesseractSettings {
    fn default() -> Self {
        Self { data_path: None, lang: "fra+eng".to_string() }
    }
}

/// Everything the binary reads from `config.toml`. Every table is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// SQLite file for candidates and the recognition cache. Defaults to the
    /// platform data directory.
    pub database_path: Option<PathBuf>,
    pub pipeline: PipelineConfig,
    pub matching: MatchConfig,
    pub gazetteer: GazetteerConfig,
    #[cfg(feature = "tesseract")]
    pub tesseract: TesseractSettings,
}

impl AppConfig {
    pub fn from_toml(toml_content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_content).context("Failed to parse config")?;
        config.pipeline.validate().context("Invalid [pipeline] section")?;
        config.matching.validate().context("Invalid [matching] section")?;
        Ok(config)
    }

    /// Reads `path` when given, otherwise the platform default location.
    /// A missing default file yields the built-in defaults; a missing
    /// explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => {
                let text = std::fs::read_to_string(p)
                    .with_context(|| format!("Failed to read config {}", p.display()))?;
                Self::from_toml(&text)
            }
            None => match default_config_path() {
                Some(p) if p.exists() => Self::load(Some(&p)),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn database_path(&self) -> Result<PathBuf> {
        if let Some(p) = &self.database_path {
            return Ok(p.clone());
        }
        let dirs = project_dirs().context("Could not determine a data directory")?;
        let data_dir = dirs.data_dir();
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;
        Ok(data_dir.join("docmatch.db"))
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("org", "docmatch", "Docmatch")
}

pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|d| d.config_dir().join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.matching.acceptance_threshold, 0.5);
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let config = AppConfig::from_toml(
            r#"
            database_path = "/tmp/docmatch-test.db"

            [matching]
            acceptance_threshold = 0.6

            [pipeline]
            cache_ttl_secs = 60

            [gazetteer]
            locations = ["KAOLACK"]
            "#,
        )
        .unwrap();
        assert_eq!(config.database_path, Some(PathBuf::from("/tmp/docmatch-test.db")));
        assert_eq!(config.matching.acceptance_threshold, 0.6);
        assert_eq!(config.matching.given_name_weight, 0.30);
        assert_eq!(config.pipeline.cache_ttl_secs, 60);
        assert_eq!(config.gazetteer.locations, vec!["KAOLACK".to_string()]);
        #[cfg(feature = "tesseract")]
        assert_eq!(config.tesseract.lang, "fra+eng");
    }

    #[test]
    fn invalid_weights_are_rejected() {
        let err = AppConfig::from_toml("[matching]\ngiven_name_weight = 0.9").unwrap_err();
        assert!(format!("{err:#}").contains("matching"));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(AppConfig::load(Some(&dir.path().join("nope.toml"))).is_err());

        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[matching]\nacceptance_threshold = 0.8\n").unwrap();
        assert_eq!(AppConfig::load(Some(&path)).unwrap().matching.acceptance_threshold, 0.8);
    }

    #[test]
    fn tesseract_section_is_accepted_with_or_without_the_engine() {
        assert!(AppConfig::from_toml("[tesseract]\nlang = \"eng\"\n").is_ok());
    }

    #[cfg(feature = "tesseract")]
    #[test]
    fn tesseract_section_is_read() {
        let config = AppConfig::from_toml("[tesseract]\nlang = \"eng\"\n").unwrap();
        assert_eq!(config.tesseract.lang, "eng");
    }
}
