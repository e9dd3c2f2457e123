use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::KiraError;

pub const DEFAULT_CONFIG_FILE: &str = "kira-tox.json";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub schema_version: u32,
    pub filter_word: String,
    pub catalog: CatalogConfig,
    pub enrichment: EnrichmentConfig,
    pub thresholds: Thresholds,
    pub columns: ExpressionColumns,
    pub paths: PipelinePaths,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub base_url: String,
    pub dataset_id: String,
    pub version: String,
    pub dataset_version: String,
    pub page_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub base_url: String,
    pub gene_set_library: String,
    pub poll_delay_ms: u64,
    pub download_library: bool,
}

/// Significance cut-offs for DEG extraction. Both comparisons are strict.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Thresholds {
    pub log_fold_change: f64,
    pub adjusted_p_value: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExpressionColumns {
    pub symbol: String,
    pub log_fold_change: String,
    pub adjusted_p_value: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelinePaths {
    pub download: Utf8PathBuf,
    pub process: Utf8PathBuf,
    pub verify: Utf8PathBuf,
    pub build: Utf8PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            schema_version: 1,
            filter_word: "EUT".to_string(),
            catalog: CatalogConfig::default(),
            enrichment: EnrichmentConfig::default(),
            thresholds: Thresholds::default(),
            columns: ExpressionColumns::default(),
            paths: PipelinePaths::default(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.develop.edelweiss.douglasconnect.com".to_string(),
            dataset_id: "d8922983-1724-4ce8-af07-93f290d9c3c2".to_string(),
            version: "latest".to_string(),
            dataset_version: "latest".to_string(),
            page_size: 1000,
        }
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            base_url: "https://maayanlab.cloud/Enrichr".to_string(),
            gene_set_library: "WikiPathway_2023_Human".to_string(),
            poll_delay_ms: 2000,
            download_library: true,
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            log_fold_change: 2.0,
            adjusted_p_value: 0.05,
        }
    }
}

impl Default for ExpressionColumns {
    fn default() -> Self {
        Self {
            symbol: "SYMBOL".to_string(),
            log_fold_change: "logFC".to_string(),
            adjusted_p_value: "padj".to_string(),
        }
    }
}

impl Default for PipelinePaths {
    fn default() -> Self {
        Self {
            download: Utf8PathBuf::from("download"),
            process: Utf8PathBuf::from("process"),
            verify: Utf8PathBuf::from("verify"),
            build: Utf8PathBuf::from("brick"),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path`, or `kira-tox.json` when present, or the built-in defaults.
    pub fn resolve(path: Option<&str>) -> Result<PipelineConfig, KiraError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(PipelineConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| KiraError::ConfigRead(config_path.clone()))?;
        let config: PipelineConfig = serde_json::from_str(&content)
            .map_err(|err| KiraError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: PipelineConfig) -> Result<PipelineConfig, KiraError> {
        let Thresholds {
            log_fold_change,
            adjusted_p_value,
        } = config.thresholds;
        if !log_fold_change.is_finite() || log_fold_change < 0.0 {
            return Err(KiraError::InvalidConfig(format!(
                "log fold change threshold must be a non-negative number, got {log_fold_change}"
            )));
        }
        if !(adjusted_p_value > 0.0 && adjusted_p_value <= 1.0) {
            return Err(KiraError::InvalidConfig(format!(
                "adjusted p-value threshold must be in (0, 1], got {adjusted_p_value}"
            )));
        }
        if config.enrichment.gene_set_library.trim().is_empty() {
            return Err(KiraError::InvalidConfig(
                "gene set library must not be empty".to_string(),
            ));
        }
        if config.catalog.page_size == 0 {
            return Err(KiraError::InvalidConfig(
                "catalog page size must be positive".to_string(),
            ));
        }

        let roots = [
            &config.paths.download,
            &config.paths.process,
            &config.paths.verify,
            &config.paths.build,
        ];
        for (i, left) in roots.iter().enumerate() {
            for right in &roots[i + 1..] {
                if left == right {
                    return Err(KiraError::InvalidConfig(format!(
                        "pipeline directories must be distinct, {left} is used twice"
                    )));
                }
            }
        }

        Ok(config)
    }
}
