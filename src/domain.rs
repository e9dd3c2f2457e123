use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::KiraError;

const DATASET_ID_PATTERN: &str = r"^[A-Za-z0-9][A-Za-z0-9._-]*$";

/// Catalog identifier of a published dataset. Also used as the file stem of
/// the materialized table, so path separators are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetId(String);

impl DatasetId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DatasetId {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let pattern = Regex::new(DATASET_ID_PATTERN)
            .map_err(|err| KiraError::InvalidDatasetId(err.to_string()))?;
        if !pattern.is_match(trimmed) || trimmed.contains("..") {
            return Err(KiraError::InvalidDatasetId(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetDescriptor {
    pub dataset_id: DatasetId,
    pub filename: String,
}

/// One row of a materialized temposeq table. Unparseable or missing numbers
/// are kept as `None` and never count as significant.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionRecord {
    pub gene_symbol: Option<String>,
    pub log_fc: Option<f64>,
    pub padj: Option<f64>,
}

/// One enrichment hit for a single queried gene.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathwayResult {
    pub gene_symbol: String,
    pub rank: u64,
    pub pathway: String,
    pub p_value: f64,
    pub adjusted_p_value: f64,
    pub odds_ratio: f64,
    pub combined_score: f64,
}
