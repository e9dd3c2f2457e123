use camino::Utf8Path;
use serde::Serialize;

use crate::error::KiraError;
use crate::manifest::Ledger;

#[derive(Debug, Clone, Serialize)]
pub struct ManifestCount {
    pub manifest: String,
    pub entries: usize,
}

impl ManifestCount {
    pub fn read(manifest: &str, path: &Utf8Path) -> Result<Self, KiraError> {
        Ok(Self {
            manifest: manifest.to_string(),
            entries: Ledger::count(path)?,
        })
    }
}

pub fn check_count(expected: usize, count: &ManifestCount) -> Result<(), KiraError> {
    if count.entries != expected {
        return Err(KiraError::CountMismatch {
            manifest: count.manifest.clone(),
            expected,
            actual: count.entries,
        });
    }
    tracing::info!(manifest = %count.manifest, entries = count.entries, "manifest matches overview");
    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn count(manifest: &str, entries: usize) -> ManifestCount {
        ManifestCount {
            manifest: manifest.to_string(),
            entries,
        }
    }

    #[test]
    fn mismatch_reports_both_counts() {
        let err = check_count(3, &count("downloaded", 2)).unwrap_err();
        assert_matches!(
            err,
            KiraError::CountMismatch { ref manifest, expected: 3, actual: 2 } if manifest.as_str() == "downloaded"
        );
        assert_eq!(
            err.to_string(),
            "number of temposeq datasets and downloaded files do not match: \
             datasets=3, downloaded files=2"
        );
    }

    #[test]
    fn equal_counts_pass() {
        assert!(check_count(0, &count("processed", 0)).is_ok());
        assert!(check_count(2, &count("processed", 2)).is_ok());
    }
}
