//! Differentially expressed gene extraction.

use std::collections::HashSet;

use crate::config::Thresholds;
use crate::domain::ExpressionRecord;

impl Thresholds {
    /// `|logFC| > threshold` and `padj < alpha`, both strict. Missing values
    /// are never significant.
    pub fn is_significant(&self, record: &ExpressionRecord) -> bool {
        let fold_change = record
            .log_fc
            .map(|fc| fc > self.log_fold_change || fc < -self.log_fold_change)
            .unwrap_or(false);
        let p_value = record
            .padj
            .map(|padj| padj < self.adjusted_p_value)
            .unwrap_or(false);
        fold_change && p_value
    }
}

/// Significant symbols of one dataset, in row order, duplicates kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetDegs {
    pub symbols: Vec<String>,
    pub missing_symbols: usize,
}

pub fn extract_degs(records: &[ExpressionRecord], thresholds: &Thresholds) -> DatasetDegs {
    let mut degs = DatasetDegs::default();
    for record in records.iter().filter(|record| thresholds.is_significant(record)) {
        match &record.gene_symbol {
            Some(symbol) if !symbol.trim().is_empty() => degs.symbols.push(symbol.clone()),
            _ => degs.missing_symbols += 1,
        }
    }
    degs
}

/// Union of DEG symbols across datasets; the first occurrence of a symbol wins.
#[derive(Debug, Default)]
pub struct DegCollector {
    seen: HashSet<String>,
    ordered: Vec<String>,
    missing_symbols: usize,
}

impl DegCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one dataset's DEGs and returns the symbols not seen before.
    pub fn add(&mut self, degs: DatasetDegs) -> Vec<String> {
        self.missing_symbols += degs.missing_symbols;
        let mut fresh = Vec::new();
        for symbol in degs.symbols {
            if self.seen.insert(symbol.clone()) {
                self.ordered.push(symbol.clone());
                fresh.push(symbol);
            }
        }
        fresh
    }

    pub fn symbols(&self) -> &[String] {
        &self.ordered
    }

    pub fn missing_symbols(&self) -> usize {
        self.missing_symbols
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(symbol: Option<&str>, log_fc: f64, padj: f64) -> ExpressionRecord {
        ExpressionRecord {
            gene_symbol: symbol.map(str::to_string),
            log_fc: Some(log_fc),
            padj: Some(padj),
        }
    }

    #[test]
    fn boundaries_are_not_significant() {
        let thresholds = Thresholds::default();
        assert!(!thresholds.is_significant(&record(Some("A"), 2.0, 0.01)));
        assert!(!thresholds.is_significant(&record(Some("A"), -2.0, 0.01)));
        assert!(!thresholds.is_significant(&record(Some("A"), 3.0, 0.05)));
        assert!(thresholds.is_significant(&record(Some("A"), 2.01, 0.049)));
        assert!(thresholds.is_significant(&record(Some("A"), -2.01, 0.049)));
    }

    #[test]
    fn missing_values_are_never_significant() {
        let thresholds = Thresholds::default();
        let record = ExpressionRecord {
            gene_symbol: Some("A".to_string()),
            log_fc: None,
            padj: Some(0.0),
        };
        assert!(!thresholds.is_significant(&record));
    }

    #[test]
    fn missing_symbols_are_counted_not_kept() {
        let degs = extract_degs(
            &[record(None, 5.0, 0.001), record(Some("  "), 5.0, 0.001), record(Some("B"), 5.0, 0.001)],
            &Thresholds::default(),
        );
        assert_eq!(degs.symbols, vec!["B"]);
        assert_eq!(degs.missing_symbols, 2);
    }

    #[test]
    fn collector_deduplicates_across_datasets() {
        let mut collector = DegCollector::new();
        let first = collector.add(DatasetDegs {
            symbols: vec!["A".into(), "B".into(), "A".into()],
            missing_symbols: 1,
        });
        let second = collector.add(DatasetDegs {
            symbols: vec!["B".into(), "C".into()],
            missing_symbols: 0,
        });
        assert_eq!(first, vec!["A", "B"]);
        assert_eq!(second, vec!["C"]);
        assert_eq!(collector.symbols(), ["A", "B", "C"]);
        assert_eq!(collector.missing_symbols(), 1);
    }
}
