//! Per-gene pathway enrichment and the aggregated pathways table.
//!
//! Genes are queried one at a time through [`EnrichmentClient`]; the client
//! owns any pacing between submit and poll. Swapping in a client backed by a
//! bounded worker pool would not touch the aggregation below.

use serde::Serialize;

use crate::domain::PathwayResult;
use crate::enrichr::EnrichmentClient;
use crate::error::KiraError;
use crate::table::Table;

pub const PATHWAY_COLUMNS: [&str; 7] = [
    "Gene symbol",
    "Rank",
    "Pathway",
    "p-value",
    "Adj. p-value",
    "Odds Ratio",
    "Combined score",
];

#[derive(Debug, Clone, Serialize)]
pub struct SkippedGene {
    pub gene_symbol: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct PathwayAccumulator {
    rows: Vec<PathwayResult>,
    queried: usize,
    skipped: Vec<SkippedGene>,
}

impl PathwayAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queries every gene in order and appends its hits. A rejected gene is
    /// skipped and remembered; any other failure aborts.
    pub fn enrich_genes<E: EnrichmentClient>(
        &mut self,
        client: &E,
        genes: &[String],
        library: &str,
    ) -> Result<(), KiraError> {
        for gene in genes {
            self.queried += 1;
            match client.enrich(gene, library) {
                Ok(terms) => {
                    self.rows.extend(terms.into_iter().map(|term| PathwayResult {
                        gene_symbol: gene.clone(),
                        rank: term.rank,
                        pathway: term.pathway,
                        p_value: term.p_value,
                        adjusted_p_value: term.adjusted_p_value,
                        odds_ratio: term.odds_ratio,
                        combined_score: term.combined_score,
                    }));
                }
                Err(KiraError::EnrichmentRejected { message, .. }) => {
                    tracing::warn!(gene = %gene, reason = %message, "skipping gene rejected by enrichment service");
                    self.skipped.push(SkippedGene {
                        gene_symbol: gene.clone(),
                        reason: message,
                    });
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    pub fn rows(&self) -> &[PathwayResult] {
        &self.rows
    }

    pub fn queried(&self) -> usize {
        self.queried
    }

    pub fn skipped(&self) -> &[SkippedGene] {
        &self.skipped
    }

    pub fn into_table(self) -> Table {
        pathways_table(&self.rows)
    }
}

pub fn pathways_table(rows: &[PathwayResult]) -> Table {
    let mut table = Table::new(PATHWAY_COLUMNS.iter().map(|c| c.to_string()).collect());
    for row in rows {
        table.push_row(vec![
            row.gene_symbol.clone(),
            row.rank.to_string(),
            row.pathway.clone(),
            row.p_value.to_string(),
            row.adjusted_p_value.to_string(),
            row.odds_ratio.to_string(),
            row.combined_score.to_string(),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::enrichr::EnrichmentTerm;

    struct ScriptedEnrichr {
        calls: Mutex<Vec<String>>,
    }

    impl EnrichmentClient for ScriptedEnrichr {
        fn enrich(&self, gene: &str, _library: &str) -> Result<Vec<EnrichmentTerm>, KiraError> {
            self.calls.lock().unwrap().push(gene.to_string());
            match gene {
                "BAD" => Err(KiraError::EnrichmentRejected {
                    gene: gene.to_string(),
                    message: "invalid gene".to_string(),
                }),
                "DOWN" => Err(KiraError::EnrichrStatus {
                    status: 503,
                    message: "unavailable".to_string(),
                }),
                _ => Ok(vec![EnrichmentTerm {
                    rank: 1,
                    pathway: format!("{gene} pathway"),
                    p_value: 0.01,
                    odds_ratio: 3.5,
                    combined_score: 12.0,
                    overlapping_genes: vec![gene.to_string()],
                    adjusted_p_value: 0.02,
                }]),
            }
        }

        fn download_library(&self, _library: &str) -> Result<String, KiraError> {
            Ok(String::new())
        }
    }

    #[test]
    fn rejected_genes_are_skipped() {
        let client = ScriptedEnrichr {
            calls: Mutex::new(Vec::new()),
        };
        let mut acc = PathwayAccumulator::new();
        acc.enrich_genes(&client, &["A".into(), "BAD".into(), "C".into()], "Lib")
            .unwrap();

        assert_eq!(acc.queried(), 3);
        assert_eq!(acc.skipped().len(), 1);
        assert_eq!(acc.skipped()[0].gene_symbol, "BAD");
        let genes = acc
            .rows()
            .iter()
            .map(|row| row.gene_symbol.as_str())
            .collect::<Vec<_>>();
        assert_eq!(genes, vec!["A", "C"]);
    }

    #[test]
    fn other_failures_abort() {
        let client = ScriptedEnrichr {
            calls: Mutex::new(Vec::new()),
        };
        let mut acc = PathwayAccumulator::new();
        let err = acc
            .enrich_genes(&client, &["DOWN".into(), "A".into()], "Lib")
            .unwrap_err();
        assert!(matches!(err, KiraError::EnrichrStatus { status: 503, .. }));
        assert_eq!(client.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn table_header_matches_output_schema() {
        let table = pathways_table(&[]);
        assert_eq!(table.columns, PATHWAY_COLUMNS);
        assert!(table.is_empty());
    }
}
