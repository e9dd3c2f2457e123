//! Row-oriented tables persisted as CSV with a header row.
//!
//! Cells are kept as text; a missing value is an empty cell. Typed views
//! (overview descriptors, expression records) are derived on demand.

use std::collections::HashSet;
use std::io::Write;

use camino::Utf8Path;

use crate::config::ExpressionColumns;
use crate::domain::{DatasetDescriptor, DatasetId, ExpressionRecord};
use crate::error::KiraError;
use crate::store::Store;

pub const DATASET_ID_COLUMN: &str = "Dataset id";
pub const FILENAME_COLUMN: &str = "Filename";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn require_column(&self, table: &str, name: &str) -> Result<usize, KiraError> {
        self.column_index(name).ok_or_else(|| KiraError::MissingColumn {
            table: table.to_string(),
            column: name.to_string(),
        })
    }

    pub fn push_row(&mut self, mut row: Vec<String>) {
        row.resize(self.columns.len(), String::new());
        self.rows.push(row);
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .map(String::as_str)
    }

    /// Keeps rows whose `column` contains `needle` (case-sensitive). Rows stay
    /// in their original relative order.
    pub fn retain_containing(&mut self, column: usize, needle: &str) {
        self.rows.retain(|row| {
            row.get(column)
                .map(|value| !value.is_empty() && value.contains(needle))
                .unwrap_or(false)
        });
    }

    pub fn read_csv(path: &Utf8Path) -> Result<Self, KiraError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path.as_std_path())
            .map_err(|err| KiraError::Table(format!("open {path}: {err}")))?;
        let columns = reader
            .headers()
            .map_err(|err| KiraError::Table(format!("read header of {path}: {err}")))?
            .iter()
            .map(str::to_string)
            .collect::<Vec<_>>();
        let mut table = Table::new(columns);
        for record in reader.records() {
            let record = record.map_err(|err| KiraError::Table(format!("read {path}: {err}")))?;
            table.push_row(record.iter().map(str::to_string).collect());
        }
        Ok(table)
    }

    /// Writes the table atomically: the destination either keeps its previous
    /// content or holds the complete new table.
    pub fn write_csv(&self, path: &Utf8Path) -> Result<(), KiraError> {
        let mut temp = Store::temp_for(path)?;
        {
            let mut writer = csv::Writer::from_writer(temp.as_file_mut());
            writer
                .write_record(&self.columns)
                .map_err(|err| KiraError::Table(err.to_string()))?;
            for row in &self.rows {
                writer
                    .write_record(row)
                    .map_err(|err| KiraError::Table(err.to_string()))?;
            }
            writer
                .flush()
                .map_err(|err| KiraError::Table(err.to_string()))?;
        }
        temp.flush()
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        Store::persist(temp, path)
    }
}

/// The filtered catalog: the authoritative, ordered work list of a run.
#[derive(Debug, Clone)]
pub struct OverviewTable {
    table: Table,
    descriptors: Vec<DatasetDescriptor>,
}

impl OverviewTable {
    pub fn from_table(table: Table) -> Result<Self, KiraError> {
        let id_col = table.require_column("overview", DATASET_ID_COLUMN)?;
        let name_col = table.require_column("overview", FILENAME_COLUMN)?;

        let mut seen = HashSet::new();
        let mut descriptors = Vec::with_capacity(table.len());
        for row in 0..table.len() {
            let dataset_id: DatasetId = table.cell(row, id_col).unwrap_or_default().parse()?;
            if !seen.insert(dataset_id.clone()) {
                return Err(KiraError::InvalidCatalog(format!(
                    "duplicate dataset id {dataset_id}"
                )));
            }
            descriptors.push(DatasetDescriptor {
                dataset_id,
                filename: table.cell(row, name_col).unwrap_or_default().to_string(),
            });
        }

        Ok(Self { table, descriptors })
    }

    /// Applies the filename filter to a full catalog table.
    pub fn from_catalog(mut catalog: Table, filter_word: &str) -> Result<Self, KiraError> {
        let name_col = catalog.require_column("catalog", FILENAME_COLUMN)?;
        catalog.retain_containing(name_col, filter_word);
        Self::from_table(catalog)
    }

    pub fn read(path: &Utf8Path) -> Result<Self, KiraError> {
        Self::from_table(Table::read_csv(path)?)
    }

    pub fn write(&self, path: &Utf8Path) -> Result<(), KiraError> {
        self.table.write_csv(path)
    }

    pub fn descriptors(&self) -> &[DatasetDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// Typed projection of a materialized dataset table.
pub fn expression_records(
    table: &Table,
    columns: &ExpressionColumns,
) -> Result<Vec<ExpressionRecord>, KiraError> {
    let symbol = table.require_column("temposeq", &columns.symbol)?;
    let log_fc = table.require_column("temposeq", &columns.log_fold_change)?;
    let padj = table.require_column("temposeq", &columns.adjusted_p_value)?;

    Ok((0..table.len())
        .map(|row| ExpressionRecord {
            gene_symbol: table
                .cell(row, symbol)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string),
            log_fc: parse_number(table.cell(row, log_fc)),
            padj: parse_number(table.cell(row, padj)),
        })
        .collect())
}

fn parse_number(cell: Option<&str>) -> Option<f64> {
    cell.map(str::trim)
        .filter(|value| !value.is_empty())
        .and_then(|value| value.parse::<f64>().ok())
        .filter(|value| !value.is_nan())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Table {
        let mut table = Table::new(vec![
            DATASET_ID_COLUMN.to_string(),
            FILENAME_COLUMN.to_string(),
            "Compound".to_string(),
        ]);
        table.push_row(vec!["b2".into(), "TempO-Seq_EUT_001.csv".into(), "x".into()]);
        table.push_row(vec!["b3".into(), "TempO-Seq_eut_002.csv".into(), "y".into()]);
        table.push_row(vec!["b4".into(), "".into(), "z".into()]);
        table.push_row(vec!["b5".into(), "EUT_summary.csv".into(), "w".into()]);
        table
    }

    #[test]
    fn filter_is_case_sensitive_and_keeps_order() {
        let overview = OverviewTable::from_catalog(catalog(), "EUT").unwrap();
        let ids = overview
            .descriptors()
            .iter()
            .map(|d| d.dataset_id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["b2", "b5"]);
    }

    #[test]
    fn empty_filter_result_is_not_an_error() {
        let overview = OverviewTable::from_catalog(catalog(), "NOPE").unwrap();
        assert!(overview.is_empty());
    }

    #[test]
    fn duplicate_dataset_ids_are_rejected() {
        let mut table = catalog();
        table.push_row(vec!["b2".into(), "EUT again".into(), "v".into()]);
        assert!(OverviewTable::from_catalog(table, "EUT").is_err());
    }

    #[test]
    fn expression_records_treat_na_as_missing() {
        let mut table = Table::new(vec!["SYMBOL".into(), "logFC".into(), "padj".into()]);
        table.push_row(vec!["GENEA".into(), "2.5".into(), "NA".into()]);
        table.push_row(vec![" ".into(), "-3".into(), "0.01".into()]);

        let records = expression_records(&table, &ExpressionColumns::default()).unwrap();
        assert_eq!(records[0].gene_symbol.as_deref(), Some("GENEA"));
        assert_eq!(records[0].padj, None);
        assert_eq!(records[1].gene_symbol, None);
        assert_eq!(records[1].log_fc, Some(-3.0));
    }
}
