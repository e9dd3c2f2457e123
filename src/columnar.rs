//! CSV -> Parquet transcoding.
//!
//! The Arrow schema is inferred from the whole CSV file, so column names and
//! types carry over unchanged; no rows are dropped or rewritten.

use std::fs::File;
use std::io::Seek;
use std::sync::Arc;

use arrow::csv::ReaderBuilder;
use arrow::csv::reader::Format;
use arrow::datatypes::{DataType, Field, Schema};
use camino::Utf8Path;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;

use crate::error::KiraError;
use crate::store::Store;

const BATCH_SIZE: usize = 8192;

fn writer_properties() -> WriterProperties {
    let created_by = KeyValue {
        key: "created_by".to_string(),
        value: Some(format!("kira-tox/{}", env!("CARGO_PKG_VERSION"))),
    };
    WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .set_key_value_metadata(Some(vec![created_by]))
        .build()
}

/// Converts `source` into a Parquet file at `dest` and returns the number of
/// rows written. `dest` is replaced atomically.
pub fn transcode(source: &Utf8Path, dest: &Utf8Path) -> Result<usize, KiraError> {
    let mut input = File::open(source.as_std_path())
        .map_err(|err| KiraError::Filesystem(format!("open {source}: {err}")))?;
    let (schema, _) = Format::default()
        .with_header(true)
        .infer_schema(&mut input, None)
        .map_err(|err| KiraError::Columnar(format!("infer schema of {source}: {err}")))?;
    input
        .rewind()
        .map_err(|err| KiraError::Filesystem(err.to_string()))?;

    let schema = Arc::new(nullable_as_text(&schema));
    let reader = ReaderBuilder::new(schema.clone())
        .with_header(true)
        .with_batch_size(BATCH_SIZE)
        .build(input)
        .map_err(|err| KiraError::Columnar(format!("read {source}: {err}")))?;

    let mut temp = Store::temp_for(dest)?;
    let mut rows = 0usize;
    {
        let mut writer = ArrowWriter::try_new(&mut temp, schema, Some(writer_properties()))
            .map_err(|err| KiraError::Columnar(format!("parquet writer init failed: {err}")))?;
        for batch in reader {
            let batch =
                batch.map_err(|err| KiraError::Columnar(format!("read {source}: {err}")))?;
            rows += batch.num_rows();
            writer
                .write(&batch)
                .map_err(|err| KiraError::Columnar(format!("parquet write failed: {err}")))?;
        }
        writer
            .close()
            .map_err(|err| KiraError::Columnar(format!("parquet close failed: {err}")))?;
    }
    Store::persist(temp, dest)?;
    Ok(rows)
}

// Columns with no values at all infer as Null; keep them as text.
fn nullable_as_text(schema: &Schema) -> Schema {
    let fields = schema
        .fields()
        .iter()
        .map(|field| match field.data_type() {
            DataType::Null => Field::new(field.name(), DataType::Utf8, true),
            _ => field.as_ref().clone(),
        })
        .collect::<Vec<_>>();
    Schema::new(fields)
}

pub fn parquet_row_count(path: &Utf8Path) -> Result<usize, KiraError> {
    let file = File::open(path.as_std_path())
        .map_err(|err| KiraError::Filesystem(format!("open {path}: {err}")))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|err| KiraError::Columnar(format!("open parquet {path}: {err}")))?;
    Ok(builder.metadata().file_metadata().num_rows() as usize)
}
