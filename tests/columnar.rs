use std::fs::File;

use camino::Utf8PathBuf;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use kira_toxflow::columnar::{parquet_row_count, transcode};

#[test]
fn transcode_keeps_columns_and_rows() {
    let dir = tempfile::tempdir().unwrap();
    let base = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    let source = base.join("download/temposeq/d1.csv");
    std::fs::create_dir_all(source.parent().unwrap()).unwrap();
    std::fs::write(
        &source,
        "SYMBOL,logFC,padj,comment\nCYP1A1,5.2,0.001,\nNQO1,-2.5,0.01,\n,0.3,0.9,\n",
    )
    .unwrap();
    let dest = base.join("brick/temposeq/d1.parquet");

    let rows = transcode(&source, &dest).unwrap();
    assert_eq!(rows, 3);
    assert_eq!(parquet_row_count(&dest).unwrap(), 3);

    let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(&dest).unwrap()).unwrap();
    let names = builder
        .schema()
        .fields()
        .iter()
        .map(|field| field.name().clone())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["SYMBOL", "logFC", "padj", "comment"]);
}

#[test]
fn header_only_table_becomes_empty_parquet() {
    let dir = tempfile::tempdir().unwrap();
    let base = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    let source = base.join("pathways.csv");
    std::fs::write(&source, "Gene symbol,Rank,Pathway\n").unwrap();
    let dest = base.join("out/pathways.parquet");

    assert_eq!(transcode(&source, &dest).unwrap(), 0);
    assert_eq!(parquet_row_count(&dest).unwrap(), 0);
}

#[test]
fn missing_source_leaves_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let base = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    let dest = base.join("out/absent.parquet");

    assert!(transcode(&base.join("absent.csv"), &dest).is_err());
    assert!(!dest.exists());
}
