use assert_matches::assert_matches;
use camino::{Utf8Path, Utf8PathBuf};

use kira_toxflow::config::PipelineConfig;
use kira_toxflow::domain::DatasetId;
use kira_toxflow::error::KiraError;
use kira_toxflow::store::Store;

fn store() -> Store {
    Store::new_in(Utf8Path::new("/data/run"), &PipelineConfig::default().paths)
}

#[test]
fn layout_paths() {
    let store = store();
    let id: DatasetId = "0c1a9e4e-7f5d-4d55-9a43-2f1d8a1b6c11".parse().unwrap();

    assert_eq!(
        store.overview_path(),
        Utf8PathBuf::from("/data/run/download/overview.csv")
    );
    assert_eq!(
        store.dataset_path(&id),
        Utf8PathBuf::from("/data/run/download/temposeq/0c1a9e4e-7f5d-4d55-9a43-2f1d8a1b6c11.csv")
    );
    assert!(store.downloaded_manifest_path().ends_with("download/downloaded_files.txt"));
    assert!(store.processed_manifest_path().ends_with("process/processed_files.txt"));
    assert!(store.pathways_path().ends_with("process/pathways.csv"));
    assert!(
        store
            .verification_marker_path()
            .ends_with("verify/verification_success.txt")
    );
    assert!(
        store
            .gene_set_library_path("WikiPathway_2023_Human")
            .ends_with("WikiPathway_2023_Human.gmt")
    );
}

#[test]
fn columnar_paths_mirror_the_build_root() {
    let store = store();
    let id: DatasetId = "d1".parse().unwrap();

    assert_eq!(
        store.columnar_path(&store.dataset_path(&id)).unwrap(),
        Utf8PathBuf::from("/data/run/brick/temposeq/d1.parquet")
    );
    assert_eq!(
        store.columnar_path(&store.pathways_path()).unwrap(),
        Utf8PathBuf::from("/data/run/brick/pathways.parquet")
    );
}

#[test]
fn columnar_path_outside_stage_roots_is_an_error() {
    let err = store()
        .columnar_path(Utf8Path::new("/elsewhere/table.csv"))
        .unwrap_err();
    assert_matches!(err, KiraError::Filesystem(_));
}

#[test]
fn atomic_write_replaces_and_remove_reports() {
    let dir = tempfile::tempdir().unwrap();
    let base = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    let target = base.join("verify/marker.txt");

    Store::write_atomic(&target, b"first").unwrap();
    Store::write_atomic(&target, b"second").unwrap();
    assert_eq!(std::fs::read_to_string(&target).unwrap(), "second");

    assert!(Store::remove_if_exists(&target).unwrap());
    assert!(!Store::remove_if_exists(&target).unwrap());
}
