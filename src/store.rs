use std::fs;
use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::{Builder, NamedTempFile};

use crate::config::PipelinePaths;
use crate::domain::DatasetId;
use crate::error::KiraError;

pub const TABLE_EXT: &str = "csv";
pub const COLUMNAR_EXT: &str = "parquet";
pub const VERIFICATION_SUCCESS: &str = "Verification successful.";

/// On-disk layout of one pipeline run. Every stage writes only below its own
/// root; the build root mirrors the download and process roots.
#[derive(Debug, Clone)]
pub struct Store {
    download_root: Utf8PathBuf,
    process_root: Utf8PathBuf,
    verify_root: Utf8PathBuf,
    build_root: Utf8PathBuf,
}

impl Store {
    pub fn new(paths: &PipelinePaths) -> Self {
        Self {
            download_root: paths.download.clone(),
            process_root: paths.process.clone(),
            verify_root: paths.verify.clone(),
            build_root: paths.build.clone(),
        }
    }

    pub fn new_in(base: &Utf8Path, paths: &PipelinePaths) -> Self {
        Self {
            download_root: base.join(&paths.download),
            process_root: base.join(&paths.process),
            verify_root: base.join(&paths.verify),
            build_root: base.join(&paths.build),
        }
    }

    pub fn download_root(&self) -> &Utf8Path {
        &self.download_root
    }

    pub fn process_root(&self) -> &Utf8Path {
        &self.process_root
    }

    pub fn verify_root(&self) -> &Utf8Path {
        &self.verify_root
    }

    pub fn build_root(&self) -> &Utf8Path {
        &self.build_root
    }

    pub fn overview_path(&self) -> Utf8PathBuf {
        self.download_root.join(format!("overview.{TABLE_EXT}"))
    }

    pub fn catalog_manifest_path(&self) -> Utf8PathBuf {
        self.download_root.join("catalog_files.txt")
    }

    pub fn gene_set_library_path(&self, library: &str) -> Utf8PathBuf {
        self.download_root.join(format!("{library}.gmt"))
    }

    pub fn datasets_dir(&self) -> Utf8PathBuf {
        self.download_root.join("temposeq")
    }

    pub fn dataset_path(&self, id: &DatasetId) -> Utf8PathBuf {
        self.datasets_dir().join(format!("{id}.{TABLE_EXT}"))
    }

    pub fn downloaded_manifest_path(&self) -> Utf8PathBuf {
        self.download_root.join("downloaded_files.txt")
    }

    pub fn processed_manifest_path(&self) -> Utf8PathBuf {
        self.process_root.join("processed_files.txt")
    }

    pub fn pathways_path(&self) -> Utf8PathBuf {
        self.process_root.join(format!("pathways.{TABLE_EXT}"))
    }

    pub fn verification_marker_path(&self) -> Utf8PathBuf {
        self.verify_root.join("verification_success.txt")
    }

    /// Maps a row-oriented artifact under the download or process root onto
    /// the build root, swapping the table extension for the columnar one.
    pub fn columnar_path(&self, source: &Utf8Path) -> Result<Utf8PathBuf, KiraError> {
        let relative = source
            .strip_prefix(&self.download_root)
            .or_else(|_| source.strip_prefix(&self.process_root))
            .map_err(|_| {
                KiraError::Filesystem(format!(
                    "{source} is outside the download and process roots"
                ))
            })?;
        Ok(self.build_root.join(relative).with_extension(COLUMNAR_EXT))
    }

    pub fn ensure_dir(path: &Utf8Path) -> Result<(), KiraError> {
        fs::create_dir_all(path.as_std_path())
            .map_err(|err| KiraError::Filesystem(format!("create {path}: {err}")))
    }

    /// Creates a temp file next to `dest`; callers fill it and hand it to
    /// [`Store::persist`].
    pub fn temp_for(dest: &Utf8Path) -> Result<NamedTempFile, KiraError> {
        let parent = dest
            .parent()
            .ok_or_else(|| KiraError::Filesystem(format!("invalid destination path {dest}")))?;
        let parent = if parent.as_str().is_empty() {
            Utf8Path::new(".")
        } else {
            parent
        };
        Self::ensure_dir(parent)?;
        Builder::new()
            .prefix(".kira-tox")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| KiraError::Filesystem(err.to_string()))
    }

    pub fn persist(temp: NamedTempFile, dest: &Utf8Path) -> Result<(), KiraError> {
        temp.persist(dest.as_std_path())
            .map_err(|err| KiraError::Filesystem(format!("persist {dest}: {}", err.error)))?;
        Ok(())
    }

    pub fn write_atomic(dest: &Utf8Path, bytes: &[u8]) -> Result<(), KiraError> {
        let mut temp = Self::temp_for(dest)?;
        temp.write_all(bytes)
            .and_then(|_| temp.flush())
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        Self::persist(temp, dest)
    }

    /// Removes `path`; a missing file is not an error. Returns whether a file
    /// was actually deleted.
    pub fn remove_if_exists(path: &Utf8Path) -> Result<bool, KiraError> {
        match fs::remove_file(path.as_std_path()) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(KiraError::Filesystem(format!("remove {path}: {err}"))),
        }
    }
}
