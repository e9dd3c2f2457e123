//! Stage manifests.
//!
//! A [`WorkList`] is what a stage plans to do (derived from the overview
//! table); a [`Ledger`] is what it has finished. Both are plain text with one
//! path per line, but only the ledger is ever written, and only by appending.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};

use crate::domain::DatasetDescriptor;
use crate::error::KiraError;
use crate::store::Store;
use crate::table::OverviewTable;

#[derive(Debug, Clone)]
pub struct WorkItem {
    pub descriptor: DatasetDescriptor,
    pub table_path: Utf8PathBuf,
}

/// Planned per-dataset artifacts, in overview order.
#[derive(Debug, Clone)]
pub struct WorkList {
    items: Vec<WorkItem>,
}

impl WorkList {
    pub fn from_overview(overview: &OverviewTable, store: &Store) -> Self {
        let items = overview
            .descriptors()
            .iter()
            .map(|descriptor| WorkItem {
                table_path: store.dataset_path(&descriptor.dataset_id),
                descriptor: descriptor.clone(),
            })
            .collect();
        Self { items }
    }

    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Append-only completion record. Each line is flushed and synced before
/// `record` returns, so earlier lines survive a crash.
pub struct Ledger {
    path: Utf8PathBuf,
    file: File,
    recorded: usize,
}

impl Ledger {
    /// Starts a fresh ledger, truncating any previous one.
    pub fn create(path: &Utf8Path) -> Result<Self, KiraError> {
        Self::ensure_parent(path)?;
        let file = File::create(path.as_std_path())
            .map_err(|err| KiraError::Filesystem(format!("create {path}: {err}")))?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            recorded: 0,
        })
    }

    /// Reopens an existing ledger for appending; creates it when absent.
    pub fn resume(path: &Utf8Path) -> Result<(Self, Vec<Utf8PathBuf>), KiraError> {
        Self::ensure_parent(path)?;
        let existing = match Self::read(path) {
            Ok(entries) => entries,
            Err(KiraError::MissingManifest(_)) => Vec::new(),
            Err(err) => return Err(err),
        };
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_std_path())
            .map_err(|err| KiraError::Filesystem(format!("open {path}: {err}")))?;
        let ledger = Self {
            path: path.to_path_buf(),
            file,
            recorded: existing.len(),
        };
        Ok((ledger, existing))
    }

    pub fn record(&mut self, artifact: &Utf8Path) -> Result<(), KiraError> {
        writeln!(self.file, "{artifact}")
            .and_then(|_| self.file.flush())
            .and_then(|_| self.file.sync_data())
            .map_err(|err| KiraError::Filesystem(format!("append to {}: {err}", self.path)))?;
        self.recorded += 1;
        Ok(())
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn recorded(&self) -> usize {
        self.recorded
    }

    pub fn read(path: &Utf8Path) -> Result<Vec<Utf8PathBuf>, KiraError> {
        let content = match fs::read_to_string(path.as_std_path()) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(KiraError::MissingManifest(path.as_std_path().to_path_buf()));
            }
            Err(err) => return Err(KiraError::Filesystem(format!("read {path}: {err}"))),
        };
        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(Utf8PathBuf::from)
            .collect())
    }

    pub fn count(path: &Utf8Path) -> Result<usize, KiraError> {
        Ok(Self::read(path)?.len())
    }

    fn ensure_parent(path: &Utf8Path) -> Result<(), KiraError> {
        match path.parent() {
            Some(parent) if !parent.as_str().is_empty() => Store::ensure_dir(parent),
            _ => Ok(()),
        }
    }
}

/// Number of leading work items a resumed ledger already covers. `None` when
/// the ledger is not an in-order prefix of `work` or a recorded table is gone.
pub fn recorded_prefix(entries: &[Utf8PathBuf], work: &WorkList) -> Option<usize> {
    if entries.len() > work.len() {
        return None;
    }
    entries
        .iter()
        .zip(work.items())
        .all(|(entry, item)| *entry == item.table_path && entry.as_std_path().is_file())
        .then_some(entries.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_truncates_and_records_in_order() {
        let temp = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp.path().join("stage/files.txt")).unwrap();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "stale\nlines\nhere\n").unwrap();

        let mut ledger = Ledger::create(&path).unwrap();
        ledger.record(Utf8Path::new("download/temposeq/a.csv")).unwrap();
        ledger.record(Utf8Path::new("download/temposeq/b.csv")).unwrap();
        assert_eq!(ledger.recorded(), 2);

        let entries = Ledger::read(&path).unwrap();
        assert_eq!(
            entries,
            vec![
                Utf8PathBuf::from("download/temposeq/a.csv"),
                Utf8PathBuf::from("download/temposeq/b.csv"),
            ]
        );
    }

    #[test]
    fn resume_appends_after_existing_lines() {
        let temp = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp.path().join("files.txt")).unwrap();
        fs::write(&path, "a.csv\n").unwrap();

        let (mut ledger, existing) = Ledger::resume(&path).unwrap();
        assert_eq!(existing, vec![Utf8PathBuf::from("a.csv")]);
        ledger.record(Utf8Path::new("b.csv")).unwrap();
        assert_eq!(ledger.recorded(), 2);
        assert_eq!(Ledger::count(&path).unwrap(), 2);
    }

    fn work(paths: &[&str]) -> WorkList {
        WorkList {
            items: paths
                .iter()
                .map(|path| WorkItem {
                    descriptor: DatasetDescriptor {
                        dataset_id: Utf8Path::new(path).file_stem().unwrap().parse().unwrap(),
                        filename: String::new(),
                    },
                    table_path: Utf8PathBuf::from(*path),
                })
                .collect(),
        }
    }

    #[test]
    fn recorded_prefix_requires_order_and_files() {
        let temp = tempfile::tempdir().unwrap();
        let base = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let a = base.join("a.csv");
        let b = base.join("b.csv");
        let c = base.join("c.csv");
        for path in [&a, &b, &c] {
            fs::write(path, "x\n").unwrap();
        }
        let planned = work(&[a.as_str(), b.as_str()]);

        assert_eq!(recorded_prefix(&[], &planned), Some(0));
        assert_eq!(recorded_prefix(&[a.clone()], &planned), Some(1));
        assert_eq!(recorded_prefix(&[b.clone()], &planned), None);
        assert_eq!(recorded_prefix(&[a.clone(), c.clone()], &planned), None);
        assert_eq!(
            recorded_prefix(&[a.clone(), b.clone(), c.clone()], &planned),
            None
        );

        fs::remove_file(&a).unwrap();
        assert_eq!(recorded_prefix(&[a.clone()], &planned), None);
    }

    #[test]
    fn missing_manifest_is_reported() {
        let temp = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp.path().join("absent.txt")).unwrap();
        assert!(matches!(
            Ledger::read(&path),
            Err(KiraError::MissingManifest(_))
        ));
    }
}
