#![allow(clippy::module_name_repetitions)]

use crate::structs::{PcaError, RawTable, Result};
use log::debug;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Source of stored expression tables addressed by id
pub trait TableStore: Send + Sync {
    /// Load the table stored under `id`
    ///
    /// # Errors
    /// Returns error if the id is unknown or the table cannot be parsed
    fn fetch(&self, id: &str) -> Result<RawTable>;

    /// All available table ids, sorted
    ///
    /// # Errors
    /// Returns error if the store cannot be listed
    fn ids(&self) -> Result<Vec<String>>;
}

/// Tables stored as `.json`, `.csv` or `.tsv` files in one directory, keyed by file stem
pub struct DirectoryStore {
    root: PathBuf,
    tables: BTreeMap<String, PathBuf>,
}

impl DirectoryStore {
    /// Index the table files of `dir`
    ///
    /// # Errors
    /// Returns error if the directory cannot be read or two files share a stem
    pub fn open(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(PcaError::Store(format!(
                "Store directory not found: {}",
                dir.display()
            )));
        }

        let mut tables = BTreeMap::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() || !is_table_file(&path) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Some(existing) = tables.insert(stem.to_string(), path.clone()) {
                return Err(PcaError::Store(format!(
                    "Ambiguous table id '{stem}': {} and {}",
                    existing.display(),
                    path.display()
                )));
            }
        }

        debug!("Indexed {} tables in {}", tables.len(), dir.display());
        Ok(Self {
            root: dir.to_path_buf(),
            tables,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl TableStore for DirectoryStore {
    fn fetch(&self, id: &str) -> Result<RawTable> {
        let path = self.tables.get(id).ok_or_else(|| {
            PcaError::Store(format!(
                "Unknown table id '{id}' in {}",
                self.root.display()
            ))
        })?;
        RawTable::from_file(path, false)
    }

    fn ids(&self) -> Result<Vec<String>> {
        Ok(self.tables.keys().cloned().collect())
    }
}

fn is_table_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| matches!(e.to_lowercase().as_str(), "json" | "csv" | "tsv"))
}
