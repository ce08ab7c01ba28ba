//! Storage layer: one JSON record per element plus a metadata record.

use crate::config::Config;
use crate::id::record_key;
use crate::types::{Element, Metadata};
use chrono::Utc;
use eyre::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Extension of element and metadata records.
const RECORD_EXT: &str = "json";

/// Storage handle for reading/writing knowledge tree records.
pub struct Storage {
    config: Config,
}

impl Storage {
    /// Initialize storage, creating the directory layout and metadata if missing.
    pub fn init(config: &Config) -> Result<Self> {
        let elements_dir = config.elements_dir();
        fs::create_dir_all(&elements_dir)
            .wrap_err_with(|| format!("Failed to create {}", elements_dir.display()))?;

        let storage = Self { config: config.clone() };

        if !config.metadata_path().exists() {
            storage.write_metadata(&Metadata::new(Utc::now()))?;
            log::info!("Initialized knowledge tree at {}", config.knowledge_dir().display());
        }

        Ok(storage)
    }

    /// Open existing storage.
    pub fn open(config: &Config) -> Result<Self> {
        if !config.elements_dir().is_dir() {
            eyre::bail!(
                "No knowledge-tree directory found in {}. Run 'ctree init' first.",
                config.working_dir().display()
            );
        }

        Ok(Self { config: config.clone() })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn element_path(&self, id: &str) -> PathBuf {
        self.config
            .elements_dir()
            .join(format!("{}.{}", record_key(id), RECORD_EXT))
    }

    /// Read an element record. Absent records are `Ok(None)`.
    pub fn read_element(&self, id: &str) -> Result<Option<Element>> {
        let path = self.element_path(id);
        let Some(element) = read_record::<Element>(&path)? else {
            return Ok(None);
        };

        // Another element's record, e.g. on a case-insensitive filesystem
        if element.id != id {
            log::warn!("Record {} holds id '{}', expected '{}'", path.display(), element.id, id);
            return Ok(None);
        }

        Ok(Some(element))
    }

    /// ID of the element holding `id`'s record file, if that is a different element.
    pub fn occupant(&self, id: &str) -> Result<Option<String>> {
        let path = self.element_path(id);
        Ok(read_record::<Element>(&path)?
            .map(|element| element.id)
            .filter(|holder| holder != id))
    }

    /// Write an element record, replacing any previous version of it.
    ///
    /// Refuses to overwrite a record that belongs to a different element.
    pub fn write_element(&self, element: &Element) -> Result<()> {
        if let Some(holder) = self.occupant(&element.id)? {
            eyre::bail!(
                "Record file for '{}' already holds element '{}'",
                element.id,
                holder
            );
        }

        let path = self.element_path(&element.id);
        write_record(&path, element).wrap_err_with(|| format!("Failed to write element '{}'", element.id))
    }

    /// Remove an element record. Returns false if it did not exist.
    pub fn remove_element(&self, id: &str) -> Result<bool> {
        let path = self.element_path(id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).wrap_err_with(|| format!("Failed to remove {}", path.display())),
        }
    }

    /// Load every element record.
    ///
    /// Unreadable or unparseable records are skipped with a warning.
    pub fn list_elements(&self) -> Result<Vec<Element>> {
        let mut elements = Vec::new();

        for path in self.record_paths()? {
            match read_record::<Element>(&path) {
                Ok(Some(element)) => elements.push(element),
                Ok(None) => {}
                Err(e) => log::warn!("Skipping {}: {:#}", path.display(), e),
            }
        }

        Ok(elements)
    }

    /// Count element records on disk.
    pub fn count_elements(&self) -> Result<usize> {
        Ok(self.record_paths()?.len())
    }

    fn record_paths(&self) -> Result<Vec<PathBuf>> {
        let dir = self.config.elements_dir();
        let entries = fs::read_dir(&dir).wrap_err_with(|| format!("Failed to read {}", dir.display()))?;

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry.context("Failed to read directory entry")?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == RECORD_EXT) {
                paths.push(path);
            }
        }
        Ok(paths)
    }

    /// Read the metadata record.
    pub fn read_metadata(&self) -> Result<Option<Metadata>> {
        read_record(&self.config.metadata_path())
    }

    /// Write the metadata record.
    pub fn write_metadata(&self, metadata: &Metadata) -> Result<()> {
        write_record(&self.config.metadata_path(), metadata).context("Failed to write metadata")
    }
}

/// Read and parse a JSON record, `None` if the file does not exist.
fn read_record<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).wrap_err_with(|| format!("Failed to read {}", path.display())),
    };

    let record = serde_json::from_str(&data).wrap_err_with(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(record))
}

/// Write a JSON record via a temp file and rename, so readers never see half a record.
fn write_record<T: Serialize>(path: &Path, record: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(record).context("Failed to serialize record")?;

    let tmp_path = path.with_extension("json.tmp");
    let mut file = File::create(&tmp_path).wrap_err_with(|| format!("Failed to create {}", tmp_path.display()))?;
    file.write_all(json.as_bytes())
        .wrap_err_with(|| format!("Failed to write {}", tmp_path.display()))?;
    file.sync_all()
        .wrap_err_with(|| format!("Failed to sync {}", tmp_path.display()))?;

    fs::rename(&tmp_path, path).wrap_err_with(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}
