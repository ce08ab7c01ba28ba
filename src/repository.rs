//! Typed element access over [`Storage`].
//!
//! Every mutation stamps timestamps and recomputes the metadata record by
//! counting what is on disk, so the count never drifts from the records.

use crate::config::Config;
use crate::storage::Storage;
use crate::types::{Element, Metadata};
use chrono::Utc;
use eyre::{Context, Result};

pub struct Repository {
    storage: Storage,
}

impl Repository {
    /// Initialize a repository, creating the storage layout if needed.
    pub fn init(config: &Config) -> Result<Self> {
        Ok(Self {
            storage: Storage::init(config)?,
        })
    }

    /// Open an existing repository.
    pub fn open(config: &Config) -> Result<Self> {
        Ok(Self {
            storage: Storage::open(config)?,
        })
    }

    pub fn config(&self) -> &Config {
        self.storage.config()
    }

    /// Get an element by ID.
    pub fn get(&self, id: &str) -> Result<Option<Element>> {
        self.storage.read_element(id)
    }

    pub fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.get(id)?.is_some())
    }

    /// A different element whose record sits where `id` would be stored.
    pub fn occupant(&self, id: &str) -> Result<Option<String>> {
        self.storage.occupant(id)
    }

    /// Persist an element.
    ///
    /// Refreshes `updated_at`, fills `created_at` on first save, then
    /// recomputes metadata.
    pub fn put(&self, element: &mut Element) -> Result<()> {
        let now = Utc::now();
        element.updated_at = Some(now);
        if element.created_at.is_none() {
            element.created_at = Some(now);
        }

        self.storage.write_element(element)?;
        log::debug!("Saved element '{}'", element.id);

        self.recompute_metadata()
    }

    /// Delete an element record and recompute metadata.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let removed = self.storage.remove_element(id)?;
        if removed {
            log::debug!("Deleted element '{}'", id);
        }
        self.recompute_metadata()?;
        Ok(removed)
    }

    /// All elements, in no particular order.
    pub fn list_all(&self) -> Result<Vec<Element>> {
        self.storage.list_elements()
    }

    /// Re-derive `total_elements` from the records on disk and refresh `last_updated`.
    pub fn recompute_metadata(&self) -> Result<()> {
        let now = Utc::now();
        let total_elements = self.storage.count_elements()?;

        let created_at = match self.storage.read_metadata() {
            Ok(Some(existing)) => existing.created_at,
            Ok(None) => now,
            Err(e) => {
                log::warn!("Metadata unreadable, recreating: {:#}", e);
                now
            }
        };

        self.storage
            .write_metadata(&Metadata {
                created_at,
                total_elements,
                last_updated: now,
            })
            .context("Failed to update metadata")
    }

    /// Read the metadata record.
    pub fn metadata(&self) -> Result<Metadata> {
        match self.storage.read_metadata()? {
            Some(metadata) => Ok(metadata),
            None => {
                self.recompute_metadata()?;
                self.storage
                    .read_metadata()?
                    .ok_or_else(|| eyre::eyre!("Metadata record missing after recompute"))
            }
        }
    }
}
