//! Directory of known assets.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{AgentError, Result};
use crate::types::AssetRecord;

/// Holds the latest metadata for every asset seen on the bus.
///
/// Records are replaced wholesale on each asset event and are kept for
/// the lifetime of the process.
#[derive(Debug, Default)]
pub struct AssetDirectory {
    assets: HashMap<String, AssetRecord>,
}

impl AssetDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record or replaces the existing one with the same name.
    ///
    /// Returns the previous record, if any.
    pub fn upsert(&mut self, record: AssetRecord) -> Option<AssetRecord> {
        debug!(
            asset = %record.name,
            priority = %record.priority,
            contact = %record.contact_email,
            "upserting asset"
        );
        self.assets.insert(record.name.clone(), record)
    }

    /// Looks up an asset by name.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::UnknownAsset` if no record exists for `name`.
    pub fn lookup(&self, name: &str) -> Result<&AssetRecord> {
        self.assets.get(name).ok_or_else(|| AgentError::UnknownAsset {
            name: name.to_string(),
        })
    }

    /// Returns true if a record exists for `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.assets.contains_key(name)
    }

    /// Returns the number of known assets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// Returns true if no asset is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}
