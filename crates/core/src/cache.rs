//! Lookup tables of one restore operation.

use std::collections::{HashMap, hash_map::Entry};

use log::trace;

use crate::{
    error::{RestoreError, RestoreResult},
    path::Category,
    permission::Metadata,
};

/// In-memory lookup tables, created at the start of a restore operation and dropped at its end.
///
/// The caches are owned by the restorer of the operation. They are written by a single worker
/// only, so there is no locking.
#[derive(Debug, Default)]
pub struct RestoreCaches {
    /// directory path => metadata of the directory
    parent_dir_to_meta: HashMap<String, Metadata>,
    /// permission id in the backup => id of the permission created during restore
    old_perm_id_to_new_id: HashMap<String, String>,
    /// container id => (collision key => id of the existing item)
    collision_keys: HashMap<String, HashMap<String, String>>,
    /// (drive id, restore folder path) => folder id
    folder_ids: HashMap<(String, Vec<String>), String>,
    /// (category, resource owner, name) => container id
    container_ids: HashMap<(Category, String, String), String>,
}

impl RestoreCaches {
    /// Create empty caches.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The metadata of the directory at `path`, if it has been visited.
    #[must_use]
    pub fn parent_dir_meta(&self, path: &str) -> Option<&Metadata> {
        self.parent_dir_to_meta.get(path)
    }

    /// Store the metadata of the directory at `path`.
    pub fn set_parent_dir_meta(&mut self, path: impl Into<String>, meta: Metadata) {
        let path = path.into();
        trace!("caching metadata of {path}");
        _ = self.parent_dir_to_meta.insert(path, meta);
    }

    /// The id of the permission created for the permission `old_id` of the backup.
    #[must_use]
    pub fn new_permission_id(&self, old_id: &str) -> Option<&str> {
        self.old_perm_id_to_new_id.get(old_id).map(String::as_str)
    }

    /// The permission id mapping, for functions which only need this table.
    pub fn permission_ids_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.old_perm_id_to_new_id
    }

    /// The collision keys of the container `container_id`.
    ///
    /// The keys are loaded by `load` on first access and reused afterwards.
    ///
    /// # Errors
    ///
    /// * [`RestoreErrorKind::Remote`] - If loading the keys failed. Nothing is cached then.
    ///
    /// [`RestoreErrorKind::Remote`]: crate::error::RestoreErrorKind::Remote
    pub fn collision_keys<F>(
        &mut self,
        container_id: &str,
        load: F,
    ) -> RestoreResult<&mut HashMap<String, String>>
    where
        F: FnOnce() -> anyhow::Result<HashMap<String, String>>,
    {
        match self.collision_keys.entry(container_id.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let keys = load().map_err(RestoreError::remote)?;
                trace!("loaded {} collision keys of {container_id}", keys.len());
                Ok(entry.insert(keys))
            }
        }
    }

    /// The id of the folder at `path` below the root of drive `drive_id`.
    #[must_use]
    pub fn folder_id(&self, drive_id: &str, path: &[String]) -> Option<&str> {
        self.folder_ids
            .get(&(drive_id.to_string(), path.to_vec()))
            .map(String::as_str)
    }

    /// Record the id of the folder at `path` below the root of drive `drive_id`.
    pub fn set_folder_id(&mut self, drive_id: &str, path: Vec<String>, id: impl Into<String>) {
        _ = self
            .folder_ids
            .insert((drive_id.to_string(), path), id.into());
    }

    /// The id of the container `name` of `resource_owner` for items of `category`.
    #[must_use]
    pub fn container_id(&self, category: Category, resource_owner: &str, name: &str) -> Option<&str> {
        self.container_ids
            .get(&(category, resource_owner.to_string(), name.to_string()))
            .map(String::as_str)
    }

    /// Record the id of a container.
    pub fn set_container_id(
        &mut self,
        category: Category,
        resource_owner: &str,
        name: &str,
        id: impl Into<String>,
    ) {
        _ = self.container_ids.insert(
            (category, resource_owner.to_string(), name.to_string()),
            id.into(),
        );
    }
}
