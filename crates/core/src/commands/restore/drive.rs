use std::iter;

use itertools::Itertools;
use log::{debug, trace, warn};

use crate::{
    collection::{CollectionErrorKind, RestoreCollection, RestoreItem},
    collision::{CollisionPolicy, restore_with_collision_policy},
    commands::restore::{CollectionRestorer, permissions::restore_permissions},
    details::{self, CollectionMetrics, DetailsEntry},
    error::{RestoreError, RestoreResult},
    path::{DrivePath, RestorePath},
    permission::{
        DATA_FILE_SUFFIX, DIR_META_FILE_SUFFIX, META_FILE_SUFFIX, Metadata, dir_meta_name,
    },
    remote::DriveRestoreHandler,
    version,
};

/// A drive item to upload
#[derive(Debug)]
struct DriveItem {
    /// name of the entry within the collection
    entry: String,
    /// file name to restore the item as
    name: String,
    /// stored metadata; empty for backups without metadata files
    meta: Metadata,
    data: bytes::Bytes,
}

impl CollectionRestorer<'_> {
    pub(super) fn restore_drive_collection(
        &mut self,
        handler: &dyn DriveRestoreHandler,
        collection: &dyn RestoreCollection,
        metrics: &mut CollectionMetrics,
    ) -> RestoreResult<()> {
        let path = collection.full_path();
        let drive_path = path.to_drive_path()?;

        let meta = self.collection_metadata(collection, &drive_path)?;
        let folder_id = self.create_restore_folders(handler, &drive_path)?;

        if self.opts.restore_permissions && !drive_path.is_root() {
            if let Err(err) = restore_permissions(
                handler,
                &drive_path.drive_id,
                &folder_id,
                path,
                &meta,
                &mut self.caches,
            ) {
                self.add_fault(err);
            }
        }
        self.caches.set_parent_dir_meta(path.to_string(), meta);

        self.for_each_item(collection, |restorer, item| {
            restorer.restore_drive_entry(handler, collection, &drive_path, &folder_id, item, metrics)
        })
    }

    /// The metadata of a drive collection, depending on the backup version.
    fn collection_metadata(
        &self,
        collection: &dyn RestoreCollection,
        drive_path: &DrivePath,
    ) -> RestoreResult<Metadata> {
        if !self.opts.restore_permissions || !version::has_meta_files(self.backup_version) {
            return Ok(Metadata::default());
        }
        // the root folder keeps its permissions
        let Some(folder) = drive_path.folders.last() else {
            return Ok(Metadata::default());
        };

        let path = collection.full_path();

        if !version::has_dir_meta_in_collection(self.backup_version) {
            // stored as `<folder>.dirmeta` in the parent collection, which is restored before
            let mut dir = path.clone();
            loop {
                if let Some(meta) = self.caches.parent_dir_meta(&dir.to_string()) {
                    return Ok(meta.clone());
                }
                if dir.to_drive_path()?.is_root() {
                    return Ok(Metadata::default());
                }
                dir = dir.dir()?;
            }
        }

        let name = dir_meta_name(self.backup_version, folder);
        let item = collection
            .fetch_item_by_name(&name)
            .map_err(|source| CollectionErrorKind::FetchingItemFailed {
                name: name.clone(),
                path: path.to_string(),
                source,
            })?;
        Ok(Metadata::from_slice(&name, &item.data)?)
    }

    /// Resolve the folder `<drive root>/<location>/<folders>`, creating missing folders.
    fn create_restore_folders(
        &mut self,
        handler: &dyn DriveRestoreHandler,
        drive_path: &DrivePath,
    ) -> RestoreResult<String> {
        let drive_id = &drive_path.drive_id;
        let mut restore_folders = Vec::with_capacity(drive_path.folders.len() + 1);
        if !self.opts.location.is_empty() {
            restore_folders.push(self.opts.location.clone());
        }
        restore_folders.extend(drive_path.folders.iter().cloned());

        if let Some(id) = self.caches.folder_id(drive_id, &restore_folders) {
            return Ok(id.to_string());
        }

        let mut parent_id = match self.caches.folder_id(drive_id, &[]) {
            Some(id) => id.to_string(),
            None => {
                let root = handler
                    .get_root_folder(drive_id)
                    .map_err(RestoreError::remote)?;
                self.caches.set_folder_id(drive_id, Vec::new(), root.id.clone());
                root.id
            }
        };

        for depth in 1..=restore_folders.len() {
            let sub_path = &restore_folders[..depth];
            if let Some(id) = self.caches.folder_id(drive_id, sub_path) {
                parent_id = id.to_string();
                continue;
            }

            let name = &restore_folders[depth - 1];
            let folder = match handler
                .get_folder_by_name(drive_id, &parent_id, name)
                .map_err(RestoreError::remote)?
            {
                Some(folder) => folder,
                None => {
                    debug!("creating folder {name} in {parent_id}");
                    handler
                        .post_folder(drive_id, &parent_id, name)
                        .map_err(RestoreError::remote)?
                }
            };

            self.caches
                .set_folder_id(drive_id, sub_path.to_vec(), folder.id.clone());
            parent_id = folder.id;
        }

        Ok(parent_id)
    }

    /// Restore one entry of a drive collection.
    fn restore_drive_entry(
        &mut self,
        handler: &dyn DriveRestoreHandler,
        collection: &dyn RestoreCollection,
        drive_path: &DrivePath,
        folder_id: &str,
        entry: RestoreItem,
        metrics: &mut CollectionMetrics,
    ) -> RestoreResult<()> {
        let path = collection.full_path();

        let item = if version::has_meta_files(self.backup_version) {
            if let Some(folder) = entry.id.strip_suffix(DIR_META_FILE_SUFFIX) {
                if !version::has_dir_meta_in_collection(self.backup_version)
                    && self.opts.restore_permissions
                {
                    let meta = Metadata::from_slice(&entry.id, &entry.data)?;
                    let folder_path = path.append(folder)?;
                    trace!("found metadata of folder {folder_path}");
                    self.caches.set_parent_dir_meta(folder_path.to_string(), meta);
                }
                return Ok(());
            }
            if entry.id.ends_with(META_FILE_SUFFIX) {
                // read together with the data file
                return Ok(());
            }
            let Some(trimmed) = entry.id.strip_suffix(DATA_FILE_SUFFIX) else {
                warn!("skipping unexpected entry {} in {path}", entry.id);
                return Ok(());
            };

            let meta = self.item_metadata(collection, trimmed)?;
            let name = if version::has_name_in_meta(self.backup_version) {
                meta.file_name.clone()
            } else {
                trimmed.to_string()
            };
            DriveItem {
                name,
                meta,
                entry: entry.id,
                data: entry.data,
            }
        } else {
            DriveItem {
                name: entry.id.clone(),
                meta: Metadata::default(),
                entry: entry.id,
                data: entry.data,
            }
        };

        metrics.objects += 1;
        let size = item.data.len() as u64;
        let drive_id = drive_path.drive_id.as_str();
        let policy = self.opts.on_collision;

        let keys = self.caches.collision_keys(folder_id, || {
            handler.collision_keys(drive_id, folder_id)
        })?;
        let updated = policy == CollisionPolicy::Replace && keys.contains_key(&item.name);

        let res = restore_with_collision_policy(
            policy,
            &item.name,
            keys,
            || handler.post_item(drive_id, folder_id, &item.name, item.data.clone(), policy),
            |old_id| handler.delete_item(drive_id, old_id),
        );
        let (item_id, replaced) = match res {
            Ok(id) => (id, updated),
            Err(err) => {
                let Some(id) = err.created_item_id().map(ToString::to_string) else {
                    return Err(err);
                };
                self.add_fault(err);
                (id, false)
            }
        };

        // the replacing item was stored under a new name next to the one it replaces
        if replaced {
            if let Err(err) = handler.rename_item(drive_id, &item_id, &item.name) {
                self.add_fault(RestoreError::remote(err));
            }
        }

        metrics.add_success(size);
        let entry = DetailsEntry {
            repo_ref: item_ref(path, &item.entry),
            location_ref: self.restore_location(drive_path),
            category: path.category(),
            name: item.name.clone(),
            size,
            updated,
        };
        details::record(self.details, entry);

        if self.opts.restore_permissions && version::has_meta_files(self.backup_version) {
            let item_path = path.append(&item.name).or_else(|_| path.append(&item.entry))?;
            restore_permissions(
                handler,
                drive_id,
                &item_id,
                &item_path,
                &item.meta,
                &mut self.caches,
            )?;
        }

        Ok(())
    }

    /// Read the metadata file belonging to the data file `<name>.data`.
    fn item_metadata(
        &self,
        collection: &dyn RestoreCollection,
        name: &str,
    ) -> RestoreResult<Metadata> {
        if !self.opts.restore_permissions && !version::has_name_in_meta(self.backup_version) {
            return Ok(Metadata::default());
        }

        let meta_name = format!("{name}{META_FILE_SUFFIX}");
        let meta_item = collection.fetch_item_by_name(&meta_name).map_err(|source| {
            CollectionErrorKind::FetchingItemFailed {
                name: meta_name.clone(),
                path: collection.full_path().to_string(),
                source,
            }
        })?;
        Ok(Metadata::from_slice(&meta_name, &meta_item.data)?)
    }

    /// The human readable restore location of a drive folder.
    fn restore_location(&self, drive_path: &DrivePath) -> String {
        iter::once(self.opts.location.as_str())
            .filter(|location| !location.is_empty())
            .chain(drive_path.folders.iter().map(String::as_str))
            .join("/")
    }
}

fn item_ref(path: &RestorePath, entry: &str) -> String {
    format!("{path}/{entry}")
}
