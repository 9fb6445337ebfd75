//! Backup format versions.
//!
//! Labels refer to the version in which a behavior relevant for restoring changed. They don't
//! need to map 1:1 to services.

/// The backup format version written by current backups.
pub const BACKUP: u32 = 8;

/// Drive items are stored as a data file plus a metadata file instead of just the data.
pub const ONE_DRIVE_1_DATA_AND_META_FILES: u32 = 1;

/// Metadata files carry a marker telling them apart from data files.
pub const ONE_DRIVE_3_IS_META_MARKER: u32 = 3;

/// Each directory stores its own permissions in a directory metadata file within its collection.
///
/// Before, the metadata of a directory was stored as `<name>.dirmeta` in the parent collection.
pub const ONE_DRIVE_4_DIR_INCLUDES_PERMISSIONS: u32 = 4;

/// The directory metadata file is named by the suffix only, not `<folder name><suffix>`.
pub const ONE_DRIVE_5_DIR_META_NO_NAME: u32 = 5;

/// Drive items are stored with their item id and the file name lives in the metadata file.
pub const ONE_DRIVE_6_NAME_IN_META: u32 = 6;

/// Collections carry a location reference besides the storage path.
pub const ONE_DRIVE_7_LOCATION_REF: u32 = 7;

/// Whether a backup of the given version stores metadata files next to drive items.
#[must_use]
pub const fn has_meta_files(version: u32) -> bool {
    version >= ONE_DRIVE_1_DATA_AND_META_FILES
}

/// Whether a backup of the given version stores directory metadata within the directory's own collection.
#[must_use]
pub const fn has_dir_meta_in_collection(version: u32) -> bool {
    version >= ONE_DRIVE_4_DIR_INCLUDES_PERMISSIONS
}

/// Whether the file name of drive items is only available in the metadata file.
#[must_use]
pub const fn has_name_in_meta(version: u32) -> bool {
    version >= ONE_DRIVE_6_NAME_IN_META
}
