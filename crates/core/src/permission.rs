//! Sharing permissions of drive items and folders.
//!
//! Contains the stored [`Permission`] and [`Metadata`] records, the permission equality and the
//! diff used to compute which permissions must be added to or removed from a restored item.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde_derive::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::{
    remote::{Identity, RemotePermission},
    version,
};

/// [`PermissionErrorKind`] describes the errors that can happen while restoring permissions
#[derive(thiserror::Error, Debug, displaydoc::Display)]
#[non_exhaustive]
pub enum PermissionErrorKind {
    /// no metadata found for parent folder: `{0}`
    MissingParentMetadata(String),
    /// no new permission id for removed permission `{0}`
    NoNewPermissionId(String),
    /// deserializing metadata `{name}` failed: `{source}`
    DecodingMetadataFailed {
        /// name of the metadata file
        name: String,
        /// the underlying error
        source: serde_json::Error,
    },
    /// remote returned no id for the created permission on item `{0}`
    NoPermissionIdReturned(String),
}

pub(crate) type PermissionResult<T> = Result<T, PermissionErrorKind>;

/// Suffix of the file holding the content of a drive item
pub const DATA_FILE_SUFFIX: &str = ".data";
/// Suffix of the file holding the [`Metadata`] of a drive item
pub const META_FILE_SUFFIX: &str = ".meta";
/// Suffix of the file holding the [`Metadata`] of a directory
pub const DIR_META_FILE_SUFFIX: &str = ".dirmeta";

/// The role which can't be granted when restoring
pub const OWNER_ROLE: &str = "owner";

/// The name of the directory metadata file within the collection of `folder_name`.
///
/// Up to [`version::ONE_DRIVE_5_DIR_META_NO_NAME`] the file was named `<folder name>.dirmeta`,
/// afterwards it is just `.dirmeta`.
#[must_use]
pub fn dir_meta_name(backup_version: u32, folder_name: &str) -> String {
    if backup_version >= version::ONE_DRIVE_5_DIR_META_NO_NAME {
        DIR_META_FILE_SUFFIX.to_string()
    } else {
        format!("{folder_name}{DIR_META_FILE_SUFFIX}")
    }
}

/// Whether the permissions of an item are inherited from its parent or set explicitly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SharingMode {
    /// The item has its own set of permissions
    #[default]
    Custom,
    /// The item uses the permissions of its parent
    Inherited,
}

impl TryFrom<u8> for SharingMode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Custom),
            1 => Ok(Self::Inherited),
            _ => Err(format!("invalid sharing mode {value}")),
        }
    }
}

impl From<SharingMode> for u8 {
    fn from(mode: SharingMode) -> Self {
        match mode {
            SharingMode::Custom => 0,
            SharingMode::Inherited => 1,
        }
    }
}

/// The kind of principal a permission is granted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityType {
    /// An application
    Application,
    /// A device
    Device,
    /// A group
    Group,
    /// A user of a site
    SiteUser,
    /// A group of a site
    SiteGroup,
    /// A user
    User,
}

/// A permission granted on an item to one principal.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Permission {
    /// The id assigned by the source system. May be empty in legacy data.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// The granted roles, e.g. "read", "write", "owner"
    #[serde(rename = "role", skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    /// Email of the principal. Only used in legacy backups, replaced by `entity_id`.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub email: String,
    /// Id of the principal
    #[serde(rename = "entityId", skip_serializing_if = "String::is_empty")]
    pub entity_id: String,
    /// The kind of the principal
    #[serde(rename = "entityType")]
    pub entity_type: Option<EntityType>,
    /// When the permission expires
    pub expiration: Option<DateTime<Utc>>,
}

impl Permission {
    /// Whether the permission names its principal by entity id or email.
    #[must_use]
    pub fn has_identity(&self) -> bool {
        !self.entity_id.is_empty() || !self.email.is_empty()
    }

    /// Compare two permissions.
    ///
    /// Identifiers are only compared where both sides have them: the entity id is ignored if it
    /// is empty on either side, so is the email. At least one identifier must be compared and
    /// match, so permissions without any identifier never equal anything. The roles are compared
    /// as sets.
    ///
    /// Note that this is not transitive when identifiers are missing: a permission with only an
    /// email may equal both a permission with only an entity id and one with both.
    #[must_use]
    pub fn equals(&self, other: &Self) -> bool {
        let mut compared = false;

        for (left, right) in [
            (&self.entity_id, &other.entity_id),
            (&self.email, &other.email),
        ] {
            if left.is_empty() || right.is_empty() {
                continue;
            }
            if left != right {
                return false;
            }
            compared = true;
        }

        if !compared {
            return false;
        }

        let roles: BTreeSet<_> = self.roles.iter().collect();
        let other_roles: BTreeSet<_> = other.roles.iter().collect();
        roles == other_roles
    }

    /// The roles which can be granted when restoring; `owner` can't be.
    #[must_use]
    pub fn restorable_roles(&self) -> Vec<String> {
        self.roles
            .iter()
            .filter(|role| *role != OWNER_ROLE)
            .cloned()
            .collect()
    }
}

/// Sharing metadata of a drive item or folder.
///
/// For folders this is computed once per restore when the folder is visited and read-only
/// afterwards.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    /// The file name of the item; only set for items since backup format 6
    #[serde(rename = "filename", skip_serializing_if = "String::is_empty")]
    pub file_name: String,
    /// Whether permissions are inherited or custom
    #[serde(rename = "permissionMode")]
    pub sharing_mode: SharingMode,
    /// The permissions of the item
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<Permission>,
}

impl Metadata {
    /// Create custom [`Metadata`] with the given permissions.
    #[must_use]
    pub fn custom(permissions: Vec<Permission>) -> Self {
        Self {
            file_name: String::new(),
            sharing_mode: SharingMode::Custom,
            permissions,
        }
    }

    /// Create [`Metadata`] inheriting the permissions of the parent.
    #[must_use]
    pub fn inherited() -> Self {
        Self {
            sharing_mode: SharingMode::Inherited,
            ..Self::default()
        }
    }

    /// Deserialize [`Metadata`] from the content of a metadata file.
    ///
    /// # Errors
    ///
    /// * [`PermissionErrorKind::DecodingMetadataFailed`] - If the content is no valid metadata
    pub fn from_slice(name: &str, data: &[u8]) -> PermissionResult<Self> {
        serde_json::from_slice(data).map_err(|source| PermissionErrorKind::DecodingMetadataFailed {
            name: name.to_string(),
            source,
        })
    }
}

/// The record stored in the `.meta` file of a drive item
pub type ItemMeta = Metadata;

/// Compare the `before` and `after` set and return the permissions which were
/// added and removed (in that order) in the `after` set.
///
/// Both results keep the order of their source.
#[must_use]
pub fn diff_permissions(
    before: &[Permission],
    after: &[Permission],
) -> (Vec<Permission>, Vec<Permission>) {
    let added = after
        .iter()
        .filter(|cp| !before.iter().any(|pp| cp.equals(pp)))
        .cloned()
        .collect();

    let removed = before
        .iter()
        .filter(|pp| !after.iter().any(|cp| cp.equals(pp)))
        .cloned()
        .collect();

    (added, removed)
}

/// Translate the permissions read from the remote into [`Permission`]s.
///
/// Entries without a principal (e.g. link shares) are skipped, so are entries whose principal
/// has no id. The principal kind is classified in the order user, site user, group, site group,
/// application, device.
#[must_use]
pub fn filter_permissions(perms: &[RemotePermission]) -> Vec<Permission> {
    perms
        .iter()
        .filter_map(|p| {
            // link shares come without a principal
            let Some(granted) = &p.granted_to else {
                debug!("skipping permission {:?} without principal", p.id);
                return None;
            };

            let classified = [
                (EntityType::User, &granted.user),
                (EntityType::SiteUser, &granted.site_user),
                (EntityType::Group, &granted.group),
                (EntityType::SiteGroup, &granted.site_group),
                (EntityType::Application, &granted.application),
                (EntityType::Device, &granted.device),
            ]
            .into_iter()
            .find_map(|(tpe, identity)| identity.as_ref().map(|identity| (tpe, identity)));

            let Some((entity_type, Identity { id: Some(entity_id), .. })) = classified else {
                info!("untracked permission {:?}", p.id);
                return None;
            };

            if entity_id.is_empty() {
                info!("untracked permission {:?}", p.id);
                return None;
            }

            Some(Permission {
                id: p.id.clone().unwrap_or_default(),
                roles: p.roles.clone(),
                email: String::new(),
                entity_id: entity_id.clone(),
                entity_type: Some(entity_type),
                expiration: p.expiration,
            })
        })
        .collect()
}
