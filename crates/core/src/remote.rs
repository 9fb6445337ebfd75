//! Traits of the remote collaborators used for restoring.
//!
//! The restorer only talks to the remote service through these traits. Every call returns an
//! [`anyhow::Result`]; the restorer does not interpret the errors, it treats any error as a
//! failure of the item or operation. Retrying is the business of the implementations.

use std::collections::HashMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde_derive::{Deserialize, Serialize};
use serde_json::Value;

use crate::{collision::CollisionPolicy, item::RestorableItem};

#[cfg(test)]
use mockall::mock;

/// A principal as returned by the remote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Identity {
    /// The id of the principal
    pub id: Option<String>,
    /// The display name of the principal
    pub display_name: Option<String>,
}

/// The principals a permission is granted to.
///
/// At most one of the fields is expected to be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IdentitySet {
    /// A user of the tenant
    pub user: Option<Identity>,
    /// A user of a site
    pub site_user: Option<Identity>,
    /// A group of the tenant
    pub group: Option<Identity>,
    /// A group of a site
    pub site_group: Option<Identity>,
    /// An application
    pub application: Option<Identity>,
    /// A device
    pub device: Option<Identity>,
}

/// A permission entry as returned by the remote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RemotePermission {
    /// The remote id of the permission
    pub id: Option<String>,
    /// The granted roles
    pub roles: Vec<String>,
    /// The principal; `None` for link shares
    #[serde(rename = "grantedToV2")]
    pub granted_to: Option<IdentitySet>,
    /// When the permission expires
    #[serde(rename = "expirationDateTime")]
    pub expiration: Option<DateTime<Utc>>,
}

/// The principal an invite is sent to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// A principal given by its object id
    ObjectId(String),
    /// A principal given by its email, used by legacy backups
    Email(String),
}

/// A request to grant a permission on an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionInvite {
    /// The roles to grant; never contains `owner`
    pub roles: Vec<String>,
    /// The principal to grant the roles to
    pub recipient: Recipient,
    /// When the permission expires
    pub expiration: Option<DateTime<Utc>>,
}

/// Capability interface of the containers items are restored into.
pub trait Container {
    /// The remote id
    fn id(&self) -> &str;
    /// The display name
    fn display_name(&self) -> &str;
    /// The id of the parent container, if there is one
    fn parent_id(&self) -> Option<&str>;
}

macro_rules! impl_container {
    ($tpe:ty, $name:ident, $parent:ident) => {
        impl Container for $tpe {
            fn id(&self) -> &str {
                &self.id
            }
            fn display_name(&self) -> &str {
                &self.$name
            }
            fn parent_id(&self) -> Option<&str> {
                self.$parent.as_deref()
            }
        }
    };
}

/// A folder in a drive
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriveFolder {
    /// The remote id
    pub id: String,
    /// The folder name
    pub name: String,
    /// The id of the parent folder; `None` for the drive root
    pub parent_id: Option<String>,
}
impl_container!(DriveFolder, name, parent_id);

/// A contact folder of a mailbox
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactFolder {
    /// The remote id
    pub id: String,
    /// The folder name
    pub display_name: String,
    /// The id of the parent folder
    pub parent_folder_id: Option<String>,
}
impl_container!(ContactFolder, display_name, parent_folder_id);

/// A calendar of a mailbox
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Calendar {
    /// The remote id
    pub id: String,
    /// The calendar name
    pub name: String,
    /// Calendars may belong to a calendar group
    pub group_id: Option<String>,
}
impl_container!(Calendar, name, group_id);

/// A site, holding lists and pages
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Site {
    /// The remote id
    pub id: String,
    /// The site name
    pub display_name: String,
    /// The id of the parent site, for subsites
    pub parent_site_id: Option<String>,
}
impl_container!(Site, display_name, parent_site_id);

/// Mutation of the sharing permissions of drive items.
pub trait PermissionUpdater: Send + Sync {
    /// Grant a permission on an item and return the id of the created permission.
    ///
    /// # Errors
    ///
    /// If the remote call failed.
    fn post_item_permission_update(
        &self,
        drive_id: &str,
        item_id: &str,
        invite: &PermissionInvite,
    ) -> anyhow::Result<Option<String>>;

    /// Remove a permission from an item.
    ///
    /// # Errors
    ///
    /// If the remote call failed.
    fn delete_item_permission(
        &self,
        drive_id: &str,
        item_id: &str,
        permission_id: &str,
    ) -> anyhow::Result<()>;
}

/// Remote operations needed to restore drive collections.
pub trait DriveRestoreHandler: PermissionUpdater {
    /// Get the root folder of a drive.
    ///
    /// # Errors
    ///
    /// If the remote call failed.
    fn get_root_folder(&self, drive_id: &str) -> anyhow::Result<DriveFolder>;

    /// Look up a direct child folder by name.
    ///
    /// # Errors
    ///
    /// If the remote call failed. A missing folder is no error.
    fn get_folder_by_name(
        &self,
        drive_id: &str,
        parent_folder_id: &str,
        name: &str,
    ) -> anyhow::Result<Option<DriveFolder>>;

    /// Create a folder.
    ///
    /// # Errors
    ///
    /// If the remote call failed.
    fn post_folder(
        &self,
        drive_id: &str,
        parent_folder_id: &str,
        name: &str,
    ) -> anyhow::Result<DriveFolder>;

    /// The collision keys (file names) of the items in a folder, mapped to the item ids.
    ///
    /// # Errors
    ///
    /// If the remote call failed.
    fn collision_keys(
        &self,
        drive_id: &str,
        folder_id: &str,
    ) -> anyhow::Result<HashMap<String, String>>;

    /// Upload an item and return its id.
    ///
    /// `on_collision` tells how a name conflict within the folder has to be handled; with
    /// [`CollisionPolicy::Copy`] and [`CollisionPolicy::Replace`] the remote is expected to
    /// store the item under a new name. A replacing item gets the original name back with
    /// [`DriveRestoreHandler::rename_item`] once the replaced item is deleted.
    ///
    /// # Errors
    ///
    /// If the remote call failed.
    fn post_item(
        &self,
        drive_id: &str,
        folder_id: &str,
        name: &str,
        data: Bytes,
        on_collision: CollisionPolicy,
    ) -> anyhow::Result<String>;

    /// Delete an item.
    ///
    /// # Errors
    ///
    /// If the remote call failed.
    fn delete_item(&self, drive_id: &str, item_id: &str) -> anyhow::Result<()>;

    /// Rename an item within its folder.
    ///
    /// # Errors
    ///
    /// If the remote call failed.
    fn rename_item(&self, drive_id: &str, item_id: &str, name: &str) -> anyhow::Result<()>;
}

/// Remote operations needed to restore items of kind `T` into containers.
///
/// Containers are referred to by their id, which is resolved once per restore operation by
/// [`ItemRestoreHandler::get_or_create_container`].
pub trait ItemRestoreHandler<T: RestorableItem>: Send + Sync {
    /// Resolve the container named `name` of `resource_owner`, creating it if needed.
    ///
    /// Containers which can't be created, like the site lists and pages live in, are just
    /// resolved.
    ///
    /// # Errors
    ///
    /// If the remote call failed.
    fn get_or_create_container(
        &self,
        resource_owner: &str,
        name: &str,
    ) -> anyhow::Result<T::Container>;

    /// The collision keys of the items within the container, mapped to the item ids.
    ///
    /// # Errors
    ///
    /// If the remote call failed.
    fn collision_keys(&self, container_id: &str) -> anyhow::Result<HashMap<String, String>>;

    /// Create an item and return its id.
    ///
    /// # Errors
    ///
    /// If the remote call failed.
    fn post_item(&self, container_id: &str, item: &T) -> anyhow::Result<String>;

    /// Create the children of an item, e.g. the items of a list.
    ///
    /// # Errors
    ///
    /// If the remote call failed. The default implementation fails if there are children, as
    /// it has no way to store them.
    fn post_children(
        &self,
        _container_id: &str,
        item_id: &str,
        children: Vec<Value>,
    ) -> anyhow::Result<()> {
        if children.is_empty() {
            return Ok(());
        }
        anyhow::bail!(
            "{} children of {} item {item_id} can't be restored",
            children.len(),
            T::KIND
        )
    }

    /// Delete an item.
    ///
    /// # Errors
    ///
    /// If the remote call failed.
    fn delete_item(&self, container_id: &str, item_id: &str) -> anyhow::Result<()>;
}

#[cfg(test)]
mock! {
    pub DriveHandler {}

    impl PermissionUpdater for DriveHandler {
        fn post_item_permission_update(
            &self,
            drive_id: &str,
            item_id: &str,
            invite: &PermissionInvite,
        ) -> anyhow::Result<Option<String>>;
        fn delete_item_permission(
            &self,
            drive_id: &str,
            item_id: &str,
            permission_id: &str,
        ) -> anyhow::Result<()>;
    }

    impl DriveRestoreHandler for DriveHandler {
        fn get_root_folder(&self, drive_id: &str) -> anyhow::Result<DriveFolder>;
        fn get_folder_by_name(
            &self,
            drive_id: &str,
            parent_folder_id: &str,
            name: &str,
        ) -> anyhow::Result<Option<DriveFolder>>;
        fn post_folder(
            &self,
            drive_id: &str,
            parent_folder_id: &str,
            name: &str,
        ) -> anyhow::Result<DriveFolder>;
        fn collision_keys(
            &self,
            drive_id: &str,
            folder_id: &str,
        ) -> anyhow::Result<HashMap<String, String>>;
        fn post_item(
            &self,
            drive_id: &str,
            folder_id: &str,
            name: &str,
            data: Bytes,
            on_collision: CollisionPolicy,
        ) -> anyhow::Result<String>;
        fn delete_item(&self, drive_id: &str, item_id: &str) -> anyhow::Result<()>;
        fn rename_item(&self, drive_id: &str, item_id: &str, name: &str) -> anyhow::Result<()>;
    }
}
