//! Handling of items which already exist at the restore destination.

use std::collections::HashMap;

use log::{debug, trace};
use serde_derive::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{RestoreError, RestoreResult};

/// [`CollisionErrorKind`] describes the errors that can happen while resolving collisions
#[derive(thiserror::Error, Debug, displaydoc::Display)]
#[non_exhaustive]
pub enum CollisionErrorKind {
    /// item with key `{key}` already exists at the destination
    ItemAlreadyExists {
        /// the collision key of the item
        key: String,
    },
    /// item `{new_id}` was restored, but deleting the replaced item `{old_id}` failed: `{source}`
    DeletingReplacedItemFailed {
        /// id of the restored item
        new_id: String,
        /// id of the item which should have been replaced
        old_id: String,
        /// the error returned by the remote
        source: anyhow::Error,
    },
}

/// What to do when an item to restore already exists at the destination.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Keep the existing item, don't restore
    #[default]
    Skip,
    /// Restore the item next to the existing one
    Copy,
    /// Restore the item, then delete the existing one
    Replace,
}

/// Restore one item, honoring the collision policy.
///
/// `collision_keys` maps the collision keys of the items existing in the destination container
/// to their ids; it is updated with the id of the created item.
///
/// * No entry for `key`: the item is created.
/// * [`CollisionPolicy::Skip`]: nothing is created, an [`CollisionErrorKind::ItemAlreadyExists`]
///   error is returned.
/// * [`CollisionPolicy::Copy`]: the item is created next to the existing one.
/// * [`CollisionPolicy::Replace`]: the item is created, then the existing one is deleted. There is
///   no rollback of the creation if the deletion fails.
///
/// # Arguments
///
/// * `policy` - The collision policy
/// * `key` - The collision key of the item
/// * `collision_keys` - The keys of the existing items
/// * `create` - Creates the item and returns its id
/// * `delete` - Deletes the item with the given id
///
/// # Errors
///
/// * [`CollisionErrorKind::ItemAlreadyExists`] - If the item exists and the policy is to skip it
/// * [`CollisionErrorKind::DeletingReplacedItemFailed`] - If the item was restored but the
///   replaced item could not be deleted
/// * [`RestoreErrorKind::Remote`] - If creating the item failed
///
/// # Returns
///
/// The id of the created item.
///
/// [`RestoreErrorKind::Remote`]: crate::error::RestoreErrorKind::Remote
pub fn restore_with_collision_policy<C, D>(
    policy: CollisionPolicy,
    key: &str,
    collision_keys: &mut HashMap<String, String>,
    create: C,
    delete: D,
) -> RestoreResult<String>
where
    C: FnOnce() -> anyhow::Result<String>,
    D: FnOnce(&str) -> anyhow::Result<()>,
{
    if collision_keys.contains_key(key) && policy == CollisionPolicy::Skip {
        debug!("skipping item with key {key}: already exists");
        return Err(CollisionErrorKind::ItemAlreadyExists {
            key: key.to_string(),
        }
        .into());
    }

    let new_id = create().map_err(RestoreError::remote)?;
    trace!("created item {new_id} for key {key}");
    let replaced = collision_keys.insert(key.to_string(), new_id.clone());

    if let (CollisionPolicy::Replace, Some(old_id)) = (policy, replaced) {
        debug!("replacing item {old_id} with {new_id}");
        delete(&old_id).map_err(|source| CollisionErrorKind::DeletingReplacedItemFailed {
            new_id: new_id.clone(),
            old_id,
            source,
        })?;
    }

    Ok(new_id)
}
