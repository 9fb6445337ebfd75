//! Restoring the sharing permissions of drive items and folders.
//!
//! Restored items inherit the permissions of their parent folder. The permissions to set are
//! computed as the difference between what an item would inherit and what it had at backup
//! time.

use std::collections::HashMap;

use log::{debug, trace, warn};

use crate::{
    cache::RestoreCaches,
    error::{RestoreError, RestoreResult},
    path::RestorePath,
    permission::{
        EntityType, Metadata, Permission, PermissionErrorKind, SharingMode, diff_permissions,
    },
    remote::{PermissionInvite, PermissionUpdater, Recipient},
};

/// Compute the permissions the item at `item_path` inherits.
///
/// Walks up the folders of the item until the first one with custom permissions. The metadata
/// of all folders on the way must be cached, which holds if parents are restored before their
/// children.
///
/// # Errors
///
/// * [`PermissionErrorKind::MissingParentMetadata`] - If a folder on the way has not been visited
/// * [`PathErrorKind`] - If the path is no drive path
///
/// # Returns
///
/// The metadata of the nearest folder with custom permissions, or empty metadata if there is
/// none below the drive root.
///
/// [`PathErrorKind`]: crate::path::PathErrorKind
pub fn compute_parent_permissions(
    item_path: &RestorePath,
    caches: &RestoreCaches,
) -> RestoreResult<Metadata> {
    let mut parent = item_path.clone();

    loop {
        parent = parent.dir()?;

        if parent.to_drive_path()?.is_root() {
            return Ok(Metadata::default());
        }

        let parent_str = parent.to_string();
        let Some(meta) = caches.parent_dir_meta(&parent_str) else {
            return Err(PermissionErrorKind::MissingParentMetadata(parent_str).into());
        };

        if meta.sharing_mode == SharingMode::Custom {
            trace!("{item_path} inherits the permissions of {parent_str}");
            return Ok(meta.clone());
        }
    }
}

/// Bring the permissions of an item to the desired state.
///
/// First the `removed` permissions are deleted, then the `added` ones are created. Removed
/// permissions are referenced by the ids they got when they were restored for a parent folder,
/// taken from `perm_ids`; created permissions are recorded there.
///
/// Added permissions are skipped if they have no identity, no role but `owner`, or are granted
/// to a site group.
///
/// # Errors
///
/// * [`PermissionErrorKind::NoNewPermissionId`] - If a removed permission was not restored before
/// * [`PermissionErrorKind::NoPermissionIdReturned`] - If the remote returned no permission id
/// * [`RestoreErrorKind::Remote`] - If a remote call failed
///
/// [`RestoreErrorKind::Remote`]: crate::error::RestoreErrorKind::Remote
pub fn update_permissions<U: PermissionUpdater + ?Sized>(
    updater: &U,
    drive_id: &str,
    item_id: &str,
    added: &[Permission],
    removed: &[Permission],
    perm_ids: &mut HashMap<String, String>,
) -> RestoreResult<()> {
    // removes must come first: an added permission may replace a removed one for the same
    // principal
    for perm in removed {
        let Some(new_id) = perm_ids.get(&perm.id) else {
            return Err(PermissionErrorKind::NoNewPermissionId(perm.id.clone()).into());
        };
        debug!("removing permission {new_id} from {item_id}");
        updater
            .delete_item_permission(drive_id, item_id, new_id)
            .map_err(RestoreError::remote)?;
    }

    for perm in added {
        let roles = perm.restorable_roles();
        if roles.is_empty() || perm.entity_type == Some(EntityType::SiteGroup) {
            debug!(
                "skipping permission {} with roles {:?} for {:?}",
                perm.id, perm.roles, perm.entity_type
            );
            continue;
        }

        if !perm.has_identity() {
            warn!("skipping permission {} without principal", perm.id);
            continue;
        }
        let recipient = if perm.entity_id.is_empty() {
            Recipient::Email(perm.email.clone())
        } else {
            Recipient::ObjectId(perm.entity_id.clone())
        };

        let invite = PermissionInvite {
            roles,
            recipient,
            expiration: perm.expiration,
        };

        debug!("adding permission {} to {item_id}", perm.id);
        let new_id = updater
            .post_item_permission_update(drive_id, item_id, &invite)
            .map_err(RestoreError::remote)?
            .ok_or_else(|| PermissionErrorKind::NoPermissionIdReturned(item_id.to_string()))?;
        _ = perm_ids.insert(perm.id.clone(), new_id);
    }

    Ok(())
}

/// Restore the permissions of an item or folder.
///
/// Items which inherit their permissions need no change. Otherwise the permissions are diffed
/// against those inherited from the parent folders and updated accordingly.
///
/// # Errors
///
/// See [`compute_parent_permissions`] and [`update_permissions`].
pub fn restore_permissions<U: PermissionUpdater + ?Sized>(
    updater: &U,
    drive_id: &str,
    item_id: &str,
    item_path: &RestorePath,
    current: &Metadata,
    caches: &mut RestoreCaches,
) -> RestoreResult<()> {
    if current.sharing_mode == SharingMode::Inherited {
        return Ok(());
    }

    let parents = compute_parent_permissions(item_path, caches)?;
    let (added, removed) = diff_permissions(&parents.permissions, &current.permissions);

    update_permissions(
        updater,
        drive_id,
        item_id,
        &added,
        &removed,
        caches.permission_ids_mut(),
    )
}

#[cfg(test)]
mod tests {
    use mockall::{Sequence, predicate::eq};
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    use super::*;
    use crate::remote::MockDriveHandler;

    const DRIVE: &str = "t/onedrive/u/files/drives/d/root:";

    fn path(folders: &str) -> RestorePath {
        format!("{DRIVE}{folders}").parse().unwrap()
    }

    fn perm(id: &str, entity_id: &str, roles: &[&str]) -> Permission {
        Permission {
            id: id.to_string(),
            roles: roles.iter().map(ToString::to_string).collect(),
            entity_id: entity_id.to_string(),
            entity_type: Some(EntityType::User),
            ..Permission::default()
        }
    }

    /// a (custom) / b (inherited) / c (inherited)
    #[fixture]
    fn caches() -> RestoreCaches {
        let mut caches = RestoreCaches::new();
        caches.set_parent_dir_meta(
            path("/a").to_string(),
            Metadata::custom(vec![perm("p1", "u1", &["read"])]),
        );
        caches.set_parent_dir_meta(path("/a/b").to_string(), Metadata::inherited());
        caches.set_parent_dir_meta(path("/a/b/c").to_string(), Metadata::inherited());
        caches
    }

    #[rstest]
    fn parent_at_root_is_empty(caches: RestoreCaches) {
        let meta = compute_parent_permissions(&path("/file"), &caches).unwrap();
        assert_eq!(meta, Metadata::default());
    }

    #[rstest]
    #[case("/a/file")]
    #[case("/a/b/file")]
    #[case("/a/b/c/file")]
    #[case("/a/b")]
    fn nearest_custom_parent(caches: RestoreCaches, #[case] item: &str) {
        let meta = compute_parent_permissions(&path(item), &caches).unwrap();
        assert_eq!(meta.permissions, vec![perm("p1", "u1", &["read"])]);
    }

    #[rstest]
    fn missing_parent_metadata(caches: RestoreCaches) {
        let err = compute_parent_permissions(&path("/a/x/y/file"), &caches).unwrap_err();
        assert!(err.is_missing_precondition());
        assert!(err.to_string().ends_with("root:/a/x/y`"));
    }

    #[test]
    fn removes_before_adds() {
        let mut seq = Sequence::new();
        let mut handler = MockDriveHandler::new();
        _ = handler
            .expect_delete_item_permission()
            .with(eq("d"), eq("item"), eq("new-p1"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));
        _ = handler
            .expect_post_item_permission_update()
            .withf(|_, _, invite| {
                invite.roles == ["write"] && invite.recipient == Recipient::ObjectId("u2".into())
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(Some("new-p2".to_string())));

        let mut ids = HashMap::from([("p1".to_string(), "new-p1".to_string())]);
        update_permissions(
            &handler,
            "d",
            "item",
            &[perm("p2", "u2", &["write", "owner"])],
            &[perm("p1", "u1", &["read"])],
            &mut ids,
        )
        .unwrap();

        assert_eq!(ids["p2"], "new-p2");
    }

    #[rstest]
    #[case(perm("p", "u1", &["owner"]))]
    #[case(Permission { entity_type: Some(EntityType::SiteGroup), ..perm("p", "4", &["read"]) })]
    #[case(perm("p", "", &["read"]))]
    fn skipped_additions(#[case] added: Permission) {
        let handler = MockDriveHandler::new();
        let mut ids = HashMap::new();

        update_permissions(&handler, "d", "item", &[added], &[], &mut ids).unwrap();
        assert!(ids.is_empty());
    }

    #[test]
    fn legacy_permission_invites_email() {
        let mut handler = MockDriveHandler::new();
        _ = handler
            .expect_post_item_permission_update()
            .withf(|_, _, invite| invite.recipient == Recipient::Email("a@b.c".into()))
            .times(1)
            .returning(|_, _, _| Ok(Some("new".to_string())));

        let legacy = Permission {
            email: "a@b.c".to_string(),
            ..perm("p", "", &["read"])
        };
        let mut ids = HashMap::new();
        update_permissions(&handler, "d", "item", &[legacy], &[], &mut ids).unwrap();
        assert_eq!(ids["p"], "new");
    }

    #[test]
    fn removal_without_new_id_fails() {
        let handler = MockDriveHandler::new();
        let err = update_permissions(
            &handler,
            "d",
            "item",
            &[],
            &[perm("p1", "u1", &["read"])],
            &mut HashMap::new(),
        )
        .unwrap_err();
        assert!(matches!(
            err.kind(),
            crate::error::RestoreErrorKind::Permission(PermissionErrorKind::NoNewPermissionId(_))
        ));
    }

    #[test]
    fn missing_returned_id_fails() {
        let mut handler = MockDriveHandler::new();
        _ = handler
            .expect_post_item_permission_update()
            .returning(|_, _, _| Ok(None));

        let err = update_permissions(
            &handler,
            "d",
            "item",
            &[perm("p1", "u1", &["read"])],
            &[],
            &mut HashMap::new(),
        )
        .unwrap_err();
        assert!(!err.is_remote());
    }

    #[rstest]
    fn inherited_item_needs_no_calls(mut caches: RestoreCaches) {
        let handler = MockDriveHandler::new();
        restore_permissions(
            &handler,
            "d",
            "item",
            &path("/nowhere/file"),
            &Metadata::inherited(),
            &mut caches,
        )
        .unwrap();
    }

    #[rstest]
    fn only_difference_to_parent_is_applied(mut caches: RestoreCaches) {
        let mut handler = MockDriveHandler::new();
        _ = handler
            .expect_post_item_permission_update()
            .withf(|_, item, invite| {
                item == "item" && invite.recipient == Recipient::ObjectId("u2".into())
            })
            .times(1)
            .returning(|_, _, _| Ok(Some("new-p2".to_string())));

        let current = Metadata::custom(vec![
            perm("p1", "u1", &["read"]),
            perm("p2", "u2", &["write"]),
        ]);
        restore_permissions(
            &handler,
            "d",
            "item",
            &path("/a/b/file"),
            &current,
            &mut caches,
        )
        .unwrap();

        assert_eq!(caches.new_permission_id("p2"), Some("new-p2"));
    }
}
