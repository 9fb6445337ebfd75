use anyhow::Result;
use pretty_assertions::assert_eq;
use rstest::rstest;

use sharevault_core::{
    CollisionPolicy, RestoreCollection, RestoreErrorKind, RestoreHandlers, RestoreOptions,
    collection::CollectionErrorKind, remote::Recipient, version,
};
use sharevault_testing::{DriveCall, InMemoryCollection, InMemoryDrive};

use crate::{DRIVE, custom_meta, inherited_meta, opts, permission, restore};

fn handlers(drive: &InMemoryDrive) -> RestoreHandlers<'_> {
    RestoreHandlers {
        drive: Some(drive),
        ..RestoreHandlers::default()
    }
}

fn permission_calls(drive: &InMemoryDrive, item: &str) -> Vec<DriveCall> {
    drive
        .calls()
        .into_iter()
        .filter(|call| match call {
            DriveCall::AddPermission { item: id, .. }
            | DriveCall::DeletePermission { item: id, .. } => id == item,
            _ => false,
        })
        .collect()
}

#[rstest]
fn only_permissions_differing_from_parent_are_restored(opts: RestoreOptions) -> Result<()> {
    let drive = InMemoryDrive::new("d");
    let opts = opts.restore_permissions(true);

    let collections: Vec<Box<dyn RestoreCollection>> = vec![
        // children come first to check the sorting
        Box::new(
            InMemoryCollection::new(&format!("{DRIVE}/folderA"))?
                .with_json(
                    ".dirmeta",
                    &custom_meta("folderA", vec![permission("p1", "u1", &["read"])]),
                )
                .with_item("item1.data", "content")
                .with_json(
                    "item1.meta",
                    &custom_meta(
                        "report.txt",
                        vec![
                            permission("p1", "u1", &["read"]),
                            permission("p2", "u2", &["write"]),
                        ],
                    ),
                ),
        ),
        Box::new(InMemoryCollection::new(DRIVE)?),
    ];

    let outcome = restore(&opts, handlers(&drive), version::BACKUP, collections, None);
    outcome.result?;
    assert!(!outcome.faults.has_errors());

    assert_eq!(drive.file("Restored/folderA/report.txt"), Some("content".into()));

    let folder_id = drive.id("Restored/folderA").unwrap();
    let folder_calls = permission_calls(&drive, &folder_id);
    assert_eq!(folder_calls.len(), 1);
    assert!(matches!(
        &folder_calls[0],
        DriveCall::AddPermission { invite, .. }
            if invite.roles == ["read"] && invite.recipient == Recipient::ObjectId("u1".into())
    ));

    // the item inherits `read` for u1 and only gets `write` for u2 on top
    let item_id = drive.id("Restored/folderA/report.txt").unwrap();
    let item_calls = permission_calls(&drive, &item_id);
    assert_eq!(item_calls.len(), 1);
    assert!(matches!(
        &item_calls[0],
        DriveCall::AddPermission { invite, .. }
            if invite.roles == ["write"] && invite.recipient == Recipient::ObjectId("u2".into())
    ));

    // meta files are no objects
    assert_eq!(outcome.status.folders, 2);
    assert_eq!(outcome.status.metrics.objects, 1);
    assert_eq!(outcome.status.metrics.successes, 1);
    assert_eq!(outcome.status.metrics.bytes, 7);
    assert_eq!(outcome.details[0].location_ref, "Restored/folderA");
    assert_eq!(outcome.details[0].name, "report.txt");
    Ok(())
}

#[rstest]
fn legacy_dir_meta_is_taken_from_parent_collection(opts: RestoreOptions) -> Result<()> {
    let drive = InMemoryDrive::new("d");
    let opts = opts.restore_permissions(true);

    let collections: Vec<Box<dyn RestoreCollection>> = vec![
        Box::new(InMemoryCollection::new(DRIVE)?.with_json(
            "folderA.dirmeta",
            &custom_meta("", vec![permission("p1", "u1", &["read"])]),
        )),
        Box::new(
            InMemoryCollection::new(&format!("{DRIVE}/folderA"))?
                .with_item("x.data", "legacy")
                .with_json("x.meta", &inherited_meta("")),
        ),
    ];

    let outcome = restore(
        &opts,
        handlers(&drive),
        version::ONE_DRIVE_3_IS_META_MARKER,
        collections,
        None,
    );
    outcome.result?;
    assert!(!outcome.faults.has_errors());

    // before names were kept in the metadata, the entry name is the file name
    assert_eq!(drive.file("Restored/folderA/x"), Some("legacy".into()));

    let folder_id = drive.id("Restored/folderA").unwrap();
    assert_eq!(permission_calls(&drive, &folder_id).len(), 1);
    let item_id = drive.id("Restored/folderA/x").unwrap();
    assert!(permission_calls(&drive, &item_id).is_empty());
    Ok(())
}

#[rstest]
fn named_dir_meta_is_read_from_own_collection(opts: RestoreOptions) -> Result<()> {
    let drive = InMemoryDrive::new("d");
    let opts = opts.restore_permissions(true);

    let collections: Vec<Box<dyn RestoreCollection>> = vec![
        Box::new(InMemoryCollection::new(DRIVE)?),
        Box::new(
            InMemoryCollection::new(&format!("{DRIVE}/folderA"))?
                .with_json(
                    "folderA.dirmeta",
                    &custom_meta("", vec![permission("p1", "u1", &["read"])]),
                )
                .with_item("item1.data", "content")
                .with_json(
                    "item1.meta",
                    &custom_meta(
                        "",
                        vec![
                            permission("p1", "u1", &["read"]),
                            permission("p2", "u2", &["write"]),
                        ],
                    ),
                ),
        ),
    ];

    let outcome = restore(
        &opts,
        handlers(&drive),
        version::ONE_DRIVE_4_DIR_INCLUDES_PERMISSIONS,
        collections,
        None,
    );
    outcome.result?;
    assert!(!outcome.faults.has_errors());

    // the metadata files are not restored as items
    assert_eq!(drive.list("Restored/folderA"), vec!["item1"]);
    assert_eq!(outcome.status.metrics.objects, 1);

    let folder_id = drive.id("Restored/folderA").unwrap();
    let folder_calls = permission_calls(&drive, &folder_id);
    assert_eq!(folder_calls.len(), 1);
    assert!(matches!(
        &folder_calls[0],
        DriveCall::AddPermission { invite, .. }
            if invite.roles == ["read"] && invite.recipient == Recipient::ObjectId("u1".into())
    ));

    let item_id = drive.id("Restored/folderA/item1").unwrap();
    let item_calls = permission_calls(&drive, &item_id);
    assert_eq!(item_calls.len(), 1);
    assert!(matches!(
        &item_calls[0],
        DriveCall::AddPermission { invite, .. }
            if invite.roles == ["write"] && invite.recipient == Recipient::ObjectId("u2".into())
    ));
    Ok(())
}

#[rstest]
fn permissions_are_left_alone_unless_requested(opts: RestoreOptions) -> Result<()> {
    let drive = InMemoryDrive::new("d");

    let collections: Vec<Box<dyn RestoreCollection>> = vec![Box::new(
        InMemoryCollection::new(&format!("{DRIVE}/folderA"))?
            .with_item("item1.data", "content")
            .with_json(
                "item1.meta",
                &custom_meta("report.txt", vec![permission("p2", "u2", &["write"])]),
            ),
    )];

    let outcome = restore(&opts, handlers(&drive), version::BACKUP, collections, None);
    outcome.result?;

    // the name is still read from the metadata
    assert!(drive.file("Restored/folderA/report.txt").is_some());
    assert!(
        drive
            .calls()
            .iter()
            .all(|call| !matches!(call, DriveCall::AddPermission { .. }))
    );
    Ok(())
}

#[rstest]
#[case(CollisionPolicy::Skip, 0, vec!["a.txt"])]
#[case(CollisionPolicy::Copy, 1, vec!["a.txt", "a.txt (1)"])]
#[case(CollisionPolicy::Replace, 1, vec!["a.txt"])]
fn collisions_follow_policy(
    opts: RestoreOptions,
    #[case] policy: CollisionPolicy,
    #[case] successes: u64,
    #[case] expected: Vec<&str>,
) -> Result<()> {
    let drive = InMemoryDrive::new("d");
    let existing = drive.add_file("Restored/docs/a.txt", "old");
    let opts = opts.on_collision(policy);

    let collections: Vec<Box<dyn RestoreCollection>> = vec![Box::new(
        InMemoryCollection::new(&format!("{DRIVE}/docs"))?.with_item("a.txt", "new"),
    )];

    let outcome = restore(&opts, handlers(&drive), 0, collections, None);
    outcome.result?;

    assert_eq!(outcome.status.metrics.objects, 1);
    assert_eq!(outcome.status.metrics.successes, successes);
    assert_eq!(drive.list("Restored/docs"), expected);

    let deleted = drive.calls().contains(&DriveCall::DeleteItem { item: existing });
    assert_eq!(deleted, policy == CollisionPolicy::Replace);

    // the replacing item takes over the name of the deleted one
    let renamed = drive.calls().iter().any(|call| {
        matches!(call, DriveCall::RenameItem { name, .. } if name == "a.txt")
    });
    assert_eq!(renamed, policy == CollisionPolicy::Replace);
    if policy == CollisionPolicy::Replace {
        assert_eq!(drive.file("Restored/docs/a.txt"), Some("new".into()));
    }

    if policy == CollisionPolicy::Skip {
        assert_eq!(outcome.faults.recovered().len(), 1);
        assert!(outcome.faults.recovered()[0].is_conflict());
        assert!(outcome.details.is_empty());
    } else {
        assert!(!outcome.faults.has_errors());
        assert_eq!(outcome.details[0].updated, policy == CollisionPolicy::Replace);
    }
    Ok(())
}

#[rstest]
fn failed_delete_of_replaced_item_keeps_the_new_one(opts: RestoreOptions) -> Result<()> {
    let drive = InMemoryDrive::new("d").with_failing_deletes();
    let existing = drive.add_file("Restored/docs/a.txt", "old");
    let opts = opts.on_collision(CollisionPolicy::Replace);

    let collections: Vec<Box<dyn RestoreCollection>> = vec![Box::new(
        InMemoryCollection::new(&format!("{DRIVE}/docs"))?.with_item("a.txt", "new"),
    )];

    let outcome = restore(&opts, handlers(&drive), 0, collections, None);
    outcome.result?;

    assert_eq!(outcome.status.metrics.successes, 1);
    assert_eq!(drive.list("Restored/docs"), vec!["a.txt", "a.txt (1)"]);
    assert_eq!(drive.id("Restored/docs/a.txt"), Some(existing));
    assert!(
        drive
            .calls()
            .iter()
            .all(|call| !matches!(call, DriveCall::RenameItem { .. }))
    );

    let recovered = outcome.faults.recovered();
    assert_eq!(recovered.len(), 1);
    assert!(recovered[0].is_remote());
    assert_eq!(
        recovered[0].created_item_id(),
        drive.id("Restored/docs/a.txt (1)").as_deref()
    );
    Ok(())
}

#[rstest]
fn unreadable_items_do_not_stop_the_collection(opts: RestoreOptions) -> Result<()> {
    let drive = InMemoryDrive::new("d");

    let collections: Vec<Box<dyn RestoreCollection>> = vec![Box::new(
        InMemoryCollection::new(&format!("{DRIVE}/docs"))?
            .with_broken_item("checksum mismatch")
            .with_item("b.txt", "b"),
    )];

    let outcome = restore(&opts, handlers(&drive), 0, collections, None);
    outcome.result?;

    assert_eq!(drive.list("Restored/docs"), vec!["b.txt"]);
    assert!(matches!(
        outcome.faults.recovered()[0].kind(),
        RestoreErrorKind::Collection(CollectionErrorKind::ReadingItemFailed { .. })
    ));
    Ok(())
}

#[rstest]
fn fail_fast_stops_at_first_error(opts: RestoreOptions) -> Result<()> {
    let drive = InMemoryDrive::new("d");
    let opts = opts.fail_fast(true);

    let collections: Vec<Box<dyn RestoreCollection>> = vec![
        Box::new(
            InMemoryCollection::new(&format!("{DRIVE}/docs"))?
                .with_broken_item("checksum mismatch")
                .with_item("b.txt", "b"),
        ),
        Box::new(InMemoryCollection::new(&format!("{DRIVE}/more"))?.with_item("c.txt", "c")),
    ];

    let outcome = restore(&opts, handlers(&drive), 0, collections, None);

    let err = outcome.result.unwrap_err();
    assert!(matches!(
        err.kind(),
        RestoreErrorKind::Collection(CollectionErrorKind::ReadingItemFailed { .. })
    ));
    assert_eq!(outcome.status.metrics.objects, 0);
    assert_eq!(outcome.status.folders, 1);
    assert!(drive.list("Restored/more").is_empty());
    Ok(())
}

#[rstest]
fn missing_handler_fails_the_collection_only(opts: RestoreOptions) -> Result<()> {
    let drive = InMemoryDrive::new("d");

    let collections: Vec<Box<dyn RestoreCollection>> = vec![
        Box::new(InMemoryCollection::new("t/exchange/u1/contacts/c")?.with_item("c1", "{}")),
        Box::new(InMemoryCollection::new(&format!("{DRIVE}/docs"))?.with_item("b.txt", "b")),
    ];

    let outcome = restore(&opts, handlers(&drive), 0, collections, None);
    outcome.result?;

    assert_eq!(outcome.status.folders, 2);
    assert_eq!(outcome.status.metrics.successes, 1);
    assert!(matches!(
        outcome.faults.recovered()[0].kind(),
        RestoreErrorKind::Collection(CollectionErrorKind::NoHandler(_))
    ));
    Ok(())
}
