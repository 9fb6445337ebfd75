/*!
A library to restore backed up groupware data: drive files and folders with their sharing
permissions, contacts, calendar events, lists and site pages.

# Overview

This section gives a brief overview of the primary types in this crate:

The main type is the [`CollectionRestorer`] which restores a set of [`RestoreCollection`]s of
one resource owner. It talks to the remote service only through the traits of the [`remote`]
module, e.g. [`remote::DriveRestoreHandler`] and [`remote::ItemRestoreHandler`], which are
passed in as [`RestoreHandlers`].

How the restore behaves is configured by [`RestoreOptions`]. Like all `*Options` types it offers
setter methods and implements [`serde::Serialize`] and [`serde::Deserialize`].

Errors which stop a single item or collection don't stop the restore; they are collected by a
[`FaultCollector`]. The restore can be stopped from outside with a [`CancelToken`].

The stored data types, like the permission metadata of drive items or the item bodies of the
other categories, are found in the [`permission`] and [`item`] modules.

# Example - restore a drive folder

```rust
    use sharevault_core::{
        CollectionRestorer, CollisionPolicy, DetailsBuilder, FaultCollector, RestoreHandlers,
        RestoreOptions, RestoreCollection,
    };
    use sharevault_testing::{InMemoryCollection, InMemoryDrive};

    let drive = InMemoryDrive::new("d");
    let mut collections: Vec<Box<dyn RestoreCollection>> = vec![Box::new(
        InMemoryCollection::new("t/onedrive/u/files/drives/d/root:/docs")
            .unwrap()
            .with_item("a.txt", "hello"),
    )];

    let opts = RestoreOptions::default()
        .location("Restored")
        .on_collision(CollisionPolicy::Copy);
    let mut faults = FaultCollector::default();
    let mut details = DetailsBuilder::new();

    let mut restorer = CollectionRestorer::new(
        &opts,
        RestoreHandlers {
            drive: Some(&drive),
            ..RestoreHandlers::default()
        },
        0,
        &mut faults,
        &mut details,
    );
    restorer.run(&mut collections).unwrap();

    assert_eq!(restorer.status().metrics.successes, 1);
    assert!(drive.file("Restored/docs/a.txt").is_some());
```

# Crate features

This crate exposes a few features for controlling dependency usage.

- **cli** - Enables support for CLI features by enabling `clap` and `merge`
  features. *This feature is disabled by default*.

- **clap** - Enables a dependency on the `clap` crate and enables parsing from
    the commandline. *This feature is disabled by default*.

- **merge** - Enables support for merging multiple values into one, which
  enables the `conflate` dependency. This is needed for parsing commandline
  arguments and merging them into one (e.g. `config`). *This feature is disabled
  by default*.
*/

// Workspace lints don't seem to work for this?
#![allow(clippy::redundant_pub_crate)]

pub(crate) mod cache;
pub(crate) mod cancel;
pub mod collection;
pub(crate) mod collision;
pub(crate) mod commands;
pub mod details;
pub(crate) mod error;
pub mod item;
pub mod pager;
pub mod path;
pub mod permission;
pub mod remote;
pub mod version;

// sharevault_core Public API
pub use crate::{
    cache::RestoreCaches,
    cancel::CancelToken,
    collection::{RestoreCollection, RestoreItem, sort_restore_collections},
    collision::{CollisionErrorKind, CollisionPolicy, restore_with_collision_policy},
    commands::restore::{
        CollectionRestorer, RestoreHandlers, RestoreOptions,
        permissions::{compute_parent_permissions, restore_permissions, update_permissions},
    },
    details::{CollectionMetrics, DetailsBuilder, DetailsEntry, DetailsSink, OperationStatus},
    error::{FaultCollector, RestoreError, RestoreErrorKind, RestoreResult},
    path::{Category, RestorePath, ServiceType},
};
