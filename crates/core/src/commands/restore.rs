//! `restore` command
//!
//! Restores collections of a backup into the remote service. Collections are handled one after
//! the other, parents before children; the items of each collection are consumed as they are
//! produced. Failures of single items or collections are collected and the restore goes on;
//! only cancellation (or a failure in `fail_fast` mode) stops it.

pub(crate) mod drive;
pub(crate) mod items;
pub mod permissions;

use std::fmt;

use crossbeam_channel::select;
use derive_setters::Setters;
use log::{debug, info, trace};
use serde_derive::{Deserialize, Serialize};

use crate::{
    cache::RestoreCaches,
    cancel::CancelToken,
    collection::{CollectionErrorKind, RestoreCollection, RestoreItem, sort_restore_collections},
    collision::CollisionPolicy,
    details::{CollectionMetrics, DetailsSink, OperationStatus},
    error::{FaultCollector, RestoreError, RestoreResult},
    item::{Contact, Event, List, Page},
    path::Category,
    remote::{DriveRestoreHandler, ItemRestoreHandler},
};

pub(crate) mod constants {
    /// The default number of items buffered between producer and restorer.
    pub(crate) const DEFAULT_ITEMS_BUFFER: usize = 32;
}

#[cfg_attr(feature = "clap", derive(clap::Parser))]
#[cfg_attr(feature = "merge", derive(conflate::Merge))]
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, Setters)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
#[setters(into)]
#[non_exhaustive]
/// Options for the `restore` command
pub struct RestoreOptions {
    /// Name of the container to restore into. Empty restores into the original location.
    #[cfg_attr(feature = "clap", clap(long, value_name = "NAME", default_value = ""))]
    #[cfg_attr(feature = "merge", merge(skip))]
    pub location: String,

    /// What to do with items which already exist at the destination
    #[cfg_attr(
        feature = "clap",
        clap(long, value_enum, default_value_t = CollisionPolicy::Skip)
    )]
    #[cfg_attr(feature = "merge", merge(skip))]
    pub on_collision: CollisionPolicy,

    /// Restore the sharing permissions of drive items and folders
    #[cfg_attr(feature = "clap", clap(long))]
    #[cfg_attr(feature = "merge", merge(strategy = conflate::bool::overwrite_false))]
    pub restore_permissions: bool,

    /// Stop at the first error instead of restoring as much as possible
    #[cfg_attr(feature = "clap", clap(long))]
    #[cfg_attr(feature = "merge", merge(strategy = conflate::bool::overwrite_false))]
    pub fail_fast: bool,

    /// Number of items to buffer while reading collections
    #[cfg_attr(
        feature = "clap",
        clap(long, value_name = "N", default_value_t = constants::DEFAULT_ITEMS_BUFFER)
    )]
    #[cfg_attr(feature = "merge", merge(skip))]
    pub items_buffer: usize,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            location: String::new(),
            on_collision: CollisionPolicy::default(),
            restore_permissions: false,
            fail_fast: false,
            items_buffer: constants::DEFAULT_ITEMS_BUFFER,
        }
    }
}

/// The remote handlers used for restoring, by category.
///
/// Collections of a category without handler fail with [`CollectionErrorKind::NoHandler`].
#[derive(Clone, Copy, Default)]
pub struct RestoreHandlers<'a> {
    /// Handler for `files` and `libraries`
    pub drive: Option<&'a dyn DriveRestoreHandler>,
    /// Handler for `contacts`
    pub contacts: Option<&'a dyn ItemRestoreHandler<Contact>>,
    /// Handler for `events`
    pub events: Option<&'a dyn ItemRestoreHandler<Event>>,
    /// Handler for `lists`
    pub lists: Option<&'a dyn ItemRestoreHandler<List>>,
    /// Handler for `pages`
    pub pages: Option<&'a dyn ItemRestoreHandler<Page>>,
}

impl fmt::Debug for RestoreHandlers<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestoreHandlers")
            .field("drive", &self.drive.is_some())
            .field("contacts", &self.contacts.is_some())
            .field("events", &self.events.is_some())
            .field("lists", &self.lists.is_some())
            .field("pages", &self.pages.is_some())
            .finish()
    }
}

fn no_handler(category: Category) -> RestoreError {
    CollectionErrorKind::NoHandler(category).into()
}

/// Restores collections of one resource owner.
///
/// Owns the [`RestoreCaches`] of the operation; create one restorer per restore operation.
/// The restorer is not meant to be shared between threads, which keeps the caches lock-free.
pub struct CollectionRestorer<'a> {
    opts: &'a RestoreOptions,
    handlers: RestoreHandlers<'a>,
    backup_version: u32,
    cancel: CancelToken,
    caches: RestoreCaches,
    status: OperationStatus,
    faults: &'a mut FaultCollector,
    details: &'a mut dyn DetailsSink,
}

impl fmt::Debug for CollectionRestorer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionRestorer")
            .field("opts", &self.opts)
            .field("handlers", &self.handlers)
            .field("backup_version", &self.backup_version)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl<'a> CollectionRestorer<'a> {
    /// Create a new [`CollectionRestorer`].
    ///
    /// # Arguments
    ///
    /// * `opts` - The restore options
    /// * `handlers` - The remote handlers
    /// * `backup_version` - The format version of the backup to restore
    /// * `faults` - Collects the errors which don't stop the restore
    /// * `details` - Receives the details of restored items
    pub fn new(
        opts: &'a RestoreOptions,
        handlers: RestoreHandlers<'a>,
        backup_version: u32,
        faults: &'a mut FaultCollector,
        details: &'a mut dyn DetailsSink,
    ) -> Self {
        Self {
            opts,
            handlers,
            backup_version,
            cancel: CancelToken::new(),
            caches: RestoreCaches::new(),
            status: OperationStatus {
                destination: opts.location.clone(),
                ..OperationStatus::default()
            },
            faults,
            details,
        }
    }

    /// Use `cancel` to stop the restore.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The status so far. Also available after a failed or cancelled restore.
    #[must_use]
    pub fn status(&self) -> &OperationStatus {
        &self.status
    }

    /// The caches of this operation.
    #[must_use]
    pub fn caches(&self) -> &RestoreCaches {
        &self.caches
    }

    /// Restore `collections`.
    ///
    /// The collections are sorted parents first. Errors of single items or collections are added
    /// to the fault collector and don't stop the restore.
    ///
    /// # Errors
    ///
    /// * [`RestoreErrorKind::Cancelled`] - If the restore was cancelled. Everything restored up to
    ///   then is accounted in [`CollectionRestorer::status`].
    /// * The failure of the fault collector, if there is one, e.g. the first error in `fail_fast`
    ///   mode.
    ///
    /// [`RestoreErrorKind::Cancelled`]: crate::error::RestoreErrorKind::Cancelled
    pub fn run<C>(&mut self, collections: &mut [C]) -> RestoreResult<()>
    where
        C: AsRef<dyn RestoreCollection>,
    {
        info!(
            "restoring {} collections (backup version {})",
            collections.len(),
            self.backup_version
        );
        sort_restore_collections(collections);

        for collection in collections.iter() {
            if self.cancel.is_cancelled() || self.faults.failure().is_some() {
                break;
            }

            let collection = collection.as_ref();
            let mut metrics = CollectionMetrics::default();
            let res = self.restore_collection(collection, &mut metrics);

            self.status.folders += 1;
            self.status.metrics = self.status.metrics + metrics;

            match res {
                Ok(()) => {}
                Err(err) if err.is_cancelled() => break,
                Err(err) => self.add_fault(err),
            }
        }

        info!("{}", self.status);

        if self.cancel.is_cancelled() {
            return Err(RestoreError::cancelled());
        }
        if let Some(failure) = self.faults.take_failure() {
            return Err(failure);
        }
        Ok(())
    }

    fn restore_collection(
        &mut self,
        collection: &dyn RestoreCollection,
        metrics: &mut CollectionMetrics,
    ) -> RestoreResult<()> {
        let category = collection.full_path().category();
        debug!("restoring collection {}", collection.full_path());

        match category {
            Category::Files | Category::Libraries => {
                let handler = self.handlers.drive.ok_or_else(|| no_handler(category))?;
                self.restore_drive_collection(handler, collection, metrics)
            }
            Category::Contacts => {
                let handler = self.handlers.contacts.ok_or_else(|| no_handler(category))?;
                self.restore_item_collection(handler, collection, metrics)
            }
            Category::Events => {
                let handler = self.handlers.events.ok_or_else(|| no_handler(category))?;
                self.restore_item_collection(handler, collection, metrics)
            }
            Category::Lists => {
                let handler = self.handlers.lists.ok_or_else(|| no_handler(category))?;
                self.restore_item_collection(handler, collection, metrics)
            }
            Category::Pages => {
                let handler = self.handlers.pages.ok_or_else(|| no_handler(category))?;
                self.restore_item_collection(handler, collection, metrics)
            }
        }
    }

    /// Record an error which doesn't stop the restore, unless in `fail_fast` mode.
    fn add_fault(&mut self, err: RestoreError) {
        if self.opts.fail_fast {
            self.faults.fail(err);
        } else {
            self.faults.add_recoverable(err);
        }
    }

    /// Consume the items of `collection`, calling `f` on each.
    ///
    /// Errors returned by `f` are added as recoverable errors. Stops when the items are
    /// exhausted, the fault collector has a failure or the restore is cancelled.
    fn for_each_item<F>(&mut self, collection: &dyn RestoreCollection, mut f: F) -> RestoreResult<()>
    where
        F: FnMut(&mut Self, RestoreItem) -> RestoreResult<()>,
    {
        let cancel = self.cancel.clone();
        let items = collection.items(self.opts.items_buffer);

        while self.faults.failure().is_none() {
            cancel.check()?;

            let next = select! {
                recv(cancel.cancelled()) -> _ => return Err(RestoreError::cancelled()),
                recv(items) -> next => next,
            };

            // disconnected: all items read
            let Ok(next) = next else {
                break;
            };

            let item = match next {
                Ok(item) => item,
                Err(source) => {
                    self.add_fault(
                        CollectionErrorKind::ReadingItemFailed {
                            path: collection.full_path().to_string(),
                            source,
                        }
                        .into(),
                    );
                    continue;
                }
            };

            trace!("restoring item {}", item.id);
            if let Err(err) = f(self, item) {
                if err.is_cancelled() {
                    return Err(err);
                }
                self.add_fault(err);
            }
        }

        Ok(())
    }
}
