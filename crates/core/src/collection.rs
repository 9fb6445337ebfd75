//! Collections of backed up items, as consumed by the restorer.

use bytes::Bytes;
use crossbeam_channel::Receiver;

use crate::path::{Category, RestorePath};

/// [`CollectionErrorKind`] describes the errors that can happen while reading collections
#[derive(thiserror::Error, Debug, displaydoc::Display)]
#[non_exhaustive]
pub enum CollectionErrorKind {
    /// fetching `{name}` from collection `{path}` failed: `{source}`
    FetchingItemFailed {
        /// name of the item
        name: String,
        /// path of the collection
        path: String,
        /// the underlying error
        source: anyhow::Error,
    },
    /// reading an item of collection `{path}` failed: `{source}`
    ReadingItemFailed {
        /// path of the collection
        path: String,
        /// the underlying error
        source: anyhow::Error,
    },
    /// no handler configured for category `{0}`
    NoHandler(Category),
}

/// One backed up item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreItem {
    /// The name of the item within its collection
    pub id: String,
    /// The stored content
    pub data: Bytes,
}

impl RestoreItem {
    /// Create a new [`RestoreItem`].
    pub fn new(id: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            id: id.into(),
            data: data.into(),
        }
    }
}

/// A collection of items to restore, i.e. a directory or container of the backup.
pub trait RestoreCollection: Send + Sync {
    /// The path of the collection. It also names the resource owner.
    fn full_path(&self) -> &RestorePath;

    /// Stream the items of the collection.
    ///
    /// The items are produced concurrently into a channel bounded by `buffer`, which is
    /// disconnected after the last item. Can only be consumed once; the producer must stop when
    /// the receiver is dropped.
    fn items(&self, buffer: usize) -> Receiver<anyhow::Result<RestoreItem>>;

    /// Get a single item by its name.
    ///
    /// # Errors
    ///
    /// If the item doesn't exist or can't be read.
    fn fetch_item_by_name(&self, name: &str) -> anyhow::Result<RestoreItem>;
}

/// Sort collections so that every collection comes after its parent.
///
/// Paths are compared element-wise, so a path always sorts before all paths it is a prefix of.
pub fn sort_restore_collections<C>(collections: &mut [C])
where
    C: AsRef<dyn RestoreCollection>,
{
    collections.sort_by(|a, b| a.as_ref().full_path().cmp(b.as_ref().full_path()));
}

#[cfg(test)]
mod tests {
    use crossbeam_channel::bounded;
    use pretty_assertions::assert_eq;

    use super::*;

    #[derive(Debug)]
    struct Paths(RestorePath);

    impl RestoreCollection for Paths {
        fn full_path(&self) -> &RestorePath {
            &self.0
        }

        fn items(&self, buffer: usize) -> Receiver<anyhow::Result<RestoreItem>> {
            bounded(buffer).1
        }

        fn fetch_item_by_name(&self, name: &str) -> anyhow::Result<RestoreItem> {
            anyhow::bail!("no item {name}")
        }
    }

    #[test]
    fn parents_come_first() {
        let mut collections: Vec<Box<dyn RestoreCollection>> = [
            "t/onedrive/u/files/drives/d/root:/a/b",
            "t/onedrive/u/files/drives/d/root:/a-b",
            "t/onedrive/u/files/drives/d/root:",
            "t/onedrive/u/files/drives/d/root:/a",
        ]
        .into_iter()
        .map(|p| Box::new(Paths(p.parse().unwrap())) as Box<dyn RestoreCollection>)
        .collect();

        sort_restore_collections(&mut collections);

        let sorted: Vec<_> = collections
            .iter()
            .map(|c| c.full_path().to_string())
            .collect();
        assert_eq!(
            sorted,
            vec![
                "t/onedrive/u/files/drives/d/root:",
                "t/onedrive/u/files/drives/d/root:/a",
                "t/onedrive/u/files/drives/d/root:/a/b",
                "t/onedrive/u/files/drives/d/root:/a-b",
            ]
        );
    }
}
