/// In-memory collection to be used for testing
pub mod in_memory_collection {
    use std::thread;

    use bytes::Bytes;
    use crossbeam_channel::{Receiver, bounded};

    use sharevault_core::{RestoreCollection, RestoreItem, RestorePath};

    #[derive(Debug, Clone)]
    enum Entry {
        Item(RestoreItem),
        /// reading this entry fails with the given message
        Broken(String),
    }

    #[derive(Debug, Clone)]
    /// In-memory collection with a fixed list of items, streamed from a producer thread
    pub struct InMemoryCollection {
        path: RestorePath,
        entries: Vec<Entry>,
    }

    impl InMemoryCollection {
        /// Create a new (empty) `InMemoryCollection`
        ///
        /// # Errors
        ///
        /// If `path` is no valid restore path.
        pub fn new(path: &str) -> anyhow::Result<Self> {
            Ok(Self {
                path: path.parse()?,
                entries: Vec::new(),
            })
        }

        /// Add an item
        #[must_use]
        pub fn with_item(mut self, id: impl Into<String>, data: impl Into<Bytes>) -> Self {
            self.entries.push(Entry::Item(RestoreItem::new(id, data)));
            self
        }

        /// Add an item serialized as JSON
        ///
        /// # Panics
        ///
        /// If `value` can't be serialized.
        #[must_use]
        pub fn with_json(self, id: impl Into<String>, value: &serde_json::Value) -> Self {
            let data = serde_json::to_vec(value).expect("serializing JSON value failed");
            self.with_item(id, data)
        }

        /// Add an entry which fails to be read
        #[must_use]
        pub fn with_broken_item(mut self, message: impl Into<String>) -> Self {
            self.entries.push(Entry::Broken(message.into()));
            self
        }
    }

    impl RestoreCollection for InMemoryCollection {
        fn full_path(&self) -> &RestorePath {
            &self.path
        }

        fn items(&self, buffer: usize) -> Receiver<anyhow::Result<RestoreItem>> {
            let (tx, rx) = bounded(buffer);
            let entries = self.entries.clone();

            _ = thread::spawn(move || {
                for entry in entries {
                    let item = match entry {
                        Entry::Item(item) => Ok(item),
                        Entry::Broken(message) => Err(anyhow::anyhow!(message)),
                    };
                    // the receiver is gone: the restore stopped
                    if tx.send(item).is_err() {
                        break;
                    }
                }
            });

            rx
        }

        fn fetch_item_by_name(&self, name: &str) -> anyhow::Result<RestoreItem> {
            self.entries
                .iter()
                .find_map(|entry| match entry {
                    Entry::Item(item) if item.id == name => Some(item.clone()),
                    _ => None,
                })
                .ok_or_else(|| anyhow::anyhow!("item `{name}` not found in `{}`", self.path))
        }
    }
}
