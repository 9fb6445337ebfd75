/// In-memory drive to be used for testing
pub mod in_memory_drive {
    use std::{
        collections::{BTreeMap, HashMap},
        sync::RwLock,
    };

    use bytes::Bytes;

    use sharevault_core::{
        CollisionPolicy,
        remote::{DriveFolder, DriveRestoreHandler, PermissionInvite, PermissionUpdater},
    };

    /// The id of the root folder of every `InMemoryDrive`
    pub const ROOT_ID: &str = "root";

    /// A mutating call received by an `InMemoryDrive`
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum DriveCall {
        /// A folder was created
        PostFolder {
            /// parent folder id
            parent: String,
            /// folder name
            name: String,
        },
        /// An item was uploaded
        PostItem {
            /// folder id
            folder: String,
            /// item name
            name: String,
        },
        /// An item was deleted
        DeleteItem {
            /// item id
            item: String,
        },
        /// An item was renamed
        RenameItem {
            /// item id
            item: String,
            /// the new name
            name: String,
        },
        /// A permission was granted
        AddPermission {
            /// item id
            item: String,
            /// the granted permission
            invite: PermissionInvite,
        },
        /// A permission was removed
        DeletePermission {
            /// item id
            item: String,
            /// permission id
            permission: String,
        },
    }

    #[derive(Debug, Clone)]
    struct Node {
        name: String,
        parent: Option<String>,
        /// `None` for folders
        data: Option<Bytes>,
    }

    #[derive(Debug, Default)]
    struct DriveState {
        nodes: BTreeMap<String, Node>,
        permissions: BTreeMap<String, Vec<(String, PermissionInvite)>>,
        calls: Vec<DriveCall>,
        next_id: usize,
    }

    impl DriveState {
        fn new_id(&mut self, prefix: &str) -> String {
            self.next_id += 1;
            format!("{prefix}-{}", self.next_id)
        }

        fn child(&self, parent: &str, name: &str) -> Option<(&String, &Node)> {
            self.nodes
                .iter()
                .find(|(_, node)| node.parent.as_deref() == Some(parent) && node.name == name)
        }
    }

    type PostHook = Box<dyn Fn(&str) + Send + Sync>;

    /// In-memory drive, keeping folders, files and permissions
    pub struct InMemoryDrive {
        drive_id: String,
        state: RwLock<DriveState>,
        fail_deletes: bool,
        post_hook: Option<PostHook>,
    }

    impl std::fmt::Debug for InMemoryDrive {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("InMemoryDrive")
                .field("drive_id", &self.drive_id)
                .field("fail_deletes", &self.fail_deletes)
                .finish_non_exhaustive()
        }
    }

    impl InMemoryDrive {
        /// Create a new `InMemoryDrive` with an empty root folder
        #[must_use]
        pub fn new(drive_id: impl Into<String>) -> Self {
            let mut state = DriveState::default();
            _ = state.nodes.insert(
                ROOT_ID.to_string(),
                Node {
                    name: ROOT_ID.to_string(),
                    parent: None,
                    data: None,
                },
            );
            Self {
                drive_id: drive_id.into(),
                state: RwLock::new(state),
                fail_deletes: false,
                post_hook: None,
            }
        }

        /// Let all item deletions fail
        #[must_use]
        pub fn with_failing_deletes(mut self) -> Self {
            self.fail_deletes = true;
            self
        }

        /// Call `hook` with the name of every uploaded item
        #[must_use]
        pub fn with_post_hook(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
            self.post_hook = Some(Box::new(hook));
            self
        }

        /// Add an existing file, e.g. to provoke collisions. Missing folders are created.
        ///
        /// # Returns
        ///
        /// The id of the file.
        ///
        /// # Panics
        ///
        /// If the lock is poisoned.
        pub fn add_file(&self, path: &str, data: impl Into<Bytes>) -> String {
            let mut state = self.state.write().unwrap();
            let (dirs, name) = path.rsplit_once('/').unwrap_or(("", path));

            let mut parent = ROOT_ID.to_string();
            for dir in dirs.split('/').filter(|dir| !dir.is_empty()) {
                parent = match state.child(&parent, dir) {
                    Some((id, _)) => id.clone(),
                    None => {
                        let id = state.new_id("folder");
                        _ = state.nodes.insert(
                            id.clone(),
                            Node {
                                name: dir.to_string(),
                                parent: Some(parent),
                                data: None,
                            },
                        );
                        id
                    }
                };
            }

            let id = state.new_id("existing");
            _ = state.nodes.insert(
                id.clone(),
                Node {
                    name: name.to_string(),
                    parent: Some(parent),
                    data: Some(data.into()),
                },
            );
            id
        }

        fn resolve(&self, path: &str) -> Option<String> {
            let state = self.state.read().unwrap();
            let mut id = ROOT_ID.to_string();
            for name in path.split('/').filter(|name| !name.is_empty()) {
                id = state.child(&id, name)?.0.clone();
            }
            Some(id)
        }

        /// The id of the folder or file at `path`, relative to the root
        ///
        /// # Panics
        ///
        /// If the lock is poisoned.
        #[must_use]
        pub fn id(&self, path: &str) -> Option<String> {
            self.resolve(path)
        }

        /// The content of the file at `path`, relative to the root
        ///
        /// # Panics
        ///
        /// If the lock is poisoned.
        #[must_use]
        pub fn file(&self, path: &str) -> Option<Bytes> {
            let id = self.resolve(path)?;
            self.state.read().unwrap().nodes.get(&id)?.data.clone()
        }

        /// The names of the files and folders in the folder at `path`
        ///
        /// # Panics
        ///
        /// If the lock is poisoned.
        #[must_use]
        pub fn list(&self, path: &str) -> Vec<String> {
            let Some(id) = self.resolve(path) else {
                return Vec::new();
            };
            let state = self.state.read().unwrap();
            let mut names: Vec<_> = state
                .nodes
                .values()
                .filter(|node| node.parent.as_deref() == Some(id.as_str()))
                .map(|node| node.name.clone())
                .collect();
            names.sort();
            names
        }

        /// The permissions granted on the item at `path`
        ///
        /// # Panics
        ///
        /// If the lock is poisoned.
        #[must_use]
        pub fn permissions(&self, path: &str) -> Vec<PermissionInvite> {
            let Some(id) = self.resolve(path) else {
                return Vec::new();
            };
            self.state
                .read()
                .unwrap()
                .permissions
                .get(&id)
                .map(|perms| perms.iter().map(|(_, invite)| invite.clone()).collect())
                .unwrap_or_default()
        }

        /// All mutating calls received so far
        ///
        /// # Panics
        ///
        /// If the lock is poisoned.
        #[must_use]
        pub fn calls(&self) -> Vec<DriveCall> {
            self.state.read().unwrap().calls.clone()
        }

        fn check_drive(&self, drive_id: &str) -> anyhow::Result<()> {
            anyhow::ensure!(drive_id == self.drive_id, "drive `{drive_id}` not found");
            Ok(())
        }
    }

    impl PermissionUpdater for InMemoryDrive {
        fn post_item_permission_update(
            &self,
            drive_id: &str,
            item_id: &str,
            invite: &PermissionInvite,
        ) -> anyhow::Result<Option<String>> {
            self.check_drive(drive_id)?;
            let mut state = self.state.write().unwrap();
            anyhow::ensure!(state.nodes.contains_key(item_id), "item `{item_id}` not found");

            let id = state.new_id("perm");
            state
                .permissions
                .entry(item_id.to_string())
                .or_default()
                .push((id.clone(), invite.clone()));
            state.calls.push(DriveCall::AddPermission {
                item: item_id.to_string(),
                invite: invite.clone(),
            });
            Ok(Some(id))
        }

        fn delete_item_permission(
            &self,
            drive_id: &str,
            item_id: &str,
            permission_id: &str,
        ) -> anyhow::Result<()> {
            self.check_drive(drive_id)?;
            let mut state = self.state.write().unwrap();
            if let Some(perms) = state.permissions.get_mut(item_id) {
                perms.retain(|(id, _)| id != permission_id);
            }
            state.calls.push(DriveCall::DeletePermission {
                item: item_id.to_string(),
                permission: permission_id.to_string(),
            });
            Ok(())
        }
    }

    impl DriveRestoreHandler for InMemoryDrive {
        fn get_root_folder(&self, drive_id: &str) -> anyhow::Result<DriveFolder> {
            self.check_drive(drive_id)?;
            Ok(DriveFolder {
                id: ROOT_ID.to_string(),
                name: ROOT_ID.to_string(),
                parent_id: None,
            })
        }

        fn get_folder_by_name(
            &self,
            drive_id: &str,
            parent_folder_id: &str,
            name: &str,
        ) -> anyhow::Result<Option<DriveFolder>> {
            self.check_drive(drive_id)?;
            let state = self.state.read().unwrap();
            Ok(state
                .child(parent_folder_id, name)
                .filter(|(_, node)| node.data.is_none())
                .map(|(id, node)| DriveFolder {
                    id: id.clone(),
                    name: node.name.clone(),
                    parent_id: node.parent.clone(),
                }))
        }

        fn post_folder(
            &self,
            drive_id: &str,
            parent_folder_id: &str,
            name: &str,
        ) -> anyhow::Result<DriveFolder> {
            self.check_drive(drive_id)?;
            let mut state = self.state.write().unwrap();
            anyhow::ensure!(
                state.nodes.contains_key(parent_folder_id),
                "folder `{parent_folder_id}` not found"
            );

            let id = state.new_id("folder");
            _ = state.nodes.insert(
                id.clone(),
                Node {
                    name: name.to_string(),
                    parent: Some(parent_folder_id.to_string()),
                    data: None,
                },
            );
            state.calls.push(DriveCall::PostFolder {
                parent: parent_folder_id.to_string(),
                name: name.to_string(),
            });
            Ok(DriveFolder {
                id,
                name: name.to_string(),
                parent_id: Some(parent_folder_id.to_string()),
            })
        }

        fn collision_keys(
            &self,
            drive_id: &str,
            folder_id: &str,
        ) -> anyhow::Result<HashMap<String, String>> {
            self.check_drive(drive_id)?;
            let state = self.state.read().unwrap();
            Ok(state
                .nodes
                .iter()
                .filter(|(_, node)| node.parent.as_deref() == Some(folder_id) && node.data.is_some())
                .map(|(id, node)| (node.name.clone(), id.clone()))
                .collect())
        }

        fn post_item(
            &self,
            drive_id: &str,
            folder_id: &str,
            name: &str,
            data: Bytes,
            on_collision: CollisionPolicy,
        ) -> anyhow::Result<String> {
            self.check_drive(drive_id)?;
            if let Some(hook) = &self.post_hook {
                hook(name);
            }

            let mut state = self.state.write().unwrap();
            let mut stored_name = name.to_string();
            let mut copy = 0;
            while state.child(folder_id, &stored_name).is_some() {
                anyhow::ensure!(
                    on_collision != CollisionPolicy::Skip,
                    "item `{name}` already exists"
                );
                copy += 1;
                stored_name = format!("{name} ({copy})");
            }

            let id = state.new_id("item");
            _ = state.nodes.insert(
                id.clone(),
                Node {
                    name: stored_name,
                    parent: Some(folder_id.to_string()),
                    data: Some(data),
                },
            );
            state.calls.push(DriveCall::PostItem {
                folder: folder_id.to_string(),
                name: name.to_string(),
            });
            Ok(id)
        }

        fn delete_item(&self, drive_id: &str, item_id: &str) -> anyhow::Result<()> {
            self.check_drive(drive_id)?;
            anyhow::ensure!(!self.fail_deletes, "deleting `{item_id}` is not allowed");

            let mut state = self.state.write().unwrap();
            anyhow::ensure!(
                state.nodes.remove(item_id).is_some(),
                "item `{item_id}` not found"
            );
            state.calls.push(DriveCall::DeleteItem {
                item: item_id.to_string(),
            });
            Ok(())
        }

        fn rename_item(&self, drive_id: &str, item_id: &str, name: &str) -> anyhow::Result<()> {
            self.check_drive(drive_id)?;
            let mut state = self.state.write().unwrap();

            let parent = match state.nodes.get(item_id) {
                Some(node) => node.parent.clone().unwrap_or_default(),
                None => anyhow::bail!("item `{item_id}` not found"),
            };
            anyhow::ensure!(
                state
                    .child(&parent, name)
                    .is_none_or(|(id, _)| id == item_id),
                "item `{name}` already exists"
            );

            if let Some(node) = state.nodes.get_mut(item_id) {
                node.name = name.to_string();
            }
            state.calls.push(DriveCall::RenameItem {
                item: item_id.to_string(),
                name: name.to_string(),
            });
            Ok(())
        }
    }
}

/// In-memory item store to be used for testing
pub mod in_memory_items {
    use std::{collections::HashMap, sync::RwLock};

    use serde_json::Value;

    use sharevault_core::{
        item::RestorableItem,
        remote::{Calendar, ContactFolder, ItemRestoreHandler, Site},
    };

    /// Containers which can be created by an `InMemoryItems` store
    pub trait NewContainer {
        /// Create a container
        fn new_container(id: String, name: String) -> Self;
    }

    impl NewContainer for ContactFolder {
        fn new_container(id: String, name: String) -> Self {
            Self {
                id,
                display_name: name,
                parent_folder_id: None,
            }
        }
    }

    impl NewContainer for Calendar {
        fn new_container(id: String, name: String) -> Self {
            Self {
                id,
                name,
                group_id: None,
            }
        }
    }

    impl NewContainer for Site {
        fn new_container(id: String, name: String) -> Self {
            Self {
                id,
                display_name: name,
                parent_site_id: None,
            }
        }
    }

    /// A restored item
    #[derive(Debug, Clone)]
    pub struct StoredItem<T> {
        /// The remote id
        pub id: String,
        /// The id of the container
        pub container: String,
        /// The item as posted
        pub item: T,
        /// The posted children
        pub children: Vec<Value>,
    }

    #[derive(Debug)]
    struct ItemsState<T> {
        /// (resource owner, name) => container id
        containers: HashMap<(String, String), String>,
        items: Vec<StoredItem<T>>,
        container_lookups: usize,
        next_id: usize,
    }

    /// In-memory store of restorable items, by container
    #[derive(Debug)]
    pub struct InMemoryItems<T> {
        state: RwLock<ItemsState<T>>,
    }

    impl<T> Default for InMemoryItems<T> {
        fn default() -> Self {
            Self::new()
        }
    }

    impl<T> InMemoryItems<T> {
        /// Create a new (empty) `InMemoryItems`
        #[must_use]
        pub fn new() -> Self {
            Self {
                state: RwLock::new(ItemsState {
                    containers: HashMap::new(),
                    items: Vec::new(),
                    container_lookups: 0,
                    next_id: 0,
                }),
            }
        }

        /// How often containers were resolved
        ///
        /// # Panics
        ///
        /// If the lock is poisoned.
        #[must_use]
        pub fn container_lookups(&self) -> usize {
            self.state.read().unwrap().container_lookups
        }
    }

    impl<T: Clone> InMemoryItems<T> {
        /// Add an existing item to the container `name` of `owner`
        ///
        /// # Returns
        ///
        /// The id of the item.
        ///
        /// # Panics
        ///
        /// If the lock is poisoned.
        pub fn add_existing(&self, owner: &str, name: &str, item: T) -> String {
            let mut state = self.state.write().unwrap();
            state.next_id += 1;
            let container = format!("container-{}", state.next_id);
            let container = state
                .containers
                .entry((owner.to_string(), name.to_string()))
                .or_insert(container)
                .clone();

            state.next_id += 1;
            let id = format!("existing-{}", state.next_id);
            state.items.push(StoredItem {
                id: id.clone(),
                container,
                item,
                children: Vec::new(),
            });
            id
        }

        /// The id of the container `name` of `owner`, if it exists
        ///
        /// # Panics
        ///
        /// If the lock is poisoned.
        #[must_use]
        pub fn container_id(&self, owner: &str, name: &str) -> Option<String> {
            self.state
                .read()
                .unwrap()
                .containers
                .get(&(owner.to_string(), name.to_string()))
                .cloned()
        }

        /// All items currently stored
        ///
        /// # Panics
        ///
        /// If the lock is poisoned.
        #[must_use]
        pub fn items(&self) -> Vec<StoredItem<T>> {
            self.state.read().unwrap().items.clone()
        }
    }

    impl<T> ItemRestoreHandler<T> for InMemoryItems<T>
    where
        T: RestorableItem + Clone,
        T::Container: NewContainer,
    {
        fn get_or_create_container(
            &self,
            resource_owner: &str,
            name: &str,
        ) -> anyhow::Result<T::Container> {
            let mut state = self.state.write().unwrap();
            state.container_lookups += 1;
            state.next_id += 1;
            let new_id = format!("container-{}", state.next_id);
            let id = state
                .containers
                .entry((resource_owner.to_string(), name.to_string()))
                .or_insert(new_id)
                .clone();
            Ok(T::Container::new_container(id, name.to_string()))
        }

        fn collision_keys(&self, container_id: &str) -> anyhow::Result<HashMap<String, String>> {
            let state = self.state.read().unwrap();
            Ok(state
                .items
                .iter()
                .filter(|stored| stored.container == container_id)
                .map(|stored| (stored.item.collision_key(), stored.id.clone()))
                .collect())
        }

        fn post_item(&self, container_id: &str, item: &T) -> anyhow::Result<String> {
            let mut state = self.state.write().unwrap();
            anyhow::ensure!(
                state.containers.values().any(|id| id == container_id),
                "container `{container_id}` not found"
            );
            state.next_id += 1;
            let id = format!("item-{}", state.next_id);
            state.items.push(StoredItem {
                id: id.clone(),
                container: container_id.to_string(),
                item: item.clone(),
                children: Vec::new(),
            });
            Ok(id)
        }

        fn post_children(
            &self,
            _container_id: &str,
            item_id: &str,
            children: Vec<Value>,
        ) -> anyhow::Result<()> {
            let mut state = self.state.write().unwrap();
            let stored = state
                .items
                .iter_mut()
                .find(|stored| stored.id == item_id)
                .ok_or_else(|| anyhow::anyhow!("item `{item_id}` not found"))?;
            stored.children.extend(children);
            Ok(())
        }

        fn delete_item(&self, container_id: &str, item_id: &str) -> anyhow::Result<()> {
            let mut state = self.state.write().unwrap();
            let before = state.items.len();
            state
                .items
                .retain(|stored| !(stored.container == container_id && stored.id == item_id));
            anyhow::ensure!(state.items.len() < before, "item `{item_id}` not found");
            Ok(())
        }
    }
}
