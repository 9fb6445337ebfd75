use log::debug;

use crate::{
    collection::{RestoreCollection, RestoreItem},
    collision::{CollisionPolicy, restore_with_collision_policy},
    commands::restore::CollectionRestorer,
    details::{self, CollectionMetrics, DetailsEntry},
    error::{RestoreError, RestoreResult},
    item::RestorableItem,
    remote::{Container, ItemRestoreHandler},
};

impl CollectionRestorer<'_> {
    pub(super) fn restore_item_collection<T: RestorableItem>(
        &mut self,
        handler: &dyn ItemRestoreHandler<T>,
        collection: &dyn RestoreCollection,
        metrics: &mut CollectionMetrics,
    ) -> RestoreResult<()> {
        let container_id = self.restore_container(handler, collection)?;

        self.for_each_item(collection, |restorer, item| {
            restorer.restore_item(handler, collection, &container_id, item, metrics)
        })
    }

    /// Resolve the container of `location` for the resource owner of `collection`, once per
    /// operation.
    ///
    /// Without a location, the items go back into a container named like the one they were
    /// backed up from.
    fn restore_container<T: RestorableItem>(
        &mut self,
        handler: &dyn ItemRestoreHandler<T>,
        collection: &dyn RestoreCollection,
    ) -> RestoreResult<String> {
        let owner = collection.full_path().resource_owner();
        let location = self.container_name(collection).to_string();
        let location = location.as_str();

        if let Some(id) = self.caches.container_id(T::CATEGORY, owner, location) {
            return Ok(id.to_string());
        }

        let container = handler
            .get_or_create_container(owner, location)
            .map_err(RestoreError::remote)?;
        debug!(
            "restoring {} items of {owner} into {} ({})",
            T::KIND,
            container.display_name(),
            container.id()
        );
        self.caches
            .set_container_id(T::CATEGORY, owner, location, container.id());
        Ok(container.id().to_string())
    }

    /// The name of the container the items of `collection` are restored into.
    fn container_name<'c>(&'c self, collection: &'c dyn RestoreCollection) -> &'c str {
        match self.opts.location.as_str() {
            "" => collection.full_path().last().unwrap_or_default(),
            location => location,
        }
    }

    fn restore_item<T: RestorableItem>(
        &mut self,
        handler: &dyn ItemRestoreHandler<T>,
        collection: &dyn RestoreCollection,
        container_id: &str,
        entry: RestoreItem,
        metrics: &mut CollectionMetrics,
    ) -> RestoreResult<()> {
        metrics.objects += 1;
        let size = entry.data.len() as u64;

        let mut item = T::decode(&entry.id, &entry.data)?;
        item.prepare_for(&self.opts.location, &entry.id);
        let children = item.take_children();
        let key = item.collision_key();
        let policy = self.opts.on_collision;

        let keys = self
            .caches
            .collision_keys(container_id, || handler.collision_keys(container_id))?;
        let updated = policy == CollisionPolicy::Replace && keys.contains_key(&key);

        let res = restore_with_collision_policy(
            policy,
            &key,
            keys,
            || handler.post_item(container_id, &item),
            |old_id| handler.delete_item(container_id, old_id),
        );
        let item_id = match res {
            Ok(id) => id,
            Err(err) => {
                let Some(id) = err.created_item_id().map(ToString::to_string) else {
                    return Err(err);
                };
                self.add_fault(err);
                id
            }
        };

        if !children.is_empty() {
            debug!("posting {} children of {item_id}", children.len());
            handler
                .post_children(container_id, &item_id, children)
                .map_err(RestoreError::remote)?;
        }

        metrics.add_success(size);
        let path = collection.full_path();
        let entry = DetailsEntry {
            repo_ref: format!("{path}/{}", entry.id),
            location_ref: self.container_name(collection).to_string(),
            category: T::CATEGORY,
            name: item.display_name(),
            size,
            updated,
        };
        details::record(self.details, entry);

        Ok(())
    }
}
