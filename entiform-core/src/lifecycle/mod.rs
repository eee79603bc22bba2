// Entiform Lifecycle Hooks - extension seams around every CRUD transition

use crate::entity::Entity;

/// Lifecycle hooks for an entity type
///
/// Every method is a no-op by default. Concrete entity types override the
/// ones they care about and register the implementation through
/// [`crate::metadata::EntityTypeBuilder::hooks`]; subtypes that register
/// nothing inherit their parent's hooks.
///
/// Hooks fire strictly in the order documented on
/// [`crate::crud::EntityRuntime`]: `before_*`, then `on_*` right before the
/// request, then either `after_*` or `*_failed`.
///
/// # Example
///
/// ```rust,ignore
/// struct AuditHooks;
///
/// impl EntityHooks for AuditHooks {
///     fn before_save(&self, entity: &mut Entity) {
///         entity.set("updated_by", "admin");
///     }
/// }
/// ```
pub trait EntityHooks: Send + Sync {
    /// Before the save request is issued (after validation passed)
    fn before_save(&self, _entity: &mut Entity) {}

    /// Right before the create/update request leaves
    fn on_saving(&self, _entity: &mut Entity) {}

    /// After the response has been merged and the snapshot refreshed
    fn after_save(&self, _entity: &mut Entity) {}

    fn save_failed(&self, _entity: &mut Entity) {}

    fn before_update(&self, _entity: &mut Entity) {}

    fn on_updating(&self, _entity: &mut Entity) {}

    fn after_update(&self, _entity: &mut Entity) {}

    fn update_failed(&self, _entity: &mut Entity) {}

    fn before_delete(&self, _entity: &mut Entity) {}

    fn on_deleting(&self, _entity: &mut Entity) {}

    fn after_delete(&self, _entity: &mut Entity) {}

    fn delete_failed(&self, _entity: &mut Entity) {}

    /// On the freshly fetched instance
    fn after_get_element(&self, _entity: &mut Entity) {}

    /// On an empty placeholder instance of the type
    fn get_element_failed(&self, _entity: &mut Entity) {}

    /// On the first instance of a fetched list only
    fn after_get_element_list(&self, _entity: &mut Entity) {}

    fn get_element_list_failed(&self, _entity: &mut Entity) {}

    fn after_refresh(&self, _entity: &mut Entity) {}

    fn refresh_failed(&self, _entity: &mut Entity) {}

    /// After a full validation pass settled
    fn on_validated(&self, _entity: &Entity) {}
}

/// Hooks used when a type registers none
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl EntityHooks for NoHooks {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::EntityType;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct CountingHooks {
        saves: Arc<AtomicUsize>,
    }

    impl EntityHooks for CountingHooks {
        fn before_save(&self, _entity: &mut Entity) {
            self.saves.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_default_hooks_are_noops() {
        let ty = EntityType::builder("Plain").build();
        let mut entity = Entity::empty(&ty);
        ty.hooks().before_save(&mut entity);
        ty.hooks().after_delete(&mut entity);
        assert!(!entity.is_dirty());
    }

    #[test]
    fn test_subtype_inherits_hooks() {
        let saves = Arc::new(AtomicUsize::new(0));
        let parent = EntityType::builder("Parent")
            .hooks(CountingHooks {
                saves: Arc::clone(&saves),
            })
            .build();
        let child = EntityType::builder("Child").extends(parent).build();

        let mut entity = Entity::empty(&child);
        child.hooks().before_save(&mut entity);
        assert_eq!(saves.load(Ordering::SeqCst), 1);
    }
}
