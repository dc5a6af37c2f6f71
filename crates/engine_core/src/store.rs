//! Entity store: a hecs world addressed by the string ids used on the wire.
//!
//! Components live in hecs archetype storage. The store keeps a side index
//! from network id to `hecs::Entity` so systems and the network layer can
//! address entities by id while queries stay archetype-fast.

use std::collections::HashMap;

use hecs::{Component, ComponentError, DynamicBundle, Entity, Query, Ref, RefMut, World};

use crate::components::{EntityKind, EntityTag};
use crate::error::{SimError, SimResult};

/// Sparse collection of entities, each an id plus an arbitrary set of components.
#[derive(Default)]
pub struct EntityStore {
    world: World,
    index: HashMap<String, Entity>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn an entity with the given id, kind and initial components.
    pub fn spawn(
        &mut self,
        id: impl Into<String>,
        kind: EntityKind,
        components: impl DynamicBundle,
    ) -> SimResult<Entity> {
        let id = id.into();
        if self.index.contains_key(&id) {
            return Err(SimError::DuplicateEntity(id));
        }
        let entity = self.world.spawn((EntityTag {
            id: id.clone(),
            kind,
        },));
        self.world
            .insert(entity, components)
            .map_err(|_| SimError::UnknownEntity(id.clone()))?;
        self.index.insert(id, entity);
        Ok(entity)
    }

    /// Remove an entity and all its components. Returns false if it did not exist.
    pub fn despawn(&mut self, id: &str) -> bool {
        match self.index.remove(id) {
            Some(entity) => self.world.despawn(entity).is_ok(),
            None => false,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn entity(&self, id: &str) -> Option<Entity> {
        self.index.get(id).copied()
    }

    pub fn kind_of(&self, id: &str) -> Option<EntityKind> {
        let entity = self.entity(id)?;
        self.world.get::<&EntityTag>(entity).ok().map(|tag| tag.kind)
    }

    /// Borrow a component of the entity with the given id.
    pub fn get<T: Component>(&self, id: &str) -> SimResult<Ref<'_, T>> {
        let entity = self
            .entity(id)
            .ok_or_else(|| SimError::UnknownEntity(id.to_string()))?;
        self.world
            .get::<&T>(entity)
            .map_err(|err| component_error::<T>(id, err))
    }

    /// Mutably borrow a component of the entity with the given id.
    pub fn get_mut<T: Component>(&self, id: &str) -> SimResult<RefMut<'_, T>> {
        let entity = self
            .entity(id)
            .ok_or_else(|| SimError::UnknownEntity(id.to_string()))?;
        self.world
            .get::<&mut T>(entity)
            .map_err(|err| component_error::<T>(id, err))
    }

    pub fn has<T: Component>(&self, id: &str) -> bool {
        self.entity(id)
            .and_then(|entity| self.world.entity(entity).ok())
            .is_some_and(|entity_ref| entity_ref.has::<T>())
    }

    /// Add (or replace) a component on an existing entity.
    pub fn insert<T: Component>(&mut self, id: &str, component: T) -> SimResult<()> {
        let entity = self
            .entity(id)
            .ok_or_else(|| SimError::UnknownEntity(id.to_string()))?;
        self.world
            .insert_one(entity, component)
            .map_err(|_| SimError::UnknownEntity(id.to_string()))
    }

    /// Detach a component from an entity, returning it.
    pub fn remove<T: Component>(&mut self, id: &str) -> SimResult<T> {
        let entity = self
            .entity(id)
            .ok_or_else(|| SimError::UnknownEntity(id.to_string()))?;
        self.world
            .remove_one::<T>(entity)
            .map_err(|err| component_error::<T>(id, err))
    }

    /// Ids of every entity matching the component query `Q`, sorted.
    pub fn ids_with<Q: Query>(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .world
            .query::<(&EntityTag, Q)>()
            .iter()
            .map(|(_, (tag, _))| tag.id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Ids of every entity with component `T` satisfying `predicate`, sorted.
    pub fn ids_where<T: Component>(&self, mut predicate: impl FnMut(&T) -> bool) -> Vec<String> {
        let mut ids: Vec<String> = self
            .world
            .query::<(&EntityTag, &T)>()
            .iter()
            .filter(|(_, (_, component))| predicate(component))
            .map(|(_, (tag, _))| tag.id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Ids of every entity of the given kind, sorted.
    pub fn ids_of_kind(&self, kind: EntityKind) -> Vec<String> {
        let mut ids: Vec<String> = self
            .world
            .query::<&EntityTag>()
            .iter()
            .filter(|(_, tag)| tag.kind == kind)
            .map(|(_, tag)| tag.id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.index.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Direct access to the underlying world for archetype queries.
    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }
}

fn component_error<T>(id: &str, err: ComponentError) -> SimError {
    match err {
        ComponentError::NoSuchEntity => SimError::UnknownEntity(id.to_string()),
        ComponentError::MissingComponent(_) => SimError::missing::<T>(id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{GameStatus, Team};
    use crate::transform::Transform;
    use glam::Vec3;

    fn store_with_two() -> EntityStore {
        let mut store = EntityStore::new();
        store
            .spawn(
                "red-1",
                EntityKind::Vehicle,
                (Transform::default(), GameStatus::new(Team::Red, 100.0)),
            )
            .unwrap();
        store
            .spawn(
                "flag-red",
                EntityKind::Flag,
                (Transform::from_position(Vec3::X),),
            )
            .unwrap();
        store
    }

    #[test]
    fn spawn_rejects_duplicate_ids() {
        let mut store = store_with_two();
        let err = store
            .spawn("red-1", EntityKind::Vehicle, (Transform::default(),))
            .unwrap_err();
        assert!(matches!(err, SimError::DuplicateEntity(id) if id == "red-1"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn query_by_components() {
        let store = store_with_two();
        assert_eq!(store.ids_with::<&Transform>(), vec!["flag-red", "red-1"]);
        assert_eq!(
            store.ids_with::<(&Transform, &GameStatus)>(),
            vec!["red-1"]
        );
        assert_eq!(store.ids_of_kind(EntityKind::Flag), vec!["flag-red"]);
    }

    #[test]
    fn query_with_predicate() {
        let store = store_with_two();
        let far = store.ids_where::<Transform>(|t| t.position.x > 0.5);
        assert_eq!(far, vec!["flag-red"]);
    }

    #[test]
    fn missing_component_is_reported() {
        let store = store_with_two();
        let err = store.get::<GameStatus>("flag-red").unwrap_err();
        assert!(matches!(err, SimError::MissingComponent { .. }));
        let err = store.get::<GameStatus>("nobody").unwrap_err();
        assert!(matches!(err, SimError::UnknownEntity(_)));
    }

    #[test]
    fn components_can_be_added_and_removed() {
        let mut store = store_with_two();
        store
            .insert("flag-red", GameStatus::flag(Team::Red))
            .unwrap();
        assert!(store.has::<GameStatus>("flag-red"));
        let removed = store.remove::<GameStatus>("flag-red").unwrap();
        assert!(removed.at_base);
        assert!(!store.has::<GameStatus>("flag-red"));
    }

    #[test]
    fn despawn_frees_the_id() {
        let mut store = store_with_two();
        assert!(store.despawn("red-1"));
        assert!(!store.despawn("red-1"));
        assert!(!store.contains("red-1"));
        store
            .spawn("red-1", EntityKind::Vehicle, (Transform::default(),))
            .unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn mutation_through_get_mut() {
        let store = store_with_two();
        store.get_mut::<GameStatus>("red-1").unwrap().take_damage(40.0);
        assert_eq!(store.get::<GameStatus>("red-1").unwrap().health, 60.0);
    }
}
