use std::collections::BTreeMap;
use voxelfront_common::{EntityId, Transform};

/// Dynamic entities composited over the streamed world.
///
/// Keyed by [`EntityId`]; a BTreeMap keeps iteration deterministic so draw
/// order does not depend on spawn order.
#[derive(Debug, Default)]
pub struct EntityStore {
    entities: BTreeMap<EntityId, Transform>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, transform: Transform) -> EntityId {
        let id = EntityId::new();
        self.entities.insert(id, transform);
        tracing::debug!(?id, "entity spawned");
        id
    }

    pub fn despawn(&mut self, id: EntityId) -> bool {
        self.entities.remove(&id).is_some()
    }

    pub fn get(&self, id: EntityId) -> Option<&Transform> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Transform> {
        self.entities.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Transforms in key order, ready for instanced rendering.
    pub fn transforms(&self) -> Vec<Transform> {
        self.entities.values().copied().collect()
    }

    pub fn clear(&mut self) {
        self.entities.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn spawn_assigns_unique_ids() {
        let mut store = EntityStore::new();
        let a = store.spawn(Transform::default());
        let b = store.spawn(Transform::default());
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn despawn_is_idempotent() {
        let mut store = EntityStore::new();
        let id = store.spawn(Transform::default());
        assert!(store.despawn(id));
        assert!(!store.despawn(id));
        assert!(store.is_empty());
    }

    #[test]
    fn transforms_reflect_mutation() {
        let mut store = EntityStore::new();
        let id = store.spawn(Transform::default());
        store.get_mut(id).unwrap().position = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(store.transforms()[0].position, Vec3::new(1.0, 2.0, 3.0));
    }
}
