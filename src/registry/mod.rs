//! Entity registry.
//!
//! In-memory map from `entity_id` to the tracked [`Entity`]. This is the only
//! state shared between the consumer and the host, so every accessor goes
//! through one lock and each call is atomic on its own.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::model::{Classification, Location};

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Entity {entity_id} is already registered")]
    Conflict { entity_id: String },

    #[error("Entity {entity_id} is not registered")]
    NotFound { entity_id: String },

    #[error("Entity {entity_id} has no history")]
    NotDynamic { entity_id: String },
}

/// Positions over time, ordered by `occurred_at`.
///
/// A sort key is recorded once, so replaying the same row twice leaves one
/// entry even when its fallback capture time differs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    entries: BTreeMap<(DateTime<Utc>, String), Location>,
    sort_keys: HashSet<String>,
}

impl History {
    /// Returns false when the sort key was already recorded.
    pub fn insert(&mut self, location: Location) -> bool {
        if !self.sort_keys.insert(location.sort_key.clone()) {
            return false;
        }
        self.entries
            .insert((location.occurred_at, location.sort_key.clone()), location);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Location> {
        self.entries.values()
    }

    pub fn latest(&self) -> Option<&Location> {
        self.entries.values().next_back()
    }
}

/// A tracked marker.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub entity_id: String,
    pub classification: Classification,
    /// The location the entity was created with.
    pub origin: Location,
    history: Option<History>,
}

impl Entity {
    /// Dynamic entities get a history seeded with `origin`.
    pub fn new(
        entity_id: impl Into<String>,
        classification: Classification,
        origin: Location,
    ) -> Self {
        let history = (classification == Classification::Dynamic).then(|| {
            let mut history = History::default();
            history.insert(origin.clone());
            history
        });
        Self {
            entity_id: entity_id.into(),
            classification,
            origin,
            history,
        }
    }

    pub fn history(&self) -> Option<&History> {
        self.history.as_ref()
    }

    /// Newest known location.
    pub fn latest(&self) -> &Location {
        self.history
            .as_ref()
            .and_then(History::latest)
            .unwrap_or(&self.origin)
    }
}

/// Thread-safe entity map.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entries: RwLock<HashMap<String, Entity>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new entity. Fails if the id is taken.
    pub async fn insert(&self, entity: Entity) -> Result<()> {
        let mut entries = self.entries.write().await;
        if entries.contains_key(&entity.entity_id) {
            return Err(RegistryError::Conflict {
                entity_id: entity.entity_id,
            });
        }
        entries.insert(entity.entity_id.clone(), entity);
        Ok(())
    }

    /// Record a new location on a Dynamic entity.
    ///
    /// Returns false when the location was already in the history.
    pub async fn append_location(&self, entity_id: &str, location: Location) -> Result<bool> {
        let mut entries = self.entries.write().await;
        let entity = entries
            .get_mut(entity_id)
            .ok_or_else(|| RegistryError::NotFound {
                entity_id: entity_id.to_string(),
            })?;
        let history = entity
            .history
            .as_mut()
            .ok_or_else(|| RegistryError::NotDynamic {
                entity_id: entity_id.to_string(),
            })?;
        Ok(history.insert(location))
    }

    pub async fn lookup(&self, entity_id: &str) -> Option<Entity> {
        self.entries.read().await.get(entity_id).cloned()
    }

    pub async fn contains(&self, entity_id: &str) -> bool {
        self.entries.read().await.contains_key(entity_id)
    }

    pub async fn remove(&self, entity_id: &str) -> Option<Entity> {
        self.entries.write().await.remove(entity_id)
    }

    /// Remove every entity matching `predicate`, returning the removed ones.
    pub async fn remove_if<F>(&self, mut predicate: F) -> Vec<Entity>
    where
        F: FnMut(&Entity) -> bool,
    {
        let mut entries = self.entries.write().await;
        let doomed: Vec<String> = entries
            .values()
            .filter(|e| predicate(e))
            .map(|e| e.entity_id.clone())
            .collect();
        doomed
            .iter()
            .filter_map(|id| entries.remove(id))
            .collect()
    }

    /// Snapshot of all entities, sorted by id.
    pub async fn entities(&self) -> Vec<Entity> {
        let mut all: Vec<Entity> = self.entries.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        all
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
