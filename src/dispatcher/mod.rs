//! Entity dispatch.
//!
//! Decides, per observed row, whether to create a tracked entity or extend an
//! existing one:
//!
//! - Dynamic: first sighting creates the entity, later rows append to its history.
//! - Static / Temporary: first sighting creates the entity, later rows are
//!   dropped since these markers are locked in position once placed.
//!
//! Rows arriving from the change feed are never written back to the store.
//! Only [`Dispatcher::create`] with [`Persist::Store`] persists.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};
use crate::interfaces::EntityStore;
use crate::model::{ChangeEvent, Classification, Location, MarkerRow};
use crate::registry::{Entity, EntityRegistry, RegistryError};

/// Whether entity creation writes the row to the entity store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persist {
    Skip,
    Store,
}

/// What a dispatch did to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A new entity was registered.
    Created,
    /// A location was added to a Dynamic entity's history.
    Appended,
    /// The location was already in the Dynamic entity's history.
    Duplicate,
    /// The entity exists and does not accept further locations.
    Dropped,
}

/// Applies rows to the entity registry.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<EntityRegistry>,
    store: Option<Arc<dyn EntityStore>>,
}

impl Dispatcher {
    pub fn new(registry: Arc<EntityRegistry>) -> Self {
        Self {
            registry,
            store: None,
        }
    }

    /// Attach the store used for persistence, removal and latest-record lookups.
    pub fn with_store(mut self, store: Arc<dyn EntityStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn registry(&self) -> &Arc<EntityRegistry> {
        &self.registry
    }

    pub fn store(&self) -> Option<&Arc<dyn EntityStore>> {
        self.store.as_ref()
    }

    /// Apply a change feed event. Never persists.
    pub async fn dispatch(&self, event: &ChangeEvent) -> DispatchOutcome {
        debug!(
            entity_id = %event.entity_id,
            sort_key = %event.sort_key,
            sequence_number = %event.sequence_number,
            "Dispatching change event"
        );
        self.apply(&event.to_row()).await
    }

    /// Apply a row already present in the store. Never persists.
    pub async fn apply(&self, row: &MarkerRow) -> DispatchOutcome {
        match row.classification {
            Classification::Dynamic => self.apply_dynamic(row).await,
            Classification::Static | Classification::Temporary => self.apply_fixed(row).await,
        }
    }

    async fn apply_dynamic(&self, row: &MarkerRow) -> DispatchOutcome {
        // A concurrent creator can win between the append and the insert, so
        // a conflicting insert goes back to appending once.
        for _ in 0..2 {
            match self
                .registry
                .append_location(&row.entity_id, row.location.clone())
                .await
            {
                Ok(true) => {
                    debug!(
                        entity_id = %row.entity_id,
                        sort_key = %row.location.sort_key,
                        position = %row.location.position,
                        "Added location to dynamic marker"
                    );
                    return DispatchOutcome::Appended;
                }
                Ok(false) => {
                    debug!(
                        entity_id = %row.entity_id,
                        sort_key = %row.location.sort_key,
                        "Location already in history"
                    );
                    return DispatchOutcome::Duplicate;
                }
                Err(RegistryError::NotDynamic { .. }) => {
                    debug!(
                        entity_id = %row.entity_id,
                        "Dynamic row for a fixed marker, dropping"
                    );
                    return DispatchOutcome::Dropped;
                }
                Err(_) => {}
            }

            match self.register(row).await {
                Ok(()) => return DispatchOutcome::Created,
                Err(RegistryError::Conflict { .. }) => continue,
                Err(e) => {
                    warn!(entity_id = %row.entity_id, error = %e, "Failed to register marker");
                    return DispatchOutcome::Dropped;
                }
            }
        }
        DispatchOutcome::Dropped
    }

    async fn apply_fixed(&self, row: &MarkerRow) -> DispatchOutcome {
        match self.register(row).await {
            Ok(()) => DispatchOutcome::Created,
            Err(e) => {
                debug!(
                    entity_id = %row.entity_id,
                    sort_key = %row.location.sort_key,
                    error = %e,
                    "Marker is locked in position, dropping row"
                );
                DispatchOutcome::Dropped
            }
        }
    }

    async fn register(&self, row: &MarkerRow) -> std::result::Result<(), RegistryError> {
        self.registry
            .insert(Entity::new(
                row.entity_id.clone(),
                row.classification,
                row.location.clone(),
            ))
            .await?;
        info!(
            entity_id = %row.entity_id,
            classification = %row.classification,
            position = %row.location.position,
            "Created marker"
        );
        Ok(())
    }

    /// Create an entity on behalf of the host.
    ///
    /// An id that is already registered is dropped, nothing is persisted.
    /// With [`Persist::Store`] the row is written after registration; a
    /// failed write is returned and the registry entry stays.
    pub async fn create(&self, row: MarkerRow, persist: Persist) -> Result<DispatchOutcome> {
        let store = match persist {
            Persist::Store => Some(self.store.as_ref().ok_or(SyncError::NoStore)?),
            Persist::Skip => None,
        };

        if let Err(e) = self.register(&row).await {
            debug!(entity_id = %row.entity_id, error = %e, "Cannot create marker");
            return Ok(DispatchOutcome::Dropped);
        }

        if let Some(store) = store {
            store.put(&row).await?;
            debug!(
                entity_id = %row.entity_id,
                sort_key = %row.location.sort_key,
                "Persisted marker"
            );
        }
        Ok(DispatchOutcome::Created)
    }

    /// Stop tracking an entity, optionally deleting its origin row from the store.
    pub async fn remove(&self, entity_id: &str, delete_from_store: bool) -> Result<Option<Entity>> {
        let store = if delete_from_store {
            Some(self.store.as_ref().ok_or(SyncError::NoStore)?)
        } else {
            None
        };

        let Some(entity) = self.registry.remove(entity_id).await else {
            return Ok(None);
        };
        info!(entity_id = %entity_id, "Removed marker");

        if let Some(store) = store {
            store.delete(entity_id, &entity.origin.sort_key).await?;
            debug!(
                entity_id = %entity_id,
                sort_key = %entity.origin.sort_key,
                "Deleted marker row"
            );
        }
        Ok(Some(entity))
    }

    /// Ask the store for the newest row of an entity.
    ///
    /// Returns the location only when it is newer than what the registry
    /// already knows; Dynamic entities also get it appended to their history.
    pub async fn refresh_latest(&self, entity_id: &str) -> Result<Option<Location>> {
        let store = self.store.as_ref().ok_or(SyncError::NoStore)?;
        let Some(entity) = self.registry.lookup(entity_id).await else {
            return Ok(None);
        };
        let Some(row) = store.latest(entity_id).await? else {
            return Ok(None);
        };

        if row.location.occurred_at <= entity.latest().occurred_at {
            return Ok(None);
        }

        if entity.classification == Classification::Dynamic {
            if let Err(e) = self
                .registry
                .append_location(entity_id, row.location.clone())
                .await
            {
                debug!(entity_id = %entity_id, error = %e, "Marker vanished during refresh");
                return Ok(None);
            }
        }
        Ok(Some(row.location))
    }
}
