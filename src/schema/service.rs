//! Typed CRUD over one table

use crate::error::{Result, StoreError};
use crate::record_id::RecordId;
use crate::repository::CachedRepository;
use crate::schema::types::{Entity, Location, Organizer, Topic};
use std::marker::PhantomData;

/// Cached CRUD operations for records of type `T`
pub struct EntityService<T> {
    repo: CachedRepository,
    _entity: PhantomData<fn() -> T>,
}

pub type LocationService = EntityService<Location>;
pub type OrganizerService = EntityService<Organizer>;
pub type TopicService = EntityService<Topic>;

impl<T> Clone for EntityService<T> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> EntityService<T> {
    pub fn new(repo: CachedRepository) -> Self {
        Self {
            repo,
            _entity: PhantomData,
        }
    }

    pub fn repository(&self) -> &CachedRepository {
        &self.repo
    }

    /// All records of the table
    pub async fn list(&self) -> Result<Vec<T>> {
        self.repo.select_all_as(T::TABLE).await
    }

    pub async fn get(&self, id: &RecordId) -> Result<Option<T>> {
        check_table::<T>(id)?;
        self.repo.select_as(id).await
    }

    /// Create `entity`, keeping its id if it has one
    pub async fn create(&self, entity: &T) -> Result<T> {
        let data = serde_json::to_value(entity)?;
        let created = self.repo.create(T::TABLE, data).await?;
        Ok(serde_json::from_value(created)?)
    }

    /// Replace the stored record with `entity`
    pub async fn update(&self, entity: &T) -> Result<T> {
        let id = entity.id().ok_or_else(|| {
            StoreError::InvalidRecordId(format!("{} record without id", T::TABLE))
        })?;
        check_table::<T>(id)?;

        let data = serde_json::to_value(entity)?;
        let updated = self.repo.update(id, data).await?;
        Ok(serde_json::from_value(updated)?)
    }

    pub async fn delete(&self, id: &RecordId) -> Result<()> {
        check_table::<T>(id)?;
        self.repo.delete(id).await
    }
}

fn check_table<T: Entity>(id: &RecordId) -> Result<()> {
    if id.table() == T::TABLE {
        Ok(())
    } else {
        Err(StoreError::InvalidRecordId(format!(
            "{} is not a {} record",
            id,
            T::TABLE
        )))
    }
}
