//! Persistence contracts, one capability trait per entity.
//!
//! Every mutating operation runs in a single transaction and its mutating
//! statement carries its own precondition, so a lost race shows up as
//! "no rows affected" rather than as a broken invariant. Missing rows are
//! reported as [`StoreError::NotFound`] naming the entity that was missing;
//! the engine decides what that means for the caller.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::db::{
    City, ListQuery, NewUser, PickupPoint, PickupPointDetails, Product, ProductType, Reception,
    User,
};

/// Entity a store error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    User,
    PickupPoint,
    OpenReception,
    Product,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::PickupPoint => write!(f, "pickup point"),
            Self::OpenReception => write!(f, "open reception"),
            Self::Product => write!(f, "product"),
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(Entity),

    #[error("{0} already exists")]
    Duplicate(Entity),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt stored value: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn is_not_found(&self, entity: Entity) -> bool {
        matches!(self, Self::NotFound(e) if *e == entity)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user; `Duplicate(User)` when the email is taken
    async fn create(&self, user: NewUser) -> StoreResult<User>;
    async fn get_by_email(&self, email: &str) -> StoreResult<User>;
}

#[async_trait]
pub trait PvzStore: Send + Sync {
    async fn create(&self, city: City) -> StoreResult<PickupPoint>;
    async fn exists(&self, id: Uuid) -> StoreResult<bool>;
    /// One page of pickup points with their (filtered) receptions and products
    async fn list_with_details(&self, query: &ListQuery) -> StoreResult<Vec<PickupPointDetails>>;
}

#[async_trait]
pub trait ReceptionStore: Send + Sync {
    /// Open a reception unless one is already open; `Duplicate(OpenReception)` otherwise
    async fn open(&self, pvz_id: Uuid) -> StoreResult<Reception>;
    /// Close the open reception; `NotFound(OpenReception)` when there is none
    async fn close_open(&self, pvz_id: Uuid) -> StoreResult<Reception>;
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Append to the open reception with the next sequence position
    async fn append(&self, pvz_id: Uuid, product_type: ProductType) -> StoreResult<Product>;
    /// Remove the highest-sequence product of the open reception.
    ///
    /// Fails with `NotFound(OpenReception)` or `NotFound(Product)`.
    async fn delete_last(&self, pvz_id: Uuid) -> StoreResult<Product>;
}

/// The four stores the services are built from
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub pvz: Arc<dyn PvzStore>,
    pub receptions: Arc<dyn ReceptionStore>,
    pub products: Arc<dyn ProductStore>,
}

impl Stores {
    pub fn sqlite(pool: crate::DbPool) -> Self {
        Self::from_backend(Arc::new(SqliteStore::new(pool)))
    }

    pub fn memory() -> Self {
        Self::from_backend(Arc::new(MemoryStore::new()))
    }

    fn from_backend<S>(backend: Arc<S>) -> Self
    where
        S: UserStore + PvzStore + ReceptionStore + ProductStore + 'static,
    {
        Self {
            users: backend.clone(),
            pvz: backend.clone(),
            receptions: backend.clone(),
            products: backend,
        }
    }
}
