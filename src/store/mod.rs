/// Cache/Store layer
///
/// Each aggregate keeps a derived, possibly stale copy of durable rows in
/// memory. Mutations go through `OptimisticCache`, so readers see changes
/// before the durable write lands and a failed write leaves no trace.

pub mod habits;
pub mod optimistic;
pub mod todos;
pub mod widget;

pub use habits::*;
pub use optimistic::*;
pub use todos::*;
pub use widget::*;

use thiserror::Error;

use crate::domain::DomainError;
use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl StoreError {
    /// Whether this is a domain rejection rather than a storage failure
    pub fn is_domain(&self) -> bool {
        matches!(self, StoreError::Domain(_))
    }
}
