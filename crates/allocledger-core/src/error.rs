//! Registry lifecycle errors.
//!
//! Data operations (insert/resize/remove/size_of) never return these; they
//! signal failure through null/zero results.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("registry is already initialized")]
    AlreadyInitialized,
    #[error("could not allocate a record table of {capacity} slots")]
    TableAllocation { capacity: usize },
}
