use thiserror::Error;

pub mod models;
pub mod snapshot;

pub use models::*;
pub use snapshot::*;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StorageError {
    #[error("Resource not found: {resource_type} '{resource_id}'")]
    ResourceNotFound {
        resource_type: String,
        resource_id: String,
    },
}

impl StorageError {
    pub fn not_found(resource_type: &str, resource: &models::ResourceRef) -> Self {
        StorageError::ResourceNotFound {
            resource_type: resource_type.to_string(),
            resource_id: resource.to_string(),
        }
    }
}
