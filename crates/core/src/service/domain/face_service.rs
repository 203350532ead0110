use thiserror::Error;

use crate::persons::domain::person::Person;
use crate::staging::domain::staged_image::StagedImage;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("transport failure: {0}")]
    Network(String),
    #[error("status {status}: {body}")]
    Server { status: u16, body: String },
    #[error("could not decode response: {0}")]
    InvalidResponse(String),
}

/// Remote face recognition service: person store, enrollment, training and
/// identification. Embeddings are computed server-side.
pub trait FaceService: Send + Sync {
    /// All known persons, in server order.
    fn list_persons(&self) -> Result<Vec<Person>, ServiceError>;

    fn create_person(&self, name: &str) -> Result<(), ServiceError>;

    fn delete_person(&self, name: &str) -> Result<(), ServiceError>;

    /// Attaches images to a person in one request, preserving slice order.
    fn attach_images(&self, name: &str, images: &[StagedImage]) -> Result<(), ServiceError>;

    fn train_person(&self, name: &str) -> Result<(), ServiceError>;

    /// Labels matched in the probe images. May be empty.
    fn recognize(&self, images: &[StagedImage]) -> Result<Vec<String>, ServiceError>;
}
