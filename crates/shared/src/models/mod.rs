pub mod api;
pub mod job;
pub mod resource;

pub use job::{JobRequest, JobSpec, ResultAttestation, ValidationError};
pub use resource::{ResourceCapability, ResourceStatus, UnknownStatus};
