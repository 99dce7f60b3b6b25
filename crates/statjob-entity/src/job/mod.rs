//! Job record entities.

pub mod record;
pub mod status;

pub use record::{ArtifactDescriptor, CURRENT_SCHEMA_VERSION, JobRecord, RunOutcome, RunRecord};
pub use status::JobStatus;
