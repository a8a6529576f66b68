//! Services module - contains the validation and business logic behind the routes.

pub mod answer_validator;
pub mod error;
pub mod fields;
pub mod package_service;
pub mod pagination;
pub mod response_service;
pub mod retention_service;

// Re-export for convenience
pub use answer_validator::{Answer, validate_answer};
pub use error::ServiceError;
pub use package_service::{PackageService, PackageSubmission, parse_package};
pub use pagination::{CursorPage, PageLinks, PageRequest, SequencedSource, paginate};
pub use response_service::{ResponseService, validate_submission};
pub use retention_service::RetentionService;
