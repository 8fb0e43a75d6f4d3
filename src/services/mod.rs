pub mod document_service;
pub mod lifecycle_service;
pub mod lookup_service;

pub use document_service::DocumentService;
pub use lifecycle_service::{resolve_date_range, LifecycleService, ReportQuery};
pub use lookup_service::LookupService;
