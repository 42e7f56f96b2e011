pub mod extract;
pub mod models;
pub mod search_service;

pub use models::{DriveError, FileDescriptor, QueryReport, SearchPolicy};
pub use search_service::{search_drive_function, DriveProvider, DriveSearchService};
