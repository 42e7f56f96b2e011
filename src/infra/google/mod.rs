pub mod auth;
pub mod drive_client;

pub use auth::GoogleAuth;
pub use drive_client::GoogleDriveClient;
