// Authentication module
// Holds the access token and coordinates its renewal

mod credentials;
mod refresh;
mod types;

pub use credentials::CredentialHolder;
pub use refresh::{RefreshCoordinator, REFRESH_PATH};
