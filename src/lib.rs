// auth-fetch - Library root

pub mod auth;
pub mod config;
pub mod error;
pub mod http_client;
pub mod install;
pub mod interceptor;
pub mod redirect;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

pub use auth::{CredentialHolder, RefreshCoordinator};
pub use error::{FetchError, RefreshError};
pub use http_client::AuthHttpClient;
pub use install::{install, installed};
pub use interceptor::{AuthInterceptor, AuthRequest};
pub use redirect::LoginRedirect;
pub use transport::Transport;
